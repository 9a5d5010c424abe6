use std::io::{BufRead, Write};
use tracing::debug;

use crate::backend::EmbeddingBackend;
use crate::errors::Result;
use crate::model::Word2Vec;

pub const START_PROMPT: &str = "Do you want to find closest words of a word? (Y/N)";
pub const WORD_PROMPT: &str = "(To quit type q) Enter the word: ";
pub const COUNT_PROMPT: &str = "number of closest words: ";


/// Interactive nearest-neighbour lookup over any line source and sink.
pub struct QueryLoop<'a, B: EmbeddingBackend, R: BufRead, W: Write> {
    backend: &'a B,
    model: &'a Word2Vec,
    input: R,
    output: W,
}

impl<'a, B: EmbeddingBackend, R: BufRead, W: Write> QueryLoop<'a, B, R, W> {

    pub fn new(backend: &'a B, model: &'a Word2Vec, input: R, output: W) -> Self {
        Self { backend, model, input, output }
    }

    // None at end of input
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    }

    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        self.read_line()
    }

    /// Runs until the user declines, types `q`, or input ends. Returns the number of
    /// lookups answered.
    pub fn run(&mut self) -> Result<usize> {

        writeln!(self.output, "{}", START_PROMPT)?;
        match self.read_line()? {
            Some(answer) if answer.eq_ignore_ascii_case("y") => {},
            _ => return Ok(0)
        }

        let mut answered = 0;
        loop {
            let word = match self.prompt(WORD_PROMPT)? {
                Some(word) if !word.eq_ignore_ascii_case("q") => word,
                _ => break
            };

            let n = match self.prompt(COUNT_PROMPT)? {
                None => break,
                Some(count) => match count.parse::<usize>() {
                    Ok(n) => n,
                    Err(_) => {
                        writeln!(self.output, "'{}' is not a valid number of words", count)?;
                        continue;
                    }
                }
            };

            let nearest = self.backend.words_nearest(self.model, &word, n);
            let labels: Vec<&str> = nearest.iter().map(|(w, _)| w.as_str()).collect();
            debug!("nearest to {}: {:?}", word, nearest);

            writeln!(self.output, "Frequency of {} is {}", word, self.model.vocab.word_frequency(&word))?;
            writeln!(self.output, "closest {} words for {} are [{}]", n, word, labels.join(", "))?;
            answered += 1;
        }

        Ok(answered)
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::config::VectorsConfiguration;
    use crate::corpus::SentenceIterator;
    use crate::model::{VocabCache, VocabWord};
    use std::io::Cursor;

    // answers with the vocabulary in order, so the output is predictable
    struct FixedBackend;

    impl EmbeddingBackend for FixedBackend {
        fn build(&self, configuration: &VectorsConfiguration) -> Word2Vec {
            Word2Vec::new(configuration.clone())
        }
        fn fit(&self, _model: &mut Word2Vec, _iter: &mut dyn SentenceIterator) -> Result<()> {
            Ok(())
        }
        fn words_nearest(&self, model: &Word2Vec, word: &str, n: usize) -> Vec<(String, f32)> {
            if !model.vocab.contains_word(word) {
                return Vec::new();
            }
            model.vocab.words().iter().filter(|w| w.word != word).take(n).map(|w| (w.word.clone(), 0.5)).collect()
        }
    }

    fn model() -> Word2Vec {
        let mut model = Word2Vec::new(VectorsConfiguration::default());
        model.vocab = VocabCache::from_words(vec![VocabWord::new("cat", 7), VocabWord::new("dog", 3), VocabWord::new("fish", 1)], 2);
        model
    }

    fn session(input: &str) -> (usize, String) {
        let model = model();
        let mut output = Vec::new();
        let answered = QueryLoop::new(&FixedBackend, &model, Cursor::new(input), &mut output).run().unwrap();
        (answered, String::from_utf8(output).unwrap())
    }

    #[test]
    fn declining_ends_immediately() {
        let (answered, output) = session("n\ncat\n2\n");
        assert_eq!(answered, 0);
        assert_eq!(output.trim_end(), START_PROMPT);
    }

    #[test]
    fn lookup_then_quit() {
        let (answered, output) = session("Y\ncat\n2\nq\n");
        assert_eq!(answered, 1);
        assert!(output.contains("Frequency of cat is 7"));
        assert!(output.contains("closest 2 words for cat are [dog, fish]"));
        assert!(output.ends_with(WORD_PROMPT));
    }

    #[test]
    fn end_of_input_stops_loop() {
        let (answered, _) = session("y\ncat\n1\ndog\n");
        assert_eq!(answered, 1);
        let (answered, _) = session("y\n");
        assert_eq!(answered, 0);
    }

    #[test]
    fn invalid_count_reprompts() {
        let (answered, output) = session("y\ncat\nmany\nunicorn\n3\nQ\n");
        assert_eq!(answered, 1);
        assert!(output.contains("'many' is not a valid number of words"));
        assert!(output.contains("Frequency of unicorn is 0"));
        assert!(output.contains("closest 3 words for unicorn are []"));
    }
}
