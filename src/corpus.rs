use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use crate::errors::{Result, Word2VecError};


// defines the behavior needed for a sentence level preprocessing step
pub trait SentencePreProcessor {
    fn pre_process(&self, sentence: &str) -> String;
}

pub struct LowerCasePreProcessor;

impl SentencePreProcessor for LowerCasePreProcessor {
    fn pre_process(&self, sentence: &str) -> String {
        sentence.to_lowercase()
    }
}


/// A restartable stream of sentences, one per line of input.
pub trait SentenceIterator {
    fn next_sentence(&mut self) -> Option<Result<String>>;
    fn reset(&mut self) -> Result<()>;
    fn set_pre_processor(&mut self, pre_processor: Box<dyn SentencePreProcessor>);
}


/// Iterates lines of a file, or of every file below a directory (sorted by path).
pub struct FileSentenceIterator {
    files: Vec<PathBuf>,
    position: usize,
    current: Option<Lines<BufReader<File>>>,
    pre_processor: Option<Box<dyn SentencePreProcessor>>,
}

impl FileSentenceIterator {

    pub fn new(source: &Path) -> Result<FileSentenceIterator> {
        let files = FileSentenceIterator::collect_files(source)?;
        Ok(Self {
            files,
            position: 0,
            current: None,
            pre_processor: None
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn collect_files(source: &Path) -> Result<Vec<PathBuf>> {

        if source.is_file() {
            return Ok(vec![source.to_path_buf()]);
        }

        let mut files = Vec::new();
        let mut pending = vec![source.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.is_file() {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn open_next(&mut self) -> Result<bool> {
        match self.files.get(self.position) {
            Some(path) => {
                let f = File::open(path)?;
                self.current = Some(BufReader::new(f).lines());
                self.position += 1;
                Ok(true)
            },
            None => Ok(false)
        }
    }
}

impl SentenceIterator for FileSentenceIterator {

    fn next_sentence(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(lines) = self.current.as_mut() {
                match lines.next() {
                    Some(Ok(line)) => {
                        let sentence = match &self.pre_processor {
                            Some(p) => p.pre_process(&line),
                            None => line
                        };
                        return Some(Ok(sentence));
                    },
                    Some(Err(e)) => return Some(Err(Word2VecError::from(e))),
                    None => self.current = None
                }
            }
            match self.open_next() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e))
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.position = 0;
        self.current = None;
        Ok(())
    }

    fn set_pre_processor(&mut self, pre_processor: Box<dyn SentencePreProcessor>) {
        self.pre_processor = Some(pre_processor);
    }
}


/// In-memory sentences, handy for small corpora and tests.
pub struct CollectionSentenceIterator {
    sentences: Vec<String>,
    position: usize,
    pre_processor: Option<Box<dyn SentencePreProcessor>>,
}

impl CollectionSentenceIterator {
    pub fn new<S: Into<String>>(sentences: impl IntoIterator<Item = S>) -> CollectionSentenceIterator {
        Self {
            sentences: sentences.into_iter().map(Into::into).collect(),
            position: 0,
            pre_processor: None
        }
    }
}

impl SentenceIterator for CollectionSentenceIterator {

    fn next_sentence(&mut self) -> Option<Result<String>> {
        let sentence = self.sentences.get(self.position)?;
        self.position += 1;
        let sentence = match &self.pre_processor {
            Some(p) => p.pre_process(sentence),
            None => sentence.to_owned()
        };
        Some(Ok(sentence))
    }

    fn reset(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn set_pre_processor(&mut self, pre_processor: Box<dyn SentencePreProcessor>) {
        self.pre_processor = Some(pre_processor);
    }
}


static PUNCTUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[\d\.:,"'\(\)\[\]|/?!;]+"#).expect("static punctuation regex")
});

/// Strips digits and punctuation from a token and lower cases it.
pub fn common_pre_process(token: &str) -> String {
    PUNCTUATION.replace_all(token, "").to_lowercase()
}

// simple tokenizer by whitespace, empty tokens (after preprocessing) are dropped
pub fn tokenize(sentence: &str) -> Vec<String> {
    sentence
        .split_whitespace()
        .map(common_pre_process)
        .filter(|tok| !tok.is_empty())
        .collect()
}


#[cfg(test)]
mod tests {

    use super::*;

    fn drain(iter: &mut dyn SentenceIterator) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(sentence) = iter.next_sentence() {
            out.push(sentence.unwrap());
        }
        out
    }

    #[test]
    fn tokenizer_strips_punctuation_and_digits() {
        let tokens = tokenize("Hello, World! It's 2024 (really) ;");
        assert_eq!(tokens, vec!["hello", "world", "its", "really"]);
    }

    #[test]
    fn directory_iteration_is_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.txt"), "Second File\n").unwrap();
        fs::write(dir.path().join("a.txt"), "First line\nSecond line\n").unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "Deep\n").unwrap();

        let mut iter = FileSentenceIterator::new(dir.path()).unwrap();
        assert_eq!(iter.files().len(), 3);
        iter.set_pre_processor(Box::new(LowerCasePreProcessor));
        let sentences = drain(&mut iter);
        assert_eq!(sentences, vec!["first line", "second line", "second file", "deep"]);

        // a reset replays the same stream
        iter.reset().unwrap();
        assert_eq!(drain(&mut iter).len(), 4);
    }

    #[test]
    fn single_file_without_preprocessor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.txt");
        fs::write(&path, "Keep Case\n").unwrap();
        let mut iter = FileSentenceIterator::new(&path).unwrap();
        assert_eq!(drain(&mut iter), vec!["Keep Case"]);
    }

    #[test]
    fn missing_source_errors() {
        assert!(FileSentenceIterator::new(Path::new("/no/such/corpus")).is_err());
    }

    #[test]
    fn collection_iterator_resets() {
        let mut iter = CollectionSentenceIterator::new(vec!["A b", "C"]);
        iter.set_pre_processor(Box::new(LowerCasePreProcessor));
        assert_eq!(drain(&mut iter), vec!["a b", "c"]);
        assert!(iter.next_sentence().is_none());
        iter.reset().unwrap();
        assert_eq!(drain(&mut iter), vec!["a b", "c"]);
    }
}
