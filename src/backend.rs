use tracing::debug;

use crate::config::VectorsConfiguration;
use crate::corpus::SentenceIterator;
use crate::errors::Result;
use crate::model::Word2Vec;
use crate::similarity::Similarity;
use crate::train::Train;


/// The embedding library as seen by the command line tool: build a model from a
/// configuration, fit it on a corpus, and query nearest neighbours.
pub trait EmbeddingBackend {

    fn build(&self, configuration: &VectorsConfiguration) -> Word2Vec;

    /// Trains `model` on `iter`. A model that already has a vocabulary continues from
    /// its current weights.
    fn fit(&self, model: &mut Word2Vec, iter: &mut dyn SentenceIterator) -> Result<()>;

    /// Up to `n` words closest to `word`, best first. Empty for unknown words.
    fn words_nearest(&self, model: &Word2Vec, word: &str, n: usize) -> Vec<(String, f32)>;
}


/// In-process SkipGram / CBOW trainer.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeBackend;

impl EmbeddingBackend for NativeBackend {

    fn build(&self, configuration: &VectorsConfiguration) -> Word2Vec {
        debug!("{}", configuration);
        Word2Vec::new(configuration.clone())
    }

    fn fit(&self, model: &mut Word2Vec, iter: &mut dyn SentenceIterator) -> Result<()> {
        Train::run(model, iter)
    }

    fn words_nearest(&self, model: &Word2Vec, word: &str, n: usize) -> Vec<(String, f32)> {
        Similarity::new(model).words_nearest(word, n)
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::config::Algorithm;
    use crate::corpus::{CollectionSentenceIterator, LowerCasePreProcessor, SentenceIterator};

    const CORPUS: [&str; 3] = [
        "Cats chase mice and cats sleep",
        "Dogs chase cats and dogs bark",
        "Mice fear cats and dogs",
    ];

    fn trained(algorithm: Algorithm) -> Word2Vec {
        let backend = NativeBackend;
        let config = VectorsConfiguration {
            layers_size: 10,
            window: 3,
            min_word_frequency: 1,
            elements_learning_algorithm: algorithm,
            ..Default::default()
        };
        let mut model = backend.build(&config);
        let mut iter = CollectionSentenceIterator::new(CORPUS);
        iter.set_pre_processor(Box::new(LowerCasePreProcessor));
        backend.fit(&mut model, &mut iter).unwrap();
        model
    }

    #[test]
    fn training_twice_gives_identical_vocabulary() {
        for algorithm in [Algorithm::SkipGram, Algorithm::Cbow] {
            let first = trained(algorithm);
            let second = trained(algorithm);
            assert_eq!(first.vocab.num_words(), second.vocab.num_words());
            for word in first.vocab.words() {
                assert_eq!(word.element_frequency, second.vocab.word_frequency(&word.word));
            }
            assert_eq!(first.vocab.word_frequency("cats"), 4);
        }
    }

    #[test]
    fn nearest_neighbours_through_backend() {
        let model = trained(Algorithm::SkipGram);
        let nearest = NativeBackend.words_nearest(&model, "cats", 3);
        assert_eq!(nearest.len(), 3);
        assert!(nearest.iter().all(|(w, _)| w != "cats"));
        assert!(NativeBackend.words_nearest(&model, "unicorn", 3).is_empty());
    }
}
