//! Model persistence.
//!
//! Two layouts are supported: a single gzipped tar archive (`archive`) and a directory of
//! plain text dumps (`text`). Both carry the vocabulary with its Huffman paths, the
//! weight matrices and the model configuration.

pub mod archive;
pub mod text;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

use crate::errors::{Result, Word2VecError};
use crate::model::Word2Vec;

const B64_PREFIX: &str = "B64:";

/// Encodes a label so it survives whitespace separated files.
pub fn encode_b64(label: &str) -> String {
    format!("{}{}", B64_PREFIX, STANDARD.encode(label.as_bytes()))
}

/// Inverse of [`encode_b64`]. Labels without the prefix are returned as is.
pub fn decode_b64(encoded: &str) -> Result<String> {
    match encoded.strip_prefix(B64_PREFIX) {
        Some(payload) => {
            let bytes = STANDARD.decode(payload)?;
            String::from_utf8(bytes).map_err(|e| Word2VecError::invalid_model(format!("label is not utf-8: {}", e)))
        },
        None => Ok(encoded.to_owned())
    }
}

/// Writes `model` to `target` as an archive file or as a text directory.
pub fn write_model(model: &Word2Vec, target: &Path, compressed: bool) -> Result<()> {
    debug!("=====Serializing word vectors to {} =====", target.display());
    if compressed {
        archive::write_word2vec_model(model, target)?;
    } else {
        text::write_uncompressed(model, target)?;
    }
    debug!("=====Serialization Completed=====");
    Ok(())
}

pub fn read_model(source: &Path, compressed: bool) -> Result<Word2Vec> {
    debug!("=====Starting Reading Vectors from {} =====", source.display());
    let model = if compressed {
        archive::read_word2vec_model(source)?
    } else {
        text::read_uncompressed(source)?
    };
    debug!("=====Reading Vectors Completed=====");
    Ok(model)
}


#[cfg(test)]
pub(crate) mod tests {

    use super::*;
    use crate::config::VectorsConfiguration;
    use crate::model::{build_huffman, VocabCache, VocabWord};
    use ndarray::Array2;

    /// Small model with awkward labels and values that need every digit to round trip.
    pub(crate) fn sample_model() -> Word2Vec {
        let counts = [("the", 9), ("new york", 5), ("don't", 3), ("ünï", 2), ("a.b,c", 1)];
        let mut words: Vec<VocabWord> = counts
            .iter()
            .map(|(w, c)| {
                let mut word = VocabWord::new(w, *c);
                word.sequences_count = (*c).min(4);
                word
            })
            .collect();
        build_huffman(&mut words);

        let config = VectorsConfiguration { layers_size: 3, negative: 2, min_word_frequency: 1, ..Default::default() };
        let mut model = Word2Vec::new(config);
        model.vocab = VocabCache::from_words(words, 4);

        let n = model.vocab.num_words();
        model.lookup_table.syn0 = Array2::from_shape_fn((n, 3), |(i, j)| (i as f32 + 1.0) / 3.0 - j as f32 * 1e-7);
        model.lookup_table.syn1 = Some(Array2::from_shape_fn((n, 3), |(i, j)| -123.456 * i as f32 + j as f32));
        model.lookup_table.syn1_neg = Some(Array2::from_shape_fn((n, 3), |(i, j)| 0.1 * (i * 3 + j) as f32));
        model
    }

    #[test]
    fn labels_survive_encoding() {
        for label in ["plain", "with space", "tab\tand\nnewline", "punct.,;:!?\"'", "üñíçødé", ""] {
            let encoded = encode_b64(label);
            assert!(!encoded.contains(char::is_whitespace));
            assert_eq!(decode_b64(&encoded).unwrap(), label);
        }
    }

    #[test]
    fn unprefixed_labels_pass_through() {
        assert_eq!(decode_b64("word").unwrap(), "word");
    }

    #[test]
    fn corrupt_payload_is_an_error() {
        assert!(decode_b64("B64:not base64!").is_err());
    }
}
