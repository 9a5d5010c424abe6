use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use ndarray::Array2;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tar::{Archive, Builder, Header};
use tracing::debug;

use crate::config::{VectorsConfiguration, BUILDER_CONFIG_FILE};
use crate::errors::{Result, Word2VecError};
use crate::model::{InMemoryLookupTable, VocabCache, Word2Vec};

const VOCAB_ENTRY: &str = "vocab.bin";
const SYN0_ENTRY: &str = "syn0.bin";
const SYN1_ENTRY: &str = "syn1.bin";
const SYN1_NEG_ENTRY: &str = "syn1Neg.bin";


fn append_entry<W: Write>(builder: &mut Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data)?;
    Ok(())
}

/// Writes the whole model into a single gzipped tar file at `path`.
pub fn write_word2vec_model(model: &Word2Vec, path: &Path) -> Result<()> {

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let f = BufWriter::new(File::create(path)?);
    let mut builder = Builder::new(GzEncoder::new(f, Compression::default()));

    append_entry(&mut builder, BUILDER_CONFIG_FILE, model.configuration.to_json()?.as_bytes())?;
    append_entry(&mut builder, VOCAB_ENTRY, &bincode::serialize(&model.vocab)?)?;
    append_entry(&mut builder, SYN0_ENTRY, &bincode::serialize(&model.lookup_table.syn0)?)?;
    if let Some(syn1) = &model.lookup_table.syn1 {
        append_entry(&mut builder, SYN1_ENTRY, &bincode::serialize(syn1)?)?;
    }
    if let Some(syn1_neg) = &model.lookup_table.syn1_neg {
        append_entry(&mut builder, SYN1_NEG_ENTRY, &bincode::serialize(syn1_neg)?)?;
    }

    let mut writer = builder.into_inner()?.finish()?;
    writer.flush()?;

    debug!("archived {} words to {}", model.vocab.num_words(), path.display());
    Ok(())
}

fn matrix(entries: &HashMap<String, Vec<u8>>, name: &str) -> Result<Option<Array2<f32>>> {
    match entries.get(name) {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
        None => Ok(None)
    }
}

fn required<'a>(entries: &'a HashMap<String, Vec<u8>>, name: &str) -> Result<&'a Vec<u8>> {
    entries.get(name).ok_or_else(|| Word2VecError::invalid_model(format!("archive has no {} entry", name)))
}

/// Reads an archive written by [`write_word2vec_model`].
pub fn read_word2vec_model(path: &Path) -> Result<Word2Vec> {

    let f = BufReader::new(File::open(path)?);
    let mut archive = Archive::new(GzDecoder::new(f));

    let mut entries: HashMap<String, Vec<u8>> = HashMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        entries.insert(name, buf);
    }

    let configuration = VectorsConfiguration::from_json(&String::from_utf8_lossy(required(&entries, BUILDER_CONFIG_FILE)?))?;
    let mut vocab: VocabCache = bincode::deserialize(required(&entries, VOCAB_ENTRY)?)?;
    vocab.rebuild_index();
    let lookup_table = InMemoryLookupTable {
        syn0: bincode::deserialize(required(&entries, SYN0_ENTRY)?)?,
        syn1: matrix(&entries, SYN1_ENTRY)?,
        syn1_neg: matrix(&entries, SYN1_NEG_ENTRY)?
    };

    let model = Word2Vec { configuration, vocab, lookup_table };
    model.validate()?;
    Ok(model)
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::serializer::tests::sample_model;

    #[test]
    fn archive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("model.zip");
        let model = sample_model();

        write_word2vec_model(&model, &path).unwrap();
        let restored = read_word2vec_model(&path).unwrap();

        assert_eq!(restored.configuration, model.configuration);
        assert_eq!(restored.vocab, model.vocab);
        assert_eq!(restored.lookup_table, model.lookup_table);
        assert_eq!(restored.vocab.index_of("ünï"), model.vocab.index_of("ünï"));
        assert_eq!(restored.vocab.total_number_of_docs(), 4);
    }

    #[test]
    fn missing_weights_stay_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.zip");
        let mut model = sample_model();
        model.lookup_table.syn1_neg = None;

        write_word2vec_model(&model, &path).unwrap();
        let restored = read_word2vec_model(&path).unwrap();
        assert!(restored.lookup_table.syn1.is_some());
        assert!(restored.lookup_table.syn1_neg.is_none());
    }

    #[test]
    fn misaligned_weights_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.zip");

        let mut model = sample_model();
        model.lookup_table.syn1_neg = Some(Array2::zeros((1, 3)));
        write_word2vec_model(&model, &path).unwrap();
        assert!(matches!(read_word2vec_model(&path), Err(Word2VecError::InvalidModel(_))));

        let mut model = sample_model();
        model.lookup_table.syn1 = Some(Array2::zeros((2, 3)));
        write_word2vec_model(&model, &path).unwrap();
        assert!(matches!(read_word2vec_model(&path), Err(Word2VecError::InvalidModel(_))));

        let mut model = sample_model();
        model.vocab.token_for_mut("the").unwrap().points[0] = 42;
        write_word2vec_model(&model, &path).unwrap();
        assert!(matches!(read_word2vec_model(&path), Err(Word2VecError::InvalidModel(_))));
    }

    #[test]
    fn missing_or_foreign_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_word2vec_model(&dir.path().join("nope.zip")), Err(Word2VecError::Io(_))));

        let junk = dir.path().join("junk.zip");
        fs::write(&junk, b"definitely not gzip").unwrap();
        assert!(read_word2vec_model(&junk).is_err());
    }
}
