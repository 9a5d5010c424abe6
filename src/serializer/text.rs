//! Uncompressed model layout: one directory of whitespace separated text files.
//!
//! ```text
//! syn0.txt         "<words> <dim>" header, then "<label> v1 .. vd" per word
//! syn1.txt         one row per line (hierarchical softmax weights, optional)
//! syn1Neg.txt      one row per line (negative sampling weights, optional)
//! codes.txt        "<label> c1 c2 .."  Huffman codes
//! huffman.txt      "<label> p1 p2 .."  Huffman points
//! frequencies.txt  "<label> <frequency> <sentences>"
//! config.json      model configuration
//! ```
//!
//! Labels are written with [`encode_b64`]. Floats use the shortest representation that
//! parses back to the same `f32`.

use ndarray::{Array2, ArrayView1};
use std::collections::HashMap;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use super::{decode_b64, encode_b64};
use crate::config::VectorsConfiguration;
use crate::errors::{Result, Word2VecError};
use crate::memory::{self, BulkReadGuard};
use crate::model::{InMemoryLookupTable, VocabCache, VocabWord, Word2Vec};

pub const SYN0_FILE: &str = "syn0.txt";
pub const SYN1_FILE: &str = "syn1.txt";
pub const SYN1_NEG_FILE: &str = "syn1Neg.txt";
pub const CODES_FILE: &str = "codes.txt";
pub const HUFFMAN_FILE: &str = "huffman.txt";
pub const FREQUENCIES_FILE: &str = "frequencies.txt";
pub const CONFIG_FILE: &str = "config.json";


fn join_values<T: Display>(head: String, values: impl Iterator<Item = T>) -> String {
    let mut line = head;
    for v in values {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&v.to_string());
    }
    line
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    write(&mut f)?;
    f.flush()?;
    Ok(())
}

/// The per-word vector dump: a header line, then one labelled row per vocabulary entry.
pub fn write_word_vectors<W: Write>(model: &Word2Vec, w: &mut W) -> Result<()> {

    let syn0 = &model.lookup_table.syn0;
    let (rows, dim) = syn0.dim();
    if rows < model.vocab.num_words() {
        return Err(Word2VecError::invalid_model(format!(
            "syn0 has {} rows for {} words", rows, model.vocab.num_words())));
    }

    writeln!(w, "{} {}", model.vocab.num_words(), dim)?;
    for word in model.vocab.words() {
        let line = join_values(encode_b64(&word.word), syn0.row(word.index).iter());
        writeln!(w, "{}", line)?;
    }
    Ok(())
}

pub fn write_matrix<W: Write>(matrix: &Array2<f32>, w: &mut W) -> Result<()> {
    for row in matrix.rows() {
        writeln!(w, "{}", join_values(String::new(), row.iter()))?;
    }
    Ok(())
}

pub fn write_codes<W: Write>(vocab: &VocabCache, w: &mut W) -> Result<()> {
    for word in vocab.words() {
        writeln!(w, "{}", join_values(encode_b64(&word.word), word.codes.iter()))?;
    }
    Ok(())
}

pub fn write_points<W: Write>(vocab: &VocabCache, w: &mut W) -> Result<()> {
    for word in vocab.words() {
        writeln!(w, "{}", join_values(encode_b64(&word.word), word.points.iter()))?;
    }
    Ok(())
}

pub fn write_frequencies<W: Write>(vocab: &VocabCache, w: &mut W) -> Result<()> {
    for word in vocab.words() {
        writeln!(w, "{} {} {}", encode_b64(&word.word), word.element_frequency, word.sequences_count)?;
    }
    Ok(())
}

/// Writes the full directory layout, creating `target` if needed. Files are written one
/// after the other; a failure part way leaves the ones already written.
pub fn write_uncompressed(model: &Word2Vec, target: &Path) -> Result<()> {

    fs::create_dir_all(target)?;

    write_file(&target.join(SYN0_FILE), |w| write_word_vectors(model, w))?;
    if let Some(syn1) = &model.lookup_table.syn1 {
        write_file(&target.join(SYN1_FILE), |w| write_matrix(syn1, w))?;
    }
    if let Some(syn1_neg) = &model.lookup_table.syn1_neg {
        write_file(&target.join(SYN1_NEG_FILE), |w| write_matrix(syn1_neg, w))?;
    }
    write_file(&target.join(CODES_FILE), |w| write_codes(&model.vocab, w))?;
    write_file(&target.join(HUFFMAN_FILE), |w| write_points(&model.vocab, w))?;
    write_file(&target.join(FREQUENCIES_FILE), |w| write_frequencies(&model.vocab, w))?;
    fs::write(target.join(CONFIG_FILE), model.configuration.to_json()?)?;

    debug!("wrote {} words to {}", model.vocab.num_words(), target.display());
    Ok(())
}


// calls `f(line_number, trimmed_line)` for every non blank line, returns the row count
fn for_each_row<R, F>(mut reader: R, mut f: F) -> Result<usize>
where
    R: BufRead,
    F: FnMut(usize, &str) -> Result<()> {

    let mut line = String::new();
    let mut line_no = 0;
    let mut rows = 0;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        f(line_no, trimmed)?;
        rows += 1;
        memory::on_row_parsed(rows, &mut line);
    }
    Ok(rows)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

fn parse_value<T: FromStr>(token: &str, line_no: usize) -> Result<T> {
    token.parse::<T>().map_err(|_| Word2VecError::parse(line_no, format!("cannot parse '{}'", token)))
}

/// Stacks all rows of a plain matrix file. `Ok(None)` for a missing or empty file.
pub fn read_matrix(path: &Path) -> Result<Option<Array2<f32>>> {

    if !path.exists() {
        return Ok(None);
    }

    let mut flat: Vec<f32> = Vec::new();
    let mut cols: Option<usize> = None;
    let rows = for_each_row(open(path)?, |line_no, line| {
        let values = line
            .split_whitespace()
            .map(|tok| parse_value::<f32>(tok, line_no))
            .collect::<Result<Vec<f32>>>()?;
        match cols {
            None => cols = Some(values.len()),
            Some(c) if c != values.len() => {
                return Err(Word2VecError::parse(line_no, format!("expected {} values, found {}", c, values.len())));
            },
            Some(_) => {}
        }
        flat.extend(values);
        Ok(())
    })?;

    if rows == 0 {
        return Ok(None);
    }
    let matrix = Array2::from_shape_vec((rows, cols.unwrap_or(0)), flat)
        .map_err(|e| Word2VecError::invalid_model(format!("{}: {}", path.display(), e)))?;
    Ok(Some(matrix))
}

/// Rows of "<label> n1 n2 ..", labels decoded.
fn read_labelled<T: FromStr>(path: &Path) -> Result<Vec<(String, Vec<T>)>> {
    let mut entries = Vec::new();
    for_each_row(open(path)?, |line_no, line| {
        let mut tokens = line.split_whitespace();
        let label = match tokens.next() {
            Some(label) => decode_b64(label)?,
            None => return Err(Word2VecError::parse(line_no, "missing label"))
        };
        let values = tokens.map(|tok| parse_value::<T>(tok, line_no)).collect::<Result<Vec<T>>>()?;
        entries.push((label, values));
        Ok(())
    })?;
    Ok(entries)
}

fn is_header(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens.len() == 2 && tokens.iter().all(|t| t.parse::<usize>().is_ok())
}

/// Reads the per-word vector dump into label -> vector, skipping the optional header.
pub fn read_word_vectors(path: &Path) -> Result<Vec<(String, Vec<f32>)>> {
    let mut vectors = Vec::new();
    for_each_row(open(path)?, |line_no, line| {
        if vectors.is_empty() && is_header(line) {
            return Ok(());
        }
        let mut tokens = line.split_whitespace();
        let label = match tokens.next() {
            Some(label) => decode_b64(label)?,
            None => return Err(Word2VecError::parse(line_no, "missing label"))
        };
        let values = tokens.map(|tok| parse_value::<f32>(tok, line_no)).collect::<Result<Vec<f32>>>()?;
        vectors.push((label, values));
        Ok(())
    })?;
    Ok(vectors)
}

/// Rebuilds a model from the four aligned per-word files. The vocabulary follows the
/// order of `codes.txt`; points and vectors are matched by label.
pub fn read_word2vec_from_text(syn0_path: &Path,
    syn1_path: &Path,
    codes_path: &Path,
    huffman_path: &Path,
    configuration: VectorsConfiguration) -> Result<Word2Vec> {

    let codes = read_labelled::<u8>(codes_path)?;
    let points = read_labelled::<u32>(huffman_path)?;
    if codes.len() != points.len() {
        return Err(Word2VecError::invalid_model(format!(
            "{} has {} rows but {} has {}", CODES_FILE, codes.len(), HUFFMAN_FILE, points.len())));
    }
    let mut points_by_label: HashMap<String, Vec<u32>> = points.into_iter().collect();

    let vectors = read_word_vectors(syn0_path)?;
    if vectors.len() != codes.len() {
        return Err(Word2VecError::invalid_model(format!(
            "{} has {} rows but {} has {}", SYN0_FILE, vectors.len(), CODES_FILE, codes.len())));
    }
    let dim = configuration.layers_size;
    let vectors_by_label: HashMap<String, Vec<f32>> = vectors.into_iter().collect();

    let mut syn0 = Array2::zeros((codes.len(), dim));
    let mut words = Vec::with_capacity(codes.len());
    for (i, (label, word_codes)) in codes.into_iter().enumerate() {

        let word_points = points_by_label.remove(&label).ok_or_else(|| {
            Word2VecError::invalid_model(format!("'{}' is missing from {}", label, HUFFMAN_FILE))
        })?;
        let vector = vectors_by_label.get(&label).ok_or_else(|| {
            Word2VecError::invalid_model(format!("'{}' is missing from {}", label, SYN0_FILE))
        })?;
        if vector.len() != dim {
            return Err(Word2VecError::invalid_model(format!(
                "'{}' has {} values, expected {}", label, vector.len(), dim)));
        }
        syn0.row_mut(i).assign(&ArrayView1::from(vector.as_slice()));

        let mut word = VocabWord::new(&label, 1);
        word.codes = word_codes;
        word.points = word_points;
        words.push(word);
    }

    let model = Word2Vec {
        configuration,
        vocab: VocabCache::from_words(words, 0),
        lookup_table: InMemoryLookupTable { syn0, syn1: read_matrix(syn1_path)?, syn1_neg: None }
    };
    model.validate()?;
    Ok(model)
}

// counts may have been written as decimals ("5.0"), truncate them
fn parse_count(token: &str, line_no: usize) -> Result<u64> {
    match token.parse::<u64>() {
        Ok(count) => Ok(count),
        Err(_) => Ok(parse_value::<f64>(token, line_no)? as u64)
    }
}

/// Overlays frequencies and sentence counts onto an already built vocabulary.
pub fn read_frequencies(path: &Path, vocab: &mut VocabCache) -> Result<()> {

    let mut total_docs = vocab.total_number_of_docs();
    for_each_row(open(path)?, |line_no, line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(Word2VecError::parse(line_no, "expected '<label> <frequency> <sentences>'"));
        }
        let label = decode_b64(tokens[0])?;
        let frequency = parse_count(tokens[1], line_no)?;
        let sequences = parse_count(tokens[2], line_no)?;
        match vocab.token_for_mut(&label) {
            Some(word) => {
                word.element_frequency = frequency;
                word.sequences_count = sequences;
                total_docs = total_docs.max(sequences);
            },
            None => warn!("{} line {}: '{}' is not in the vocabulary, skipped", FREQUENCIES_FILE, line_no, label)
        }
        Ok(())
    })?;
    // the layout has no document total; the largest per-word count is the best lower bound
    vocab.set_total_number_of_docs(total_docs);
    Ok(())
}

/// Restores a model written by [`write_uncompressed`]. `frequencies.txt` and `syn1Neg.txt`
/// are optional. Bulk-read tuning is held for the whole read.
pub fn read_uncompressed(source: &Path) -> Result<Word2Vec> {

    debug!("Trying full model restoration...");
    let _guard = BulkReadGuard::acquire();

    let json = fs::read_to_string(source.join(CONFIG_FILE))?;
    let configuration = VectorsConfiguration::from_json(&json)?;

    let mut model = read_word2vec_from_text(
        &source.join(SYN0_FILE),
        &source.join(SYN1_FILE),
        &source.join(CODES_FILE),
        &source.join(HUFFMAN_FILE),
        configuration
    )?;

    let frequencies = source.join(FREQUENCIES_FILE);
    if frequencies.exists() {
        read_frequencies(&frequencies, &mut model.vocab)?;
    }

    // a full model may come without negative sampling weights
    if let Some(syn1_neg) = read_matrix(&source.join(SYN1_NEG_FILE))? {
        model.lookup_table.syn1_neg = Some(syn1_neg);
        model.validate()?;
    }

    Ok(model)
}
