use ndarray::Array2;
use serde::{Serialize, Deserialize};
use std::collections::HashMap;

use crate::config::{Algorithm, VectorsConfiguration};
use crate::errors::{Result, Word2VecError};


/// One vocabulary entry along with its hierarchical softmax path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VocabWord {
    pub word: String,
    pub element_frequency: u64,
    pub sequences_count: u64,
    pub index: usize,
    pub codes: Vec<u8>,
    pub points: Vec<u32>,
}

impl VocabWord {
    pub fn new(word: &str, element_frequency: u64) -> VocabWord {
        Self {
            word: word.to_owned(),
            element_frequency,
            sequences_count: 0,
            index: 0,
            codes: Vec::new(),
            points: Vec::new()
        }
    }
}


/// Words in index order plus a label lookup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabCache {
    words: Vec<VocabWord>,
    #[serde(skip)]
    t2i: HashMap<String, usize>,
    total_docs: u64,
}

impl VocabCache {

    /// Takes ownership of `words` and renumbers them by position.
    pub fn from_words(mut words: Vec<VocabWord>, total_docs: u64) -> VocabCache {
        let mut t2i = HashMap::with_capacity(words.len());
        for (i, w) in words.iter_mut().enumerate() {
            w.index = i;
            t2i.insert(w.word.clone(), i);
        }
        Self { words, t2i, total_docs }
    }

    // the label index is not serialized, rebuild it after deserializing
    pub fn rebuild_index(&mut self) {
        self.t2i = self.words.iter().enumerate().map(|(i, w)| (w.word.clone(), i)).collect();
    }

    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[VocabWord] {
        &self.words
    }

    pub fn element_at_index(&self, index: usize) -> Option<&VocabWord> {
        self.words.get(index)
    }

    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.t2i.get(word).copied()
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.t2i.contains_key(word)
    }

    pub fn token_for(&self, word: &str) -> Option<&VocabWord> {
        self.index_of(word).and_then(|i| self.words.get(i))
    }

    pub fn token_for_mut(&mut self, word: &str) -> Option<&mut VocabWord> {
        match self.t2i.get(word) {
            Some(i) => self.words.get_mut(*i),
            None => None
        }
    }

    /// Occurrence count of `word`, 0 when unknown.
    pub fn word_frequency(&self, word: &str) -> u64 {
        self.token_for(word).map_or(0, |w| w.element_frequency)
    }

    /// Number of sentences `word` appeared in, 0 when unknown.
    pub fn doc_appeared_in(&self, word: &str) -> u64 {
        self.token_for(word).map_or(0, |w| w.sequences_count)
    }

    pub fn total_word_occurrences(&self) -> u64 {
        self.words.iter().map(|w| w.element_frequency).sum()
    }

    pub fn total_number_of_docs(&self) -> u64 {
        self.total_docs
    }

    pub fn set_total_number_of_docs(&mut self, total_docs: u64) {
        self.total_docs = total_docs
    }
}


/// The weight matrices of a model; `syn1` and `syn1_neg` are only present when the
/// matching output layer is in use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InMemoryLookupTable {
    pub syn0: Array2<f32>,
    pub syn1: Option<Array2<f32>>,
    pub syn1_neg: Option<Array2<f32>>,
}

impl InMemoryLookupTable {

    pub fn empty(layer_size: usize) -> InMemoryLookupTable {
        Self {
            syn0: Array2::zeros((0, layer_size)),
            syn1: None,
            syn1_neg: None
        }
    }

    pub fn layer_size(&self) -> usize {
        self.syn0.dim().1
    }
}


/// A word2vec model: configuration, vocabulary and weights.
#[derive(Clone, Debug)]
pub struct Word2Vec {
    pub configuration: VectorsConfiguration,
    pub vocab: VocabCache,
    pub lookup_table: InMemoryLookupTable,
}

impl Word2Vec {

    pub fn new(configuration: VectorsConfiguration) -> Word2Vec {
        let layer_size = configuration.layers_size;
        Self {
            configuration,
            vocab: VocabCache::default(),
            lookup_table: InMemoryLookupTable::empty(layer_size)
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.configuration.elements_learning_algorithm
    }

    pub fn set_elements_learning_algorithm(&mut self, algorithm: Algorithm) {
        self.configuration.elements_learning_algorithm = algorithm
    }

    pub fn stop_words(&self) -> &[String] {
        &self.configuration.stop_list
    }

    pub fn is_trained(&self) -> bool {
        !self.vocab.is_empty()
    }

    /// Checks that the weights line up with the vocabulary: every matrix has one row per
    /// word and the same width, and every Huffman path stays inside `syn1`.
    pub fn validate(&self) -> Result<()> {

        let words = self.vocab.num_words();
        let dim = self.lookup_table.layer_size();
        let matrices = [
            ("syn0", Some(&self.lookup_table.syn0)),
            ("syn1", self.lookup_table.syn1.as_ref()),
            ("syn1Neg", self.lookup_table.syn1_neg.as_ref()),
        ];
        for (name, matrix) in matrices {
            if let Some(matrix) = matrix {
                let (rows, cols) = matrix.dim();
                if rows != words || cols != dim {
                    return Err(Word2VecError::invalid_model(format!(
                        "{} is {}x{}, expected {}x{}", name, rows, cols, words, dim)));
                }
            }
        }

        for word in self.vocab.words() {
            if word.codes.len() != word.points.len() {
                return Err(Word2VecError::invalid_model(format!(
                    "'{}' has {} codes but {} points", word.word, word.codes.len(), word.points.len())));
            }
            if let Some(point) = word.points.iter().find(|p| **p as usize >= words) {
                return Err(Word2VecError::invalid_model(format!(
                    "'{}' has huffman point {} outside {} rows", word.word, point, words)));
            }
        }
        Ok(())
    }
}


/// Assigns word2vec style Huffman codes and points to `words`, which must already be
/// sorted by descending frequency. Points index the inner nodes (0..n-1), root-first.
pub fn build_huffman(words: &mut [VocabWord]) {

    let n = words.len();
    if n == 0 {
        return;
    }
    if n == 1 {
        words[0].codes = vec![0];
        words[0].points = vec![0];
        return;
    }

    // leaves 0..n, inner nodes n..2n-1
    let mut count: Vec<u64> = words.iter().map(|w| w.element_frequency).collect();
    count.extend(std::iter::repeat(u64::MAX).take(n - 1));
    let mut binary = vec![0u8; 2 * n - 1];
    let mut parent = vec![0usize; 2 * n - 1];

    // two cursors: pos1 walks leaves backward (rarest first), pos2 walks new inner nodes forward
    let mut pos1 = n as isize - 1;
    let mut pos2 = n;
    let pick = |pos1: &mut isize, pos2: &mut usize, count: &Vec<u64>| -> usize {
        if *pos1 >= 0 && count[*pos1 as usize] < count[*pos2] {
            let m = *pos1 as usize;
            *pos1 -= 1;
            m
        } else {
            let m = *pos2;
            *pos2 += 1;
            m
        }
    };

    for a in 0..n - 1 {
        let min1 = pick(&mut pos1, &mut pos2, &count);
        let min2 = pick(&mut pos1, &mut pos2, &count);
        count[n + a] = count[min1].saturating_add(count[min2]);
        parent[min1] = n + a;
        parent[min2] = n + a;
        binary[min2] = 1;
    }

    let root = 2 * n - 2;
    for (a, word) in words.iter_mut().enumerate() {
        let mut codes = Vec::new();
        let mut points = Vec::new();
        let mut b = a;
        while b != root {
            codes.push(binary[b]);
            points.push((parent[b] - n) as u32);
            b = parent[b];
        }
        codes.reverse();
        points.reverse();
        word.codes = codes;
        word.points = points;
    }
}
