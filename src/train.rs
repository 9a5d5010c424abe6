use ndarray::prelude::*;
use ndarray::Array;
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::iter::zip;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{Algorithm, VectorsConfiguration};
use crate::corpus::{tokenize, SentenceIterator};
use crate::errors::{Result, Word2VecError};
use crate::model::{build_huffman, InMemoryLookupTable, VocabCache, VocabWord, Word2Vec};

const MAX_EXP: f32 = 6.0;
const UNIGRAM_TABLE_SIZE: usize = 1_000_000;
const UNIGRAM_POWER: f64 = 0.75;
// sentences tokenized per parallel counting batch
const COUNT_BATCH: usize = 10_000;


// word -> (occurrences, sentences it appeared in)
type Counts = HashMap<String, (u64, u64)>;

fn count_sentence(sentence: &str, stop_words: &HashSet<&str>) -> Counts {
    let mut counts = Counts::new();
    for tok in tokenize(sentence) {
        if stop_words.contains(tok.as_str()) {
            continue;
        }
        let entry = counts.entry(tok).or_insert((0, 0));
        entry.0 += 1;
    }
    for entry in counts.values_mut() {
        entry.1 = 1;
    }
    counts
}

fn merge_counts(mut into: Counts, from: Counts) -> Counts {
    for (tok, (freq, docs)) in from {
        let entry = into.entry(tok).or_insert((0, 0));
        entry.0 += freq;
        entry.1 += docs;
    }
    into
}

/// Scans the corpus once and builds a frequency sorted vocabulary with Huffman paths.
pub fn build_vocab(config: &VectorsConfiguration, iter: &mut dyn SentenceIterator) -> Result<VocabCache> {

    let stop_words: HashSet<&str> = config.stop_list.iter().map(|s| s.as_str()).collect();
    let mut token2count = Counts::new();
    let mut total_docs: u64 = 0;

    iter.reset()?;
    let mut batch: Vec<String> = Vec::with_capacity(COUNT_BATCH);
    loop {
        let next = iter.next_sentence().transpose()?;
        let done = next.is_none();
        if let Some(sentence) = next {
            batch.push(sentence);
        }

        // count every batch in parallel, merging is order independent
        if batch.len() >= COUNT_BATCH || (done && !batch.is_empty()) {
            total_docs += batch.len() as u64;
            let batch_counts = batch
                .par_iter()
                .map(|sentence| count_sentence(sentence, &stop_words))
                .reduce(Counts::new, merge_counts);
            token2count = merge_counts(token2count, batch_counts);
            batch.clear();
        }
        if done {
            break;
        }
    }

    let mut words: Vec<VocabWord> = token2count
        .into_iter()
        .filter(|(_, (freq, _))| *freq >= config.min_word_frequency)
        .map(|(tok, (freq, docs))| {
            let mut w = VocabWord::new(&tok, freq);
            w.sequences_count = docs;
            w
        })
        .collect();

    if words.is_empty() {
        return Err(Word2VecError::EmptyVocabulary);
    }

    // most frequent first, ties by label so the build is reproducible
    words.sort_by(|a, b| b.element_frequency.cmp(&a.element_frequency).then_with(|| a.word.cmp(&b.word)));
    build_huffman(&mut words);

    debug!("built vocabulary of {} words out of {} sentences", words.len(), total_docs);
    Ok(VocabCache::from_words(words, total_docs))
}


/// Fresh weights for a vocabulary: `syn0` uniform in [-0.5, 0.5) / dim, output layers zero.
pub fn reset_weights(config: &VectorsConfiguration, vocab_size: usize, rng: &mut StdRng) -> InMemoryLookupTable {
    let dim = config.layers_size;
    let syn0 = Array::random_using((vocab_size, dim), Uniform::new(-0.5, 0.5), rng) / dim as f32;
    let mut table = InMemoryLookupTable { syn0, syn1: None, syn1_neg: None };
    ensure_output_layers(config, &mut table);
    table
}

/// Adds any output layer the configuration needs but the table lacks (e.g. after a load).
pub fn ensure_output_layers(config: &VectorsConfiguration, table: &mut InMemoryLookupTable) {
    let (rows, dim) = table.syn0.dim();
    if config.use_hierarchic_softmax && table.syn1.is_none() {
        table.syn1 = Some(Array2::zeros((rows, dim)));
    }
    if config.negative > 0 && table.syn1_neg.is_none() {
        table.syn1_neg = Some(Array2::zeros((rows, dim)));
    }
}


/// Noise distribution for negative sampling, frequencies raised to 3/4.
fn build_unigram_table(vocab: &VocabCache) -> Vec<u32> {

    let words = vocab.words();
    let n = words.len();
    let train_words_pow: f64 = words.iter().map(|w| (w.element_frequency as f64).powf(UNIGRAM_POWER)).sum();
    if n == 0 || train_words_pow <= 0.0 {
        return Vec::new();
    }

    let mut table = vec![0u32; UNIGRAM_TABLE_SIZE];
    let mut i = 0usize;
    let mut d1 = (words[0].element_frequency as f64).powf(UNIGRAM_POWER) / train_words_pow;
    for (a, slot) in table.iter_mut().enumerate() {
        *slot = i as u32;
        if a as f64 / UNIGRAM_TABLE_SIZE as f64 > d1 && i + 1 < n {
            i += 1;
            d1 += (words[i].element_frequency as f64).powf(UNIGRAM_POWER) / train_words_pow;
        }
    }
    table
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}


pub struct Train {
    rng: StdRng,
    unigram_table: Vec<u32>,
    alpha: f32,
    words_processed: u64,
    total_words: u64,
}

impl Train {

    fn new(model: &Word2Vec, rng: StdRng) -> Train {
        let config = &model.configuration;
        let passes = (config.epochs.max(1) * config.iterations.max(1)) as u64;
        let unigram_table = if config.negative > 0 {
            build_unigram_table(&model.vocab)
        } else {
            Vec::new()
        };
        Self {
            rng,
            unigram_table,
            alpha: config.learning_rate,
            words_processed: 0,
            total_words: (model.vocab.total_word_occurrences() * passes).max(1),
        }
    }

    fn update_alpha(&mut self, config: &VectorsConfiguration) {
        let progress = self.words_processed as f32 / self.total_words as f32;
        self.alpha = (config.learning_rate * (1.0 - progress)).max(config.min_learning_rate);
    }

    // word2vec subsampling of frequent words
    fn keep(&mut self, word: &VocabWord, sampling: f64, total: u64) -> bool {
        if sampling <= 0.0 {
            return true;
        }
        let threshold = sampling * total as f64;
        let f = word.element_frequency as f64;
        let ran = ((f / threshold).sqrt() + 1.0) * threshold / f;
        ran >= self.rng.gen::<f64>()
    }

    /// Shared output layer: hierarchical softmax and/or negative sampling against `target`.
    /// Accumulates the input gradient into `neu1e`.
    fn output_layer(&mut self,
        config: &VectorsConfiguration,
        vocab: &VocabCache,
        table: &mut InMemoryLookupTable,
        target: usize,
        l1: &Array1<f32>,
        neu1e: &mut Array1<f32>) {

        let alpha = self.alpha;

        if config.use_hierarchic_softmax {
            if let (Some(syn1), Some(word)) = (table.syn1.as_mut(), vocab.element_at_index(target)) {
                for (code, point) in zip(&word.codes, &word.points) {
                    let mut row = syn1.row_mut(*point as usize);
                    let f = l1.dot(&row);
                    if f <= -MAX_EXP || f >= MAX_EXP {
                        continue;
                    }
                    let g = (1.0 - *code as f32 - sigmoid(f)) * alpha;
                    neu1e.scaled_add(g, &row);
                    row.scaled_add(g, l1);
                }
            }
        }

        if config.negative > 0 && !self.unigram_table.is_empty() {
            if let Some(syn1_neg) = table.syn1_neg.as_mut() {
                for d in 0..=config.negative {
                    let (sample, label) = if d == 0 {
                        (target, 1.0)
                    } else {
                        let pick = self.unigram_table[self.rng.gen_range(0..self.unigram_table.len())] as usize;
                        if pick == target {
                            continue;
                        }
                        (pick, 0.0)
                    };
                    let mut row = syn1_neg.row_mut(sample);
                    let f = l1.dot(&row);
                    let g = if f > MAX_EXP {
                        (label - 1.0) * alpha
                    } else if f < -MAX_EXP {
                        label * alpha
                    } else {
                        (label - sigmoid(f)) * alpha
                    };
                    neu1e.scaled_add(g, &row);
                    row.scaled_add(g, l1);
                }
            }
        }
    }

    fn context_of(&mut self, pos: usize, len: usize, window: usize) -> Vec<usize> {
        // random reduced window, as word2vec.c does
        let b = self.rng.gen_range(0..window);
        let mut context = Vec::with_capacity(2 * window);
        for a in b..(2 * window + 1 - b) {
            if a == window {
                continue;
            }
            let c = pos as isize - window as isize + a as isize;
            if c < 0 || c >= len as isize {
                continue;
            }
            context.push(c as usize);
        }
        context
    }

    fn skip_gram(&mut self, model: &mut Word2Vec, sequence: &[usize]) {
        let window = model.configuration.window;
        let dim = model.lookup_table.layer_size();
        for (pos, word) in sequence.iter().enumerate() {
            for c in self.context_of(pos, sequence.len(), window) {
                let last_word = sequence[c];
                let l1 = model.lookup_table.syn0.row(last_word).to_owned();
                let mut neu1e = Array1::zeros(dim);
                self.output_layer(&model.configuration, &model.vocab, &mut model.lookup_table, *word, &l1, &mut neu1e);
                model.lookup_table.syn0.row_mut(last_word).scaled_add(1.0, &neu1e);
            }
        }
    }

    fn cbow(&mut self, model: &mut Word2Vec, sequence: &[usize]) {
        let window = model.configuration.window;
        let dim = model.lookup_table.layer_size();
        for (pos, word) in sequence.iter().enumerate() {
            let context = self.context_of(pos, sequence.len(), window);
            if context.is_empty() {
                continue;
            }
            let mut neu1: Array1<f32> = Array1::zeros(dim);
            for c in &context {
                neu1 += &model.lookup_table.syn0.row(sequence[*c]);
            }
            neu1 /= context.len() as f32;

            let mut neu1e = Array1::zeros(dim);
            self.output_layer(&model.configuration, &model.vocab, &mut model.lookup_table, *word, &neu1, &mut neu1e);
            for c in &context {
                model.lookup_table.syn0.row_mut(sequence[*c]).scaled_add(1.0, &neu1e);
            }
        }
    }

    fn train(&mut self, model: &mut Word2Vec, iter: &mut dyn SentenceIterator) -> Result<()> {

        let config = model.configuration.clone();
        let total = model.vocab.total_word_occurrences();
        let algorithm = model.algorithm();

        for epoch in 0..config.epochs.max(1) {

            let timer = Instant::now();
            let mut sentences = 0usize;
            iter.reset()?;

            while let Some(sentence) = iter.next_sentence() {
                let sentence = sentence?;
                let indexes: Vec<usize> = tokenize(&sentence)
                    .iter()
                    .filter_map(|tok| model.vocab.index_of(tok))
                    .collect();
                let seen = indexes.len() as u64;

                let mut sequence = Vec::with_capacity(indexes.len());
                for i in indexes {
                    let keep = match model.vocab.element_at_index(i) {
                        Some(word) => self.keep(word, config.sampling, total),
                        None => false
                    };
                    if keep {
                        sequence.push(i);
                    }
                }

                if config.window > 0 && sequence.len() > 1 {
                    for _ in 0..config.iterations.max(1) {
                        match algorithm {
                            Algorithm::SkipGram => self.skip_gram(model, &sequence),
                            Algorithm::Cbow => self.cbow(model, &sequence),
                        }
                    }
                }

                self.words_processed += seen * config.iterations.max(1) as u64;
                self.update_alpha(&config);
                sentences += 1;
            }

            info!("finished epoch {}, {} sentences, alpha {:.6}, took {} seconds...",
                epoch, sentences, self.alpha, timer.elapsed().as_secs());
        }

        Ok(())
    }

    /// Trains `model` on `iter`. An empty model first gets a vocabulary and fresh weights;
    /// a loaded model keeps both and continues from them.
    pub fn run(model: &mut Word2Vec, iter: &mut dyn SentenceIterator) -> Result<()> {

        let mut rng = StdRng::seed_from_u64(model.configuration.seed);

        if !model.is_trained() {
            let vocab = build_vocab(&model.configuration, iter)?;
            model.lookup_table = reset_weights(&model.configuration, vocab.num_words(), &mut rng);
            model.vocab = vocab;
        } else {
            ensure_output_layers(&model.configuration, &mut model.lookup_table);
            model.validate()?;
        }

        let mut trainer = Train::new(model, rng);
        trainer.train(model, iter)
    }
}
