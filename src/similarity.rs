use ndarray::prelude::*;

use crate::errors::{Result, Word2VecError};
use crate::model::Word2Vec;


/// Cosine similarity over a model's `syn0`, rows normalized once up front.
pub struct Similarity<'a> {
    w: Array2<f32>,
    model: &'a Word2Vec,
}

impl<'a> Similarity<'a> {

    pub fn new(model: &'a Word2Vec) -> Similarity<'a> {

        // need to normalize w so each entry norm l2 is 1
        let mut w = model.lookup_table.syn0.clone();
        for mut row in w.axis_iter_mut(Axis(0)) {
            let norm = row.mapv(|a| a.powi(2)).sum().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|a| a / norm);
            }
        }

        Self { w, model }
    }

    pub fn extract_vec_from_word(&self, token: &str) -> Result<Array1<f32>> {
        match self.model.vocab.index_of(token) {
            Some(i) if i < self.w.dim().0 => Ok(self.w.slice(s![i, ..]).to_owned()),
            _ => Err(Word2VecError::UnknownWord(token.to_owned()))
        }
    }

    /// The `k` rows closest to `vec`, best first, skipping the indexes in `exclude`.
    pub fn find_k_most_similar(&self, vec: &Array1<f32>, k: usize, exclude: &[usize]) -> Vec<(String, f32)> {

        // multiply all vectors by token vector
        let scores = self.w.dot(vec); // of size w.0, vocab size
        let mut indexed_scores: Vec<(usize, f32)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(i, _)| !exclude.contains(i))
            .collect();

        // sort by most similar in descending order
        indexed_scores.sort_by(|(_i, s), (_j, t)| t.total_cmp(s));

        indexed_scores
            .into_iter()
            .take(k)
            .filter_map(|(index, score)| {
                self.model.vocab.element_at_index(index).map(|w| (w.word.clone(), score))
            })
            .collect()
    }

    /// Nearest words to `token`, the token itself excluded. Unknown tokens have no neighbours.
    pub fn words_nearest(&self, token: &str, k: usize) -> Vec<(String, f32)> {
        let index = match self.model.vocab.index_of(token) {
            Some(index) => index,
            None => return Vec::new()
        };
        match self.extract_vec_from_word(token) {
            Ok(vec) => self.find_k_most_similar(&vec, k, &[index]),
            Err(_) => Vec::new()
        }
    }
}
