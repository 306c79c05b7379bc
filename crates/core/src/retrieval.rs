//! Lexical retrieval over stored records.
//!
//! The index is rebuilt on every query: tokens are lowercased runs of two or
//! more word characters, weights are raw term counts times smoothed IDF
//! (`ln((1 + n) / (1 + df)) + 1`), and vectors are L2-normalized so the dot
//! product is the cosine similarity.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::domain::Record;

pub const DEFAULT_TOP_K: usize = 3;

/// Sparse vector keyed by vocabulary index
pub type SparseVector = HashMap<usize, f64>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Position of the record in the searched slice
    pub index: usize,
    pub score: f64,
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"))
}

pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// TF-IDF vocabulary and weights fitted over a document set
#[derive(Debug, Clone)]
pub struct TfidfModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfModel {
    /// Fits the model; `None` when the documents yield no tokens at all
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Option<Self> {
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();

        for document in documents {
            let mut seen: Vec<usize> = tokenize(document.as_ref())
                .into_iter()
                .map(|token| {
                    let next = vocabulary.len();
                    *vocabulary.entry(token).or_insert(next)
                })
                .collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                if term == doc_freq.len() {
                    doc_freq.push(0);
                }
                doc_freq[term] += 1;
            }
        }

        if vocabulary.is_empty() {
            return None;
        }

        let n = documents.len() as f64;
        let idf = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        Some(Self { vocabulary, idf })
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Projects text into the fitted space; unknown terms are dropped
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut vector = SparseVector::new();
        for token in tokenize(text) {
            if let Some(&term) = self.vocabulary.get(&token) {
                *vector.entry(term).or_insert(0.0) += 1.0;
            }
        }
        for (term, weight) in vector.iter_mut() {
            *weight *= self.idf[*term];
        }
        normalize(&mut vector);
        vector
    }
}

fn normalize(vector: &mut SparseVector) {
    let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for weight in vector.values_mut() {
            *weight /= norm;
        }
    }
}

/// Cosine similarity of two L2-normalized sparse vectors
pub fn cosine_similarity(left: &SparseVector, right: &SparseVector) -> f64 {
    let (small, large) = if left.len() <= right.len() {
        (left, right)
    } else {
        (right, left)
    };
    small
        .iter()
        .filter_map(|(term, weight)| large.get(term).map(|other| weight * other))
        .sum()
}

/// Ranks records against the query, best first.
///
/// Ties keep record order. At most `top_k` hits are returned and every hit
/// has a strictly positive score.
pub fn rank(query: &str, records: &[Record], top_k: usize) -> Vec<SearchHit> {
    if records.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let documents: Vec<String> = records.iter().map(Record::search_text).collect();
    let Some(model) = TfidfModel::fit(&documents) else {
        debug!("no indexable terms in {} records", records.len());
        return Vec::new();
    };

    let query_vector = model.transform(query);
    if query_vector.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = documents
        .iter()
        .enumerate()
        .map(|(index, document)| SearchHit {
            index,
            score: cosine_similarity(&query_vector, &model.transform(document)),
        })
        .filter(|hit| hit.score > 0.0)
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(top_k);

    debug!(
        vocabulary = model.vocabulary_len(),
        hits = hits.len(),
        "ranked {} records",
        records.len()
    );
    hits
}

/// Returns the most relevant records for the query
pub fn search<'a>(query: &str, records: &'a [Record], top_k: usize) -> Vec<&'a Record> {
    rank(query, records, top_k)
        .into_iter()
        .map(|hit| &records[hit.index])
        .collect()
}
