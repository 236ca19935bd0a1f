//! Bag-of-words features: tokenization and TF-IDF weighting.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::LazyLock,
};

use anyhow::bail;
use rayon::prelude::*;
use regex::Regex;

/// Words of two or more characters.
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_REGEX
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Non-zero `(column, value)` pairs of one row, sorted by column.
pub type SparseRow = Vec<(usize, f64)>;

#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    pub n_cols: usize,
    pub rows: Vec<SparseRow>,
}

impl SparseMatrix {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.n_cols)
    }
}

/// TF-IDF with smoothed idf and L2-normalised rows:
/// `idf(t) = ln((1 + n) / (1 + df(t))) + 1`.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn fit<S: AsRef<str> + Sync>(&mut self, documents: &[S]) -> anyhow::Result<()> {
        let tokenized: Vec<BTreeSet<String>> = documents
            .par_iter()
            .map(|doc| tokenize(doc.as_ref()).into_iter().collect())
            .collect();

        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for terms in &tokenized {
            for term in terms {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }
        if doc_freq.is_empty() {
            bail!("empty vocabulary; perhaps the documents only contain stop words or one-letter words");
        }

        let n_docs = documents.len() as f64;
        self.terms = doc_freq.keys().map(|t| t.to_string()).collect();
        self.vocabulary = self
            .terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();
        self.idf = doc_freq
            .values()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();
        Ok(())
    }

    fn transform_one(&self, document: &str) -> SparseRow {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(document) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseRow = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();
        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in row.iter_mut() {
                *w /= norm;
            }
        }
        row
    }

    pub fn transform<S: AsRef<str> + Sync>(&self, documents: &[S]) -> SparseMatrix {
        let rows = documents
            .par_iter()
            .map(|doc| self.transform_one(doc.as_ref()))
            .collect();
        SparseMatrix {
            n_cols: self.terms.len(),
            rows,
        }
    }

    pub fn fit_transform<S: AsRef<str> + Sync>(
        &mut self,
        documents: &[S],
    ) -> anyhow::Result<SparseMatrix> {
        self.fit(documents)?;
        Ok(self.transform(documents))
    }
}
