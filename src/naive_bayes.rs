//! Multinomial Naive Bayes over sparse term-weight features.

use anyhow::{bail, ensure};
use rayon::prelude::*;

use crate::vectorizer::{SparseMatrix, SparseRow};

#[derive(Debug, Clone)]
pub struct MultinomialNaiveBayes {
    alpha: f64,
    classes: Vec<i64>,
    class_log_prior: Vec<f64>,
    /// `feature_log_prob[class][term]`
    feature_log_prob: Vec<Vec<f64>>,
}

impl MultinomialNaiveBayes {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            classes: Vec::new(),
            class_log_prior: Vec::new(),
            feature_log_prob: Vec::new(),
        }
    }

    /// Labels seen during fitting, ascending.
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn fit(&mut self, features: &SparseMatrix, labels: &[i64]) -> anyhow::Result<()> {
        ensure!(
            features.rows.len() == labels.len(),
            "{} feature rows but {} labels",
            features.rows.len(),
            labels.len()
        );
        if labels.is_empty() {
            bail!("cannot fit on zero samples");
        }
        ensure!(self.alpha >= 0.0, "smoothing must be non-negative");

        let mut classes = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();

        let n_terms = features.n_cols;
        let mut class_count = vec![0usize; classes.len()];
        let mut feature_count = vec![vec![0.0; n_terms]; classes.len()];
        for (row, label) in features.rows.iter().zip(labels) {
            // classes is sorted and contains every label
            let Ok(c) = classes.binary_search(label) else {
                continue;
            };
            class_count[c] += 1;
            for &(term, weight) in row {
                ensure!(
                    term < n_terms,
                    "term index {term} out of range for {n_terms} columns"
                );
                feature_count[c][term] += weight;
            }
        }

        let n_samples = labels.len() as f64;
        self.class_log_prior = class_count
            .iter()
            .map(|&count| (count as f64 / n_samples).ln())
            .collect();
        self.feature_log_prob = feature_count
            .iter()
            .map(|counts| {
                let total = counts.iter().sum::<f64>() + self.alpha * n_terms as f64;
                counts
                    .iter()
                    .map(|count| ((count + self.alpha) / total).ln())
                    .collect()
            })
            .collect();
        self.classes = classes;
        Ok(())
    }

    fn joint_log_likelihood(&self, row: &SparseRow) -> Vec<f64> {
        self.class_log_prior
            .iter()
            .zip(&self.feature_log_prob)
            .map(|(prior, log_probs)| {
                prior
                    + row
                        .iter()
                        .filter_map(|&(term, weight)| log_probs.get(term).map(|lp| lp * weight))
                        .sum::<f64>()
            })
            .collect()
    }

    pub fn predict_one(&self, row: &SparseRow) -> anyhow::Result<i64> {
        let scores = self.joint_log_likelihood(row);
        let mut best: Option<(usize, f64)> = None;
        for (c, score) in scores.into_iter().enumerate() {
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((c, score));
            }
        }
        match best {
            Some((c, _)) => Ok(self.classes[c]),
            None => bail!("model has not been fitted"),
        }
    }

    pub fn predict(&self, features: &SparseMatrix) -> anyhow::Result<Vec<i64>> {
        features
            .rows
            .par_iter()
            .map(|row| self.predict_one(row))
            .collect()
    }
}

impl Default for MultinomialNaiveBayes {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorizer::TfidfVectorizer;

    fn fitted() -> (TfidfVectorizer, MultinomialNaiveBayes) {
        let docs = [
            "tax cuts for small business",
            "cut taxes and regulation",
            "border security now",
            "healthcare for all families",
            "protect voting rights",
            "climate action and clean energy",
        ];
        let labels = [1, 1, 1, 0, 0, 0];
        let mut vectorizer = TfidfVectorizer::new();
        let features = vectorizer.fit_transform(&docs).unwrap();
        let mut model = MultinomialNaiveBayes::default();
        model.fit(&features, &labels).unwrap();
        (vectorizer, model)
    }

    #[test]
    fn learns_sorted_classes() {
        let (_, model) = fitted();
        assert_eq!(model.classes(), &[0, 1]);
    }

    #[test]
    fn predicts_by_vocabulary() {
        let (vectorizer, model) = fitted();
        let features = vectorizer.transform(&["lower taxes for business", "clean energy for families"]);
        assert_eq!(model.predict(&features).unwrap(), vec![1, 0]);
    }

    #[test]
    fn unknown_text_falls_back_to_prior() {
        let docs = ["alpha", "beta", "gamma"];
        let mut vectorizer = TfidfVectorizer::new();
        let features = vectorizer.fit_transform(&docs).unwrap();
        let mut model = MultinomialNaiveBayes::default();
        model.fit(&features, &[3, 3, 7]).unwrap();
        let unseen = vectorizer.transform(&["zzz"]);
        assert_eq!(model.predict(&unseen).unwrap(), vec![3]);
    }

    #[test]
    fn rejects_bad_input() {
        let empty = SparseMatrix {
            n_cols: 0,
            rows: Vec::new(),
        };
        assert!(MultinomialNaiveBayes::default().fit(&empty, &[]).is_err());

        let one = SparseMatrix {
            n_cols: 1,
            rows: vec![vec![(0, 1.0)]],
        };
        assert!(MultinomialNaiveBayes::default().fit(&one, &[0, 1]).is_err());
        assert!(MultinomialNaiveBayes::default().predict_one(&vec![(0, 1.0)]).is_err());
    }

    #[test]
    fn rejects_term_outside_columns() {
        let features = SparseMatrix {
            n_cols: 2,
            rows: vec![vec![(0, 1.0)], vec![(5, 1.0)]],
        };
        let err = MultinomialNaiveBayes::default()
            .fit(&features, &[0, 1])
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
