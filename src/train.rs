use std::fmt;

use anyhow::ensure;
use log::info;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{
    labeled_text::LabeledText, naive_bayes::MultinomialNaiveBayes, vectorizer::TfidfVectorizer,
};

#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    pub test_size: f64,
    pub seed: u64,
    pub alpha: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            alpha: 1.0,
        }
    }
}

/// Shuffles with a seeded generator and carves off `ceil(test_size * n)`
/// samples for testing. Returns `(train, test)`.
pub fn train_test_split(
    data: &[LabeledText],
    test_size: f64,
    seed: u64,
) -> anyhow::Result<(Vec<LabeledText>, Vec<LabeledText>)> {
    ensure!(
        test_size > 0.0 && test_size < 1.0,
        "test size must be between 0 and 1, got {test_size}"
    );
    let n_test = (test_size * data.len() as f64).ceil() as usize;
    ensure!(
        n_test > 0 && n_test < data.len(),
        "{} samples cannot be split with test size {test_size}",
        data.len()
    );

    let mut indices: Vec<usize> = (0..data.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    let pick = |idx: &[usize]| idx.iter().map(|&i| data[i].clone()).collect::<Vec<_>>();
    Ok((pick(train_idx), pick(test_idx)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: i64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    /// Labels indexing the confusion matrix rows (truth) and columns (prediction).
    pub labels: Vec<i64>,
    pub confusion: Vec<Vec<usize>>,
    pub per_class: Vec<ClassMetrics>,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub train_shape: (usize, usize),
    pub test_shape: (usize, usize),
    pub evaluation: Evaluation,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

pub fn evaluate(truth: &[i64], predicted: &[i64]) -> Evaluation {
    let mut labels: Vec<i64> = truth.iter().chain(predicted).copied().collect();
    labels.sort_unstable();
    labels.dedup();

    let mut confusion = vec![vec![0usize; labels.len()]; labels.len()];
    for (t, p) in truth.iter().zip(predicted) {
        if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
            confusion[i][j] += 1;
        }
    }

    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    let accuracy = ratio(correct, truth.len());

    let per_class = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| {
            let tp = confusion[i][i];
            let support: usize = confusion[i].iter().sum();
            let predicted_as: usize = confusion.iter().map(|row| row[i]).sum();
            let precision = ratio(tp, predicted_as);
            let recall = ratio(tp, support);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            ClassMetrics {
                label,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    Evaluation {
        accuracy,
        labels,
        confusion,
        per_class,
    }
}

/// Splits, vectorizes and fits a Naive Bayes model, then scores it on the
/// held-out split.
pub fn train_model(data: &[LabeledText], options: TrainOptions) -> anyhow::Result<TrainReport> {
    let (train, test) = train_test_split(data, options.test_size, options.seed)?;

    let train_text: Vec<&str> = train.iter().map(|s| s.text.as_str()).collect();
    let test_text: Vec<&str> = test.iter().map(|s| s.text.as_str()).collect();
    let train_labels: Vec<i64> = train.iter().map(|s| s.label).collect();
    let test_labels: Vec<i64> = test.iter().map(|s| s.label).collect();

    let mut vectorizer = TfidfVectorizer::new();
    let x_train = vectorizer.fit_transform(&train_text)?;
    let x_test = vectorizer.transform(&test_text);
    info!("X_train shape: {:?}", x_train.shape());
    info!("X_test shape: {:?}", x_test.shape());

    let mut model = MultinomialNaiveBayes::new(options.alpha);
    model.fit(&x_train, &train_labels)?;
    let predicted = model.predict(&x_test)?;

    let evaluation = evaluate(&test_labels, &predicted);
    info!("accuracy: {:.4}", evaluation.accuracy);

    Ok(TrainReport {
        train_shape: x_train.shape(),
        test_shape: x_test.shape(),
        evaluation,
    })
}

impl fmt::Display for TrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "X_train shape: {:?}", self.train_shape)?;
        writeln!(f, "X_test shape: {:?}", self.test_shape)?;
        let eval = &self.evaluation;
        writeln!(f, "Accuracy: {:.4}", eval.accuracy)?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows: true, columns: predicted)")?;
        write!(f, "{:>8}", "")?;
        for label in &eval.labels {
            write!(f, "{label:>8}")?;
        }
        writeln!(f)?;
        for (label, row) in eval.labels.iter().zip(&eval.confusion) {
            write!(f, "{label:>8}")?;
            for count in row {
                write!(f, "{count:>8}")?;
            }
            writeln!(f)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>8}{:>11}{:>10}{:>10}{:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for m in &eval.per_class {
            writeln!(
                f,
                "{:>8}{:>11.2}{:>10.2}{:>10.2}{:>10}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(n: usize) -> Vec<LabeledText> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    LabeledText::new(0, format!("healthcare voting rights climate {i}"))
                } else {
                    LabeledText::new(1, format!("tax cuts border security {i}"))
                }
            })
            .collect()
    }

    #[test]
    fn split_sizes_round_test_up() {
        let data = corpus(11);
        let (train, test) = train_test_split(&data, 0.2, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn split_is_deterministic_and_disjoint() {
        let data = corpus(20);
        let (train_a, test_a) = train_test_split(&data, 0.25, 7).unwrap();
        let (train_b, test_b) = train_test_split(&data, 0.25, 7).unwrap();
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        for sample in &test_a {
            assert!(!train_a.contains(sample));
        }
    }

    #[test]
    fn split_rejects_degenerate_sizes() {
        assert!(train_test_split(&corpus(10), 0.0, 1).is_err());
        assert!(train_test_split(&corpus(10), 1.0, 1).is_err());
        assert!(train_test_split(&corpus(1), 0.5, 1).is_err());
    }

    #[test]
    fn evaluate_builds_confusion_matrix() {
        let eval = evaluate(&[0, 0, 1, 1], &[0, 1, 1, 1]);
        assert_eq!(eval.accuracy, 0.75);
        assert_eq!(eval.labels, vec![0, 1]);
        assert_eq!(eval.confusion, vec![vec![1, 1], vec![0, 2]]);
        assert_eq!(eval.per_class[0].precision, 1.0);
        assert_eq!(eval.per_class[0].recall, 0.5);
        assert_eq!(eval.per_class[1].support, 2);
        assert!((eval.per_class[1].precision - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn separable_corpus_is_learned() {
        let report = train_model(&corpus(50), TrainOptions::default()).unwrap();
        assert_eq!(report.train_shape.0, 40);
        assert_eq!(report.test_shape.0, 10);
        assert_eq!(report.train_shape.1, report.test_shape.1);
        assert_eq!(report.evaluation.accuracy, 1.0);

        let printed = report.to_string();
        assert!(printed.contains("X_train shape: (40,"));
        assert!(printed.contains("precision"));
    }
}
