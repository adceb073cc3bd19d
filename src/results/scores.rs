//! Classification scores over predicted and true category indices.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A score computed from `(y_true, y_pred)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Fraction of correct predictions.
    Accuracy,
    /// Mean recall over the classes present in `y_true` (BMA).
    BalancedAccuracy,
    /// Mean recall over every class seen in either `y_true` or `y_pred`.
    MacroRecall,
}

impl ScoreKind {
    /// Compute the score. Both slices must be non-empty and the same length.
    pub fn compute(self, y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
        check_lengths(y_true, y_pred)?;
        Ok(match self {
            Self::Accuracy => accuracy_unchecked(y_true, y_pred),
            Self::BalancedAccuracy => {
                let recalls = per_class_recall(y_true, y_pred);
                recalls.values().sum::<f64>() / recalls.len() as f64
            }
            Self::MacroRecall => {
                let recalls = per_class_recall(y_true, y_pred);
                let labels: BTreeSet<usize> = y_true.iter().chain(y_pred).copied().collect();
                labels
                    .iter()
                    .map(|l| recalls.get(l).copied().unwrap_or(0.0))
                    .sum::<f64>()
                    / labels.len() as f64
            }
        })
    }

    /// Axis label used in charts.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Accuracy => "Accuracy",
            Self::BalancedAccuracy => "BMA",
            Self::MacroRecall => "Macro Recall",
        }
    }
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accuracy => "accuracy",
            Self::BalancedAccuracy => "balanced_accuracy",
            Self::MacroRecall => "macro_recall",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ScoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "accuracy" | "acc" => Ok(Self::Accuracy),
            "balanced_accuracy" | "bma" | "balanced_acc" => Ok(Self::BalancedAccuracy),
            "macro_recall" | "recall" => Ok(Self::MacroRecall),
            other => Err(Error::InvalidConfig(format!("unknown score '{other}'"))),
        }
    }
}

fn check_lengths(y_true: &[usize], y_pred: &[usize]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(Error::Dataset(format!(
            "{} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(Error::Dataset("no predictions to score".to_string()));
    }
    Ok(())
}

fn accuracy_unchecked(y_true: &[usize], y_pred: &[usize]) -> f64 {
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

fn per_class_recall(y_true: &[usize], y_pred: &[usize]) -> BTreeMap<usize, f64> {
    let mut totals: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for (&t, &p) in y_true.iter().zip(y_pred) {
        let entry = totals.entry(t).or_default();
        entry.0 += 1;
        if t == p {
            entry.1 += 1;
        }
    }
    totals
        .into_iter()
        .map(|(label, (n, hit))| (label, hit as f64 / n as f64))
        .collect()
}

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    ScoreKind::Accuracy.compute(y_true, y_pred)
}

pub fn balanced_accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    ScoreKind::BalancedAccuracy.compute(y_true, y_pred)
}

/// Convert a 0..1 score to a percentage rounded to two decimals.
#[must_use]
pub fn as_percent(score: f64) -> f64 {
    (score * 100.0 * 100.0).round() / 100.0
}

/// Counts of (true, predicted) pairs; rows are true labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    /// Sorted union of true and predicted labels.
    pub labels: Vec<usize>,
    /// `counts[i][j]`: samples of `labels[i]` predicted as `labels[j]`.
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Counts as floats.
    #[must_use]
    pub fn values(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| row.iter().map(|&c| c as f64).collect())
            .collect()
    }

    /// Each row divided by its sum, so rows hold per-class recall rates.
    #[must_use]
    pub fn normalized(&self) -> Vec<Vec<f64>> {
        normalize_rows(&self.values())
    }
}

/// Build the confusion matrix of two label sequences.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize]) -> Result<ConfusionMatrix> {
    check_lengths(y_true, y_pred)?;

    let labels: Vec<usize> = y_true
        .iter()
        .chain(y_pred)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let position: BTreeMap<usize, usize> = labels.iter().enumerate().map(|(i, &l)| (l, i)).collect();

    let mut counts = vec![vec![0; labels.len()]; labels.len()];
    for (t, p) in y_true.iter().zip(y_pred) {
        counts[position[t]][position[p]] += 1;
    }

    Ok(ConfusionMatrix { labels, counts })
}

/// Divide every row by its sum; all-zero rows stay zero.
#[must_use]
pub fn normalize_rows(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    matrix
        .iter()
        .map(|row| {
            let sum: f64 = row.iter().sum();
            if sum == 0.0 {
                row.clone()
            } else {
                row.iter().map(|v| v / sum).collect()
            }
        })
        .collect()
}
