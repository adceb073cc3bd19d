//! Model predictions on the test split.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dataset::GroundTruth;
use crate::error::{Error, Result};
use crate::results::ScoreKind;

const IMAGE_COLUMN: &str = "image";
const PREDICTION_COLUMN: &str = "pred_category";

/// Predicted category per image, read from an `image,pred_category` CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predictions {
    path: PathBuf,
    rows: Vec<(String, usize)>,
}

impl Predictions {
    /// Load a predictions CSV. Extra columns (per-class probabilities) are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| Error::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                })
        };
        let image_idx = find(IMAGE_COLUMN)?;
        let pred_idx = find(PREDICTION_COLUMN)?;

        let mut rows = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let image = record.get(image_idx).unwrap_or("").to_string();
            let field = record.get(pred_idx).unwrap_or("");
            let category = parse_category(field).ok_or_else(|| Error::Log {
                path: path.to_path_buf(),
                reason: format!("row {}: invalid category '{field}'", row + 1),
            })?;
            rows.push((image, category));
        }

        Ok(Self {
            path: path.to_path_buf(),
            rows,
        })
    }

    /// Build from in-memory rows.
    #[must_use]
    pub fn from_rows(rows: Vec<(String, usize)>) -> Self {
        Self {
            path: PathBuf::new(),
            rows,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inner join with the ground truth on image name.
    ///
    /// Returns `(y_true, y_pred)`; images missing from either side, or
    /// without a category in the ground truth, are dropped.
    #[must_use]
    pub fn join(&self, ground_truth: &GroundTruth) -> (Vec<usize>, Vec<usize>) {
        let truth: HashMap<&str, usize> = ground_truth
            .samples
            .iter()
            .filter_map(|s| s.category.map(|c| (s.image.as_str(), c)))
            .collect();

        self.rows
            .iter()
            .filter_map(|(image, pred)| truth.get(image.as_str()).map(|&t| (t, *pred)))
            .unzip()
    }
}

// Some exporters write categories as floats ("3.0").
fn parse_category(field: &str) -> Option<usize> {
    if let Ok(n) = field.parse::<usize>() {
        return Some(n);
    }
    let value: f64 = field.parse().ok()?;
    (value >= 0.0 && value.fract() == 0.0).then_some(value as usize)
}

/// Score `predictions` against `ground_truth`.
pub fn test_score(predictions: &Predictions, ground_truth: &GroundTruth, kind: ScoreKind) -> Result<f64> {
    let (y_true, y_pred) = predictions.join(ground_truth);
    if y_true.is_empty() {
        return Err(Error::Dataset(format!(
            "no predictions in {} match the ground truth",
            predictions.path.display()
        )));
    }
    tracing::debug!(
        matched = y_true.len(),
        total = predictions.len(),
        score = %kind,
        "scoring predictions"
    );
    kind.compute(&y_true, &y_pred)
}
