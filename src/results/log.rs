//! Per-epoch training logs written by the training loop.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Column holding the epoch number, when the log has one.
pub const EPOCH_COLUMN: &str = "epoch";

/// A CSV training log: one row per epoch, one numeric column per metric.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingLog {
    path: PathBuf,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl TrainingLog {
    /// Load a log such as `epoch,loss,val_loss,balanced_accuracy,...`.
    ///
    /// Empty cells are read as NaN and skipped by [`TrainingLog::best`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let mut values = vec![Vec::new(); columns.len()];

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            for (i, column) in values.iter_mut().enumerate() {
                let field = record.get(i).unwrap_or("");
                let value = if field.is_empty() {
                    f64::NAN
                } else {
                    field.parse().map_err(|_| Error::Log {
                        path: path.to_path_buf(),
                        reason: format!("row {}: invalid value '{field}' in column {}", row + 1, columns[i]),
                    })?
                };
                column.push(value);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            values,
        })
    }

    /// File the log was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names in file order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Number of logged epochs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of one metric, one per epoch.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
            .ok_or_else(|| Error::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    /// X values for plotting: the `epoch` column, or 0..len without one.
    #[must_use]
    pub fn epochs(&self) -> Vec<f64> {
        match self.column(EPOCH_COLUMN) {
            Ok(epochs) => epochs.to_vec(),
            Err(_) => (0..self.len()).map(|i| i as f64).collect(),
        }
    }

    /// Best value of a metric across epochs: the minimum for losses, the
    /// maximum otherwise.
    pub fn best(&self, metric: &str) -> Result<f64> {
        let values = self.column(metric)?;
        let lower_is_better = metric.contains("loss");

        values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(|a, b| if lower_is_better { a.min(b) } else { a.max(b) })
            .ok_or_else(|| Error::Log {
                path: self.path.clone(),
                reason: format!("no values for {metric}"),
            })
    }
}

/// Load `log_path` and return the best epoch value of `metric`.
pub fn best_metric(log_path: impl AsRef<Path>, metric: &str) -> Result<f64> {
    TrainingLog::load(log_path)?.best(metric)
}
