//! Registry of trained models and their result files.
//!
//! A registry is a JSON file listing every trained model with its
//! hyperparameters, its training log and the folder holding its test
//! predictions:
//!
//! ```json
//! [
//!   {
//!     "model": "DenseNet201",
//!     "hyperparameters": { "batch_size": "32", "dropout": "None" },
//!     "log": "densenet201/log.csv",
//!     "pred_test": "densenet201/test_predictions"
//!   }
//! ]
//! ```
//!
//! Relative paths are resolved against the registry's directory.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::dataset::GroundTruth;
use crate::error::{Error, Result};
use crate::results::{Predictions, ScoreKind, TrainingLog, best_metric, test_score};

/// Model checkpoints whose test predictions are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    /// Epoch with the best validation BMA.
    BestBalancedAcc,
    /// Epoch with the lowest validation loss.
    BestLoss,
    /// Last epoch.
    Latest,
}

impl Checkpoint {
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::BestBalancedAcc, Self::BestLoss, Self::Latest]
    }

    /// Predictions file stem.
    #[must_use]
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::BestBalancedAcc => "best_balanced_acc",
            Self::BestLoss => "best_loss",
            Self::Latest => "latest",
        }
    }

    /// Chart label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::BestBalancedAcc => "Best BMA Model",
            Self::BestLoss => "Best Loss Model",
            Self::Latest => "Last Model",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// One trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Architecture name, e.g. `DenseNet201`.
    pub model: String,

    /// Hyperparameters as strings; `"None"` marks an unset value.
    #[serde(default, deserialize_with = "stringly_map")]
    pub hyperparameters: BTreeMap<String, String>,

    /// Training log CSV.
    pub log: PathBuf,

    /// Folder with `no_unknown/{checkpoint}.csv` prediction files.
    #[serde(default)]
    pub pred_test: Option<PathBuf>,
}

impl ModelInfo {
    #[must_use]
    pub fn hyperparameter(&self, name: &str) -> Option<&str> {
        self.hyperparameters.get(name).map(String::as_str)
    }

    /// Numeric value of a hyperparameter; `"None"` reads as 0.
    pub fn hyperparameter_value(&self, name: &str) -> Result<f64> {
        let raw = self.hyperparameter(name).ok_or_else(|| {
            Error::Dataset(format!("model {} has no hyperparameter '{name}'", self.model))
        })?;
        if raw == "None" {
            return Ok(0.0);
        }
        raw.parse().map_err(|_| {
            Error::Dataset(format!(
                "hyperparameter '{name}' of model {} is not numeric: {raw}",
                self.model
            ))
        })
    }

    /// Predictions file of a checkpoint, if the model has test predictions.
    #[must_use]
    pub fn checkpoint_predictions(&self, checkpoint: Checkpoint) -> Option<PathBuf> {
        self.pred_test.as_ref().map(|dir| {
            dir.join("no_unknown")
                .join(format!("{}.csv", checkpoint.file_stem()))
        })
    }

    pub fn load_log(&self) -> Result<TrainingLog> {
        TrainingLog::load(&self.log)
    }

    /// Best epoch value of a logged metric.
    pub fn log_metric(&self, metric: &str) -> Result<f64> {
        best_metric(&self.log, metric)
    }

    /// Test score of a checkpoint, or `None` without test predictions.
    pub fn test_score(
        &self,
        ground_truth: &GroundTruth,
        checkpoint: Checkpoint,
        kind: ScoreKind,
    ) -> Result<Option<f64>> {
        let Some(path) = self.checkpoint_predictions(checkpoint) else {
            return Ok(None);
        };
        let predictions = Predictions::load(&path)?;
        test_score(&predictions, ground_truth, kind).map(Some)
    }

    fn resolve(&mut self, base: &Path) {
        if self.log.is_relative() {
            self.log = base.join(&self.log);
        }
        if let Some(dir) = self.pred_test.as_mut().filter(|d| d.is_relative()) {
            *dir = base.join(&*dir);
        }
    }
}

fn stringly_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => "None".to_string(),
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryFile {
    List(Vec<ModelInfo>),
    Wrapped { models: Vec<ModelInfo> },
}

/// All models listed in a registry file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRegistry {
    pub models: Vec<ModelInfo>,
}

impl ModelRegistry {
    /// Load a registry: either a JSON array of models or `{"models": [...]}`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_json::from_str(&content)?;
        let mut models = match file {
            RegistryFile::List(models) | RegistryFile::Wrapped { models } => models,
        };

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for model in &mut models {
            model.resolve(base);
        }

        tracing::debug!(path = %path.display(), models = models.len(), "loaded model registry");
        Ok(Self { models })
    }

    /// See [`filter_models`].
    #[must_use]
    pub fn filter(
        &self,
        names: Option<&[String]>,
        constant_parameters: &BTreeMap<String, String>,
    ) -> Vec<&ModelInfo> {
        filter_models(&self.models, names, constant_parameters)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.model == name)
    }
}

/// Keep models named in `names` (all when `None`) whose hyperparameters
/// match every entry of `constant_parameters`.
#[must_use]
pub fn filter_models<'a>(
    models: &'a [ModelInfo],
    names: Option<&[String]>,
    constant_parameters: &BTreeMap<String, String>,
) -> Vec<&'a ModelInfo> {
    models
        .iter()
        .filter(|m| names.is_none_or(|names| names.contains(&m.model)))
        .filter(|m| {
            constant_parameters
                .iter()
                .all(|(k, v)| m.hyperparameter(k) == Some(v.as_str()))
        })
        .collect()
}
