//! Reading training results: per-epoch logs, test predictions, scores and
//! the registry of trained models.

mod log;
mod models;
mod predictions;
mod scores;

pub use log::{EPOCH_COLUMN, TrainingLog, best_metric};
pub use models::{Checkpoint, ModelInfo, ModelRegistry, filter_models};
pub use predictions::{Predictions, test_score};
pub use scores::{
    ConfusionMatrix, ScoreKind, accuracy, as_percent, balanced_accuracy, confusion_matrix,
    normalize_rows,
};
