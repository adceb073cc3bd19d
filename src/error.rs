//! Error types for lesion-balance operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lesion-balance operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while sampling a dataset or rendering charts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed to load an image file.
    #[error("Image load failed: {path}: {reason}")]
    ImageLoad {
        /// Path to the image that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Failed to write an image file.
    #[error("Image save failed: {path}: {reason}")]
    ImageSave {
        /// Destination path.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Malformed ground truth table.
    #[error("Ground truth error at line {line}: {reason}")]
    GroundTruth {
        /// Line number where the error occurred (1-based, header is line 1).
        line: usize,
        /// Reason for the failure.
        reason: String,
    },

    /// Error assembling or splitting a dataset.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Per-class sample allocation could not be computed.
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// Invalid augmentation group or operation.
    #[error("Augmentation error: {0}")]
    Augmentation(String),

    /// Malformed training log or predictions file.
    #[error("Log error: {path}: {reason}")]
    Log {
        /// Path of the log file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// A required column is missing from a table.
    #[error("Missing column '{column}' in {path}")]
    MissingColumn {
        /// Path of the table.
        path: PathBuf,
        /// Name of the missing column.
        column: String,
    },

    /// Chart input could not be rendered.
    #[error("Chart error: {0}")]
    Chart(String),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Image codec error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
