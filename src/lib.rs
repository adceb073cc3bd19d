//! # lesion-balance
//!
//! Class rebalancing and experiment charts for skin-lesion image datasets.
//!
//! The library has two halves. The **sampler** turns an imbalanced labelled
//! image folder into a balanced training split by augmenting rare classes
//! and subsampling common ones, and writes train, validation and test
//! splits as resized JPEGs with matching ground truth CSVs. The **results**
//! and **plot** modules read what training runs leave behind (per-epoch
//! logs, test predictions, a model registry) and render comparison charts
//! as SVG.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lesion_balance::sampler::{SamplerConfig, run};
//!
//! let config = SamplerConfig::builder()
//!     .images_dir("./ISIC_2019_Training_Input")
//!     .descriptions("./ISIC_2019_Training_GroundTruth.csv")
//!     .output_dir("./balanced")
//!     .training_samples(Some(20_000))
//!     .class_balance(true)
//!     .seed(Some(7))
//!     .build()?;
//!
//! let metadata = run(&config)?;
//! println!("{} training images", metadata.training_samples);
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`dataset`]: Ground truth tables, image discovery, stratified splits
//! - [`sampler`]: Allocation, augmentation and the sampling pipeline
//! - [`results`]: Training logs, predictions, scores and the model registry
//! - [`plot`]: SVG charts

pub mod dataset;
pub mod error;
pub mod plot;
pub mod results;
pub mod sampler;

// Re-export commonly used types
pub use dataset::{GroundTruth, LesionCategory, Sample};
pub use error::{Error, Result};
pub use results::{Checkpoint, ModelInfo, ModelRegistry, ScoreKind, TrainingLog};
pub use sampler::{BalancePolicy, Metadata, SamplerConfig, run};
