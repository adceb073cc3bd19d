//! Class-rebalancing dataset sampler.
//!
//! Reads a ground truth table and its image directory, carves out
//! validation and test splits, computes a target count per class, and then
//! oversamples (augmentation) or undersamples (random draw) each class of
//! the training split before writing every split back to disk.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lesion_balance::sampler::{SamplerConfig, run};
//!
//! let config = SamplerConfig::builder()
//!     .images_dir("./isic2019/ISIC_2019_Training_Input")
//!     .descriptions("./isic2019/ISIC_2019_Training_GroundTruth.csv")
//!     .output_dir("./isic2019/sampled")
//!     .training_samples(Some(20_000))
//!     .class_balance(true)
//!     .build()?;
//!
//! let metadata = run(&config)?;
//! ```

pub mod allocation;
pub mod augment;
pub mod image_io;
mod output;
mod pipeline;

use std::path::PathBuf;

use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

pub use allocation::{BalancePolicy, allocate};
pub use augment::{AugmentOp, Operation, augment, augmentation_group};
pub use output::{Metadata, OutputLayout, run, save, save_no_unknown};
pub use pipeline::{SampledDataset, process, sample};

use crate::dataset::{LesionCategory, Sample};
use crate::error::{Error, Result};

/// A dataset row together with its decoded, resized image.
#[derive(Debug, Clone)]
pub struct LoadedSample {
    /// The row.
    pub sample: Sample,
    /// Decoded image.
    pub image: RgbImage,
}

impl LoadedSample {
    /// Load the row's image centre-cropped and resized to `img_size`.
    pub fn load(sample: Sample, img_size: u32) -> Result<Self> {
        tracing::debug!(file = sample.file_name(), image = %sample.image, "loading image");
        let image = image_io::load_image(&sample.path, Some(img_size), true)?;
        Ok(Self { sample, image })
    }
}

/// Configuration for a sampler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Directory holding `{image}.jpg` files named in the ground truth.
    pub images_dir: PathBuf,

    /// Ground truth CSV.
    pub descriptions: PathBuf,

    /// Output root.
    pub output_dir: PathBuf,

    /// Directory of unlabeled test images; when unset the test split is
    /// carved from the ground truth.
    pub test_dir: Option<PathBuf>,

    /// Directory of out-of-distribution images.
    pub unknown_images: Option<PathBuf>,

    /// Put out-of-distribution images in the training pool instead of the
    /// test split.
    pub unknown_train: bool,

    /// Square side of every output image.
    pub target_size: u32,

    /// Requested training set size.
    pub training_samples: Option<usize>,

    /// Give every class the same number of samples.
    pub class_balance: bool,

    /// Per-class lower bound.
    pub min_samples: Option<usize>,

    /// Augmentation group used for oversampling.
    pub augmentation_group: u8,

    /// Fraction of the ground truth held out for testing.
    pub test_fraction: f64,

    /// Fraction of the remaining rows held out for validation.
    pub validation_fraction: f64,

    /// Prefix of output folder and file names.
    pub dataset_prefix: String,

    /// Name of the out-of-distribution label column.
    pub unknown_column: String,

    /// RNG seed; drawn from the OS when unset.
    pub seed: Option<u64>,

    /// Draw progress bars on stderr.
    #[serde(skip)]
    pub show_progress: bool,
}

impl SamplerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> SamplerConfigBuilder {
        SamplerConfigBuilder::default()
    }

    /// The balancing policy selected by the options.
    #[must_use]
    pub fn policy(&self) -> BalancePolicy {
        BalancePolicy::from_options(self.training_samples, self.class_balance, self.min_samples)
    }

    /// Check option combinations.
    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(Error::InvalidConfig("target size must be positive".into()));
        }
        for (name, value) in [
            ("test fraction", self.test_fraction),
            ("validation fraction", self.validation_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be in (0, 1), got {value}"
                )));
            }
        }
        if self.unknown_train && self.unknown_images.is_none() {
            return Err(Error::InvalidConfig(
                "unknown_train requires an unknown images directory".into(),
            ));
        }
        if self.training_samples == Some(0) {
            return Err(Error::InvalidConfig("training samples must be positive".into()));
        }
        if self.dataset_prefix.is_empty() {
            return Err(Error::InvalidConfig("dataset prefix must not be empty".into()));
        }
        Ok(())
    }
}

/// Builder for [`SamplerConfig`].
#[derive(Debug, Default)]
pub struct SamplerConfigBuilder {
    images_dir: Option<PathBuf>,
    descriptions: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    test_dir: Option<PathBuf>,
    unknown_images: Option<PathBuf>,
    unknown_train: bool,
    target_size: Option<u32>,
    training_samples: Option<usize>,
    class_balance: bool,
    min_samples: Option<usize>,
    augmentation_group: Option<u8>,
    test_fraction: Option<f64>,
    validation_fraction: Option<f64>,
    dataset_prefix: Option<String>,
    unknown_column: Option<String>,
    seed: Option<u64>,
    show_progress: bool,
}

impl SamplerConfigBuilder {
    /// Set the source image directory.
    #[must_use]
    pub fn images_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.images_dir = Some(path.into());
        self
    }

    /// Set the ground truth CSV.
    #[must_use]
    pub fn descriptions(mut self, path: impl Into<PathBuf>) -> Self {
        self.descriptions = Some(path.into());
        self
    }

    /// Set the output root.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Use a directory of unlabeled images as the test split.
    #[must_use]
    pub fn test_dir(mut self, path: Option<PathBuf>) -> Self {
        self.test_dir = path;
        self
    }

    /// Set the out-of-distribution image directory.
    #[must_use]
    pub fn unknown_images(mut self, path: Option<PathBuf>) -> Self {
        self.unknown_images = path;
        self
    }

    /// Train on out-of-distribution images.
    #[must_use]
    pub fn unknown_train(mut self, enabled: bool) -> Self {
        self.unknown_train = enabled;
        self
    }

    /// Set the output image side.
    #[must_use]
    pub fn target_size(mut self, size: u32) -> Self {
        self.target_size = Some(size);
        self
    }

    /// Set the requested training set size.
    #[must_use]
    pub fn training_samples(mut self, n: Option<usize>) -> Self {
        self.training_samples = n;
        self
    }

    /// Balance classes equally.
    #[must_use]
    pub fn class_balance(mut self, enabled: bool) -> Self {
        self.class_balance = enabled;
        self
    }

    /// Set the per-class lower bound.
    #[must_use]
    pub fn min_samples(mut self, n: Option<usize>) -> Self {
        self.min_samples = n;
        self
    }

    /// Select the augmentation group.
    #[must_use]
    pub fn augmentation_group(mut self, group: u8) -> Self {
        self.augmentation_group = Some(group);
        self
    }

    /// Set the test hold-out fraction.
    #[must_use]
    pub fn test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = Some(fraction);
        self
    }

    /// Set the validation hold-out fraction.
    #[must_use]
    pub fn validation_fraction(mut self, fraction: f64) -> Self {
        self.validation_fraction = Some(fraction);
        self
    }

    /// Set the output name prefix.
    #[must_use]
    pub fn dataset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dataset_prefix = Some(prefix.into());
        self
    }

    /// Set the out-of-distribution column name.
    #[must_use]
    pub fn unknown_column(mut self, name: impl Into<String>) -> Self {
        self.unknown_column = Some(name.into());
        self
    }

    /// Fix the RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Draw progress bars.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<SamplerConfig> {
        let required = |value: Option<PathBuf>, name: &str| {
            value.ok_or_else(|| Error::InvalidConfig(format!("{name} is required")))
        };

        let config = SamplerConfig {
            images_dir: required(self.images_dir, "images_dir")?,
            descriptions: required(self.descriptions, "descriptions")?,
            output_dir: required(self.output_dir, "output_dir")?,
            test_dir: self.test_dir,
            unknown_images: self.unknown_images,
            unknown_train: self.unknown_train,
            target_size: self.target_size.unwrap_or(224),
            training_samples: self.training_samples,
            class_balance: self.class_balance,
            min_samples: self.min_samples,
            augmentation_group: self.augmentation_group.unwrap_or(1),
            test_fraction: self.test_fraction.unwrap_or(0.1),
            validation_fraction: self.validation_fraction.unwrap_or(0.1),
            dataset_prefix: self.dataset_prefix.unwrap_or_else(|| "ISIC_2019".to_string()),
            unknown_column: self
                .unknown_column
                .unwrap_or_else(|| LesionCategory::Unk.to_string()),
            seed: self.seed,
            show_progress: self.show_progress,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Progress bar for a loop over `len` items; hidden unless `visible`.
pub(crate) fn progress_bar(len: u64, message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples ({per_sec})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(message.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SamplerConfigBuilder {
        SamplerConfig::builder()
            .images_dir("/data/images")
            .descriptions("/data/gt.csv")
            .output_dir("/data/out")
    }

    #[test]
    fn test_builder_defaults() {
        let config = base().build().unwrap();
        assert_eq!(config.target_size, 224);
        assert_eq!(config.augmentation_group, 1);
        assert_eq!(config.test_fraction, 0.1);
        assert_eq!(config.validation_fraction, 0.1);
        assert_eq!(config.dataset_prefix, "ISIC_2019");
        assert_eq!(config.unknown_column, "UNK");
        assert_eq!(config.policy(), BalancePolicy::KeepOriginal);
    }

    #[test]
    fn test_builder_requires_paths() {
        let err = SamplerConfig::builder().images_dir("/x").build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_validation_rules() {
        assert!(base().target_size(0).build().is_err());
        assert!(base().test_fraction(1.0).build().is_err());
        assert!(base().validation_fraction(0.0).build().is_err());
        assert!(base().unknown_train(true).build().is_err());
        assert!(base().training_samples(Some(0)).build().is_err());
        assert!(
            base()
                .unknown_train(true)
                .unknown_images(Some("/ood".into()))
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_policy_from_config() {
        let config = base().training_samples(Some(100)).class_balance(true).build().unwrap();
        assert_eq!(config.policy(), BalancePolicy::ClassBalance { total: Some(100) });
    }
}
