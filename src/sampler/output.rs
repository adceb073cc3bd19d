//! Writing sampled splits and the run manifest to disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{Sample, count_per_category, write_ground_truth};
use crate::error::Result;
use crate::sampler::image_io::save_jpeg;
use crate::sampler::{LoadedSample, SampledDataset, SamplerConfig, process};

/// File and folder names of a sampled dataset under one output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    prefix: String,
}

impl OutputLayout {
    /// Layout rooted at `root` with names starting with `prefix`.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    /// Output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn named(&self, suffix: &str) -> PathBuf {
        self.root.join(format!("{}_{suffix}", self.prefix))
    }

    #[must_use]
    pub fn train_images(&self) -> PathBuf {
        self.named("Training_Input")
    }

    #[must_use]
    pub fn train_csv(&self) -> PathBuf {
        self.named("Training_GroundTruth.csv")
    }

    #[must_use]
    pub fn validation_images(&self) -> PathBuf {
        self.named("Validation_Input")
    }

    #[must_use]
    pub fn validation_csv(&self) -> PathBuf {
        self.named("Validation_GroundTruth.csv")
    }

    #[must_use]
    pub fn test_images(&self) -> PathBuf {
        self.named("Test_Input")
    }

    /// Test labels without out-of-distribution rows.
    #[must_use]
    pub fn test_csv(&self) -> PathBuf {
        self.named("Test_GroundTruth.csv")
    }

    /// Test labels including out-of-distribution rows.
    #[must_use]
    pub fn test_csv_unknown(&self) -> PathBuf {
        self.named("Test_GroundTruth_Unknown.csv")
    }

    #[must_use]
    pub fn metadata(&self) -> PathBuf {
        self.root.join("metadata.json")
    }
}

/// Manifest written next to a sampled dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Output root.
    pub path: PathBuf,
    /// Side of every written image.
    pub target_size: u32,
    /// Rows in the written training split.
    pub training_samples: usize,
    /// Whether classes were balanced equally.
    pub class_balance: bool,
    /// Per-class lower bound, if one was set.
    pub min_samples: Option<usize>,
    /// Source image directory.
    pub images_location: PathBuf,
    /// Source ground truth CSV.
    pub descriptions_location: PathBuf,
    /// Out-of-distribution image directory.
    pub unknown_images_location: Option<PathBuf>,
    /// Whether out-of-distribution images went to the training split.
    pub unknown_train: bool,
    /// Augmentation group used for oversampling.
    pub data_augmentation_group: u8,
    /// Seed the run can be reproduced with.
    pub seed: u64,
    /// Rows in the written validation split.
    pub validation_samples: usize,
    /// Rows in the written test split.
    pub test_samples: usize,
    /// Training rows per label column after resampling.
    pub class_counts: BTreeMap<String, usize>,
    /// When the run finished.
    pub created_at: DateTime<Utc>,
}

impl Metadata {
    fn from_run(config: &SamplerConfig, data: &SampledDataset, seed: u64) -> Self {
        let rows: Vec<Sample> = data.train.iter().map(|l| l.sample.clone()).collect();
        let class_counts = count_per_category(&rows)
            .into_iter()
            .map(|(index, n)| {
                let name = data
                    .columns
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| index.to_string());
                (name, n)
            })
            .collect();

        Self {
            path: config.output_dir.clone(),
            target_size: config.target_size,
            training_samples: data.train.len(),
            class_balance: config.class_balance,
            min_samples: config.min_samples,
            images_location: config.images_dir.clone(),
            descriptions_location: config.descriptions.clone(),
            unknown_images_location: config.unknown_images.clone(),
            unknown_train: config.unknown_train,
            data_augmentation_group: config.augmentation_group,
            seed,
            validation_samples: data.validation.len(),
            test_samples: data.test.len(),
            class_counts,
            created_at: Utc::now(),
        }
    }

    /// Write as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a manifest written by [`Metadata::write`].
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Write one split: every image as `{image}.jpg` under `images_dir`, and the
/// label table to `csv`.
///
/// An existing `images_dir` is removed first, as is an existing `csv`.
pub fn save(split: &[LoadedSample], images_dir: &Path, csv: &Path, columns: &[String]) -> Result<()> {
    if images_dir.exists() {
        fs::remove_dir_all(images_dir)?;
    }
    fs::create_dir_all(images_dir)?;
    if csv.exists() {
        fs::remove_file(csv)?;
    }

    split
        .par_iter()
        .try_for_each(|l| save_jpeg(&l.image, &images_dir.join(format!("{}.jpg", l.sample.image))))?;

    let rows: Vec<Sample> = split.iter().map(|l| l.sample.clone()).collect();
    write_ground_truth(csv, columns, &rows)?;
    info!(rows = rows.len(), csv = %csv.display(), "saved split");
    Ok(())
}

/// Write the label table of the test rows that are not out-of-distribution.
pub fn save_no_unknown(
    test: &[LoadedSample],
    csv: &Path,
    columns: &[String],
    unknown_index: Option<usize>,
) -> Result<()> {
    let rows: Vec<Sample> = test
        .iter()
        .filter(|l| unknown_index.is_none() || l.sample.category != unknown_index)
        .map(|l| l.sample.clone())
        .collect();
    write_ground_truth(csv, columns, &rows)
}

/// Run the whole sampler: build the splits, write them and the manifest.
pub fn run(config: &SamplerConfig) -> Result<Metadata> {
    config.validate()?;

    let seed = config.seed.unwrap_or_else(rand::random::<u64>);
    let mut rng = StdRng::seed_from_u64(seed);
    info!(seed, output = %config.output_dir.display(), "sampling dataset");

    let data = process(config, &mut rng)?;

    let layout = OutputLayout::new(&config.output_dir, &config.dataset_prefix);
    fs::create_dir_all(layout.root())?;

    save(&data.train, &layout.train_images(), &layout.train_csv(), &data.columns)?;
    save(
        &data.validation,
        &layout.validation_images(),
        &layout.validation_csv(),
        &data.columns,
    )?;

    if config.unknown_images.is_some() {
        save(&data.test, &layout.test_images(), &layout.test_csv_unknown(), &data.columns)?;
        save_no_unknown(&data.test, &layout.test_csv(), &data.columns, data.unknown_index)?;
    } else {
        save(&data.test, &layout.test_images(), &layout.test_csv(), &data.columns)?;
    }

    let metadata = Metadata::from_run(config, &data, seed);
    metadata.write(&layout.metadata())?;
    info!(
        train = metadata.training_samples,
        validation = metadata.validation_samples,
        test = metadata.test_samples,
        "wrote dataset"
    );
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn loaded(name: &str, category: usize, width: usize) -> LoadedSample {
        LoadedSample {
            sample: Sample::one_hot(name, format!("/src/{name}.jpg"), category, width),
            image: RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])),
        }
    }

    fn columns() -> Vec<String> {
        ["MEL", "NV", "UNK"].iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_layout_names() {
        let layout = OutputLayout::new("/out", "ISIC_2019");
        assert_eq!(layout.train_images(), PathBuf::from("/out/ISIC_2019_Training_Input"));
        assert_eq!(
            layout.validation_csv(),
            PathBuf::from("/out/ISIC_2019_Validation_GroundTruth.csv")
        );
        assert_eq!(
            layout.test_csv_unknown(),
            PathBuf::from("/out/ISIC_2019_Test_GroundTruth_Unknown.csv")
        );
        assert_eq!(layout.metadata(), PathBuf::from("/out/metadata.json"));
    }

    #[test]
    fn test_save_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("imgs");
        let csv = dir.path().join("gt.csv");
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join("stale.jpg"), b"old").unwrap();

        let split = vec![loaded("a", 0, 3), loaded("b", 1, 3)];
        save(&split, &images, &csv, &columns()).unwrap();

        assert!(!images.join("stale.jpg").exists());
        assert!(images.join("a.jpg").exists());
        assert!(images.join("b.jpg").exists());

        let content = fs::read_to_string(&csv).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "image,MEL,NV,UNK");
        assert_eq!(lines[1], "a,1.0,0.0,0.0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_save_no_unknown_filters_rows() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("test.csv");
        let test = vec![loaded("a", 0, 3), loaded("ood", 2, 3), loaded("b", 1, 3)];
        save_no_unknown(&test, &csv, &columns(), Some(2)).unwrap();

        let content = fs::read_to_string(&csv).unwrap();
        assert!(!content.contains("ood"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let metadata = Metadata {
            path: "/out".into(),
            target_size: 224,
            training_samples: 10,
            class_balance: true,
            min_samples: None,
            images_location: "/in".into(),
            descriptions_location: "/in/gt.csv".into(),
            unknown_images_location: None,
            unknown_train: false,
            data_augmentation_group: 2,
            seed: 7,
            validation_samples: 2,
            test_samples: 3,
            class_counts: [("MEL".to_string(), 5), ("NV".to_string(), 5)].into_iter().collect(),
            created_at: Utc::now(),
        };
        metadata.write(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["data_augmentation_group"], 2);
        assert_eq!(json["unknown_images_location"], serde_json::Value::Null);
        assert_eq!(Metadata::read(&path).unwrap(), metadata);
    }
}
