//! Labelled image datasets.
//!
//! This module provides the in-memory table the sampler works on: one
//! [`Sample`] per image, with its one-hot label vector and derived category
//! index, plus discovery of unlabeled image folders and stratified splits.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lesion_balance::dataset::{GroundTruth, stratified_split};
//!
//! let gt = GroundTruth::load("ISIC_2019_Training_GroundTruth.csv", "./images", Some("UNK"))?;
//! let (train, test) = stratified_split(gt.samples, 0.1, &mut rng);
//! ```

mod category;
mod discovery;
mod ground_truth;
mod split;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use category::LesionCategory;
pub use discovery::{SUPPORTED_EXTENSIONS, discover_images, out_of_distribution_samples};
pub use ground_truth::{GroundTruth, write_ground_truth};
pub use split::stratified_split;

/// One image row of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Image identifier (file stem, without extension).
    pub image: String,

    /// Location of the source image.
    pub path: PathBuf,

    /// One-hot label vector over all label columns. Empty for unlabeled rows.
    #[serde(default)]
    pub labels: Vec<f64>,

    /// Index of the label column holding the maximum value.
    pub category: Option<usize>,
}

impl Sample {
    /// Create an unlabeled sample.
    #[must_use]
    pub fn unlabeled(image: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            path: path.into(),
            labels: Vec::new(),
            category: None,
        }
    }

    /// Create a sample from a label vector; the category is its argmax.
    #[must_use]
    pub fn labelled(image: impl Into<String>, path: impl Into<PathBuf>, labels: Vec<f64>) -> Self {
        let category = argmax(&labels);
        Self {
            image: image.into(),
            path: path.into(),
            labels,
            category,
        }
    }

    /// Create a sample whose one-hot vector marks only `category`.
    #[must_use]
    pub fn one_hot(
        image: impl Into<String>,
        path: impl Into<PathBuf>,
        category: usize,
        width: usize,
    ) -> Self {
        let mut labels = vec![0.0; width];
        if let Some(slot) = labels.get_mut(category) {
            *slot = 1.0;
        }
        Self {
            image: image.into(),
            path: path.into(),
            labels,
            category: Some(category),
        }
    }

    /// Get the source file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(|s| s.to_str()).unwrap_or("")
    }
}

/// Index of the largest value; ties resolve to the first column.
fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Count labelled samples per category. Categories with no samples are absent.
#[must_use]
pub fn count_per_category(samples: &[Sample]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for sample in samples {
        if let Some(cat) = sample.category {
            *counts.entry(cat).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_argmax() {
        let s = Sample::labelled("ISIC_0000000", "/tmp/ISIC_0000000.jpg", vec![0.0, 1.0, 0.0]);
        assert_eq!(s.category, Some(1));
        assert_eq!(s.file_name(), "ISIC_0000000.jpg");
    }

    #[test]
    fn test_argmax_ties_and_empty() {
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_one_hot() {
        let s = Sample::one_hot("x", "/tmp/x.jpg", 2, 4);
        assert_eq!(s.labels, vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(s.category, Some(2));
    }

    #[test]
    fn test_count_per_category_skips_unlabeled() {
        let samples = vec![
            Sample::one_hot("a", "a.jpg", 0, 3),
            Sample::one_hot("b", "b.jpg", 0, 3),
            Sample::one_hot("c", "c.jpg", 2, 3),
            Sample::unlabeled("d", "d.jpg"),
        ];
        let counts = count_per_category(&samples);
        assert_eq!(counts.get(&0), Some(&2));
        assert_eq!(counts.get(&1), None);
        assert_eq!(counts.get(&2), Some(&1));
    }
}
