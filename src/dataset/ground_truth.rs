//! Ground truth tables: `image` column followed by one-hot label columns.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::{LesionCategory, Sample, out_of_distribution_samples};
use crate::error::{Error, Result};

const IMAGE_COLUMN: &str = "image";

/// A labelled image table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Label column names, in file order.
    pub columns: Vec<String>,

    /// Name of the out-of-distribution column, if the table has one.
    pub unknown_column: Option<String>,

    /// One row per image.
    pub samples: Vec<Sample>,
}

impl GroundTruth {
    /// Load a ground truth CSV.
    ///
    /// Each sample's path is `images_dir/{image}.jpg`. When `unknown_column`
    /// names a column the table lacks, the column is appended with 0.0 for
    /// every row so that out-of-distribution samples can still be labelled.
    pub fn load(
        csv_path: impl AsRef<Path>,
        images_dir: impl AsRef<Path>,
        unknown_column: Option<&str>,
    ) -> Result<Self> {
        let csv_path = csv_path.as_ref();
        let images_dir = images_dir.as_ref();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(csv_path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let image_idx = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(IMAGE_COLUMN))
            .ok_or_else(|| Error::MissingColumn {
                path: csv_path.to_path_buf(),
                column: IMAGE_COLUMN.to_string(),
            })?;

        let mut columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != image_idx)
            .map(|(_, h)| h.clone())
            .collect();

        if columns.is_empty() {
            return Err(Error::GroundTruth {
                line: 1,
                reason: "no label columns".to_string(),
            });
        }

        for column in &columns {
            if LesionCategory::from_str_loose(column).is_none() {
                tracing::debug!(column = %column, "label column is not an ISIC category");
            }
        }

        let mut samples = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let line = record.position().map_or(row + 2, |p| p.line() as usize);

            let image = record.get(image_idx).unwrap_or("").to_string();
            if image.is_empty() {
                return Err(Error::GroundTruth {
                    line,
                    reason: "empty image name".to_string(),
                });
            }

            let mut labels = Vec::with_capacity(columns.len());
            for (i, field) in record.iter().enumerate() {
                if i == image_idx {
                    continue;
                }
                let value: f64 = field.parse().map_err(|_| Error::GroundTruth {
                    line,
                    reason: format!("invalid label value '{field}' for image {image}"),
                })?;
                labels.push(value);
            }

            let path = image_path(images_dir, &image);
            samples.push(Sample::labelled(image, path, labels));
        }

        let unknown_column = match unknown_column {
            Some(name) if !columns.iter().any(|c| c == name) => {
                columns.push(name.to_string());
                for sample in &mut samples {
                    sample.labels.push(0.0);
                }
                Some(name.to_string())
            }
            Some(name) => Some(name.to_string()),
            None => None,
        };

        tracing::info!(
            path = %csv_path.display(),
            rows = samples.len(),
            columns = columns.len(),
            "loaded ground truth"
        );

        Ok(Self {
            columns,
            unknown_column,
            samples,
        })
    }

    /// Names of the known (in-distribution) categories.
    #[must_use]
    pub fn category_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| Some(c.as_str()) != self.unknown_column.as_deref())
            .map(String::as_str)
            .collect()
    }

    /// Column index of the unknown category.
    #[must_use]
    pub fn unknown_index(&self) -> Option<usize> {
        let name = self.unknown_column.as_deref()?;
        self.columns.iter().position(|c| c == name)
    }

    /// ISIC category for a column index, when the column name is recognized.
    #[must_use]
    pub fn lesion_category(&self, index: usize) -> Option<LesionCategory> {
        self.columns
            .get(index)
            .and_then(|c| LesionCategory::from_str_loose(c))
    }

    /// Display name for a category index.
    #[must_use]
    pub fn column_name(&self, index: usize) -> String {
        self.columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }

    /// Add every image in `dir` as an unknown-labelled sample.
    pub fn with_out_of_distribution(mut self, dir: &Path) -> Result<Self> {
        let unknown_index = self.unknown_index().ok_or_else(|| {
            Error::Dataset("ground truth has no unknown column for out-of-distribution images".into())
        })?;
        let extra = out_of_distribution_samples(dir, self.columns.len(), unknown_index)?;
        tracing::info!(dir = %dir.display(), count = extra.len(), "added out-of-distribution samples");
        self.samples.extend(extra);
        Ok(self)
    }

    /// Look up the category of an image by name.
    #[must_use]
    pub fn category_of(&self, image: &str) -> Option<usize> {
        self.samples
            .iter()
            .find(|s| s.image == image)
            .and_then(|s| s.category)
    }
}

/// Write a ground truth CSV: `image` followed by the label columns.
///
/// Unlabeled rows are written with every label at 0.0.
pub fn write_ground_truth(path: &Path, columns: &[String], samples: &[Sample]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push(IMAGE_COLUMN.to_string());
    header.extend(columns.iter().cloned());
    writer.write_record(&header)?;

    for sample in samples {
        let mut record = Vec::with_capacity(columns.len() + 1);
        record.push(sample.image.clone());
        for i in 0..columns.len() {
            record.push(format_label(sample.labels.get(i).copied().unwrap_or(0.0)));
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn format_label(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn image_path(images_dir: &Path, image: &str) -> PathBuf {
    images_dir.join(format!("{image}.jpg"))
}
