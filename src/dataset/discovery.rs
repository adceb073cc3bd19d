//! Image discovery in directories.

use std::fs;
use std::path::{Path, PathBuf};

use crate::dataset::Sample;
use crate::error::{Error, Result};

/// Supported image extensions.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// List the images directly inside `path` as unlabeled samples.
///
/// Samples are named after the file stem and sorted by name so that
/// downstream shuffles depend only on the RNG seed.
pub fn discover_images(path: &Path) -> Result<Vec<Sample>> {
    if !path.exists() {
        return Err(Error::Dataset(format!("Path does not exist: {}", path.display())));
    }

    if !path.is_dir() {
        return Err(Error::Dataset(format!("Path is not a directory: {}", path.display())));
    }

    let entries = fs::read_dir(path).map_err(|e| {
        Error::Dataset(format!("Failed to read directory {}: {}", path.display(), e))
    })?;

    let mut samples = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::Dataset(format!("Failed to read entry in {}: {}", path.display(), e))
        })?;

        let file = entry.path();
        if !file.is_file() {
            continue;
        }
        if let Some(sample) = try_image_sample(file) {
            samples.push(sample);
        }
    }

    samples.sort_by(|a, b| a.image.cmp(&b.image));
    tracing::debug!(dir = %path.display(), count = samples.len(), "discovered images");
    Ok(samples)
}

fn try_image_sample(path: PathBuf) -> Option<Sample> {
    let name = path.file_name()?.to_str()?;
    // Skip hidden files
    if name.starts_with('.') {
        return None;
    }

    let extension = path.extension()?.to_str()?.to_lowercase();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }

    let stem = path.file_stem()?.to_str()?.to_string();
    Some(Sample::unlabeled(stem, path))
}

/// Discover out-of-distribution images and label them as the unknown column.
///
/// Every known column is 0.0 and the unknown column is 1.0.
pub fn out_of_distribution_samples(
    path: &Path,
    column_count: usize,
    unknown_index: usize,
) -> Result<Vec<Sample>> {
    if unknown_index >= column_count {
        return Err(Error::Dataset(format!(
            "Unknown column index {unknown_index} outside of {column_count} label columns"
        )));
    }

    Ok(discover_images(path)?
        .into_iter()
        .map(|s| Sample::one_hot(s.image, s.path, unknown_index, column_count))
        .collect())
}
