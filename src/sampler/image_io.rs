//! Image loading and saving for the sampler.
//!
//! Source images are decoded to RGB, optionally centre-cropped to a square
//! and resized with a bicubic (Catmull-Rom) filter. Output images are always
//! written as JPEG.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};

use crate::error::{Error, Result};

/// Decode an image from disk.
///
/// # Arguments
///
/// * `path` - Image file to decode.
/// * `target_size` - Square output side, or `None` to keep the decoded size.
/// * `center_crop` - Crop the largest centred square before resizing.
pub fn load_image(path: &Path, target_size: Option<u32>, center_crop: bool) -> Result<RgbImage> {
    let decoded = image::open(path).map_err(|e| Error::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut img = decoded.to_rgb8();
    if center_crop {
        img = crop_center(&img);
    }
    if let Some(size) = target_size {
        img = resize(&img, size);
    }
    Ok(img)
}

/// Crop the largest square centred in the image.
#[must_use]
pub fn crop_center(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    let side = width.min(height);
    let left = (width - side) / 2;
    let top = (height - side) / 2;
    imageops::crop_imm(img, left, top, side, side).to_image()
}

/// Resize to a `size` x `size` square.
#[must_use]
pub fn resize(img: &RgbImage, size: u32) -> RgbImage {
    if img.dimensions() == (size, size) {
        return img.clone();
    }
    imageops::resize(img, size, size, FilterType::CatmullRom)
}

/// Write an image as JPEG.
pub fn save_jpeg(img: &RgbImage, path: &Path) -> Result<()> {
    img.save_with_format(path, ImageFormat::Jpeg)
        .map_err(|e| Error::ImageSave {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
