//! Randomized image augmentation for oversampling.
//!
//! An augmentation group is an ordered list of [`AugmentOp`]s. Each op fires
//! independently with its own probability; the uniform draw is rounded to
//! one decimal before the comparison, so an op with probability `p` fires
//! for draws in `{0.0, 0.1, ..., p}`.

use std::collections::HashSet;

use image::imageops;
use image::{Rgb, RgbImage};
use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::Sample;
use crate::error::{Error, Result};
use crate::sampler::LoadedSample;
use crate::sampler::image_io::{crop_center, load_image, resize};

/// Exclusive upper bound of the numeric suffix given to augmented copies.
pub const NAME_SUFFIX_RANGE: u32 = 1_000_000;

/// Random suffixes tried before scanning for the lowest free one.
const RANDOM_NAME_ATTEMPTS: usize = 16;

/// A single image transformation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Mirror horizontally.
    FlipLeftRight,
    /// Mirror vertically.
    FlipTopBottom,
    /// Rotate by a random multiple of 90 degrees.
    Rotate90,
    /// Rotate by a random angle, cropping away the empty corners.
    RotateRange {
        /// Largest counter-clockwise angle in degrees.
        max_left: f32,
        /// Largest clockwise angle in degrees.
        max_right: f32,
    },
    /// Crop a random central region and scale it back up.
    ZoomRandom {
        /// Smallest zoom factor (>= 1.0).
        min_factor: f32,
        /// Largest zoom factor.
        max_factor: f32,
    },
    /// Multiply intensities by a random factor.
    Brightness {
        /// Smallest factor.
        min: f32,
        /// Largest factor.
        max: f32,
    },
    /// Scale distance from the mean luminance by a random factor.
    Contrast {
        /// Smallest factor.
        min: f32,
        /// Largest factor.
        max: f32,
    },
    /// Rotate hue by up to `max_degrees` either way.
    HueShift {
        /// Largest hue rotation in degrees.
        max_degrees: i32,
    },
    /// Gaussian blur with a random sigma in `(0, max_sigma]`.
    GaussianBlur {
        /// Largest sigma.
        max_sigma: f32,
    },
    /// Centre-crop and resize to a square.
    Resize {
        /// Output side in pixels.
        size: u32,
    },
}

/// An operation with the probability that it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AugmentOp {
    /// The transformation.
    pub operation: Operation,
    /// Probability in `[0, 1]`.
    pub probability: f64,
}

impl AugmentOp {
    /// Create an op.
    #[must_use]
    pub fn new(operation: Operation, probability: f64) -> Self {
        Self {
            operation,
            probability,
        }
    }

    /// Draw whether the op fires.
    pub fn fires<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        let draw = (rng.random::<f64>() * 10.0).round() / 10.0;
        draw <= self.probability
    }

    /// Apply the transformation unconditionally.
    pub fn perform<R: Rng + ?Sized>(&self, img: &RgbImage, rng: &mut R) -> RgbImage {
        match self.operation {
            Operation::FlipLeftRight => imageops::flip_horizontal(img),
            Operation::FlipTopBottom => imageops::flip_vertical(img),
            Operation::Rotate90 => match rng.random_range(0..3) {
                0 => imageops::rotate90(img),
                1 => imageops::rotate180(img),
                _ => imageops::rotate270(img),
            },
            Operation::RotateRange {
                max_left,
                max_right,
            } => {
                let angle = uniform(rng, -max_left, max_right);
                rotate_and_crop(img, angle.to_radians())
            }
            Operation::ZoomRandom {
                min_factor,
                max_factor,
            } => {
                let factor = uniform(rng, min_factor.max(1.0), max_factor.max(1.0));
                zoom(img, factor)
            }
            Operation::Brightness { min, max } => {
                let factor = uniform(rng, min, max);
                map_pixels(img, |c| c * factor)
            }
            Operation::Contrast { min, max } => {
                let factor = uniform(rng, min, max);
                let mean = mean_luminance(img);
                map_pixels(img, |c| (c - mean) * factor + mean)
            }
            Operation::HueShift { max_degrees } => {
                let degrees = if max_degrees > 0 {
                    rng.random_range(-max_degrees..=max_degrees)
                } else {
                    0
                };
                imageops::huerotate(img, degrees)
            }
            Operation::GaussianBlur { max_sigma } => {
                let sigma = uniform(rng, 0.1, max_sigma.max(0.1));
                imageops::blur(img, sigma)
            }
            Operation::Resize { size } => resize(&crop_center(img), size),
        }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f32, high: f32) -> f32 {
    if high <= low {
        low
    } else {
        rng.random_range(low..=high)
    }
}

fn map_pixels(img: &RgbImage, f: impl Fn(f32) -> f32) -> RgbImage {
    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        for channel in &mut pixel.0 {
            *channel = f(f32::from(*channel)).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn mean_luminance(img: &RgbImage) -> f32 {
    let count = img.width() as usize * img.height() as usize;
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = img
        .pixels()
        .map(|p| 0.299 * f64::from(p[0]) + 0.587 * f64::from(p[1]) + 0.114 * f64::from(p[2]))
        .sum();
    (sum / count as f64) as f32
}

/// Central crop by `factor`, then resize back to the input dimensions.
fn zoom(img: &RgbImage, factor: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    let crop_w = ((width as f32 / factor).round() as u32).clamp(1, width.max(1));
    let crop_h = ((height as f32 / factor).round() as u32).clamp(1, height.max(1));
    if (crop_w, crop_h) == (width, height) {
        return img.clone();
    }
    let left = (width - crop_w) / 2;
    let top = (height - crop_h) / 2;
    let cropped = imageops::crop_imm(img, left, top, crop_w, crop_h).to_image();
    imageops::resize(&cropped, width, height, imageops::FilterType::CatmullRom)
}

/// Rotate about the centre with bilinear sampling, then zoom so that no
/// empty corner remains in frame.
fn rotate_and_crop(img: &RgbImage, radians: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || radians == 0.0 {
        return img.clone();
    }

    let (sin, cos) = radians.sin_cos();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    let mut rotated = RgbImage::new(width, height);
    for (x, y, out) in rotated.enumerate_pixels_mut() {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = cos * dx + sin * dy + cx;
        let sy = -sin * dx + cos * dy + cy;
        *out = bilinear(img, sx, sy);
    }

    zoom(&rotated, sin.abs() + cos.abs())
}

fn bilinear(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
        return Rgb([0, 0, 0]);
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = f32::from(p00[c]) * (1.0 - fx) + f32::from(p10[c]) * fx;
        let bottom = f32::from(p01[c]) * (1.0 - fx) + f32::from(p11[c]) * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Build an augmentation group.
///
/// - 1: geometric (flips, 90-degree and free rotation, zoom)
/// - 2: group 1 plus brightness and contrast
/// - 3: group 2 plus hue shift and blur
///
/// Every group ends with a centre-crop resize to `img_size`.
pub fn augmentation_group(group: u8, img_size: u32) -> Result<Vec<AugmentOp>> {
    let geometric = [
        AugmentOp::new(Operation::FlipLeftRight, 0.5),
        AugmentOp::new(Operation::FlipTopBottom, 0.5),
        AugmentOp::new(Operation::Rotate90, 0.5),
        AugmentOp::new(
            Operation::RotateRange {
                max_left: 25.0,
                max_right: 25.0,
            },
            0.5,
        ),
        AugmentOp::new(
            Operation::ZoomRandom {
                min_factor: 1.0,
                max_factor: 1.2,
            },
            0.5,
        ),
    ];
    let photometric = [
        AugmentOp::new(Operation::Brightness { min: 0.8, max: 1.2 }, 0.5),
        AugmentOp::new(Operation::Contrast { min: 0.8, max: 1.2 }, 0.5),
    ];
    let color = [
        AugmentOp::new(Operation::HueShift { max_degrees: 10 }, 0.3),
        AugmentOp::new(Operation::GaussianBlur { max_sigma: 1.0 }, 0.2),
    ];

    let mut ops: Vec<AugmentOp> = match group {
        1 => geometric.to_vec(),
        2 => geometric.iter().chain(&photometric).copied().collect(),
        3 => geometric
            .iter()
            .chain(&photometric)
            .chain(&color)
            .copied()
            .collect(),
        other => {
            return Err(Error::Augmentation(format!(
                "unknown augmentation group {other} (expected 1-3)"
            )));
        }
    };
    ops.push(AugmentOp::new(Operation::Resize { size: img_size }, 1.0));
    Ok(ops)
}

/// Run an image through every op that fires.
pub fn apply_ops<R: Rng + ?Sized>(img: RgbImage, ops: &[AugmentOp], rng: &mut R) -> RgbImage {
    let mut current = img;
    for op in ops {
        if op.fires(rng) {
            current = op.perform(&current, rng);
        }
    }
    current
}

struct Draw {
    source: usize,
    name: String,
    seed: u64,
}

/// Pick an unused `{image}_{n}` name and reserve it in `taken`.
///
/// A few random suffixes are tried first; after that suffixes are scanned
/// upwards from `cursor`, which only moves forward.
fn free_name<R: Rng + ?Sized>(
    image: &str,
    taken: &mut HashSet<String>,
    cursor: &mut u32,
    rng: &mut R,
) -> Result<String> {
    for _ in 0..RANDOM_NAME_ATTEMPTS {
        let candidate = format!("{image}_{}", rng.random_range(0..NAME_SUFFIX_RANGE));
        if taken.insert(candidate.clone()) {
            return Ok(candidate);
        }
    }
    while *cursor < NAME_SUFFIX_RANGE {
        let candidate = format!("{image}_{cursor}");
        *cursor += 1;
        if taken.insert(candidate.clone()) {
            return Ok(candidate);
        }
    }
    Err(Error::Augmentation(format!("no free augmented name left for {image}")))
}

/// Grow `samples` to approximately `target` rows with augmented copies.
///
/// Originals are loaded centre-cropped and resized to `img_size`. The
/// missing `target - samples.len()` rows are drawn with replacement; each
/// draw is reloaded uncropped, passed through `ops` and renamed
/// `{image}_{n}` with a numeric suffix below [`NAME_SUFFIX_RANGE`] that is
/// not yet in `taken`. Every name handed out is added to `taken`. Returns
/// originals followed by the augmented copies.
///
/// Fails with [`Error::Augmentation`] when a source image would need more
/// copies than there are free suffixes.
pub fn augment<R: Rng + ?Sized>(
    samples: &[Sample],
    ops: &[AugmentOp],
    target: usize,
    img_size: u32,
    taken: &mut HashSet<String>,
    rng: &mut R,
    progress: &ProgressBar,
) -> Result<Vec<LoadedSample>> {
    let missing = target.saturating_sub(samples.len());
    let sources: Vec<usize> = if samples.is_empty() {
        Vec::new()
    } else {
        (0..missing).map(|_| rng.random_range(0..samples.len())).collect()
    };

    let mut copies = vec![0usize; samples.len()];
    for &source in &sources {
        copies[source] += 1;
    }
    if let Some((source, &n)) = copies
        .iter()
        .enumerate()
        .find(|(_, n)| **n > NAME_SUFFIX_RANGE as usize)
    {
        return Err(Error::Augmentation(format!(
            "{} needs {n} augmented copies but only {NAME_SUFFIX_RANGE} names are available",
            samples[source].image
        )));
    }

    let mut out: Vec<LoadedSample> = samples
        .par_iter()
        .map(|s| LoadedSample::load(s.clone(), img_size))
        .collect::<Result<_>>()?;
    if sources.is_empty() {
        return Ok(out);
    }

    taken.extend(samples.iter().map(|s| s.image.clone()));
    let mut cursors = vec![0u32; samples.len()];
    let draws: Vec<Draw> = sources
        .into_iter()
        .map(|source| {
            let name = free_name(&samples[source].image, taken, &mut cursors[source], rng)?;
            Ok(Draw {
                source,
                name,
                seed: rng.random(),
            })
        })
        .collect::<Result<_>>()?;

    progress.set_length(draws.len() as u64);
    progress.set_message("Executing Pipeline");

    let augmented: Vec<LoadedSample> = draws
        .par_iter()
        .map(|draw| {
            let source = &samples[draw.source];
            let mut local = StdRng::seed_from_u64(draw.seed);
            let img = load_image(&source.path, None, false)?;
            let img = apply_ops(img, ops, &mut local);

            let mut sample = source.clone();
            sample.image.clone_from(&draw.name);
            progress.inc(1);
            tracing::trace!(image = %sample.image, "augmented");
            Ok(LoadedSample { sample, image: img })
        })
        .collect::<Result<_>>()?;

    progress.finish_and_clear();
    out.extend(augmented);
    Ok(out)
}
