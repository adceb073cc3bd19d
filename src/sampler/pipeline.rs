//! The resampling pipeline: split, allocate, oversample/undersample, load.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use rayon::prelude::*;
use tracing::info;

use crate::dataset::{
    GroundTruth, Sample, count_per_category, discover_images, out_of_distribution_samples,
    stratified_split,
};
use crate::error::{Error, Result};
use crate::sampler::{
    LoadedSample, SamplerConfig, allocate, augment, augmentation_group, progress_bar,
};

/// The three splits produced by [`process`], with images decoded.
#[derive(Debug, Clone)]
pub struct SampledDataset {
    /// Label column names shared by all splits.
    pub columns: Vec<String>,
    /// Column index of the out-of-distribution category.
    pub unknown_index: Option<usize>,
    /// Rebalanced training split.
    pub train: Vec<LoadedSample>,
    /// Validation split.
    pub validation: Vec<LoadedSample>,
    /// Test split, including out-of-distribution rows when requested.
    pub test: Vec<LoadedSample>,
    /// Per-class counts of the training split before resampling.
    pub source_counts: BTreeMap<usize, usize>,
    /// Per-class targets the training split was resampled to.
    pub target_counts: BTreeMap<usize, usize>,
}

/// Resample every class of `train` to its target count.
///
/// Classes above target are undersampled without replacement, classes below
/// target are grown with augmented copies, the rest are kept as is. Copy
/// names never repeat a name from any class of `train`. The combined result
/// is shuffled.
pub fn sample<R: Rng + ?Sized>(
    train: &[Sample],
    targets: &BTreeMap<usize, usize>,
    augmentation: u8,
    img_size: u32,
    rng: &mut R,
    show_progress: bool,
) -> Result<Vec<LoadedSample>> {
    let mut result = Vec::with_capacity(targets.values().sum());
    let mut taken: HashSet<String> = train.iter().map(|s| s.image.clone()).collect();

    for (&category, &target) in targets {
        let category_samples: Vec<Sample> = train
            .iter()
            .filter(|s| s.category == Some(category))
            .cloned()
            .collect();
        let available = category_samples.len();

        let samples = if target > available {
            info!(
                "Augmenting {} samples from class {} into approximately {} samples...",
                available, category, target
            );
            let ops = augmentation_group(augmentation, img_size)?;
            let pb = progress_bar(0, "Executing Pipeline", show_progress);
            augment(&category_samples, &ops, target, img_size, &mut taken, rng, &pb)?
        } else if target < available {
            info!(
                "Undersampling {} samples from class {} into approximately {} samples...",
                available, category, target
            );
            let kept: Vec<Sample> = category_samples
                .choose_multiple(rng, target)
                .cloned()
                .collect();
            load_all(kept, img_size, show_progress)?
        } else {
            info!(
                "Keeping original {} samples from class {} ...",
                available, category
            );
            load_all(category_samples, img_size, show_progress)?
        };

        result.extend(samples);
    }

    result.shuffle(rng);
    Ok(result)
}

fn load_all(samples: Vec<Sample>, img_size: u32, show_progress: bool) -> Result<Vec<LoadedSample>> {
    let pb = progress_bar(samples.len() as u64, "Loading", show_progress);
    let loaded = samples
        .into_par_iter()
        .map(|s| {
            let loaded = LoadedSample::load(s, img_size);
            pb.inc(1);
            loaded
        })
        .collect::<Result<Vec<_>>>()?;
    pb.finish_and_clear();
    Ok(loaded)
}

fn load_shuffled<R: Rng + ?Sized>(
    mut samples: Vec<Sample>,
    img_size: u32,
    rng: &mut R,
    show_progress: bool,
) -> Result<Vec<LoadedSample>> {
    samples.shuffle(rng);
    load_all(samples, img_size, show_progress)
}

/// Build the train, validation and test splits described by `config`.
///
/// Without a test directory the test split (`test_fraction`) and then the
/// validation split (`validation_fraction` of the remainder) are carved out
/// of the ground truth with stratified sampling. With a test directory the
/// whole ground truth minus the validation split is used for training and
/// the directory's images, unlabeled, form the test split.
///
/// Out-of-distribution images join the training pool when
/// `config.unknown_train` is set and the test split otherwise.
pub fn process<R: Rng + ?Sized>(config: &SamplerConfig, rng: &mut R) -> Result<SampledDataset> {
    // The unknown column is only added when out-of-distribution images exist.
    let unknown_column = config
        .unknown_images
        .as_ref()
        .map(|_| config.unknown_column.as_str());
    let mut ground_truth =
        GroundTruth::load(&config.descriptions, &config.images_dir, unknown_column)?;

    if config.unknown_train {
        if let Some(dir) = &config.unknown_images {
            ground_truth = ground_truth.with_out_of_distribution(dir)?;
        }
    }

    let columns = ground_truth.columns.clone();
    let unknown_index = ground_truth.unknown_index();

    let (train, validation, mut test) = match &config.test_dir {
        None => {
            let (rest, test) = stratified_split(ground_truth.samples, config.test_fraction, rng);
            let (train, validation) = stratified_split(rest, config.validation_fraction, rng);
            (train, validation, test)
        }
        Some(dir) => {
            let (train, validation) =
                stratified_split(ground_truth.samples, config.validation_fraction, rng);
            (train, validation, discover_images(dir)?)
        }
    };

    if !config.unknown_train {
        if let Some(dir) = &config.unknown_images {
            let index = unknown_index.ok_or_else(|| {
                Error::Dataset(format!("no '{}' column for unknown images", config.unknown_column))
            })?;
            let ood = out_of_distribution_samples(dir, columns.len(), index)?;
            info!(count = ood.len(), "adding out-of-distribution samples to the test split");
            test.extend(ood);
        }
    }

    let source_counts = count_per_category(&train);
    let target_counts = allocate(&source_counts, config.policy())?;
    info!(
        "Turning {} samples into {} samples...",
        source_counts.values().sum::<usize>(),
        target_counts.values().sum::<usize>()
    );

    let train = sample(
        &train,
        &target_counts,
        config.augmentation_group,
        config.target_size,
        rng,
        config.show_progress,
    )?;
    let test = load_shuffled(test, config.target_size, rng, config.show_progress)?;
    let validation = load_shuffled(validation, config.target_size, rng, config.show_progress)?;

    Ok(SampledDataset {
        columns,
        unknown_index,
        train,
        validation,
        test,
        source_counts,
        target_counts,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use image::{Rgb, RgbImage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn write_images(dir: &Path, names: &[String]) {
        for (i, name) in names.iter().enumerate() {
            RgbImage::from_pixel(12, 16, Rgb([i as u8, 0, 0]))
                .save(dir.join(format!("{name}.jpg")))
                .unwrap();
        }
    }

    fn train_rows(dir: &Path, per_class: &[usize]) -> Vec<Sample> {
        let mut rows = Vec::new();
        let mut names = Vec::new();
        for (cat, &n) in per_class.iter().enumerate() {
            for i in 0..n {
                let name = format!("c{cat}_{i}");
                rows.push(Sample::one_hot(name.clone(), dir.join(format!("{name}.jpg")), cat, per_class.len()));
                names.push(name);
            }
        }
        write_images(dir, &names);
        rows
    }

    #[test]
    fn test_sample_over_and_under() {
        let dir = tempfile::tempdir().unwrap();
        let rows = train_rows(dir.path(), &[6, 2, 3]);
        let targets: BTreeMap<usize, usize> = [(0, 3), (1, 5), (2, 3)].into_iter().collect();

        let mut rng = StdRng::seed_from_u64(9);
        let out = sample(&rows, &targets, 1, 8, &mut rng, false).unwrap();

        let counts = count_per_category(&out.iter().map(|l| l.sample.clone()).collect::<Vec<_>>());
        assert_eq!(counts, targets);
        assert!(out.iter().all(|l| l.image.dimensions() == (8, 8)));

        let names: HashSet<_> = out.iter().map(|l| l.sample.image.as_str()).collect();
        assert_eq!(names.len(), out.len());
    }

    #[test]
    fn test_process_builds_three_splits() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();

        let mut csv = String::from("image,A,B,UNK\n");
        let mut names = Vec::new();
        for i in 0..40 {
            let name = format!("img_{i:03}");
            let row = if i % 4 == 0 { "0.0,1.0,0.0" } else { "1.0,0.0,0.0" };
            csv.push_str(&format!("{name},{row}\n"));
            names.push(name);
        }
        write_images(&images, &names);
        let gt = dir.path().join("gt.csv");
        std::fs::write(&gt, csv).unwrap();

        let ood = dir.path().join("ood");
        std::fs::create_dir(&ood).unwrap();
        write_images(&ood, &["ood_a".to_string(), "ood_b".to_string()]);

        let config = SamplerConfig::builder()
            .images_dir(&images)
            .descriptions(&gt)
            .output_dir(dir.path().join("out"))
            .unknown_images(Some(ood))
            .target_size(8)
            .class_balance(true)
            .build()
            .unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        let data = process(&config, &mut rng).unwrap();

        assert_eq!(data.columns, vec!["A", "B", "UNK"]);
        assert_eq!(data.unknown_index, Some(2));
        // 40 rows: test 4 (A 3, B 1), validation 4 (A 3, B 1), train 32 (A 24, B 8)
        assert_eq!(data.source_counts.values().sum::<usize>(), 32);
        assert_eq!(data.target_counts, [(0, 16), (1, 16)].into_iter().collect());
        assert_eq!(data.train.len(), 32);
        assert_eq!(data.validation.len(), 4);
        assert_eq!(data.test.len(), 6);
        assert_eq!(
            data.test.iter().filter(|l| l.sample.category == Some(2)).count(),
            2
        );
    }

    #[test]
    fn test_process_trains_on_unknown_images() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();

        let mut csv = String::from("image,A,B\n");
        let mut names = Vec::new();
        for i in 0..20 {
            let name = format!("img_{i:03}");
            let row = if i % 2 == 0 { "1.0,0.0" } else { "0.0,1.0" };
            csv.push_str(&format!("{name},{row}\n"));
            names.push(name);
        }
        write_images(&images, &names);
        let gt = dir.path().join("gt.csv");
        std::fs::write(&gt, csv).unwrap();

        let ood = dir.path().join("ood");
        std::fs::create_dir(&ood).unwrap();
        let ood_names: Vec<String> = (0..10).map(|i| format!("ood_{i}")).collect();
        write_images(&ood, &ood_names);

        let config = SamplerConfig::builder()
            .images_dir(&images)
            .descriptions(&gt)
            .output_dir(dir.path().join("out"))
            .unknown_images(Some(ood))
            .unknown_train(true)
            .target_size(8)
            .build()
            .unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let data = process(&config, &mut rng).unwrap();

        assert_eq!(data.columns, vec!["A", "B", "UNK"]);
        assert_eq!(data.unknown_index, Some(2));
        // Per class of 10 (A, B) or 10 (UNK): test 1, validation 1, train 8.
        assert_eq!(
            data.source_counts,
            [(0, 8), (1, 8), (2, 8)].into_iter().collect()
        );
        assert_eq!(data.target_counts, data.source_counts);

        let unknown_train: Vec<_> = data
            .train
            .iter()
            .filter(|l| l.sample.category == Some(2))
            .collect();
        assert_eq!(unknown_train.len(), 8);
        assert!(unknown_train.iter().all(|l| l.sample.image.starts_with("ood_")));
        assert_eq!(
            data.test.iter().filter(|l| l.sample.category == Some(2)).count(),
            1
        );
        assert_eq!(data.test.len() + data.validation.len() + data.train.len(), 30);
    }

    #[test]
    fn test_process_without_unknown_images_keeps_columns() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();

        let mut csv = String::from("image,A,B\n");
        let mut names = Vec::new();
        for i in 0..20 {
            let name = format!("img_{i:03}");
            let row = if i % 2 == 0 { "1.0,0.0" } else { "0.0,1.0" };
            csv.push_str(&format!("{name},{row}\n"));
            names.push(name);
        }
        write_images(&images, &names);
        let gt = dir.path().join("gt.csv");
        std::fs::write(&gt, csv).unwrap();

        let config = SamplerConfig::builder()
            .images_dir(&images)
            .descriptions(&gt)
            .output_dir(dir.path().join("out"))
            .target_size(8)
            .build()
            .unwrap();

        let data = process(&config, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(data.columns, vec!["A", "B"]);
        assert_eq!(data.unknown_index, None);
    }

    #[test]
    fn test_sample_copy_names_avoid_other_classes() {
        let dir = tempfile::tempdir().unwrap();
        // Class 0 holds "x"; class 1 holds "x_0" .. "x_9", names an augmented copy of "x" could take.
        let mut rows = vec![Sample::one_hot("x", dir.path().join("x.jpg"), 0, 2)];
        let mut names = vec!["x".to_string()];
        for i in 0..10 {
            let name = format!("x_{i}");
            rows.push(Sample::one_hot(name.clone(), dir.path().join(format!("{name}.jpg")), 1, 2));
            names.push(name);
        }
        write_images(dir.path(), &names);
        let targets: BTreeMap<usize, usize> = [(0, 10), (1, 10)].into_iter().collect();

        let out = sample(&rows, &targets, 1, 8, &mut StdRng::seed_from_u64(6), false).unwrap();
        let unique: HashSet<_> = out.iter().map(|l| l.sample.image.as_str()).collect();
        assert_eq!(unique.len(), 20);
    }
}
