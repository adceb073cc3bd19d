//! End-to-end sampler runs on small synthetic datasets.

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use lesion_balance::sampler::{Metadata, OutputLayout, SamplerConfig, run};

fn write_image(dir: &Path, name: &str, shade: u8) {
    RgbImage::from_fn(20, 14, |x, y| Rgb([shade, (x * 10) as u8, (y * 15) as u8]))
        .save(dir.join(format!("{name}.jpg")))
        .unwrap();
}

/// 30 rows of class A and 10 of class B.
fn dataset(root: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let images = root.join("images");
    fs::create_dir_all(&images).unwrap();
    let mut csv = String::from("image,A,B\n");
    for i in 0..40 {
        let name = format!("ISIC_{i:07}");
        let label = if i % 4 == 0 { "0.0,1.0" } else { "1.0,0.0" };
        csv.push_str(&format!("{name},{label}\n"));
        write_image(&images, &name, (i * 6) as u8);
    }
    let gt = root.join("gt.csv");
    fs::write(&gt, csv).unwrap();
    (images, gt)
}

fn csv_rows(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count() - 1
}

fn files_in(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn class_balanced_run_writes_every_split() {
    let dir = tempfile::tempdir().unwrap();
    let (images, gt) = dataset(dir.path());
    let out = dir.path().join("balanced");

    let config = SamplerConfig::builder()
        .images_dir(&images)
        .descriptions(&gt)
        .output_dir(&out)
        .target_size(8)
        .training_samples(Some(40))
        .class_balance(true)
        .seed(Some(5))
        .build()
        .unwrap();
    let metadata = run(&config).unwrap();

    assert_eq!(metadata.seed, 5);
    assert_eq!(metadata.training_samples, 40);
    assert_eq!(metadata.validation_samples, 4);
    assert_eq!(metadata.test_samples, 4);
    assert_eq!(metadata.class_counts.get("A"), Some(&20));
    assert_eq!(metadata.class_counts.get("B"), Some(&20));

    let layout = OutputLayout::new(&out, "ISIC_2019");
    assert_eq!(files_in(&layout.train_images()), 40);
    assert_eq!(csv_rows(&layout.train_csv()), 40);
    assert_eq!(files_in(&layout.validation_images()), 4);
    assert_eq!(csv_rows(&layout.validation_csv()), 4);
    assert_eq!(csv_rows(&layout.test_csv()), 4);
    assert!(!layout.test_csv_unknown().exists());

    let header = fs::read_to_string(layout.train_csv()).unwrap();
    assert!(header.starts_with("image,A,B\n"));

    let first = fs::read_dir(layout.train_images()).unwrap().next().unwrap().unwrap();
    let img = image::open(first.path()).unwrap();
    assert_eq!((img.width(), img.height()), (8, 8));

    let manifest = Metadata::read(&layout.metadata()).unwrap();
    assert_eq!(manifest, metadata);
}

#[test]
fn same_seed_reproduces_the_training_split() {
    let dir = tempfile::tempdir().unwrap();
    let (images, gt) = dataset(dir.path());

    let run_into = |name: &str| {
        let out = dir.path().join(name);
        let config = SamplerConfig::builder()
            .images_dir(&images)
            .descriptions(&gt)
            .output_dir(&out)
            .target_size(8)
            .training_samples(Some(50))
            .class_balance(true)
            .seed(Some(42))
            .build()
            .unwrap();
        run(&config).unwrap();
        fs::read_to_string(OutputLayout::new(&out, "ISIC_2019").train_csv()).unwrap()
    };

    assert_eq!(run_into("first"), run_into("second"));
}

#[test]
fn test_folder_with_unknown_images() {
    let dir = tempfile::tempdir().unwrap();
    let (images, gt) = dataset(dir.path());

    let test_dir = dir.path().join("test");
    fs::create_dir_all(&test_dir).unwrap();
    for i in 0..3 {
        write_image(&test_dir, &format!("test_{i}"), 200);
    }
    let ood = dir.path().join("ood");
    fs::create_dir_all(&ood).unwrap();
    write_image(&ood, "ood_0", 10);
    write_image(&ood, "ood_1", 20);

    let out = dir.path().join("out");
    let config = SamplerConfig::builder()
        .images_dir(&images)
        .descriptions(&gt)
        .output_dir(&out)
        .test_dir(Some(test_dir))
        .unknown_images(Some(ood))
        .target_size(8)
        .dataset_prefix("ISIC_2018")
        .seed(Some(1))
        .build()
        .unwrap();
    let metadata = run(&config).unwrap();

    let layout = OutputLayout::new(&out, "ISIC_2018");
    assert_eq!(metadata.test_samples, 5);
    assert_eq!(files_in(&layout.test_images()), 5);
    assert_eq!(csv_rows(&layout.test_csv_unknown()), 5);
    assert_eq!(csv_rows(&layout.test_csv()), 3);
    // Validation is carved from the ground truth, the rest is kept as is.
    assert_eq!(metadata.training_samples + metadata.validation_samples, 40);
}
