//! Dataset sampling command.

use anyhow::{Context, Result};
use lesion_balance::sampler::{SamplerConfig, run as run_sampler};

use crate::SampleArgs;

pub fn run(args: SampleArgs) -> Result<()> {
    let json = args.json;
    let config = config_from_args(args)?;

    tracing::info!(
        images = %config.images_dir.display(),
        descriptions = %config.descriptions.display(),
        policy = ?config.policy(),
        "sampling dataset"
    );

    let metadata = run_sampler(&config)
        .with_context(|| format!("Failed to sample dataset into {}", config.output_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("Sampled dataset written to: {}", metadata.path.display());
    println!("  Seed: {}", metadata.seed);
    println!("  Training images: {}", metadata.training_samples);
    println!("  Validation images: {}", metadata.validation_samples);
    println!("  Test images: {}", metadata.test_samples);
    if !metadata.class_counts.is_empty() {
        println!("  Training images per class:");
        for (class, count) in &metadata.class_counts {
            println!("    {}: {}", class, count);
        }
    }

    Ok(())
}

fn config_from_args(args: SampleArgs) -> Result<SamplerConfig> {
    SamplerConfig::builder()
        .images_dir(args.images)
        .descriptions(args.descriptions)
        .output_dir(args.output)
        .test_dir(args.test)
        .unknown_images(args.unknown_images)
        .unknown_train(args.unknown_train)
        .target_size(args.target_size)
        .training_samples(args.training_samples)
        .class_balance(args.class_balance)
        .min_samples(args.min_samples)
        .augmentation_group(args.data_augmentation_group)
        .test_fraction(args.test_fraction)
        .validation_fraction(args.validation_fraction)
        .dataset_prefix(args.prefix)
        .seed(args.seed)
        .show_progress(args.progress)
        .build()
        .context("Invalid sampling options")
}
