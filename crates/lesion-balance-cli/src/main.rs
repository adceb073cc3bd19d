//! lesion-balance CLI - dataset rebalancing and experiment charts

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod commands;
mod logging;

use logging::{Verbosity, init_logging};

/// Rebalance skin-lesion image datasets and chart training results.
#[derive(Parser)]
#[command(name = "lesion-balance")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resample a labelled image folder into train, validation and test splits
    Sample(SampleArgs),

    /// Render experiment charts as SVG
    Plot {
        #[command(subcommand)]
        chart: PlotChart,
    },
}

#[derive(Args)]
pub struct SampleArgs {
    /// Directory of source images named in the ground truth
    #[arg(long, env = "LESION_BALANCE_IMAGES")]
    pub images: PathBuf,

    /// Ground truth CSV (image column followed by one-hot labels)
    #[arg(long, env = "LESION_BALANCE_DESCRIPTIONS")]
    pub descriptions: PathBuf,

    /// Directory of unlabeled test images
    #[arg(long, env = "LESION_BALANCE_TEST")]
    pub test: Option<PathBuf>,

    /// Directory of out-of-distribution images
    #[arg(long, env = "LESION_BALANCE_UNKNOWN_IMAGES")]
    pub unknown_images: Option<PathBuf>,

    /// Train on the out-of-distribution images instead of testing on them
    #[arg(long, requires = "unknown_images")]
    pub unknown_train: bool,

    /// Side of the square output images
    #[arg(long, default_value_t = 224, env = "LESION_BALANCE_TARGET_SIZE")]
    pub target_size: u32,

    /// Number of training images to produce
    #[arg(long, env = "LESION_BALANCE_TRAINING_SAMPLES")]
    pub training_samples: Option<usize>,

    /// Give every class the same number of training images
    #[arg(long)]
    pub class_balance: bool,

    /// Lower bound of training images per class
    #[arg(long, env = "LESION_BALANCE_MIN_SAMPLES")]
    pub min_samples: Option<usize>,

    /// Augmentation group used to oversample rare classes (1-3)
    #[arg(long, default_value_t = 1)]
    pub data_augmentation_group: u8,

    /// Fraction of the ground truth held out for testing
    #[arg(long, default_value_t = 0.1)]
    pub test_fraction: f64,

    /// Fraction of the remaining rows held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub validation_fraction: f64,

    /// Prefix of output folder and CSV names
    #[arg(long, default_value = "ISIC_2019")]
    pub prefix: String,

    /// RNG seed; random when omitted
    #[arg(long, env = "LESION_BALANCE_SEED")]
    pub seed: Option<u64>,

    /// Show progress bars
    #[arg(long)]
    pub progress: bool,

    /// Print the run manifest as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Output directory
    #[arg(short, long, env = "LESION_BALANCE_OUTPUT")]
    pub output: PathBuf,
}

#[derive(Subcommand)]
pub enum PlotChart {
    /// Loss, BMA and learning rate of one training run
    Complexity {
        /// Training log CSV
        #[arg(long)]
        log: PathBuf,

        /// Epochs trained before fine tuning started
        #[arg(long)]
        feature_extract_epochs: Option<usize>,

        /// Last epoch shown
        #[arg(long, default_value_t = 90.0)]
        epoch_max: f64,

        #[arg(long, default_value = "")]
        title: String,

        /// Output SVG
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Images per category of a ground truth table
    ClassDist {
        /// Ground truth CSV
        #[arg(long)]
        descriptions: PathBuf,

        /// Output SVG
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Confusion matrix of a predictions file
    Confusion {
        /// Predictions CSV (image, pred_category)
        #[arg(long)]
        predictions: PathBuf,

        /// Ground truth CSV
        #[arg(long)]
        ground_truth: PathBuf,

        /// Divide each row by its total
        #[arg(long)]
        normalize: bool,

        #[arg(long, default_value = "Confusion matrix")]
        title: String,

        /// Output SVG
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Test scores of the models in a registry
    Models {
        /// Model registry JSON
        #[arg(long)]
        registry: PathBuf,

        /// Ground truth CSV of the test split
        #[arg(long)]
        ground_truth: PathBuf,

        /// Only these models (repeatable)
        #[arg(long = "model")]
        models: Vec<String>,

        /// Only models with this hyperparameter value, as KEY=VALUE (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Label bars with this hyperparameter instead of the model name
        #[arg(long)]
        parameter: Option<String>,

        /// Compare train, validation and test BMA instead of test BMA and accuracy
        #[arg(long)]
        balanced_acc: bool,

        #[arg(long, default_value = "")]
        title: String,

        /// Output SVG
        #[arg(short, long)]
        output: PathBuf,
    },

    /// BMA and accuracy of the saved checkpoints of one model
    Checkpoints {
        /// Model registry JSON
        #[arg(long)]
        registry: PathBuf,

        /// Model name
        #[arg(long)]
        model: String,

        /// Ground truth CSV of the test split
        #[arg(long)]
        ground_truth: PathBuf,

        /// Output SVG
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Scores against one hyperparameter
    Hyperparameter {
        /// Model registry JSON
        #[arg(long)]
        registry: PathBuf,

        /// Hyperparameter to compare
        #[arg(long)]
        name: String,

        /// Axis and legend label for the hyperparameter
        #[arg(long)]
        label: Option<String>,

        /// Log column plotted per epoch with --sweep
        #[arg(long, default_value = "balanced_accuracy")]
        metric: String,

        /// Architecture whose runs are compared
        #[arg(long, default_value = "DenseNet201")]
        model: String,

        /// Only runs with this hyperparameter value, as KEY=VALUE (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Plot the metric over epochs, one curve per run
        #[arg(long, conflicts_with = "bars")]
        sweep: bool,

        /// Grouped bars instead of lines
        #[arg(long)]
        bars: bool,

        /// Logarithmic hyperparameter axis
        #[arg(long)]
        log_scale: bool,

        /// Ground truth CSV; adds test scores
        #[arg(long)]
        ground_truth: Option<PathBuf>,

        #[arg(long, default_value = "")]
        title: String,

        /// Output SVG
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Parse a `KEY=VALUE` pair.
fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(Verbosity::from_flags(cli.quiet, cli.verbose));

    match cli.command {
        Commands::Sample(args) => commands::sample::run(args),
        Commands::Plot { chart } => commands::plot::run(chart),
    }
}
