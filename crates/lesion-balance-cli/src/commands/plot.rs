//! Chart rendering commands.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use lesion_balance::dataset::{GroundTruth, count_per_category};
use lesion_balance::plot::{
    self, AxisScale, ComparisonOptions, ComplexityOptions, HyperparameterComparisonOptions,
    SweepOptions,
};
use lesion_balance::results::{ModelRegistry, Predictions, ScoreKind, TrainingLog};

use crate::PlotChart;

pub fn run(chart: PlotChart) -> Result<()> {
    match chart {
        PlotChart::Complexity {
            log,
            feature_extract_epochs,
            epoch_max,
            title,
            output,
        } => {
            let log = TrainingLog::load(&log)
                .with_context(|| format!("Failed to load training log {}", log.display()))?;
            let opts = ComplexityOptions {
                title,
                feature_extract_epochs,
                epoch_range: (None, Some(epoch_max)),
                ..ComplexityOptions::default()
            };
            let svg = plot::complexity_graph(&log, &opts)?;
            write_svg(&output, &svg)
        }
        PlotChart::ClassDist { descriptions, output } => {
            let gt = load_ground_truth(&descriptions)?;
            let counts = count_per_category(&gt.samples);
            write_svg(&output, &plot::class_distribution(&gt.columns, &counts))
        }
        PlotChart::Confusion {
            predictions,
            ground_truth,
            normalize,
            title,
            output,
        } => {
            let gt = load_ground_truth(&ground_truth)?;
            let predictions = Predictions::load(&predictions)
                .with_context(|| format!("Failed to load predictions {}", predictions.display()))?;
            let (y_true, y_pred) = predictions.join(&gt);
            if y_true.is_empty() {
                bail!("No predicted image appears in {}", ground_truth.display());
            }
            let svg = plot::confusion_matrix(&y_true, &y_pred, &gt.columns, normalize, &title)?;
            write_svg(&output, &svg)
        }
        PlotChart::Models {
            registry,
            ground_truth,
            models,
            params,
            parameter,
            balanced_acc,
            title,
            output,
        } => {
            let registry = load_registry(&registry)?;
            let gt = load_ground_truth(&ground_truth)?;
            let opts = ComparisonOptions {
                names: (!models.is_empty()).then_some(models),
                constant_parameters: params.into_iter().collect(),
                title,
                parameter,
                ..ComparisonOptions::default()
            };

            let svg = if balanced_acc {
                plot::model_comparison_balanced_acc(&registry.models, &gt, &opts)?
            } else {
                let scores = [
                    (ScoreKind::BalancedAccuracy, "BMA".to_string()),
                    (ScoreKind::Accuracy, "Accuracy".to_string()),
                ];
                plot::model_comparison(&registry.models, &gt, &scores, &opts)?
            };
            let Some(svg) = svg else {
                bail!("No model with test predictions matches the filters");
            };
            write_svg(&output, &svg)
        }
        PlotChart::Checkpoints {
            registry,
            model,
            ground_truth,
            output,
        } => {
            let registry = load_registry(&registry)?;
            let gt = load_ground_truth(&ground_truth)?;
            let Some(info) = registry.find(&model) else {
                bail!("Model {model} is not in the registry");
            };
            let Some(svg) = plot::checkpoint_comparison(info, &gt, &model)? else {
                bail!("Model {model} has no test predictions");
            };
            write_svg(&output, &svg)
        }
        PlotChart::Hyperparameter {
            registry,
            name,
            label,
            metric,
            model,
            params,
            sweep,
            bars,
            log_scale,
            ground_truth,
            title,
            output,
        } => {
            let registry = load_registry(&registry)?;
            let constant_parameters: BTreeMap<String, String> = params.into_iter().collect();
            let label = label.unwrap_or_else(|| name.clone());
            let scale = if log_scale { AxisScale::Log } else { AxisScale::Linear };

            let svg = if sweep {
                let opts = SweepOptions {
                    metric_label: metric.clone(),
                    metric,
                    hyperparameter: name,
                    hyperparameter_label: label,
                    constant_parameters,
                    title,
                    subtitle: true,
                    model: model.clone(),
                    y_scale: scale,
                    ..SweepOptions::default()
                };
                let chart = if opts.metric == "lr" {
                    plot::lr_over_epochs(&registry.models, &opts)?
                } else {
                    plot::hyperparameter_over_epochs(&registry.models, &opts)?
                };
                let Some(svg) = chart else {
                    bail!("No {model} run matches the filters");
                };
                svg
            } else {
                let names = [model.clone()];
                let selected = registry.filter(Some(names.as_slice()), &constant_parameters);
                if selected.is_empty() {
                    bail!("No {model} run matches the filters");
                }
                let gt = ground_truth.as_deref().map(load_ground_truth).transpose()?;
                let opts = HyperparameterComparisonOptions {
                    parameter_label: label,
                    title,
                    x_scale: scale,
                    bars,
                    ..HyperparameterComparisonOptions::default()
                };
                plot::hyperparameter_comparison(&selected, &name, gt.as_ref(), &opts)?
            };
            write_svg(&output, &svg)
        }
    }
}

fn load_ground_truth(path: &Path) -> Result<GroundTruth> {
    GroundTruth::load(path, "", None)
        .with_context(|| format!("Failed to load ground truth {}", path.display()))
}

fn load_registry(path: &Path) -> Result<ModelRegistry> {
    ModelRegistry::load(path)
        .with_context(|| format!("Failed to load model registry {}", path.display()))
}

fn write_svg(path: &Path, svg: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, svg).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved chart to: {}", path.display());
    Ok(())
}
