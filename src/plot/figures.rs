//! Ready-made experiment figures built from training logs, predictions and
//! the model registry.
//!
//! Every function returns a complete SVG document. Functions that select
//! models through a filter return `Ok(None)` when nothing matches.

use std::collections::BTreeMap;

use crate::dataset::GroundTruth;
use crate::error::{Error, Result};
use crate::plot::bar::{BarChart, BarGroup, Orientation, ValueLabels};
use crate::plot::figure::{Figure, Layout, Panel};
use crate::plot::heatmap::{Heatmap, ImagePanel};
use crate::plot::line::{LineChart, LineStyle, Series};
use crate::plot::svg::{AxisScale, colors, format_value};
use crate::results::{
    Checkpoint, ModelInfo, Predictions, ScoreKind, TrainingLog, as_percent, filter_models,
    test_score,
};

const FINE_TUNING_LABEL: &str = "Start Fine Tuning";
const METRIC_STYLES: [LineStyle; 3] = [LineStyle::Solid, LineStyle::Dashed, LineStyle::Dotted];

fn epoch_axis(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64).collect()
}

fn with_fine_tuning(chart: LineChart, feature_extract_epochs: Option<usize>) -> LineChart {
    match feature_extract_epochs {
        Some(epochs) => chart.vertical_marker(epochs as f64 - 1.0, FINE_TUNING_LABEL),
        None => chart,
    }
}

/// Options for [`complexity_graph`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityOptions {
    pub title: String,
    /// Epochs trained with a frozen backbone; marks where fine tuning starts.
    pub feature_extract_epochs: Option<usize>,
    pub loss_range: (f64, f64),
    pub epoch_range: (Option<f64>, Option<f64>),
    pub accuracy_range: (f64, f64),
    pub width: u32,
    pub height: u32,
}

impl Default for ComplexityOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            feature_extract_epochs: None,
            loss_range: (0.0, 2.0),
            epoch_range: (None, Some(90.0)),
            accuracy_range: (0.0, 1.0),
            width: 1400,
            height: 1000,
        }
    }
}

/// Loss, balanced accuracy and learning rate of one training run, stacked.
pub fn complexity_graph(log: &TrainingLog, opts: &ComplexityOptions) -> Result<String> {
    let x = epoch_axis(log.len());
    let (epoch_min, epoch_max) = opts.epoch_range;

    let lr = log.column("lr")?;
    let lr_max = lr.iter().copied().filter(|v| v.is_finite()).fold(0.0, f64::max);

    let loss = LineChart::new("Training and Validation Loss")
        .y_label("Loss")
        .series(Series::from_xy("Training Loss", colors::BLUE, &x, log.column("loss")?))
        .series(Series::from_xy("Validation Loss", colors::ORANGE, &x, log.column("val_loss")?))
        .x_range(epoch_min, epoch_max)
        .y_range(Some(opts.loss_range.0), Some(opts.loss_range.1));

    let accuracy = LineChart::new("Training and Validation Accuracy")
        .x_label("Epoch")
        .y_label("BMA")
        .series(Series::from_xy(
            "Training Accuracy",
            colors::BLUE,
            &x,
            log.column("balanced_accuracy")?,
        ))
        .series(Series::from_xy(
            "Validation Accuracy",
            colors::ORANGE,
            &x,
            log.column("val_balanced_accuracy")?,
        ))
        .x_range(epoch_min, epoch_max)
        .y_range(Some(opts.accuracy_range.0), Some(opts.accuracy_range.1));

    let learning_rate = LineChart::new("Learning rate over epochs")
        .x_label("Epoch")
        .y_label("Learning rate")
        .series(Series::from_xy("Learning Rate", colors::BLUE, &x, lr))
        .x_range(epoch_min, epoch_max)
        .y_range(Some(0.0), Some(lr_max + 0.00001));

    Ok(Figure::new(opts.width, opts.height)
        .title(&opts.title)
        .panel(with_fine_tuning(loss, opts.feature_extract_epochs))
        .panel(with_fine_tuning(accuracy, opts.feature_extract_epochs))
        .panel(with_fine_tuning(learning_rate, opts.feature_extract_epochs))
        .render())
}

/// Titles and size of a bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct BarOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
}

impl Default for BarOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            width: 1000,
            height: 500,
        }
    }
}

/// One group of bars per x label, one bar per series, each labelled with
/// its value.
pub fn grouped_bars(
    scalars: &[Vec<f64>],
    series_labels: &[String],
    x_labels: &[String],
    opts: &BarOptions,
) -> Result<String> {
    if scalars.is_empty() || scalars.len() != series_labels.len() {
        return Err(Error::Chart(format!(
            "{} series but {} series labels",
            scalars.len(),
            series_labels.len()
        )));
    }
    if let Some(bad) = scalars.iter().find(|s| s.len() != x_labels.len()) {
        return Err(Error::Chart(format!(
            "series has {} values for {} x labels",
            bad.len(),
            x_labels.len()
        )));
    }

    let mut chart = BarChart::new(&opts.title, x_labels.to_vec())
        .x_label(&opts.x_label)
        .y_label(&opts.y_label);
    for (i, (values, label)) in scalars.iter().zip(series_labels).enumerate() {
        chart = chart.group(BarGroup::new(label, colors::cycle(i), values.clone()));
    }
    Ok(chart.to_svg(opts.width, opts.height))
}

/// Annotated confusion matrix; `normalize` divides each row by its total.
///
/// Axis labels are `classes[label]` for every label seen in either input.
pub fn confusion_matrix(
    y_true: &[usize],
    y_pred: &[usize],
    classes: &[String],
    normalize: bool,
    title: &str,
) -> Result<String> {
    let cm = crate::results::confusion_matrix(y_true, y_pred)?;
    let values = if normalize { cm.normalized() } else { cm.values() };
    let names: Vec<String> = cm
        .labels
        .iter()
        .map(|&l| classes.get(l).cloned().unwrap_or_else(|| l.to_string()))
        .collect();

    Ok(Heatmap::new(title, values)
        .labels(names.clone(), names)
        .x_label("Predicted Label")
        .y_label("True Label")
        .to_svg(800, 600))
}

/// An image next to its `topk` most probable classes.
pub fn prob_bars(
    true_title: &str,
    predicted_title: &str,
    image_path: &str,
    labels: &[String],
    probs: &[f64],
    topk: usize,
    title: Option<&str>,
) -> Result<String> {
    if labels.len() != probs.len() {
        return Err(Error::Chart(format!(
            "{} labels but {} probabilities",
            labels.len(),
            probs.len()
        )));
    }
    let k = topk.min(labels.len());

    let bars = BarChart::new(predicted_title, labels[..k].to_vec())
        .orientation(Orientation::Horizontal)
        .value_range(Some(0.0), Some(1.0))
        .labels(ValueLabels::Scientific(1))
        .legend(false)
        .group(BarGroup::new("", colors::BLUE, probs[..k].to_vec()));

    let mut figure = Figure::new(1200, 400)
        .layout(Layout::Columns(vec![5.0, 7.0]))
        .panel(ImagePanel::new(true_title, image_path))
        .panel(bars);
    if let Some(title) = title {
        figure = figure.title(title);
    }
    Ok(figure.render())
}

/// Number of images per category; categories without images show 0.
#[must_use]
pub fn class_distribution(category_names: &[String], counts: &BTreeMap<usize, usize>) -> String {
    let values = (0..category_names.len())
        .map(|i| counts.get(&i).copied().unwrap_or(0) as f64)
        .collect();
    BarChart::new("", category_names.to_vec())
        .x_label("Category")
        .y_label("Number of Images")
        .legend(false)
        .group(BarGroup::new("Images", colors::BLUE, values))
        .to_svg(800, 500)
}

/// Options for the per-epoch hyperparameter sweep charts.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOptions {
    /// Log column to plot; the validation curve reads `val_{metric}`.
    pub metric: String,
    pub metric_label: String,
    /// Hyperparameter that varies between the compared runs.
    pub hyperparameter: String,
    pub hyperparameter_label: String,
    /// Hyperparameters every compared run must share.
    pub constant_parameters: BTreeMap<String, String>,
    pub title: String,
    /// Show the other hyperparameters above the chart.
    pub subtitle: bool,
    /// Architecture whose runs are compared.
    pub model: String,
    pub feature_extract_epochs: Option<usize>,
    pub epoch_max: Option<f64>,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub y_scale: AxisScale,
    pub width: u32,
    pub height: u32,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            metric: "balanced_accuracy".to_string(),
            metric_label: "BMA".to_string(),
            hyperparameter: String::new(),
            hyperparameter_label: String::new(),
            constant_parameters: BTreeMap::new(),
            title: String::new(),
            subtitle: false,
            model: "DenseNet201".to_string(),
            feature_extract_epochs: None,
            epoch_max: None,
            y_min: None,
            y_max: None,
            y_scale: AxisScale::Linear,
            width: 1400,
            height: 600,
        }
    }
}

impl SweepOptions {
    fn parameter_label(&self) -> &str {
        if self.hyperparameter_label.is_empty() {
            &self.hyperparameter
        } else {
            &self.hyperparameter_label
        }
    }
}

/// Runs of `opts.model` matching the constant parameters, sorted by the
/// compared hyperparameter.
fn sweep_models<'a>(models: &'a [ModelInfo], opts: &SweepOptions) -> Result<Vec<(f64, &'a ModelInfo)>> {
    let names = [opts.model.clone()];
    let mut selected = filter_models(models, Some(names.as_slice()), &opts.constant_parameters)
        .into_iter()
        .map(|m| Ok((m.hyperparameter_value(&opts.hyperparameter)?, m)))
        .collect::<Result<Vec<_>>>()?;
    selected.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(selected)
}

fn sweep_chart(opts: &SweepOptions, selected: &[(f64, &ModelInfo)]) -> LineChart {
    let subtitle = match selected.last() {
        Some((_, model)) if opts.subtitle => model
            .hyperparameters
            .iter()
            .filter(|(k, _)| **k != opts.hyperparameter)
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    };

    let chart = LineChart::new(subtitle)
        .x_label("Epoch")
        .y_label(&opts.metric_label)
        .x_range(Some(0.0), opts.epoch_max)
        .y_range(opts.y_min, opts.y_max)
        .y_scale(opts.y_scale)
        .grid(true);
    with_fine_tuning(chart, opts.feature_extract_epochs)
}

/// Train (solid) and validation (dashed) curves of `opts.metric` for every
/// run of one architecture, one colour per hyperparameter value.
pub fn hyperparameter_over_epochs(models: &[ModelInfo], opts: &SweepOptions) -> Result<Option<String>> {
    let selected = sweep_models(models, opts)?;
    if selected.is_empty() {
        return Ok(None);
    }

    let val_metric = format!("val_{}", opts.metric);
    let mut chart = sweep_chart(opts, &selected);
    for (i, (value, model)) in selected.iter().enumerate() {
        let log = model.load_log()?;
        let x = epoch_axis(log.len());
        let color = colors::SWEEP[i % colors::SWEEP.len()];
        let label = format!("{}={}", opts.parameter_label(), format_value(*value));

        chart = chart
            .series(Series::from_xy(format!("{label} (Train)"), color, &x, log.column(&opts.metric)?))
            .series(
                Series::from_xy(format!("{label} (Validation)"), color, &x, log.column(&val_metric)?)
                    .style(LineStyle::Dashed),
            );
    }

    Ok(Some(
        Figure::new(opts.width, opts.height)
            .title(&opts.title)
            .panel(chart)
            .render(),
    ))
}

/// One curve of `opts.metric` (typically `lr`) per run.
pub fn lr_over_epochs(models: &[ModelInfo], opts: &SweepOptions) -> Result<Option<String>> {
    let selected = sweep_models(models, opts)?;
    if selected.is_empty() {
        return Ok(None);
    }

    let mut chart = sweep_chart(opts, &selected);
    for (i, (value, model)) in selected.iter().enumerate() {
        let log = model.load_log()?;
        let x = epoch_axis(log.len());
        let label = format!("{}={}", opts.parameter_label(), format_value(*value));
        chart = chart.series(Series::from_xy(
            label,
            colors::SWEEP[i % colors::SWEEP.len()],
            &x,
            log.column(&opts.metric)?,
        ));
    }

    Ok(Some(
        Figure::new(opts.width, opts.height)
            .title(&opts.title)
            .panel(chart)
            .render(),
    ))
}

/// Model selection and labelling for the comparison charts.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOptions {
    /// Models to include; all when `None`.
    pub names: Option<Vec<String>>,
    pub constant_parameters: BTreeMap<String, String>,
    pub title: String,
    /// Label bars with this hyperparameter instead of the model name.
    pub parameter: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            names: None,
            constant_parameters: BTreeMap::new(),
            title: String::new(),
            parameter: None,
            width: 1000,
            height: 500,
        }
    }
}

impl ComparisonOptions {
    fn label(&self, model: &ModelInfo) -> Result<String> {
        match &self.parameter {
            None => Ok(model.model.clone()),
            Some(p) => model.hyperparameter(p).map(str::to_string).ok_or_else(|| {
                Error::Chart(format!("model {} has no hyperparameter '{p}'", model.model))
            }),
        }
    }
}

fn scored_bars(
    title: &str,
    categories: Vec<String>,
    series: Vec<(String, Vec<f64>)>,
) -> BarChart {
    let mut chart = BarChart::new(title, categories)
        .orientation(Orientation::Horizontal)
        .bar_width(0.40)
        .labels(ValueLabels::Fixed(2))
        .x_label("Metric Score (%)")
        .y_label("Model")
        .grid(true);
    for (i, (label, values)) in series.into_iter().enumerate() {
        chart = chart.group(BarGroup::new(label, colors::cycle(i), values));
    }
    chart
}

/// Test scores of the best-BMA checkpoint of every selected model, as
/// horizontal bars sorted by the first score.
pub fn model_comparison(
    models: &[ModelInfo],
    ground_truth: &GroundTruth,
    scores: &[(ScoreKind, String)],
    opts: &ComparisonOptions,
) -> Result<Option<String>> {
    if scores.is_empty() {
        return Err(Error::Chart("no scores to compare".to_string()));
    }

    let mut rows: Vec<(Vec<f64>, String)> = Vec::new();
    for model in filter_models(models, opts.names.as_deref(), &opts.constant_parameters) {
        let Some(path) = model.checkpoint_predictions(Checkpoint::BestBalancedAcc) else {
            continue;
        };
        let predictions = Predictions::load(&path)?;
        let values = scores
            .iter()
            .map(|(kind, _)| test_score(&predictions, ground_truth, *kind).map(as_percent))
            .collect::<Result<Vec<_>>>()?;
        rows.push((values, opts.label(model)?));
    }
    if rows.is_empty() {
        return Ok(None);
    }
    rows.sort_by(|a, b| a.0[0].total_cmp(&b.0[0]));

    let categories = rows.iter().map(|r| r.1.clone()).collect();
    let series = scores
        .iter()
        .enumerate()
        .map(|(j, (_, label))| (label.clone(), rows.iter().map(|r| r.0[j]).collect()))
        .collect();
    Ok(Some(scored_bars(&opts.title, categories, series).to_svg(opts.width, opts.height)))
}

/// BMA and accuracy of the three saved checkpoints of one model.
pub fn checkpoint_comparison(
    model: &ModelInfo,
    ground_truth: &GroundTruth,
    title: &str,
) -> Result<Option<String>> {
    let mut bma = Vec::new();
    let mut accuracy = Vec::new();
    for checkpoint in Checkpoint::all() {
        let Some(path) = model.checkpoint_predictions(*checkpoint) else {
            return Ok(None);
        };
        let predictions = Predictions::load(&path)?;
        bma.push(as_percent(test_score(&predictions, ground_truth, ScoreKind::BalancedAccuracy)?));
        accuracy.push(as_percent(test_score(&predictions, ground_truth, ScoreKind::Accuracy)?));
    }

    let categories = Checkpoint::all().iter().map(|c| c.label().to_string()).collect();
    let series = vec![("BMA (%)".to_string(), bma), ("Accuracy (%)".to_string(), accuracy)];
    Ok(Some(scored_bars(title, categories, series).to_svg(1000, 500)))
}

/// Train, validation and test BMA per model, sorted by test BMA.
pub fn model_comparison_balanced_acc(
    models: &[ModelInfo],
    ground_truth: &GroundTruth,
    opts: &ComparisonOptions,
) -> Result<Option<String>> {
    let mut rows: Vec<([f64; 3], String)> = Vec::new();
    for model in filter_models(models, opts.names.as_deref(), &opts.constant_parameters) {
        let Some(test) = model.test_score(ground_truth, Checkpoint::BestBalancedAcc, ScoreKind::BalancedAccuracy)?
        else {
            continue;
        };
        let train = model.log_metric("balanced_accuracy")?;
        let val = model.log_metric("val_balanced_accuracy")?;
        rows.push((
            [as_percent(train), as_percent(val), as_percent(test)],
            opts.label(model)?,
        ));
    }
    if rows.is_empty() {
        return Ok(None);
    }
    rows.sort_by(|a, b| {
        a.0[2]
            .total_cmp(&b.0[2])
            .then(a.0[1].total_cmp(&b.0[1]))
            .then(a.0[0].total_cmp(&b.0[0]))
    });

    let categories = rows.iter().map(|r| r.1.clone()).collect();
    let mut chart = BarChart::new(&opts.title, categories)
        .y_label("BMA (%)")
        .bar_width(0.30)
        .value_range(Some(0.0), Some(100.0));
    for (j, name) in ["Train", "Validation", "Test"].iter().enumerate() {
        chart = chart.group(BarGroup::new(*name, colors::cycle(j), rows.iter().map(|r| r.0[j]).collect()));
    }
    Ok(Some(chart.to_svg(opts.width, opts.height)))
}

/// Labels for [`model_parameter_comparison`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterComparisonOptions {
    pub parameter_label: String,
    pub metric_label: String,
    pub title: String,
    pub integer_x: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for ParameterComparisonOptions {
    fn default() -> Self {
        Self {
            parameter_label: String::new(),
            metric_label: String::new(),
            title: String::new(),
            integer_x: false,
            width: 700,
            height: 500,
        }
    }
}

/// Train and validation BMA and accuracy against a per-architecture
/// property such as parameter count, each point annotated with the model.
pub fn model_parameter_comparison(
    models: &[&ModelInfo],
    parameter_by_model: &BTreeMap<String, f64>,
    opts: &ParameterComparisonOptions,
) -> Result<String> {
    let mut rows = Vec::with_capacity(models.len());
    for model in models {
        let parameter = *parameter_by_model.get(&model.model).ok_or_else(|| {
            Error::Chart(format!("no parameter value for model {}", model.model))
        })?;
        let metrics = [
            "balanced_accuracy",
            "accuracy",
            "val_balanced_accuracy",
            "val_accuracy",
        ]
        .iter()
        .map(|m| model.log_metric(m).map(as_percent))
        .collect::<Result<Vec<_>>>()?;
        rows.push((parameter, metrics, model.model.clone()));
    }
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));

    let x: Vec<f64> = rows.iter().map(|r| r.0).collect();
    let column = |j: usize| rows.iter().map(|r| r.1[j]).collect::<Vec<f64>>();
    let lines = [
        ("BMA (train)", colors::BLUE, LineStyle::Solid),
        ("Accuracy (train)", colors::BLUE, LineStyle::Dashed),
        ("BMA (validation)", colors::RED, LineStyle::Solid),
        ("Accuracy (validation)", colors::RED, LineStyle::Dashed),
    ];

    let mut chart = LineChart::new(&opts.title)
        .x_label(&opts.parameter_label)
        .y_label(&opts.metric_label)
        .integer_x(opts.integer_x)
        .grid(true);
    for (j, (label, color, style)) in lines.into_iter().enumerate() {
        let ys = column(j);
        for ((&px, &py), row) in x.iter().zip(&ys).zip(&rows) {
            chart = chart.annotate(px, py + 0.1, &row.2);
        }
        chart = chart.series(Series::from_xy(label, color, &x, &ys).style(style).markers(true));
    }
    Ok(chart.to_svg(opts.width, opts.height))
}

/// Options for [`hyperparameter_comparison`] and
/// [`hyperparameter_comparison_multi_metrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct HyperparameterComparisonOptions {
    /// `(log column, legend label)` pairs scored on the training split.
    pub train_metrics: Vec<(String, String)>,
    /// `(log column, legend label)` pairs scored on the validation split.
    pub val_metrics: Vec<(String, String)>,
    /// Scores computed from test predictions when a ground truth is given.
    pub test_scores: Vec<(ScoreKind, String)>,
    pub parameter_label: String,
    pub metric_label: String,
    pub title: String,
    pub x_scale: AxisScale,
    /// Grouped bars of the first metric instead of lines.
    pub bars: bool,
    pub integer_x: bool,
    pub width: u32,
    pub height: u32,
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items.iter().map(|(a, b)| ((*a).to_string(), (*b).to_string())).collect()
}

impl Default for HyperparameterComparisonOptions {
    fn default() -> Self {
        Self {
            train_metrics: pairs(&[("balanced_accuracy", "Train BMA"), ("accuracy", "Train Accuracy")]),
            val_metrics: pairs(&[
                ("val_balanced_accuracy", "Validation BMA"),
                ("val_accuracy", "Validation Accuracy"),
            ]),
            test_scores: vec![
                (ScoreKind::BalancedAccuracy, "Test BMA".to_string()),
                (ScoreKind::Accuracy, "Test Accuracy".to_string()),
            ],
            parameter_label: String::new(),
            metric_label: "Metric Score(%)".to_string(),
            title: String::new(),
            x_scale: AxisScale::Linear,
            bars: false,
            integer_x: false,
            width: 700,
            height: 500,
        }
    }
}

impl HyperparameterComparisonOptions {
    /// BMA only, labelled by split.
    #[must_use]
    pub fn multi_metrics() -> Self {
        Self {
            train_metrics: pairs(&[("balanced_accuracy", "Train")]),
            val_metrics: pairs(&[("val_balanced_accuracy", "Validation")]),
            test_scores: vec![(ScoreKind::BalancedAccuracy, "Test".to_string())],
            metric_label: "BMA(%)".to_string(),
            ..Self::default()
        }
    }
}

struct SweepRow {
    parameter: f64,
    train: Vec<f64>,
    val: Vec<f64>,
    test: Vec<f64>,
}

fn sweep_rows(
    models: &[&ModelInfo],
    hyperparameter: &str,
    ground_truth: Option<&GroundTruth>,
    opts: &HyperparameterComparisonOptions,
) -> Result<Vec<SweepRow>> {
    if models.is_empty() {
        return Err(Error::Chart("no models to compare".to_string()));
    }
    if opts.train_metrics.len() != opts.val_metrics.len() {
        return Err(Error::Chart("train and validation metric lists differ in length".to_string()));
    }

    let log_scores = |model: &ModelInfo, metrics: &[(String, String)]| {
        metrics
            .iter()
            .map(|(m, _)| model.log_metric(m).map(as_percent))
            .collect::<Result<Vec<_>>>()
    };

    let mut rows = Vec::with_capacity(models.len());
    for model in models {
        let test = match ground_truth {
            Some(gt) => opts
                .test_scores
                .iter()
                .map(|(kind, _)| {
                    model
                        .test_score(gt, Checkpoint::BestBalancedAcc, *kind)
                        .map(|s| s.map_or(f64::NAN, as_percent))
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        rows.push(SweepRow {
            parameter: model.hyperparameter_value(hyperparameter)?,
            train: log_scores(model, &opts.train_metrics)?,
            val: log_scores(model, &opts.val_metrics)?,
            test,
        });
    }
    rows.sort_by(|a, b| a.parameter.total_cmp(&b.parameter));
    Ok(rows)
}

fn sweep_lines(
    rows: &[SweepRow],
    opts: &HyperparameterComparisonOptions,
    test_color: impl Fn(usize) -> &'static str,
) -> LineChart {
    let x: Vec<f64> = rows.iter().map(|r| r.parameter).collect();
    let mut chart = LineChart::new(&opts.title)
        .x_label(&opts.parameter_label)
        .y_label(&opts.metric_label)
        .x_scale(opts.x_scale)
        .integer_x(opts.integer_x)
        .grid(true);

    for (i, ((_, train_label), (_, val_label))) in
        opts.train_metrics.iter().zip(&opts.val_metrics).enumerate()
    {
        let style = METRIC_STYLES[i % METRIC_STYLES.len()];
        let train: Vec<f64> = rows.iter().map(|r| r.train[i]).collect();
        let val: Vec<f64> = rows.iter().map(|r| r.val[i]).collect();
        chart = chart
            .series(Series::from_xy(train_label, colors::BLUE, &x, &train).style(style).markers(true))
            .series(Series::from_xy(val_label, colors::RED, &x, &val).style(style).markers(true));
    }

    for (i, (_, label)) in opts.test_scores.iter().enumerate() {
        let test: Vec<f64> = rows.iter().filter_map(|r| r.test.get(i).copied()).collect();
        if test.len() == rows.len() {
            chart = chart.series(
                Series::from_xy(label, test_color(i), &x, &test)
                    .style(LineStyle::Dotted)
                    .markers(true),
            );
        }
    }
    chart
}

/// Train, validation and (with a ground truth) test scores against one
/// hyperparameter, as lines or as grouped bars of the first metric.
pub fn hyperparameter_comparison(
    models: &[&ModelInfo],
    hyperparameter: &str,
    ground_truth: Option<&GroundTruth>,
    opts: &HyperparameterComparisonOptions,
) -> Result<String> {
    let rows = sweep_rows(models, hyperparameter, ground_truth, opts)?;

    if !opts.bars {
        const TEST_COLORS: [&str; 3] = [colors::RED, colors::BLUE, colors::GREEN];
        let chart = sweep_lines(&rows, opts, |i| TEST_COLORS[i % TEST_COLORS.len()]);
        return Ok(chart.to_svg(opts.width, opts.height));
    }

    let first = |values: &Vec<f64>| values.first().copied().unwrap_or(f64::NAN);
    let categories = rows.iter().map(|r| format_value(r.parameter)).collect();
    let mut chart = BarChart::new(&opts.title, categories)
        .x_label(&opts.parameter_label)
        .y_label(&opts.metric_label)
        .bar_width(0.28)
        .group(BarGroup::new("Train", colors::cycle(0), rows.iter().map(|r| first(&r.train)).collect()))
        .group(BarGroup::new("Validation", colors::cycle(1), rows.iter().map(|r| first(&r.val)).collect()));
    if ground_truth.is_some() && !opts.test_scores.is_empty() {
        chart = chart.group(BarGroup::new("Test", colors::cycle(2), rows.iter().map(|r| first(&r.test)).collect()));
    }
    Ok(chart.to_svg(opts.width, opts.height))
}

/// Like [`hyperparameter_comparison`] in line mode, with train, validation
/// and test drawn in fixed colours and metrics told apart by line style.
pub fn hyperparameter_comparison_multi_metrics(
    models: &[&ModelInfo],
    hyperparameter: &str,
    ground_truth: Option<&GroundTruth>,
    opts: &HyperparameterComparisonOptions,
) -> Result<String> {
    let rows = sweep_rows(models, hyperparameter, ground_truth, opts)?;
    let chart = sweep_lines(&rows, opts, |_| colors::GREEN);
    Ok(chart.to_svg(opts.width, opts.height))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    const GROUND_TRUTH: &str = "image,MEL,NV\nimg0,1,0\nimg1,1,0\nimg2,0,1\nimg3,0,1\n";

    fn log_csv(train: f64, val: f64) -> String {
        format!(
            "epoch,loss,val_loss,accuracy,val_accuracy,balanced_accuracy,val_balanced_accuracy,lr\n\
             0,1.2,1.3,0.5,0.4,0.3,0.2,0.001\n\
             1,0.8,0.9,{train},{val},{train},{val},0.0005\n"
        )
    }

    fn ground_truth(dir: &Path) -> GroundTruth {
        let path = dir.join("gt.csv");
        fs::write(&path, GROUND_TRUTH).unwrap();
        GroundTruth::load(&path, dir, None).unwrap()
    }

    fn model(
        dir: &Path,
        name: &str,
        params: &[(&str, &str)],
        scores: (f64, f64),
        predictions: Option<&[usize]>,
    ) -> ModelInfo {
        let root = dir.join(format!("{name}-{}", params.iter().map(|p| p.1).collect::<Vec<_>>().join("-")));
        fs::create_dir_all(root.join("pred/no_unknown")).unwrap();
        let log = root.join("log.csv");
        fs::write(&log, log_csv(scores.0, scores.1)).unwrap();

        if let Some(predictions) = predictions {
            let mut csv = String::from("image,pred_category\n");
            for (i, p) in predictions.iter().enumerate() {
                csv.push_str(&format!("img{i},{p}\n"));
            }
            for checkpoint in Checkpoint::all() {
                let path = root.join(format!("pred/no_unknown/{}.csv", checkpoint.file_stem()));
                fs::write(path, &csv).unwrap();
            }
        }

        ModelInfo {
            model: name.to_string(),
            hyperparameters: params
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            log,
            pred_test: predictions.map(|_| root.join("pred")),
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_complexity_graph_panels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, log_csv(0.7, 0.6)).unwrap();
        let log = TrainingLog::load(&path).unwrap();

        let svg = complexity_graph(
            &log,
            &ComplexityOptions {
                title: "DenseNet201".to_string(),
                feature_extract_epochs: Some(2),
                ..ComplexityOptions::default()
            },
        )
        .unwrap();
        assert!(svg.contains("Training and Validation Loss"));
        assert!(svg.contains("Training and Validation Accuracy"));
        assert!(svg.contains("Learning rate over epochs"));
        assert!(svg.contains(FINE_TUNING_LABEL));
        assert!(svg.contains(">DenseNet201<"));
    }

    #[test]
    fn test_complexity_graph_requires_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, "epoch,loss\n0,1.0\n").unwrap();
        let log = TrainingLog::load(&path).unwrap();
        assert!(matches!(
            complexity_graph(&log, &ComplexityOptions::default()),
            Err(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_grouped_bars_checks_shapes() {
        let opts = BarOptions::default();
        let x = names(&["a", "b"]);
        let svg = grouped_bars(&[vec![1.0, 2.0], vec![3.0, 4.0]], &names(&["s1", "s2"]), &x, &opts).unwrap();
        assert!(svg.contains(">s2<"));
        assert!(grouped_bars(&[vec![1.0]], &names(&["s1"]), &x, &opts).is_err());
        assert!(grouped_bars(&[vec![1.0, 2.0]], &names(&[]), &x, &opts).is_err());
    }

    #[test]
    fn test_confusion_matrix_uses_class_names() {
        let classes = names(&["MEL", "NV", "BCC"]);
        let svg = confusion_matrix(&[0, 0, 1, 2], &[0, 1, 1, 2], &classes, true, "Normalized").unwrap();
        assert!(svg.contains(">BCC<"));
        assert!(svg.contains(">0.50<"));
        assert!(svg.contains("True Label"));
        assert!(svg.contains("Predicted Label"));
    }

    #[test]
    fn test_prob_bars_keeps_topk() {
        let labels = names(&["MEL", "NV", "BCC"]);
        let svg = prob_bars("MEL", "Predicted: MEL", "img.jpg", &labels, &[0.7, 0.2, 0.1], 2, Some("ISIC_1")).unwrap();
        assert!(svg.contains(">NV<"));
        assert!(!svg.contains(">BCC<"));
        assert!(svg.contains(">7.0e-01<"));
        assert!(svg.contains(r#"href="img.jpg""#));
        assert!(prob_bars("", "", "", &labels, &[1.0], 1, None).is_err());
    }

    #[test]
    fn test_class_distribution_fills_missing() {
        let counts: BTreeMap<usize, usize> = [(0, 12), (2, 3)].into_iter().collect();
        let svg = class_distribution(&names(&["MEL", "NV", "BCC"]), &counts);
        assert!(svg.contains(">12<"));
        assert!(svg.contains(">0<"));
        assert!(svg.contains("Number of Images"));
    }

    #[test]
    fn test_hyperparameter_over_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let models = vec![
            model(dir.path(), "DenseNet201", &[("lr", "0.01"), ("batch_size", "32")], (0.8, 0.7), None),
            model(dir.path(), "DenseNet201", &[("lr", "0.001"), ("batch_size", "32")], (0.9, 0.8), None),
            model(dir.path(), "ResNet152", &[("lr", "0.1"), ("batch_size", "32")], (0.5, 0.5), None),
        ];
        let opts = SweepOptions {
            hyperparameter: "lr".to_string(),
            hyperparameter_label: "Learning rate".to_string(),
            subtitle: true,
            ..SweepOptions::default()
        };

        let svg = hyperparameter_over_epochs(&models, &opts).unwrap().unwrap();
        let small = svg.find("Learning rate=0.001 (Train)").unwrap();
        let large = svg.find("Learning rate=0.01 (Train)").unwrap();
        assert!(small < large);
        assert!(svg.contains("Learning rate=0.01 (Validation)"));
        assert!(!svg.contains("0.1 (Train)"));
        assert!(svg.contains("batch_size=32"));

        let missing = SweepOptions {
            model: "VGG16".to_string(),
            ..opts.clone()
        };
        assert_eq!(hyperparameter_over_epochs(&models, &missing).unwrap(), None);

        let lr = SweepOptions {
            metric: "lr".to_string(),
            ..opts
        };
        let svg = lr_over_epochs(&models, &lr).unwrap().unwrap();
        assert!(svg.contains("Learning rate=0.001"));
        assert!(!svg.contains("(Train)"));
    }

    #[test]
    fn test_model_comparison_sorted_by_first_score() {
        let dir = tempfile::tempdir().unwrap();
        let gt = ground_truth(dir.path());
        let models = vec![
            model(dir.path(), "A", &[], (0.9, 0.8), Some(&[0, 0, 1, 1])),
            model(dir.path(), "B", &[], (0.9, 0.8), Some(&[0, 1, 1, 1])),
            model(dir.path(), "C", &[], (0.9, 0.8), None),
        ];
        let scores = vec![
            (ScoreKind::BalancedAccuracy, "BMA".to_string()),
            (ScoreKind::Accuracy, "Accuracy".to_string()),
        ];
        let svg = model_comparison(&models, &gt, &scores, &ComparisonOptions::default())
            .unwrap()
            .unwrap();
        assert!(svg.find(">B<").unwrap() < svg.find(">A<").unwrap());
        assert!(!svg.contains(">C<"));
        assert!(svg.contains(">75.00<"));
        assert!(svg.contains(">100.00<"));
        assert!(svg.contains("Metric Score (%)"));

        let only_c = ComparisonOptions {
            names: Some(names(&["C"])),
            ..ComparisonOptions::default()
        };
        assert_eq!(model_comparison(&models, &gt, &scores, &only_c).unwrap(), None);
        assert!(model_comparison(&models, &gt, &[], &ComparisonOptions::default()).is_err());
    }

    #[test]
    fn test_checkpoint_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let gt = ground_truth(dir.path());
        let with = model(dir.path(), "A", &[], (0.9, 0.8), Some(&[0, 1, 1, 1]));
        let svg = checkpoint_comparison(&with, &gt, "A").unwrap().unwrap();
        for checkpoint in Checkpoint::all() {
            assert!(svg.contains(checkpoint.label()));
        }
        assert!(svg.contains("BMA (%)"));

        let without = model(dir.path(), "B", &[], (0.9, 0.8), None);
        assert_eq!(checkpoint_comparison(&without, &gt, "B").unwrap(), None);
    }

    #[test]
    fn test_model_comparison_balanced_acc_labels_by_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let gt = ground_truth(dir.path());
        let models = vec![
            model(dir.path(), "A", &[("dropout", "0.5")], (0.91, 0.82), Some(&[0, 0, 1, 1])),
            model(dir.path(), "A", &[("dropout", "0.2")], (0.95, 0.85), Some(&[0, 1, 1, 1])),
        ];
        let opts = ComparisonOptions {
            parameter: Some("dropout".to_string()),
            ..ComparisonOptions::default()
        };
        let svg = model_comparison_balanced_acc(&models, &gt, &opts).unwrap().unwrap();
        assert!(svg.find(">0.2<").unwrap() < svg.find(">0.5<").unwrap());
        assert!(svg.contains(">91<"));
        assert!(svg.contains(">85<"));
        assert!(svg.contains("BMA (%)"));

        let bad = ComparisonOptions {
            parameter: Some("missing".to_string()),
            ..ComparisonOptions::default()
        };
        assert!(model_comparison_balanced_acc(&models, &gt, &bad).is_err());
    }

    #[test]
    fn test_model_parameter_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let a = model(dir.path(), "Big", &[], (0.9, 0.8), None);
        let b = model(dir.path(), "Small", &[], (0.7, 0.6), None);
        let parameters: BTreeMap<String, f64> =
            [("Big".to_string(), 20.0), ("Small".to_string(), 5.0)].into_iter().collect();
        let opts = ParameterComparisonOptions {
            parameter_label: "Parameters (M)".to_string(),
            ..ParameterComparisonOptions::default()
        };

        let svg = model_parameter_comparison(&[&a, &b], &parameters, &opts).unwrap();
        assert!(svg.contains("BMA (validation)"));
        assert_eq!(svg.matches(">Small<").count(), 4);
        assert_eq!(svg.matches("<circle").count(), 8);

        let partial: BTreeMap<String, f64> = [("Big".to_string(), 20.0)].into_iter().collect();
        assert!(model_parameter_comparison(&[&a, &b], &partial, &opts).is_err());
    }

    #[test]
    fn test_hyperparameter_comparison_modes() {
        let dir = tempfile::tempdir().unwrap();
        let gt = ground_truth(dir.path());
        let a = model(dir.path(), "A", &[("batch_size", "64")], (0.9, 0.8), Some(&[0, 0, 1, 1]));
        let b = model(dir.path(), "A", &[("batch_size", "16")], (0.7, 0.6), Some(&[0, 1, 1, 1]));
        let models = [&a, &b];

        let lines = hyperparameter_comparison(&models, "batch_size", Some(&gt), &HyperparameterComparisonOptions::default())
            .unwrap();
        assert!(lines.contains("Test BMA"));
        assert!(lines.contains("Validation Accuracy"));

        let no_test = hyperparameter_comparison(&models, "batch_size", None, &HyperparameterComparisonOptions::default())
            .unwrap();
        assert!(!no_test.contains("Test BMA"));

        let bars = HyperparameterComparisonOptions {
            bars: true,
            ..HyperparameterComparisonOptions::default()
        };
        let svg = hyperparameter_comparison(&models, "batch_size", Some(&gt), &bars).unwrap();
        assert!(svg.find(">16<").unwrap() < svg.find(">64<").unwrap());
        assert!(svg.contains(">Test<"));
        assert!(svg.contains(">100<"));

        assert!(hyperparameter_comparison(&[], "batch_size", None, &bars).is_err());
    }

    #[test]
    fn test_multi_metrics_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let gt = ground_truth(dir.path());
        let a = model(dir.path(), "A", &[("epochs", "10")], (0.9, 0.8), Some(&[0, 0, 1, 1]));
        let svg = hyperparameter_comparison_multi_metrics(
            &[&a],
            "epochs",
            Some(&gt),
            &HyperparameterComparisonOptions::multi_metrics(),
        )
        .unwrap();
        assert!(svg.contains(">Train<"));
        assert!(svg.contains(">Test<"));
        assert!(svg.contains("BMA(%)"));
        assert!(svg.contains(colors::GREEN));
    }
}
