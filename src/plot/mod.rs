//! SVG charts for datasets and training experiments.
//!
//! Charts are plain SVG strings built by hand, styled for both light and dark
//! viewers. Low-level panels ([`LineChart`], [`BarChart`], [`Heatmap`],
//! [`ImagePanel`]) implement [`Panel`] and can be rendered on their own or
//! combined on a [`Figure`]. The functions re-exported from `figures` build
//! the standard experiment plots from logs, predictions and the model
//! registry.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lesion_balance::plot::{ComplexityOptions, complexity_graph};
//! use lesion_balance::results::TrainingLog;
//!
//! let log = TrainingLog::load("runs/densenet/log.csv")?;
//! let svg = complexity_graph(&log, &ComplexityOptions::default())?;
//! std::fs::write("complexity.svg", svg)?;
//! ```

mod bar;
mod figure;
mod figures;
mod heatmap;
mod line;
pub mod svg;

pub use bar::{BarChart, BarGroup, Orientation, ValueLabels, default_bar_width};
pub use figure::{Figure, Layout, Panel};
pub use figures::{
    BarOptions, ComparisonOptions, ComplexityOptions, HyperparameterComparisonOptions,
    ParameterComparisonOptions, SweepOptions, checkpoint_comparison, class_distribution,
    complexity_graph, confusion_matrix, grouped_bars, hyperparameter_comparison,
    hyperparameter_comparison_multi_metrics, hyperparameter_over_epochs, lr_over_epochs,
    model_comparison, model_comparison_balanced_acc, model_parameter_comparison, prob_bars,
};
pub use heatmap::{Heatmap, ImagePanel};
pub use line::{Annotation, LineChart, LineStyle, Series};
pub use svg::{AxisScale, colors};
