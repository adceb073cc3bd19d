//! Grouped bar charts, vertical or horizontal.

use std::fmt::Write as _;

use crate::plot::figure::Panel;
use crate::plot::svg::{
    AxisTitles, LegendEntry, LegendMark, Rect, Scale, AxisScale, draw_axes, draw_legend, draw_x_ticks,
    draw_y_ticks, escape, format_scientific, format_value,
};

/// Direction bars grow in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Vertical,
    /// Categories run top to bottom in the order given.
    Horizontal,
}

/// Text drawn at the end of every bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueLabels {
    None,
    /// Integers without decimals, other values as written.
    #[default]
    Natural,
    /// Fixed number of decimals.
    Fixed(usize),
    /// Scientific notation with the given mantissa precision.
    Scientific(usize),
}

impl ValueLabels {
    fn format(self, v: f64) -> Option<String> {
        match self {
            Self::None => None,
            Self::Natural => Some(format_value(v)),
            Self::Fixed(decimals) => Some(format!("{v:.decimals$}")),
            Self::Scientific(precision) => Some(format_scientific(v, precision)),
        }
    }
}

/// One bar per category, drawn in one colour.
#[derive(Debug, Clone, PartialEq)]
pub struct BarGroup {
    pub name: String,
    pub color: String,
    pub values: Vec<f64>,
}

impl BarGroup {
    pub fn new(name: impl Into<String>, color: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            values,
        }
    }
}

/// Bar width for `groups` bars sharing a category slot.
#[must_use]
pub fn default_bar_width(groups: usize) -> f64 {
    match groups {
        0 | 1 => 0.8,
        2 => 0.42,
        3 => 0.32,
        n => 0.9 / n as f64,
    }
}

/// A single bar-chart panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarChart {
    titles: AxisTitles,
    categories: Vec<String>,
    groups: Vec<BarGroup>,
    orientation: Orientation,
    bar_width: Option<f64>,
    value_min: Option<f64>,
    value_max: Option<f64>,
    labels: ValueLabels,
    grid: bool,
    legend: bool,
}

impl BarChart {
    pub fn new(title: impl Into<String>, categories: Vec<String>) -> Self {
        Self {
            titles: AxisTitles {
                title: title.into(),
                ..AxisTitles::default()
            },
            categories,
            legend: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn x_label(mut self, label: impl Into<String>) -> Self {
        self.titles.x_label = label.into();
        self
    }

    #[must_use]
    pub fn y_label(mut self, label: impl Into<String>) -> Self {
        self.titles.y_label = label.into();
        self
    }

    #[must_use]
    pub fn group(mut self, group: BarGroup) -> Self {
        self.groups.push(group);
        self
    }

    #[must_use]
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Width of one bar as a fraction of the category slot.
    #[must_use]
    pub fn bar_width(mut self, width: f64) -> Self {
        self.bar_width = Some(width);
        self
    }

    /// Fix either end of the value axis.
    #[must_use]
    pub fn value_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.value_min = min;
        self.value_max = max;
        self
    }

    #[must_use]
    pub fn labels(mut self, labels: ValueLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Grid lines along the value axis.
    #[must_use]
    pub fn grid(mut self, grid: bool) -> Self {
        self.grid = grid;
        self
    }

    #[must_use]
    pub fn legend(mut self, legend: bool) -> Self {
        self.legend = legend;
        self
    }

    fn value_domain(&self) -> (f64, f64) {
        let values: Vec<f64> = self
            .groups
            .iter()
            .flat_map(|g| g.values.iter().copied())
            .filter(|v| v.is_finite())
            .collect();
        let data_min = values.iter().copied().fold(0.0, f64::min);
        let data_max = values.iter().copied().fold(0.0, f64::max);
        let headroom = if self.labels == ValueLabels::None { 1.05 } else { 1.12 };
        (
            self.value_min.unwrap_or(data_min),
            self.value_max.unwrap_or(if data_max > 0.0 { data_max * headroom } else { 1.0 }),
        )
    }
}

impl Panel for BarChart {
    fn render(&self, out: &mut String, area: Rect) {
        let horizontal = self.orientation == Orientation::Horizontal;
        let left = if horizontal {
            let longest = self.categories.iter().map(|c| c.chars().count()).max().unwrap_or(0);
            (16.0 + longest as f64 * 6.5).max(56.0)
        } else {
            56.0
        };
        let plot = self.titles.plot_area(area, left, 16.0);
        self.titles.draw(out, area, plot);

        let (v_min, v_max) = self.value_domain();
        let n = self.categories.len().max(1);
        let width = self.bar_width.unwrap_or_else(|| default_bar_width(self.groups.len()));
        let offset0 = -(self.groups.len().saturating_sub(1) as f64) / 2.0 * width;

        // Category axis runs over slots [-0.5, n - 0.5].
        let (values, slots) = if horizontal {
            (
                Scale::new(v_min, v_max, plot.x, plot.right(), AxisScale::Linear),
                Scale::new(-0.5, n as f64 - 0.5, plot.y, plot.bottom(), AxisScale::Linear),
            )
        } else {
            (
                Scale::new(v_min, v_max, plot.bottom(), plot.y, AxisScale::Linear),
                Scale::new(-0.5, n as f64 - 0.5, plot.x, plot.right(), AxisScale::Linear),
            )
        };

        let ticks = values.ticks(6, false);
        if horizontal {
            draw_x_ticks(out, plot, &values, &ticks, self.grid);
        } else {
            draw_y_ticks(out, plot, &values, &ticks, self.grid);
        }

        for (i, category) in self.categories.iter().enumerate() {
            let pos = slots.map(i as f64);
            if horizontal {
                let _ = writeln!(
                    out,
                    r#"<text x="{:.2}" y="{:.2}" text-anchor="end" class="tick-label">{}</text>"#,
                    plot.x - 6.0,
                    pos + 4.0,
                    escape(category)
                );
            } else {
                let _ = writeln!(
                    out,
                    r#"<text x="{pos:.2}" y="{:.2}" text-anchor="middle" class="tick-label">{}</text>"#,
                    plot.bottom() + 16.0,
                    escape(category)
                );
            }
        }

        let slot_px = (slots.map(1.0) - slots.map(0.0)).abs();
        let thickness = slot_px * width;
        let base = values.map(v_min.max(0.0).min(v_max));

        for (g, group) in self.groups.iter().enumerate() {
            let offset = offset0 + g as f64 * width;
            for (i, &v) in group.values.iter().enumerate().take(self.categories.len()) {
                if !v.is_finite() {
                    continue;
                }
                let center = slots.map(i as f64 + offset);
                let end = values.map(v);
                let label = self.labels.format(v);
                if horizontal {
                    let (x, w) = (base.min(end), (end - base).abs());
                    let _ = writeln!(
                        out,
                        r#"<rect x="{x:.2}" y="{:.2}" width="{w:.2}" height="{thickness:.2}" fill="{}"/>"#,
                        center - thickness / 2.0,
                        group.color
                    );
                    if let Some(text) = label {
                        let _ = writeln!(
                            out,
                            r#"<text x="{:.2}" y="{:.2}" class="value-label">{text}</text>"#,
                            end + 4.0,
                            center + 3.5
                        );
                    }
                } else {
                    let (y, h) = (base.min(end), (end - base).abs());
                    let _ = writeln!(
                        out,
                        r#"<rect x="{:.2}" y="{y:.2}" width="{thickness:.2}" height="{h:.2}" fill="{}"/>"#,
                        center - thickness / 2.0,
                        group.color
                    );
                    if let Some(text) = label {
                        let _ = writeln!(
                            out,
                            r#"<text x="{center:.2}" y="{:.2}" text-anchor="middle" class="value-label">{text}</text>"#,
                            end - 3.0
                        );
                    }
                }
            }
        }

        draw_axes(out, plot);

        if self.legend {
            let entries: Vec<LegendEntry> = self
                .groups
                .iter()
                .filter(|g| !g.name.is_empty())
                .map(|g| LegendEntry {
                    label: g.name.clone(),
                    color: g.color.clone(),
                    mark: LegendMark::Swatch,
                })
                .collect();
            draw_legend(out, plot, &entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::svg::colors;

    fn categories() -> Vec<String> {
        vec!["MEL".into(), "NV".into(), "BCC".into()]
    }

    #[test]
    fn test_default_widths() {
        assert_eq!(default_bar_width(2), 0.42);
        assert_eq!(default_bar_width(3), 0.32);
        assert!((default_bar_width(6) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_vertical_grouped_bars() {
        let svg = BarChart::new("Counts", categories())
            .group(BarGroup::new("Train", colors::BLUE, vec![10.0, 20.0, 5.0]))
            .group(BarGroup::new("Test", colors::ORANGE, vec![1.0, 2.5, 0.0]))
            .to_svg(600, 300);
        // 6 bars + 2 legend swatches + background
        assert_eq!(svg.matches("<rect").count(), 6 + 2 + 1 + 1);
        assert!(svg.contains(">20<"));
        assert!(svg.contains(">2.5<"));
        assert!(svg.contains(">BCC<"));
    }

    #[test]
    fn test_horizontal_first_category_on_top() {
        let svg = BarChart::new("", vec!["top".into(), "bottom".into()])
            .orientation(Orientation::Horizontal)
            .labels(ValueLabels::Fixed(2))
            .legend(false)
            .group(BarGroup::new("", colors::BLUE, vec![50.0, 75.5]))
            .to_svg(400, 200);
        let y_of = |label: &str| -> f64 {
            let line = svg.lines().find(|l| l.ends_with(&format!(">{label}</text>"))).unwrap();
            let start = line.find("y=\"").unwrap() + 3;
            line[start..].split('"').next().unwrap().parse().unwrap()
        };
        assert!(y_of("top") < y_of("bottom"));
        assert!(svg.contains(">75.50<"));
    }

    #[test]
    fn test_scientific_labels_and_fixed_range() {
        let svg = BarChart::new("p", vec!["a".into()])
            .orientation(Orientation::Horizontal)
            .value_range(Some(0.0), Some(1.0))
            .labels(ValueLabels::Scientific(1))
            .group(BarGroup::new("", colors::BLUE, vec![0.25]))
            .to_svg(400, 200);
        assert!(svg.contains(">2.5e-01<"));
    }
}
