//! Line charts: metric curves over epochs and hyperparameter sweeps.

use std::fmt::Write as _;

use crate::plot::figure::Panel;
use crate::plot::svg::{
    AxisScale, AxisTitles, LegendEntry, LegendMark, Rect, Scale, colors, draw_axes, draw_legend,
    draw_x_ticks, draw_y_ticks, escape,
};

/// Stroke pattern of a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl LineStyle {
    fn dash_array(self) -> Option<&'static str> {
        match self {
            Self::Solid => None,
            Self::Dashed => Some("7 4"),
            Self::Dotted => Some("2 3"),
        }
    }
}

/// One curve. Points with a NaN coordinate break the line.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub color: String,
    pub style: LineStyle,
    pub markers: bool,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn new(name: impl Into<String>, color: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            style: LineStyle::Solid,
            markers: false,
            points,
        }
    }

    /// Series over `x` and `y` zipped together.
    pub fn from_xy(name: impl Into<String>, color: impl Into<String>, x: &[f64], y: &[f64]) -> Self {
        Self::new(name, color, x.iter().copied().zip(y.iter().copied()).collect())
    }

    #[must_use]
    pub fn style(mut self, style: LineStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn markers(mut self, markers: bool) -> Self {
        self.markers = markers;
        self
    }
}

/// Text placed at a data coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// A single line-chart panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineChart {
    titles: AxisTitles,
    series: Vec<Series>,
    x_min: Option<f64>,
    x_max: Option<f64>,
    y_min: Option<f64>,
    y_max: Option<f64>,
    x_scale: AxisScale,
    y_scale: AxisScale,
    marker: Option<(f64, String)>,
    annotations: Vec<Annotation>,
    grid: bool,
    integer_x: bool,
}

impl LineChart {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            titles: AxisTitles {
                title: title.into(),
                ..AxisTitles::default()
            },
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
    pub fn series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Fix either end of the x axis; `None` keeps the data bound.
    #[must_use]
    pub fn x_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.x_min = min;
        self.x_max = max;
        self
    }

    #[must_use]
    pub fn y_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.y_min = min;
        self.y_max = max;
        self
    }

    #[must_use]
    pub fn x_scale(mut self, scale: AxisScale) -> Self {
        self.x_scale = scale;
        self
    }

    #[must_use]
    pub fn y_scale(mut self, scale: AxisScale) -> Self {
        self.y_scale = scale;
        self
    }

    /// Vertical line at `x`, listed in the legend as `label`.
    #[must_use]
    pub fn vertical_marker(mut self, x: f64, label: impl Into<String>) -> Self {
        self.marker = Some((x, label.into()));
        self
    }

    #[must_use]
    pub fn annotate(mut self, x: f64, y: f64, text: impl Into<String>) -> Self {
        self.annotations.push(Annotation {
            x,
            y,
            text: text.into(),
        });
        self
    }

    #[must_use]
    pub fn grid(mut self, grid: bool) -> Self {
        self.grid = grid;
        self
    }

    /// Only put x ticks on whole numbers.
    #[must_use]
    pub fn integer_x(mut self, integer: bool) -> Self {
        self.integer_x = integer;
        self
    }

    #[must_use]
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    fn domain(&self) -> Option<((f64, f64), (f64, f64))> {
        let finite: Vec<(f64, f64)> = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().copied())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        if finite.is_empty() {
            return None;
        }
        let xs: Vec<f64> = finite.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = finite.iter().map(|p| p.1).collect();

        let (data_x_min, data_x_max) = bounds_with_padding(&xs, 0.0);
        let (data_y_min, data_y_max) = bounds_with_padding(&ys, 0.05);
        Some((
            (self.x_min.unwrap_or(data_x_min), self.x_max.unwrap_or(data_x_max)),
            (self.y_min.unwrap_or(data_y_min), self.y_max.unwrap_or(data_y_max)),
        ))
    }
}

impl Panel for LineChart {
    fn render(&self, out: &mut String, area: Rect) {
        let plot = self.titles.plot_area(area, 56.0, 16.0);
        self.titles.draw(out, area, plot);

        let Some(((x_min, x_max), (y_min, y_max))) = self.domain() else {
            draw_axes(out, plot);
            let _ = writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" class="axis-label">No data</text>"#,
                plot.center_x(),
                plot.center_y()
            );
            return;
        };

        let sx = Scale::new(x_min, x_max, plot.x, plot.right(), self.x_scale);
        let sy = Scale::new(y_min, y_max, plot.bottom(), plot.y, self.y_scale);

        let x_ticks = sx.ticks(8, self.integer_x);
        let y_ticks = sy.ticks(6, false);
        draw_x_ticks(out, plot, &sx, &x_ticks, self.grid);
        draw_y_ticks(out, plot, &sy, &y_ticks, self.grid);
        draw_axes(out, plot);

        let clip = format!("clip-{:.0}-{:.0}", area.x, area.y);
        let _ = writeln!(
            out,
            r#"<clipPath id="{clip}"><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/></clipPath>"#,
            plot.x, plot.y, plot.width, plot.height
        );
        let _ = writeln!(out, r#"<g clip-path="url(#{clip})">"#);

        let mut legend = Vec::with_capacity(self.series.len() + 1);
        for s in &self.series {
            let mut path = String::new();
            let mut pen_down = false;
            for &(x, y) in &s.points {
                if !(x.is_finite() && y.is_finite()) {
                    pen_down = false;
                    continue;
                }
                let cmd = if pen_down { " L" } else { " M" };
                let _ = write!(path, "{cmd} {:.2},{:.2}", sx.map(x), sy.map(y));
                pen_down = true;
            }
            let dash = s
                .style
                .dash_array()
                .map(|d| format!(r#" stroke-dasharray="{d}""#))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                r#"<path d="{}" stroke="{}" stroke-width="2" fill="none"{dash}/>"#,
                path.trim_start(),
                s.color
            );
            if s.markers {
                for &(x, y) in s.points.iter().filter(|(x, y)| x.is_finite() && y.is_finite()) {
                    let _ = writeln!(
                        out,
                        r#"<circle cx="{:.2}" cy="{:.2}" r="3.5" fill="{}"/>"#,
                        sx.map(x),
                        sy.map(y),
                        s.color
                    );
                }
            }
            legend.push(LegendEntry {
                label: s.name.clone(),
                color: s.color.clone(),
                mark: LegendMark::Line(s.style.dash_array()),
            });
        }

        if let Some((x, label)) = &self.marker {
            let px = sx.map(*x);
            let _ = writeln!(
                out,
                r#"<line x1="{px:.2}" y1="{:.2}" x2="{px:.2}" y2="{:.2}" stroke="{}" stroke-width="1.5"/>"#,
                plot.y,
                plot.bottom(),
                colors::GREEN
            );
            legend.push(LegendEntry {
                label: label.clone(),
                color: colors::GREEN.to_string(),
                mark: LegendMark::Line(None),
            });
        }

        for a in &self.annotations {
            let _ = writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" class="annotation">{}</text>"#,
                sx.map(a.x) + 3.0,
                sy.map(a.y) - 3.0,
                escape(&a.text)
            );
        }
        let _ = writeln!(out, "</g>");

        legend.retain(|e| !e.label.is_empty());
        draw_legend(out, plot, &legend);
    }
}

/// Min/max of `values`, widened by `padding` of the range on both sides.
fn bounds_with_padding(values: &[f64], padding: f64) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    (min - range * padding, max + range * padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart() -> LineChart {
        LineChart::new("Training and Validation Loss")
            .y_label("Loss")
            .series(Series::from_xy("Training Loss", colors::BLUE, &[0.0, 1.0, 2.0], &[1.5, 1.0, 0.7]))
            .series(
                Series::from_xy("Validation Loss", colors::ORANGE, &[0.0, 1.0, 2.0], &[1.6, f64::NAN, 0.9])
                    .style(LineStyle::Dashed),
            )
    }

    #[test]
    fn test_render_series_and_legend() {
        let svg = chart().y_range(Some(0.0), Some(2.0)).grid(true).to_svg(600, 300);
        assert!(svg.contains("Training and Validation Loss"));
        assert!(svg.contains("Validation Loss"));
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains(r#"stroke-dasharray="7 4""#));
        assert!(svg.contains(r#"class="grid""#));
    }

    #[test]
    fn test_nan_breaks_line() {
        let svg = chart().to_svg(600, 300);
        let dashed = svg
            .lines()
            .find(|l| l.contains("stroke-dasharray") && l.starts_with("<path"))
            .unwrap();
        assert_eq!(dashed.matches('M').count(), 2);
    }

    #[test]
    fn test_vertical_marker_in_legend() {
        let svg = chart().vertical_marker(1.0, "Start Fine Tuning").to_svg(600, 300);
        assert!(svg.contains("Start Fine Tuning"));
        assert!(svg.contains(colors::GREEN));
    }

    #[test]
    fn test_annotations_are_escaped() {
        let svg = chart().annotate(1.0, 1.0, "A<B").to_svg(600, 300);
        assert!(svg.contains("A&lt;B"));
    }

    #[test]
    fn test_empty_chart_says_no_data() {
        let svg = LineChart::new("Empty").to_svg(300, 200);
        assert!(svg.contains("No data"));
    }

    #[test]
    fn test_log_scale_renders() {
        let svg = LineChart::new("lr")
            .y_scale(AxisScale::Log)
            .series(Series::from_xy("lr", colors::RED, &[0.0, 1.0], &[1e-3, 1e-4]).markers(true))
            .to_svg(400, 200);
        assert_eq!(svg.matches("<circle").count(), 2);
    }
}
