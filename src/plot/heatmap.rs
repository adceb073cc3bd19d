//! Annotated heatmaps and image panels.

use std::fmt::Write as _;

use crate::plot::figure::Panel;
use crate::plot::svg::{AxisTitles, Rect, blues, escape};

/// Matrix drawn as coloured cells with the value printed in each cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    titles: AxisTitles,
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    values: Vec<Vec<f64>>,
    decimals: usize,
}

impl Heatmap {
    pub fn new(title: impl Into<String>, values: Vec<Vec<f64>>) -> Self {
        Self {
            titles: AxisTitles {
                title: title.into(),
                ..AxisTitles::default()
            },
            row_labels: Vec::new(),
            col_labels: Vec::new(),
            values,
            decimals: 2,
        }
    }

    #[must_use]
    pub fn labels(mut self, rows: Vec<String>, cols: Vec<String>) -> Self {
        self.row_labels = rows;
        self.col_labels = cols;
        self
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

    /// Decimals in cell annotations.
    #[must_use]
    pub fn decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals;
        self
    }

    fn range(&self) -> (f64, f64) {
        let finite = self.values.iter().flatten().copied().filter(|v| v.is_finite());
        let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if min.is_finite() { (min, max) } else { (0.0, 1.0) }
    }
}

impl Panel for Heatmap {
    fn render(&self, out: &mut String, area: Rect) {
        let rows = self.values.len();
        let cols = self.values.iter().map(Vec::len).max().unwrap_or(0);

        let longest_row = self.row_labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let left = (12.0 + longest_row as f64 * 7.0).max(40.0);
        let plot = self.titles.plot_area(area, left, 16.0);
        self.titles.draw(out, area, plot);
        if rows == 0 || cols == 0 {
            return;
        }

        let cell = (plot.width / cols as f64).min(plot.height / rows as f64);
        let grid_x = plot.x + (plot.width - cell * cols as f64) / 2.0;
        let grid_y = plot.y;

        let (min, max) = self.range();
        let norm = |v: f64| if max > min { (v - min) / (max - min) } else { 0.0 };
        let threshold = norm(max) / 2.0;
        let decimals = self.decimals;

        for (i, row) in self.values.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                let x = grid_x + j as f64 * cell;
                let y = grid_y + i as f64 * cell;
                let t = norm(v);
                let _ = writeln!(
                    out,
                    r#"<rect x="{x:.2}" y="{y:.2}" width="{cell:.2}" height="{cell:.2}" fill="{}"/>"#,
                    blues(t)
                );
                let class = if t > threshold { "cell-light" } else { "cell-dark" };
                let _ = writeln!(
                    out,
                    r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" class="{class}">{v:.decimals$}</text>"#,
                    x + cell / 2.0,
                    y + cell / 2.0 + 4.0
                );
            }
        }

        for (i, label) in self.row_labels.iter().enumerate().take(rows) {
            let _ = writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="end" class="tick-label">{}</text>"#,
                grid_x - 6.0,
                grid_y + (i as f64 + 0.5) * cell + 4.0,
                escape(label)
            );
        }
        for (j, label) in self.col_labels.iter().enumerate().take(cols) {
            let _ = writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" class="tick-label">{}</text>"#,
                grid_x + (j as f64 + 0.5) * cell,
                grid_y + rows as f64 * cell + 16.0,
                escape(label)
            );
        }
    }
}

/// A titled panel showing an image file by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePanel {
    title: String,
    href: String,
}

impl ImagePanel {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }
}

impl Panel for ImagePanel {
    fn render(&self, out: &mut String, area: Rect) {
        let inner = area.inset(34.0, 12.0, 12.0, 12.0);
        let _ = writeln!(
            out,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" class="title">{}</text>"#,
            area.center_x(),
            area.y + 22.0,
            escape(&self.title)
        );
        let _ = writeln!(
            out,
            r#"<image href="{href}" xlink:href="{href}" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" preserveAspectRatio="xMidYMid meet"/>"#,
            inner.x,
            inner.y,
            inner.width,
            inner.height,
            href = escape(&self.href)
        );
    }
}
