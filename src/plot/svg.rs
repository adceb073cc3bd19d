//! SVG building blocks shared by every chart: document shell with light and
//! dark mode CSS, axis scales, tick generation, legends and colours.

use std::fmt::Write as _;

/// Rectangle in SVG user units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    #[must_use]
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Shrink by the given margins.
    #[must_use]
    pub fn inset(&self, top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            x: self.x + left,
            y: self.y + top,
            width: (self.width - left - right).max(1.0),
            height: (self.height - top - bottom).max(1.0),
        }
    }
}

/// Linear or base-10 logarithmic axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AxisScale {
    #[default]
    Linear,
    Log,
}

/// Maps data values onto a pixel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub min: f64,
    pub max: f64,
    start: f64,
    end: f64,
    kind: AxisScale,
}

impl Scale {
    /// Scale mapping `[min, max]` to `[start, end]`. A degenerate domain is
    /// widened so mapping stays finite.
    #[must_use]
    pub fn new(min: f64, max: f64, start: f64, end: f64, kind: AxisScale) -> Self {
        let (mut min, mut max) = (min, max);
        if kind == AxisScale::Log {
            min = min.max(f64::MIN_POSITIVE);
            max = max.max(min * 10.0);
        }
        if max <= min {
            let pad = if min == 0.0 { 0.5 } else { min.abs() * 0.05 };
            min -= pad;
            max += pad;
        }
        Self {
            min,
            max,
            start,
            end,
            kind,
        }
    }

    #[must_use]
    pub fn map(&self, v: f64) -> f64 {
        let frac = match self.kind {
            AxisScale::Linear => (v - self.min) / (self.max - self.min),
            AxisScale::Log => {
                let v = v.max(self.min);
                (v.log10() - self.min.log10()) / (self.max.log10() - self.min.log10())
            }
        };
        self.start + frac * (self.end - self.start)
    }

    /// Tick positions inside the domain.
    #[must_use]
    pub fn ticks(&self, target: usize, integer: bool) -> Vec<f64> {
        match self.kind {
            AxisScale::Linear => nice_ticks(self.min, self.max, target, integer),
            AxisScale::Log => {
                let first = (self.min.log10() - 1e-9).ceil() as i32;
                let last = (self.max.log10() + 1e-9).floor() as i32;
                (first..=last).map(|e| 10f64.powi(e)).collect()
            }
        }
    }
}

/// Round-number ticks (steps of 1, 2 or 5 times a power of ten).
#[must_use]
pub fn nice_ticks(min: f64, max: f64, target: usize, integer: bool) -> Vec<f64> {
    if !(max > min) || target == 0 {
        return vec![min];
    }
    let step = nice_step((max - min) / target as f64);
    let step = if integer { step.max(1.0).round() } else { step };

    // Round to the step's precision so 3 * 0.2 reads as 0.6.
    let precision = 10f64.powi((-step.log10().floor()).max(0.0) as i32);
    let first = (min / step).ceil();
    let mut ticks = Vec::new();
    let mut k = 0.0;
    loop {
        let v = (first + k) * step;
        if v > max + step * 1e-9 {
            break;
        }
        ticks.push((v * precision).round() / precision);
        k += 1.0;
    }
    ticks
}

fn nice_step(raw: f64) -> f64 {
    let magnitude = 10f64.powf(raw.log10().floor());
    let norm = raw / magnitude;
    let factor = if norm < 1.5 {
        1.0
    } else if norm < 3.0 {
        2.0
    } else if norm < 7.0 {
        5.0
    } else {
        10.0
    };
    factor * magnitude
}

/// Format a tick value with as many decimals as the tick spacing needs.
#[must_use]
pub fn format_tick(v: f64, ticks: &[f64]) -> String {
    let step = ticks
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(f64::INFINITY, f64::min);
    if v != 0.0 && (v.abs() < 1e-3 || v.abs() >= 1e6) {
        return format_scientific(v, 1);
    }
    let decimals = if step.is_finite() && step > 0.0 {
        (-step.log10().floor()).clamp(0.0, 6.0) as usize
    } else {
        2
    };
    format!("{v:.decimals$}")
}

/// Scientific notation with a signed two-digit exponent, e.g. `5.0e-01`.
#[must_use]
pub fn format_scientific(v: f64, precision: usize) -> String {
    let raw = format!("{v:.precision$e}");
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => raw,
    }
}

/// Format a bar value the way it reads naturally: integers without a
/// decimal point, other values as written.
#[must_use]
pub fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Escape text for use in SVG content and attributes.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"<style>
  :root {
    --bg-color: #ffffff;
    --text-color: #1a1a1a;
    --grid-color: #e0e0e0;
    --axis-color: #333333;
    --legend-bg: #ffffff;
    --legend-border: #cccccc;
  }
  @media (prefers-color-scheme: dark) {
    :root {
      --bg-color: #1a1a1a;
      --text-color: #e0e0e0;
      --grid-color: #404040;
      --axis-color: #b0b0b0;
      --legend-bg: #2a2a2a;
      --legend-border: #505050;
    }
  }
  .background { fill: var(--bg-color); }
  .suptitle { font: bold 18px system-ui, sans-serif; fill: var(--text-color); }
  .title { font: bold 14px system-ui, sans-serif; fill: var(--text-color); }
  .axis-label { font: 13px system-ui, sans-serif; fill: var(--text-color); }
  .tick-label { font: 11px system-ui, sans-serif; fill: var(--text-color); }
  .value-label { font: 10px system-ui, sans-serif; fill: var(--text-color); }
  .annotation { font: 10px system-ui, sans-serif; fill: var(--text-color); }
  .legend { font: 12px system-ui, sans-serif; fill: var(--text-color); }
  .grid { stroke: var(--grid-color); stroke-width: 1; }
  .axis { stroke: var(--axis-color); stroke-width: 1.5; }
  .legend-bg { fill: var(--legend-bg); stroke: var(--legend-border); }
  .cell-dark { font: 11px system-ui, sans-serif; fill: #1a1a1a; }
  .cell-light { font: 11px system-ui, sans-serif; fill: #ffffff; }
</style>
"#;

/// Wrap rendered content in an SVG document with background and CSS.
#[must_use]
pub fn document(width: u32, height: u32, body: &str) -> String {
    let mut svg = String::with_capacity(body.len() + 2048);
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        width, height, width, height
    );
    svg.push_str(STYLE);
    let _ = writeln!(
        svg,
        r#"<rect class="background" width="{}" height="{}"/>"#,
        width, height
    );
    svg.push_str(body);
    svg.push_str("</svg>\n");
    svg
}

/// Panel title, axis labels, and the plot area left after reserving room
/// for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisTitles {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl AxisTitles {
    /// Plot area inside `area` with the given extra left margin for tick labels.
    #[must_use]
    pub fn plot_area(&self, area: Rect, left: f64, right: f64) -> Rect {
        let top = if self.title.is_empty() { 14.0 } else { 34.0 };
        let bottom = if self.x_label.is_empty() { 28.0 } else { 50.0 };
        let left = if self.y_label.is_empty() { left } else { left + 22.0 };
        area.inset(top, right, bottom, left)
    }

    pub fn draw(&self, out: &mut String, area: Rect, plot: Rect) {
        if !self.title.is_empty() {
            let _ = writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" class="title">{}</text>"#,
                plot.center_x(),
                area.y + 22.0,
                escape(&self.title)
            );
        }
        if !self.x_label.is_empty() {
            let _ = writeln!(
                out,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" class="axis-label">{}</text>"#,
                plot.center_x(),
                area.bottom() - 10.0,
                escape(&self.x_label)
            );
        }
        if !self.y_label.is_empty() {
            let x = area.x + 16.0;
            let y = plot.center_y();
            let _ = writeln!(
                out,
                r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" class="axis-label" transform="rotate(-90 {x:.2} {y:.2})">{}</text>"#,
                escape(&self.y_label)
            );
        }
    }
}

/// Draw the x and y axis lines along the bottom and left of `plot`.
pub fn draw_axes(out: &mut String, plot: Rect) {
    let _ = writeln!(
        out,
        r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" class="axis"/>"#,
        plot.x,
        plot.bottom(),
        plot.right(),
        plot.bottom()
    );
    let _ = writeln!(
        out,
        r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" class="axis"/>"#,
        plot.x,
        plot.y,
        plot.x,
        plot.bottom()
    );
}

/// Vertical grid lines and labels for x ticks.
pub fn draw_x_ticks(out: &mut String, plot: Rect, scale: &Scale, ticks: &[f64], grid: bool) {
    for &t in ticks {
        let x = scale.map(t);
        if grid {
            let _ = writeln!(
                out,
                r#"<line x1="{x:.2}" y1="{:.2}" x2="{x:.2}" y2="{:.2}" class="grid"/>"#,
                plot.y,
                plot.bottom()
            );
        }
        let _ = writeln!(
            out,
            r#"<text x="{x:.2}" y="{:.2}" text-anchor="middle" class="tick-label">{}</text>"#,
            plot.bottom() + 16.0,
            format_tick(t, ticks)
        );
    }
}

/// Horizontal grid lines and labels for y ticks.
pub fn draw_y_ticks(out: &mut String, plot: Rect, scale: &Scale, ticks: &[f64], grid: bool) {
    for &t in ticks {
        let y = scale.map(t);
        if grid {
            let _ = writeln!(
                out,
                r#"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" class="grid"/>"#,
                plot.x,
                plot.right()
            );
        }
        let _ = writeln!(
            out,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end" class="tick-label">{}</text>"#,
            plot.x - 6.0,
            y + 4.0,
            format_tick(t, ticks)
        );
    }
}

/// How a legend entry is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum LegendMark {
    /// Short line segment with an SVG dash array.
    Line(Option<&'static str>),
    /// Filled square.
    Swatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
    pub mark: LegendMark,
}

/// Legend box in the top-right corner of `plot`.
pub fn draw_legend(out: &mut String, plot: Rect, entries: &[LegendEntry]) {
    if entries.is_empty() {
        return;
    }
    let longest = entries.iter().map(|e| e.label.chars().count()).max().unwrap_or(0);
    let width = 40.0 + longest as f64 * 6.5;
    let height = 10.0 + entries.len() as f64 * 18.0;
    let x = plot.right() - width - 8.0;
    let y = plot.y + 8.0;

    let _ = writeln!(
        out,
        r#"<rect x="{x:.2}" y="{y:.2}" width="{width:.2}" height="{height:.2}" rx="4" class="legend-bg" opacity="0.9"/>"#
    );
    for (i, entry) in entries.iter().enumerate() {
        let cy = y + 14.0 + i as f64 * 18.0;
        match entry.mark {
            LegendMark::Line(dash) => {
                let dash = dash.map(|d| format!(r#" stroke-dasharray="{d}""#)).unwrap_or_default();
                let _ = writeln!(
                    out,
                    r#"<line x1="{:.2}" y1="{cy:.2}" x2="{:.2}" y2="{cy:.2}" stroke="{}" stroke-width="2"{dash}/>"#,
                    x + 8.0,
                    x + 28.0,
                    entry.color
                );
            }
            LegendMark::Swatch => {
                let _ = writeln!(
                    out,
                    r#"<rect x="{:.2}" y="{:.2}" width="14" height="10" fill="{}"/>"#,
                    x + 11.0,
                    cy - 5.0,
                    entry.color
                );
            }
        }
        let _ = writeln!(
            out,
            r#"<text x="{:.2}" y="{:.2}" class="legend">{}</text>"#,
            x + 34.0,
            cy + 4.0,
            escape(&entry.label)
        );
    }
}

/// Colour at `t` in `[0, 1]` on a white-to-dark-blue ramp.
#[must_use]
pub fn blues(t: f64) -> String {
    const STOPS: [[f64; 3]; 9] = [
        [247.0, 251.0, 255.0],
        [222.0, 235.0, 247.0],
        [198.0, 219.0, 239.0],
        [158.0, 202.0, 225.0],
        [107.0, 174.0, 214.0],
        [66.0, 146.0, 198.0],
        [33.0, 113.0, 181.0],
        [8.0, 81.0, 156.0],
        [8.0, 48.0, 107.0],
    ];
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let pos = t * (STOPS.len() - 1) as f64;
    let i = (pos.floor() as usize).min(STOPS.len() - 2);
    let f = pos - i as f64;
    let channel = |c: usize| (STOPS[i][c] + (STOPS[i + 1][c] - STOPS[i][c]) * f).round() as u8;
    format!("#{:02x}{:02x}{:02x}", channel(0), channel(1), channel(2))
}

/// Chart colour palette.
pub mod colors {
    pub const BLUE: &str = "#1f77b4";
    pub const ORANGE: &str = "#ff7f0e";
    pub const GREEN: &str = "#2ca02c";
    pub const RED: &str = "#d62728";
    pub const PURPLE: &str = "#9467bd";
    pub const BROWN: &str = "#8c564b";
    pub const PINK: &str = "#e377c2";
    pub const GRAY: &str = "#7f7f7f";
    pub const OLIVE: &str = "#bcbd22";
    pub const CYAN: &str = "#17becf";
    pub const YELLOW: &str = "#f1c40f";
    pub const MAGENTA: &str = "#c0398f";
    pub const DARK: &str = "#34495e";

    /// Default cycle for series and bar groups.
    pub const CYCLE: [&str; 10] = [BLUE, ORANGE, GREEN, RED, PURPLE, BROWN, PINK, GRAY, OLIVE, CYAN];

    /// Cycle for hyperparameter sweeps.
    pub const SWEEP: [&str; 7] = [RED, GREEN, BLUE, YELLOW, MAGENTA, DARK, CYAN];

    /// Colour `i` of the default cycle.
    #[must_use]
    pub fn cycle(i: usize) -> &'static str {
        CYCLE[i % CYCLE.len()]
    }
}
