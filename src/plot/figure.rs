//! Figures: one or more panels laid out on a single SVG canvas.

use std::fmt::Write as _;

use crate::plot::svg::{Rect, document, escape};

/// Anything that can draw itself into a rectangle of a figure.
pub trait Panel {
    /// Append SVG elements for this panel inside `area`.
    fn render(&self, out: &mut String, area: Rect);

    /// Render as a standalone SVG document.
    fn to_svg(&self, width: u32, height: u32) -> String
    where
        Self: Sized,
    {
        let mut body = String::with_capacity(4096);
        self.render(&mut body, Rect::new(0.0, 0.0, f64::from(width), f64::from(height)));
        document(width, height, &body)
    }
}

/// How panels share the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    /// Stacked top to bottom, equal heights.
    Rows,
    /// Side by side with relative widths.
    Columns(Vec<f64>),
}

/// A canvas holding panels and an optional title across the top.
pub struct Figure {
    width: u32,
    height: u32,
    title: Option<String>,
    layout: Layout,
    panels: Vec<Box<dyn Panel>>,
}

impl Figure {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            title: None,
            layout: Layout::Rows,
            panels: Vec::new(),
        }
    }

    /// Title drawn above every panel; empty titles are ignored.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = (!title.is_empty()).then_some(title);
        self
    }

    #[must_use]
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn panel(mut self, panel: impl Panel + 'static) -> Self {
        self.panels.push(Box::new(panel));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Areas assigned to each panel.
    fn areas(&self) -> Vec<Rect> {
        let top = if self.title.is_some() { 36.0 } else { 0.0 };
        let canvas = Rect::new(0.0, top, f64::from(self.width), f64::from(self.height) - top);
        let n = self.panels.len();
        if n == 0 {
            return Vec::new();
        }

        match &self.layout {
            Layout::Rows => {
                let h = canvas.height / n as f64;
                (0..n)
                    .map(|i| Rect::new(canvas.x, canvas.y + i as f64 * h, canvas.width, h))
                    .collect()
            }
            Layout::Columns(ratios) => {
                let ratios: Vec<f64> = (0..n).map(|i| ratios.get(i).copied().unwrap_or(1.0)).collect();
                let total: f64 = ratios.iter().sum();
                let mut x = canvas.x;
                ratios
                    .iter()
                    .map(|r| {
                        let w = canvas.width * r / total;
                        let area = Rect::new(x, canvas.y, w, canvas.height);
                        x += w;
                        area
                    })
                    .collect()
            }
        }
    }

    /// Render every panel into one SVG document.
    #[must_use]
    pub fn render(&self) -> String {
        let mut body = String::with_capacity(8192);
        if let Some(title) = &self.title {
            let _ = writeln!(
                body,
                r#"<text x="{:.2}" y="26" text-anchor="middle" class="suptitle">{}</text>"#,
                f64::from(self.width) / 2.0,
                escape(title)
            );
        }
        for (panel, area) in self.panels.iter().zip(self.areas()) {
            let _ = writeln!(body, "<g>");
            panel.render(&mut body, area);
            let _ = writeln!(body, "</g>");
        }
        document(self.width, self.height, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(&'static str);

    impl Panel for Marker {
        fn render(&self, out: &mut String, area: Rect) {
            let _ = writeln!(
                out,
                r#"<rect id="{}" x="{:.0}" y="{:.0}" width="{:.0}" height="{:.0}"/>"#,
                self.0, area.x, area.y, area.width, area.height
            );
        }
    }

    #[test]
    fn test_rows_split_height() {
        let svg = Figure::new(100, 300)
            .panel(Marker("a"))
            .panel(Marker("b"))
            .panel(Marker("c"))
            .render();
        assert!(svg.contains(r#"id="b" x="0" y="100" width="100" height="100""#));
    }

    #[test]
    fn test_columns_use_ratios_and_title_space() {
        let figure = Figure::new(1200, 436)
            .title("Probabilities")
            .layout(Layout::Columns(vec![5.0, 7.0]))
            .panel(Marker("img"))
            .panel(Marker("bars"));
        assert_eq!(figure.len(), 2);
        let svg = figure.render();
        assert!(svg.contains("Probabilities"));
        assert!(svg.contains(r#"id="img" x="0" y="36" width="500" height="400""#));
        assert!(svg.contains(r#"id="bars" x="500" y="36" width="700""#));
    }

    #[test]
    fn test_panel_to_svg() {
        let svg = Marker("solo").to_svg(40, 20);
        assert!(svg.contains(r#"id="solo" x="0" y="0" width="40" height="20""#));
    }
}
