//! Comment callout layout.
//!
//! Text is wrapped with an average glyph width rather than real font metrics.
//! The estimate is tuned for Helvetica-like sans faces, which both the raster
//! text and the PDF text layer use.

use kurbo::{Point, Rect};
use pdfnote_core::projection::Callout;

/// Average Helvetica advance in ems.
pub const AVERAGE_CHAR_WIDTH: f64 = 0.5;
/// Line height as a multiple of the font size.
pub const LINE_HEIGHT: f64 = 1.16;

/// A callout with its text broken into lines.
#[derive(Debug, Clone, PartialEq)]
pub struct CalloutLayout {
    pub callout: Callout,
    pub lines: Vec<String>,
}

impl CalloutLayout {
    pub fn new(callout: Callout) -> Self {
        let per_line = (callout.width / (callout.font_size * AVERAGE_CHAR_WIDTH)).floor();
        let lines = wrap(&callout.text, (per_line as usize).max(1));
        Self { callout, lines }
    }

    pub fn line_height(&self) -> f64 {
        self.callout.font_size * LINE_HEIGHT
    }

    /// Background box. The bottom edge sits on the anchor.
    pub fn bounds(&self) -> Rect {
        let height = self.lines.len() as f64 * self.line_height();
        let anchor = self.callout.anchor;
        Rect::new(
            anchor.x,
            anchor.y - height,
            anchor.x + self.callout.width,
            anchor.y,
        )
    }

    /// Baseline origin of each line, top to bottom.
    pub fn baselines(&self) -> impl Iterator<Item = (Point, &str)> {
        let top = self.bounds().y0;
        let x = self.callout.anchor.x;
        let line_height = self.line_height();
        let ascent = self.callout.font_size;
        self.lines.iter().enumerate().map(move |(i, line)| {
            (
                Point::new(x, top + i as f64 * line_height + ascent),
                line.as_str(),
            )
        })
    }
}

fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.trim().lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut rest = word;
            while !rest.is_empty() {
                let len = rest.chars().count();
                let used = line.chars().count();
                let needed = if line.is_empty() { len } else { used + 1 + len };
                if needed <= max_chars {
                    if !line.is_empty() {
                        line.push(' ');
                    }
                    line.push_str(rest);
                    rest = "";
                } else if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                } else {
                    // Longer than a whole line: hard break.
                    let split = rest
                        .char_indices()
                        .nth(max_chars)
                        .map_or(rest.len(), |(i, _)| i);
                    lines.push(rest[..split].to_string());
                    rest = &rest[split..];
                }
            }
        }
        if !line.is_empty() || paragraph.trim().is_empty() {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfnote_core::shapes::SerializableColor;

    fn callout(text: &str, width: f64) -> Callout {
        Callout::above(
            Rect::new(100.0, 200.0, 100.0 + width, 260.0),
            1.0,
            text.to_string(),
            SerializableColor::black(),
        )
    }

    #[test]
    fn test_wrap_words() {
        assert_eq!(wrap("hello big world", 9), vec!["hello big", "world"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("one\n\ntwo", 10), vec!["one", "", "two"]);
    }

    #[test]
    fn test_short_text_is_one_line() {
        let layout = CalloutLayout::new(callout("Check this", 80.0));
        assert_eq!(layout.lines, vec!["Check this"]);
        // 150 units wide at 8pt fits 37 average glyphs.
        let long = "word ".repeat(20);
        assert!(CalloutLayout::new(callout(&long, 80.0)).lines.len() > 1);
    }

    #[test]
    fn test_box_grows_upward_from_anchor() {
        let layout = CalloutLayout::new(callout(&"word ".repeat(20), 80.0));
        let bounds = layout.bounds();
        assert!((bounds.y1 - 197.0).abs() < 1e-9);
        assert!((bounds.height() - layout.lines.len() as f64 * 8.0 * LINE_HEIGHT).abs() < 1e-9);
        assert!((bounds.width() - 150.0).abs() < 1e-9);

        let baselines: Vec<_> = layout.baselines().collect();
        assert_eq!(baselines.len(), layout.lines.len());
        assert!(baselines.iter().all(|(p, _)| p.y <= bounds.y1 && p.y > bounds.y0));
        assert!(baselines.windows(2).all(|w| w[0].0.y < w[1].0.y));
    }
}
