//! Text drawn as single-element SVG fragments through resvg

use anyhow::Context;
use resvg::usvg::{self, fontdb};
use std::sync::Arc;
use tiny_skia::{Pixmap, Rect, Transform};

use crate::error::Result;
use crate::render::style::Color;

/// Average glyph advance as a fraction of the font size, used for layout
const ADVANCE_RATIO: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn as_svg(self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

/// One piece of text. `x`/`y` is the anchor point on the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpec {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size_px: f32,
    pub color: Color,
    pub anchor: Anchor,
    pub bold: bool,
    /// Rotation in degrees around the anchor point
    pub rotate: f32,
}

impl TextSpec {
    pub fn new(text: &str, x: f32, y: f32, size_px: f32, color: Color) -> Self {
        TextSpec {
            text: text.to_string(),
            x,
            y,
            size_px,
            color,
            anchor: Anchor::Start,
            bold: false,
            rotate: 0.0,
        }
    }

    pub fn anchored(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn rotated(mut self, degrees: f32) -> Self {
        self.rotate = degrees;
        self
    }

    /// Estimated extent, independent of the fonts installed. Only upright
    /// and quarter-turn text is supported.
    pub fn extent(&self) -> Option<Rect> {
        let w = estimate_width(&self.text, self.size_px).max(1.0);
        let ascent = self.size_px * 0.95;
        let descent = self.size_px * 0.3;
        let dx0 = match self.anchor {
            Anchor::Start => 0.0,
            Anchor::Middle => -w / 2.0,
            Anchor::End => -w,
        };
        // offsets from the anchor point: (left, top, right, bottom)
        let (l, t, r, b) = if self.rotate == -90.0 {
            (-ascent, -(dx0 + w), descent, -dx0)
        } else if self.rotate == 90.0 {
            (-descent, dx0, ascent, dx0 + w)
        } else {
            (dx0, -ascent, dx0 + w, descent)
        };
        Rect::from_ltrb(self.x + l, self.y + t, self.x + r, self.y + b)
    }
}

pub fn estimate_width(text: &str, size_px: f32) -> f32 {
    text.chars().count() as f32 * size_px * ADVANCE_RATIO
}

/// Draws text onto a pixmap with the shared font database
pub struct TextPainter {
    fonts: Arc<fontdb::Database>,
    family: String,
}

impl TextPainter {
    pub fn new(fonts: Arc<fontdb::Database>, family: &str) -> Self {
        TextPainter {
            fonts,
            family: family.to_string(),
        }
    }

    pub fn available(&self) -> bool {
        !self.fonts.is_empty()
    }

    /// Draw `spec`. Returns `false` when no font is available and nothing
    /// was drawn.
    pub fn draw(&self, pixmap: &mut Pixmap, spec: &TextSpec) -> Result<bool> {
        if !self.available() || spec.text.trim().is_empty() {
            return Ok(false);
        }
        let svg = self.svg_fragment(pixmap.width(), pixmap.height(), spec);

        let mut opt = usvg::Options::default();
        opt.font_family = primary_font(&self.family);
        opt.fontdb = Arc::clone(&self.fonts);
        let tree = usvg::Tree::from_str(&svg, &opt)
            .with_context(|| format!("Failed to lay out text '{}'", spec.text))?;
        resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
        Ok(true)
    }

    fn svg_fragment(&self, width: u32, height: u32, spec: &TextSpec) -> String {
        let transform = if spec.rotate != 0.0 {
            format!(
                r#" transform="rotate({:.2} {:.2} {:.2})""#,
                spec.rotate, spec.x, spec.y
            )
        } else {
            String::new()
        };
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><text x="{x:.2}" y="{y:.2}" font-family="{family}" font-size="{size:.2}" font-weight="{weight}" text-anchor="{anchor}" fill="{fill}" fill-opacity="{opacity:.3}"{transform}>{text}</text></svg>"#,
            w = width,
            h = height,
            x = spec.x,
            y = spec.y,
            family = escape_xml(&self.family),
            size = spec.size_px,
            weight = if spec.bold { "bold" } else { "normal" },
            anchor = spec.anchor.as_svg(),
            fill = spec.color.to_hex(),
            opacity = spec.color.opacity(),
            transform = transform,
            text = escape_xml(&spec.text),
        )
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn primary_font(fonts: &str) -> String {
    fonts
        .split(',')
        .map(|s| s.trim().trim_matches('"'))
        .find(|s| !s.is_empty())
        .unwrap_or("sans-serif")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::style::palette;

    #[test]
    fn test_escape_and_primary_font() {
        assert_eq!(escape_xml("'PE' & <x>"), "&apos;PE&apos; &amp; &lt;x&gt;");
        assert_eq!(primary_font(" \"DejaVu Sans\", Arial"), "DejaVu Sans");
        assert_eq!(primary_font(""), "sans-serif");
    }

    #[test]
    fn test_extent_follows_anchor() {
        let spec = TextSpec::new("abcd", 100.0, 50.0, 10.0, palette::BLACK);
        let start = spec.extent().unwrap();
        assert_eq!(start.left(), 100.0);
        assert!((start.width() - 24.0).abs() < 1e-4);

        let middle = spec.clone().anchored(Anchor::Middle).extent().unwrap();
        assert!((middle.left() - 88.0).abs() < 1e-4);
        let end = spec.clone().anchored(Anchor::End).extent().unwrap();
        assert!((end.right() - 100.0).abs() < 1e-4);

        let turned = spec.anchored(Anchor::Middle).rotated(-90.0).extent().unwrap();
        assert!((turned.top() - 38.0).abs() < 1e-4);
        assert!((turned.bottom() - 62.0).abs() < 1e-4);
        assert!(turned.right() <= 103.0 + 1e-4);
    }

    #[test]
    fn test_draw_without_fonts_is_a_no_op() {
        let painter = TextPainter::new(Arc::new(fontdb::Database::new()), "sans-serif");
        let mut pixmap = Pixmap::new(20, 20).unwrap();
        let drawn = painter
            .draw(&mut pixmap, &TextSpec::new("x", 2.0, 10.0, 8.0, palette::BLACK))
            .unwrap();
        assert!(!drawn);
        assert!(pixmap.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fragment_is_escaped() {
        let painter = TextPainter::new(Arc::new(fontdb::Database::new()), "DejaVu Sans");
        let spec = TextSpec::new("Mapa de 'Pop' & co", 1.0, 2.0, 12.0, palette::WHITE).rotated(-90.0);
        let svg = painter.svg_fragment(10, 10, &spec);
        assert!(svg.contains("&apos;Pop&apos; &amp; co"));
        assert!(svg.contains("rotate(-90.00 1.00 2.00)"));
        assert!(svg.contains(r##"fill="#ffffff""##));
    }
}
