//! Line legend and colour bar

use tiny_skia::{PathBuilder, Pixmap, Rect, Transform};

use crate::error::Result;
use crate::render::style::{palette, Color, ColorScale};
use crate::render::surface::{solid_paint, stroke_of};
use crate::render::text::{estimate_width, Anchor, TextPainter, TextSpec};

const LEGEND_FONT_PT: f32 = 10.0;
const TICK_FONT_PT: f32 = 9.0;
const CAPTION_FONT_PT: f32 = 11.0;
const TICK_COUNT: usize = 5;

/// One line sample in a legend
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Color,
    pub width_pt: f32,
}

/// Legend of line samples, lower right inside the axes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineLegend {
    pub entries: Vec<LegendEntry>,
}

impl LineLegend {
    pub fn push(&mut self, label: &str, color: Color, width_pt: f32) {
        self.entries.push(LegendEntry {
            label: label.to_string(),
            color,
            width_pt,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }

    /// Box the legend occupies for the given axes
    pub fn frame(&self, axes: Rect, px_per_pt: f32) -> Option<Rect> {
        if self.is_empty() {
            return None;
        }
        let font = LEGEND_FONT_PT * px_per_pt;
        let pad = font * 0.5;
        let sample = font * 2.0;
        let row = font * 1.6;
        let label_w = self
            .entries
            .iter()
            .map(|e| estimate_width(&e.label, font))
            .fold(0.0f32, f32::max);
        let w = pad + sample + font * 0.6 + label_w + pad;
        let h = pad * 2.0 + row * self.entries.len() as f32;
        let margin = font * 0.8;
        Rect::from_xywh(axes.right() - margin - w, axes.bottom() - margin - h, w, h)
    }

    pub fn draw(
        &self,
        pixmap: &mut Pixmap,
        axes: Rect,
        px_per_pt: f32,
        painter: &TextPainter,
    ) -> Result<()> {
        let Some(frame) = self.frame(axes, px_per_pt) else {
            return Ok(());
        };
        let font = LEGEND_FONT_PT * px_per_pt;
        let pad = font * 0.5;
        let sample = font * 2.0;
        let row = font * 1.6;

        let frame_path = PathBuilder::from_rect(frame);
        pixmap.fill_path(
            &frame_path,
            &solid_paint(palette::WHITE.with_alpha(0.8)),
            tiny_skia::FillRule::Winding,
            Transform::identity(),
            None,
        );
        pixmap.stroke_path(
            &frame_path,
            &solid_paint(palette::LEGEND_EDGE),
            &stroke_of(0.8 * px_per_pt),
            Transform::identity(),
            None,
        );

        for (i, entry) in self.entries.iter().enumerate() {
            let cy = frame.top() + pad + row * (i as f32 + 0.5);
            let x0 = frame.left() + pad;
            let mut pb = PathBuilder::new();
            pb.move_to(x0, cy);
            pb.line_to(x0 + sample, cy);
            if let Some(path) = pb.finish() {
                pixmap.stroke_path(
                    &path,
                    &solid_paint(entry.color),
                    &stroke_of(entry.width_pt * px_per_pt),
                    Transform::identity(),
                    None,
                );
            }
            let label = TextSpec::new(
                &entry.label,
                x0 + sample + font * 0.6,
                cy + font * 0.35,
                font,
                palette::BLACK,
            );
            painter.draw(pixmap, &label)?;
        }
        Ok(())
    }
}

/// Vertical colour bar right of the axes
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBar {
    pub scale: ColorScale,
    pub label: String,
}

impl ColorBar {
    pub fn new(scale: ColorScale, label: &str) -> Self {
        ColorBar {
            scale,
            label: label.to_string(),
        }
    }

    fn bar_rect(axes: Rect, figure_width: f32) -> Option<Rect> {
        let gap = figure_width * 0.025;
        let width = figure_width * 0.025;
        Rect::from_xywh(axes.right() + gap, axes.top(), width, axes.height())
    }

    fn tick_specs(&self, bar: Rect, px_per_pt: f32) -> Vec<TextSpec> {
        let font = TICK_FONT_PT * px_per_pt;
        let span = self.scale.max - self.scale.min;
        self.scale
            .ticks(TICK_COUNT)
            .into_iter()
            .map(|v| {
                let y = bar.bottom() - self.scale.normalize(v) as f32 * bar.height();
                TextSpec::new(
                    &format_tick(v, span),
                    bar.right() + 4.0 * px_per_pt,
                    y + font * 0.35,
                    font,
                    palette::BLACK,
                )
            })
            .collect()
    }

    fn caption_spec(&self, bar: Rect, ticks: &[TextSpec], px_per_pt: f32) -> TextSpec {
        let font = CAPTION_FONT_PT * px_per_pt;
        let labels_right = ticks
            .iter()
            .filter_map(TextSpec::extent)
            .map(|r| r.right())
            .fold(bar.right(), f32::max);
        TextSpec::new(
            &self.label,
            labels_right + 6.0 * px_per_pt + font,
            bar.top() + bar.height() / 2.0,
            font,
            palette::BLACK,
        )
        .anchored(Anchor::Middle)
        .rotated(-90.0)
    }

    /// Everything the colour bar covers, labels included
    pub fn extent(&self, axes: Rect, figure_width: f32, px_per_pt: f32) -> Option<Rect> {
        let bar = Self::bar_rect(axes, figure_width)?;
        let ticks = self.tick_specs(bar, px_per_pt);
        let caption = self.caption_spec(bar, &ticks, px_per_pt);
        let covered = ticks
            .iter()
            .chain(std::iter::once(&caption))
            .filter_map(TextSpec::extent)
            .fold(bar, union_rect);
        Some(covered)
    }

    pub fn draw(
        &self,
        pixmap: &mut Pixmap,
        axes: Rect,
        px_per_pt: f32,
        painter: &TextPainter,
    ) -> Result<()> {
        let Some(bar) = Self::bar_rect(axes, pixmap.width() as f32) else {
            return Ok(());
        };
        let rows = bar.height().ceil().max(1.0) as usize;
        for i in 0..rows {
            let t = 1.0 - (i as f64 + 0.5) / rows as f64;
            let Some(strip) = Rect::from_xywh(bar.left(), bar.top() + i as f32, bar.width(), 1.0)
            else {
                continue;
            };
            pixmap.fill_rect(
                strip,
                &solid_paint(self.scale.cmap.sample(t)),
                Transform::identity(),
                None,
            );
        }
        pixmap.stroke_path(
            &PathBuilder::from_rect(bar),
            &solid_paint(palette::BLACK),
            &stroke_of(0.6 * px_per_pt),
            Transform::identity(),
            None,
        );

        let ticks = self.tick_specs(bar, px_per_pt);
        for tick in &ticks {
            let y = tick.y - tick.size_px * 0.35;
            let mut pb = PathBuilder::new();
            pb.move_to(bar.right(), y);
            pb.line_to(bar.right() + 2.5 * px_per_pt, y);
            if let Some(path) = pb.finish() {
                pixmap.stroke_path(
                    &path,
                    &solid_paint(palette::BLACK),
                    &stroke_of(0.6 * px_per_pt),
                    Transform::identity(),
                    None,
                );
            }
            painter.draw(pixmap, tick)?;
        }
        painter.draw(pixmap, &self.caption_spec(bar, &ticks, px_per_pt))?;
        Ok(())
    }
}

/// Tick label with as many decimals as the value range needs
pub fn format_tick(value: f64, span: f64) -> String {
    let reference = if span > 0.0 { span } else { value.abs() };
    let decimals = if reference >= 100.0 {
        0
    } else if reference >= 1.0 {
        1
    } else if reference >= 0.01 {
        3
    } else {
        5
    };
    format!("{:.*}", decimals, value)
}

pub(crate) fn union_rect(a: Rect, b: Rect) -> Rect {
    Rect::from_ltrb(
        a.left().min(b.left()),
        a.top().min(b.top()),
        a.right().max(b.right()),
        a.bottom().max(b.bottom()),
    )
    .unwrap_or(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::style::ColorMap;

    fn axes() -> Rect {
        Rect::from_xywh(100.0, 100.0, 400.0, 300.0).unwrap()
    }

    #[test]
    fn test_legend_sits_inside_axes_lower_right() {
        let mut legend = LineLegend::default();
        legend.push("Região Intermediária", palette::INTERMEDIATE, 1.8);
        legend.push("Região Imediata", palette::IMMEDIATE, 1.0);
        let frame = legend.frame(axes(), 1.0).unwrap();
        assert!(frame.right() < axes().right());
        assert!(frame.bottom() < axes().bottom());
        assert!(frame.left() > axes().left());
        assert_eq!(legend.labels().len(), 2);
        assert!(LineLegend::default().frame(axes(), 1.0).is_none());
    }

    #[test]
    fn test_colorbar_extent_right_of_axes() {
        let scale = ColorScale::from_values(ColorMap::Viridis, [0.0, 1000.0]).unwrap();
        let bar = ColorBar::new(scale, "population");
        let extent = bar.extent(axes(), 800.0, 1.0).unwrap();
        assert!(extent.left() >= axes().right());
        assert!(extent.top() <= axes().top());
    }

    #[test]
    fn test_tick_format() {
        assert_eq!(format_tick(1234.567, 5000.0), "1235");
        assert_eq!(format_tick(0.5, 1.0), "0.5");
        assert_eq!(format_tick(0.125, 0.5), "0.125");
        assert_eq!(format_tick(7.0, 0.0), "7.0");
    }

    #[test]
    fn test_colorbar_paints_scale_colours() {
        let scale = ColorScale::from_values(ColorMap::Plasma, [0.0, 1.0]).unwrap();
        let bar = ColorBar::new(scale, "x");
        let mut pixmap = Pixmap::new(800, 500).unwrap();
        let painter = TextPainter::new(
            std::sync::Arc::new(resvg::usvg::fontdb::Database::new()),
            "sans-serif",
        );
        bar.draw(&mut pixmap, axes(), 1.0, &painter).unwrap();
        // bar spans x 520..540; sample the middle of the top row
        let top = pixmap.pixel(530, 102).unwrap();
        let expected = ColorMap::Plasma.sample(1.0);
        assert!((top.red() as i32 - expected.r as i32).abs() <= 8);
        assert!((top.blue() as i32 - expected.b as i32).abs() <= 8);
    }
}
