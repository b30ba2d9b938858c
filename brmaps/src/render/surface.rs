//! Shared drawing surface for one map request
//!
//! Layers are recorded with their z-order and only rasterised when the
//! surface is rendered, after the viewport has been fixed. Paint order is
//! ascending z, ties broken by insertion order.

use anyhow::{anyhow, Context};
use geo::{Coord, Geometry, LineString, MultiPolygon, Point};
use log::{debug, info, warn};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tiny_skia::{
    FillRule, IntRect, LineCap, LineJoin, Mask, Paint, PathBuilder, Pixmap, Rect, Stroke,
    Transform,
};

use crate::config::RenderConfig;
use crate::error::{MapError, Result};
use crate::geo_core::BoundingBox;
use crate::geometric::ops::polygonal_parts;
use crate::render::legend::{union_rect, ColorBar, LineLegend};
use crate::render::style::{palette, Color, LayerStyle};
use crate::render::text::{Anchor, TextPainter, TextSpec};

/// Radius of point markers, in points
const POINT_RADIUS_PT: f32 = 1.5;

/// A geometry and how to paint it
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub geometry: Geometry<f64>,
    pub style: LayerStyle,
}

impl DrawItem {
    pub fn new(geometry: Geometry<f64>, style: LayerStyle) -> Self {
        DrawItem { geometry, style }
    }
}

/// A named group of items painted at one z-order
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub z: i32,
    seq: usize,
    pub items: Vec<DrawItem>,
}

impl Layer {
    pub fn feature_count(&self) -> usize {
        self.items.len()
    }
}

/// Colours of everything that is not a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub figure_bg: Color,
    pub axes_bg: Color,
    pub title_color: Color,
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            figure_bg: palette::WHITE,
            axes_bg: palette::OCEAN,
            title_color: palette::BLACK,
        }
    }
}

/// Pixel placement of the figure elements
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub px_per_pt: f32,
    pub axes: Rect,
    pub title: Option<TextSpec>,
}

/// Maps data coordinates onto the axes rectangle, y pointing up
#[derive(Debug, Clone, Copy)]
struct Viewport {
    limits: BoundingBox,
    axes: Rect,
}

impl Viewport {
    fn to_px(&self, c: &Coord<f64>) -> (f32, f32) {
        let sx = self.axes.width() as f64 / self.limits.width();
        let sy = self.axes.height() as f64 / self.limits.height();
        let x = self.axes.left() as f64 + (c.x - self.limits.min_x) * sx;
        let y = self.axes.top() as f64 + (self.limits.max_y - c.y) * sy;
        (x as f32, y as f32)
    }
}

/// The canvas and axes shared by every layer of one map
#[derive(Debug, Clone)]
pub struct DrawingSurface {
    dpi: u32,
    width_px: u32,
    height_px: u32,
    pad_px: f32,
    title_size_pt: f32,
    frame: Frame,
    layers: Vec<Layer>,
    limits: Option<BoundingBox>,
    title: Option<String>,
    legend: Option<LineLegend>,
    colorbar: Option<ColorBar>,
}

impl DrawingSurface {
    pub fn new(config: &RenderConfig) -> Self {
        let dpi = config.dpi.max(1);
        DrawingSurface {
            dpi,
            width_px: (config.figure_width_in * dpi as f32).round().max(1.0) as u32,
            height_px: (config.figure_height_in * dpi as f32).round().max(1.0) as u32,
            pad_px: config.pad_inches.max(0.0) * dpi as f32,
            title_size_pt: config.title_size_pt,
            frame: Frame::default(),
            layers: Vec::new(),
            limits: None,
            title: None,
            legend: None,
            colorbar: None,
        }
    }

    pub fn set_frame(&mut self, frame: Frame) {
        self.frame = frame;
    }

    /// Record a layer. Returns the number of items it holds.
    pub fn add_layer(&mut self, name: &str, z: i32, items: Vec<DrawItem>) -> usize {
        let count = items.len();
        debug!("Layer '{}' at z={} with {} item(s)", name, z, count);
        self.layers.push(Layer {
            name: name.to_string(),
            z,
            seq: self.layers.len(),
            items,
        });
        count
    }

    /// Layers in paint order
    pub fn layers(&self) -> Vec<&Layer> {
        let mut ordered: Vec<&Layer> = self.layers.iter().collect();
        ordered.sort_by_key(|l| (l.z, l.seq));
        ordered
    }

    pub fn set_limits(&mut self, limits: BoundingBox) -> Result<()> {
        if !limits.has_area() {
            return Err(MapError::InvalidRequest(format!(
                "Viewport has no area: {:?}",
                limits
            )));
        }
        self.limits = Some(limits);
        Ok(())
    }

    pub fn limits(&self) -> Option<BoundingBox> {
        self.limits
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    pub fn set_legend(&mut self, legend: LineLegend) {
        self.legend = (!legend.is_empty()).then_some(legend);
    }

    pub fn legend(&self) -> Option<&LineLegend> {
        self.legend.as_ref()
    }

    pub fn set_colorbar(&mut self, colorbar: ColorBar) {
        self.colorbar = Some(colorbar);
    }

    pub fn colorbar(&self) -> Option<&ColorBar> {
        self.colorbar.as_ref()
    }

    pub fn px_per_pt(&self) -> f32 {
        self.dpi as f32 / 72.0
    }

    fn require_limits(&self) -> Result<BoundingBox> {
        self.limits
            .ok_or_else(|| MapError::InvalidRequest("Viewport was never set".to_string()))
    }

    /// Place the axes with an equal data aspect inside the figure, leaving
    /// room for the title above and the colour bar to the right.
    pub fn layout(&self) -> Result<Layout> {
        let limits = self.require_limits()?;
        let w = self.width_px as f32;
        let h = self.height_px as f32;
        let ppt = self.px_per_pt();
        let margin = 0.04 * w.min(h);
        let title_px = self.title_size_pt * ppt;
        let title_h = if self.title.is_some() { title_px * 1.8 } else { 0.0 };
        let reserve = if self.colorbar.is_some() { 0.16 * w } else { 0.0 };

        let left = margin;
        let top = margin + title_h;
        let avail_w = (w - margin - reserve - left).max(1.0);
        let avail_h = (h - margin - top).max(1.0);
        let aspect = (limits.width() / limits.height()) as f32;
        let (ax_w, ax_h) = if avail_w / avail_h > aspect {
            (avail_h * aspect, avail_h)
        } else {
            (avail_w, avail_w / aspect)
        };
        let axes = Rect::from_xywh(
            left + (avail_w - ax_w) / 2.0,
            top + (avail_h - ax_h) / 2.0,
            ax_w.max(1.0),
            ax_h.max(1.0),
        )
        .ok_or_else(|| anyhow!("Degenerate axes for limits {:?}", limits))?;

        let title = self.title.as_ref().map(|text| {
            TextSpec::new(
                text,
                axes.left() + axes.width() / 2.0,
                axes.top() - title_px * 0.45,
                title_px,
                self.frame.title_color,
            )
            .anchored(Anchor::Middle)
            .bold()
        });

        Ok(Layout {
            width: self.width_px,
            height: self.height_px,
            px_per_pt: ppt,
            axes,
            title,
        })
    }

    /// Rasterise the figure and crop it to its content plus padding
    pub fn render(&self, painter: &TextPainter) -> Result<Pixmap> {
        let limits = self.require_limits()?;
        let layout = self.layout()?;
        let mut pixmap = Pixmap::new(layout.width, layout.height).ok_or_else(|| {
            anyhow!("Failed to allocate {}x{} pixmap", layout.width, layout.height)
        })?;
        pixmap.fill(self.frame.figure_bg.to_skia());
        pixmap.fill_rect(
            layout.axes,
            &solid_paint(self.frame.axes_bg),
            Transform::identity(),
            None,
        );

        let mut clip = Mask::new(layout.width, layout.height)
            .ok_or_else(|| anyhow!("Failed to allocate clip mask"))?;
        clip.fill_path(
            &PathBuilder::from_rect(layout.axes),
            FillRule::Winding,
            false,
            Transform::identity(),
        );

        let viewport = Viewport {
            limits,
            axes: layout.axes,
        };
        for layer in self.layers() {
            for item in &layer.items {
                paint_item(&mut pixmap, item, &viewport, layout.px_per_pt, &clip);
            }
        }

        if let Some(legend) = &self.legend {
            legend.draw(&mut pixmap, layout.axes, layout.px_per_pt, painter)?;
        }
        if let Some(colorbar) = &self.colorbar {
            colorbar.draw(&mut pixmap, layout.axes, layout.px_per_pt, painter)?;
        }
        if let Some(title) = &layout.title {
            painter.draw(&mut pixmap, title)?;
        }
        let has_text = self.title.is_some() || self.legend.is_some() || self.colorbar.is_some();
        if has_text && !painter.available() {
            warn!("No font available; title and labels omitted");
        }

        let content = self.content_box(&layout);
        crop(&pixmap, content, self.pad_px)
    }

    /// Union of axes, title and colour bar
    fn content_box(&self, layout: &Layout) -> Rect {
        let mut content = layout.axes;
        if let Some(extent) = layout.title.as_ref().and_then(TextSpec::extent) {
            content = union_rect(content, extent);
        }
        if let Some(extent) = self
            .colorbar
            .as_ref()
            .and_then(|c| c.extent(layout.axes, layout.width as f32, layout.px_per_pt))
        {
            content = union_rect(content, extent);
        }
        content
    }

    /// Render and write a PNG at `path`. Returns the image size in pixels.
    pub fn save(&self, path: &Path, painter: &TextPainter) -> Result<(u32, u32)> {
        let pixmap = self.render(painter)?;
        write_png(&pixmap, path, self.dpi)?;
        info!(
            "Saved {} ({}x{} px, {} dpi)",
            path.display(),
            pixmap.width(),
            pixmap.height(),
            self.dpi
        );
        Ok((pixmap.width(), pixmap.height()))
    }
}

pub(crate) fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

pub(crate) fn stroke_of(width_px: f32) -> Stroke {
    Stroke {
        width: width_px.max(0.1),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    }
}

fn paint_item(pixmap: &mut Pixmap, item: &DrawItem, vp: &Viewport, ppt: f32, clip: &Mask) {
    let style = item.style;
    let polygons = polygonal_parts(&item.geometry);
    if let Some(path) = polygon_path(&polygons, vp) {
        if let Some(face) = style.face {
            pixmap.fill_path(
                &path,
                &solid_paint(face),
                FillRule::EvenOdd,
                Transform::identity(),
                Some(clip),
            );
        }
        if let (Some(edge), true) = (style.edge, style.draws_edge()) {
            pixmap.stroke_path(
                &path,
                &solid_paint(edge),
                &stroke_of(style.width_pt * ppt),
                Transform::identity(),
                Some(clip),
            );
        }
    }

    let mut lines = Vec::new();
    collect_lines(&item.geometry, &mut lines);
    if let Some(path) = line_path(&lines, vp) {
        if let Some(color) = style.edge.or(style.face) {
            pixmap.stroke_path(
                &path,
                &solid_paint(color),
                &stroke_of(style.width_pt.max(0.5) * ppt),
                Transform::identity(),
                Some(clip),
            );
        }
    }

    let mut points = Vec::new();
    collect_points(&item.geometry, &mut points);
    if let (false, Some(color)) = (points.is_empty(), style.face.or(style.edge)) {
        let mut pb = PathBuilder::new();
        for p in &points {
            let (x, y) = vp.to_px(&p.0);
            pb.push_circle(x, y, POINT_RADIUS_PT * ppt);
        }
        if let Some(path) = pb.finish() {
            pixmap.fill_path(
                &path,
                &solid_paint(color),
                FillRule::Winding,
                Transform::identity(),
                Some(clip),
            );
        }
    }
}

fn polygon_path(polygons: &MultiPolygon<f64>, vp: &Viewport) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for polygon in &polygons.0 {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            push_coords(&mut pb, ring, vp, true);
        }
    }
    pb.finish()
}

fn line_path(lines: &[LineString<f64>], vp: &Viewport) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for line in lines {
        push_coords(&mut pb, line, vp, false);
    }
    pb.finish()
}

fn push_coords(pb: &mut PathBuilder, ring: &LineString<f64>, vp: &Viewport, close: bool) {
    let mut coords = ring.coords();
    let Some(first) = coords.next() else {
        return;
    };
    let (x, y) = vp.to_px(first);
    pb.move_to(x, y);
    for c in coords {
        let (x, y) = vp.to_px(c);
        pb.line_to(x, y);
    }
    if close {
        pb.close();
    }
}

fn collect_lines(geometry: &Geometry<f64>, out: &mut Vec<LineString<f64>>) {
    match geometry {
        Geometry::Line(l) => out.push(LineString::from(*l)),
        Geometry::LineString(ls) => out.push(ls.clone()),
        Geometry::MultiLineString(mls) => out.extend(mls.0.iter().cloned()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.iter() {
                collect_lines(g, out);
            }
        }
        _ => {}
    }
}

fn collect_points(geometry: &Geometry<f64>, out: &mut Vec<Point<f64>>) {
    match geometry {
        Geometry::Point(p) => out.push(*p),
        Geometry::MultiPoint(mp) => out.extend(mp.iter().copied()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.iter() {
                collect_points(g, out);
            }
        }
        _ => {}
    }
}

/// Crop `pixmap` to `content` grown by `pad`, clamped to the figure
fn crop(pixmap: &Pixmap, content: Rect, pad: f32) -> Result<Pixmap> {
    let left = (content.left() - pad).floor().max(0.0) as i32;
    let top = (content.top() - pad).floor().max(0.0) as i32;
    let right = ((content.right() + pad).ceil() as i32).min(pixmap.width() as i32);
    let bottom = ((content.bottom() + pad).ceil() as i32).min(pixmap.height() as i32);
    let rect = IntRect::from_ltrb(left, top, right, bottom)
        .ok_or_else(|| anyhow!("Empty crop box {:?}", content))?;
    let cropped = pixmap
        .clone_rect(rect)
        .ok_or_else(|| anyhow!("Crop box {:?} outside the figure", rect))?;
    Ok(cropped)
}

/// Encode `pixmap` as PNG with the resolution recorded in pHYs. The file is
/// written next to `path` and renamed into place once complete.
pub fn write_png(pixmap: &Pixmap, path: &Path, dpi: u32) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    {
        let mut buf = BufWriter::new(tmp.as_file());
        let mut encoder = png::Encoder::new(&mut buf, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let ppm = (dpi as f64 / 0.0254).round() as u32;
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder
            .write_header()
            .context("Failed to write PNG header")?;
        writer
            .write_image_data(&data)
            .context("Failed to encode PNG data")?;
        writer.finish().context("Failed to finish PNG stream")?;
        buf.flush().context("Failed to flush PNG file")?;
    }
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::style::palette;
    use geo::{line_string, polygon};
    use resvg::usvg::fontdb;
    use std::sync::Arc;

    fn config() -> RenderConfig {
        RenderConfig {
            dpi: 20,
            figure_width_in: 10.0,
            figure_height_in: 10.0,
            ..RenderConfig::default()
        }
    }

    fn no_text() -> TextPainter {
        TextPainter::new(Arc::new(fontdb::Database::new()), "sans-serif")
    }

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ])
    }

    #[test]
    fn test_layers_sorted_by_z_then_insertion() {
        let mut surface = DrawingSurface::new(&config());
        surface.add_layer("border", 4, vec![]);
        surface.add_layer("states", 2, vec![]);
        surface.add_layer("imediatas", 5, vec![]);
        surface.add_layer("intermediarias", 5, vec![]);
        let names: Vec<_> = surface.layers().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["states", "border", "imediatas", "intermediarias"]);
    }

    #[test]
    fn test_layout_keeps_equal_aspect() {
        let mut surface = DrawingSurface::new(&config());
        surface.set_limits(BoundingBox::new(0.0, 0.0, 200.0, 100.0)).unwrap();
        let layout = surface.layout().unwrap();
        let ratio = layout.axes.width() / layout.axes.height();
        assert!((ratio - 2.0).abs() < 1e-3);
        assert!(layout.axes.right() <= 200.0);
    }

    #[test]
    fn test_degenerate_limits_rejected() {
        let mut surface = DrawingSurface::new(&config());
        assert!(surface.set_limits(BoundingBox::new(1.0, 1.0, 1.0, 5.0)).is_err());
        assert!(surface.render(&no_text()).is_err());
    }

    #[test]
    fn test_later_layer_paints_on_top() {
        let mut surface = DrawingSurface::new(&config());
        surface.set_limits(BoundingBox::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        // inserted first but painted last
        surface.add_layer(
            "top",
            3,
            vec![DrawItem::new(square(0.0, 0.0, 10.0), LayerStyle::fill(palette::INTERMEDIATE))],
        );
        surface.add_layer(
            "bottom",
            1,
            vec![DrawItem::new(square(0.0, 0.0, 10.0), LayerStyle::fill(palette::LAND))],
        );
        let pixmap = surface.render(&no_text()).unwrap();
        let centre = pixmap.pixel(pixmap.width() / 2, pixmap.height() / 2).unwrap();
        assert_eq!(
            (centre.red(), centre.green(), centre.blue()),
            (0xd0, 0x00, 0x00)
        );
    }

    #[test]
    fn test_holes_stay_open() {
        let mut surface = DrawingSurface::new(&config());
        surface.set_limits(BoundingBox::new(0.0, 0.0, 9.0, 9.0)).unwrap();
        let donut = Geometry::Polygon(geo::Polygon::new(
            geo::line_string![(x: 0.0, y: 0.0), (x: 9.0, y: 0.0), (x: 9.0, y: 9.0), (x: 0.0, y: 9.0), (x: 0.0, y: 0.0)],
            vec![geo::line_string![(x: 3.0, y: 3.0), (x: 6.0, y: 3.0), (x: 6.0, y: 6.0), (x: 3.0, y: 6.0), (x: 3.0, y: 3.0)]],
        ));
        surface.add_layer("donut", 2, vec![DrawItem::new(donut, LayerStyle::fill(palette::BLACK))]);
        let pixmap = surface.render(&no_text()).unwrap();
        let centre = pixmap.pixel(pixmap.width() / 2, pixmap.height() / 2).unwrap();
        assert_eq!(
            (centre.red(), centre.green(), centre.blue()),
            (palette::OCEAN.r, palette::OCEAN.g, palette::OCEAN.b)
        );
    }

    #[test]
    fn test_save_writes_png_with_dpi() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("map.png");
        let mut surface = DrawingSurface::new(&config());
        surface.set_limits(BoundingBox::new(0.0, 0.0, 4.0, 3.0)).unwrap();
        surface.set_title("Municípios de PE");
        let (w, h) = surface.save(&path, &no_text()).unwrap();

        let decoder = png::Decoder::new(fs::File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (w, h));
        let dims = info.pixel_dims.unwrap();
        assert_eq!(dims.unit, png::Unit::Meter);
        assert_eq!(dims.xppu, 787);
        // only the PNG remains, no temporary file
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_crop_is_tight_around_axes() {
        let mut surface = DrawingSurface::new(&config());
        surface.set_limits(BoundingBox::new(0.0, 0.0, 4.0, 1.0)).unwrap();
        let pixmap = surface.render(&no_text()).unwrap();
        // a wide extent leaves most of the square figure empty
        assert!(pixmap.height() < pixmap.width() / 2);
    }
}
