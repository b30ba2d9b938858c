//! Colours, layer styles and continuous colour scales

use std::fmt;

/// 8-bit RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    /// Same colour with its opacity multiplied by `alpha`
    pub fn with_alpha(self, alpha: f32) -> Self {
        let a = (self.a as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
        Color { a, ..self }
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }

    /// `#rrggbb`, opacity dropped (SVG carries it separately)
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(self) -> f32 {
        self.a as f32 / 255.0
    }

    fn lerp(self, other: Color, t: f64) -> Color {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "{}", self.to_hex())
        } else {
            write!(f, "{}{:02x}", self.to_hex(), self.a)
        }
    }
}

/// Named colours shared by the map plans
pub mod palette {
    use super::Color;

    pub const OCEAN: Color = Color::rgb(0xaa, 0xda, 0xff);
    pub const LAND: Color = Color::rgb(0xf2, 0xef, 0xe9);
    pub const LAND_EDGE: Color = Color::rgb(0xb0, 0xb0, 0xb0);
    pub const STATE_FACE: Color = Color::rgb(0xd9, 0xd9, 0xd9);
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const HIGHLIGHT: Color = Color::rgb(0xe6, 0x39, 0x46);
    pub const MUNICIPALITY_FACE: Color = Color::rgb(0xfe, 0xe8, 0xc8);
    pub const MUNICIPALITY_EDGE: Color = Color::rgb(0x7f, 0x7f, 0x7f);
    pub const CHOROPLETH_EDGE: Color = Color::rgb(0x4d, 0x4d, 0x4d);
    /// Records without a value in a choropleth
    pub const MISSING: Color = Color::rgb(0xd9, 0xd9, 0xd9);
    pub const COVERAGE_FACE: Color = Color::rgb(0xf5, 0xf5, 0xf5);
    pub const COVERAGE_EDGE: Color = Color::rgb(0xd3, 0xd3, 0xd3);
    pub const IMMEDIATE: Color = Color::rgb(0x00, 0x77, 0xb6);
    pub const INTERMEDIATE: Color = Color::rgb(0xd0, 0x00, 0x00);
    /// Immediate-region lines when no municipality coverage is drawn
    pub const MUTED: Color = Color::rgb(0x69, 0x69, 0x69);
    pub const LEGEND_EDGE: Color = Color::rgb(0xcc, 0xcc, 0xcc);
}

/// Fill and edge of one layer. A `None` face leaves polygons hollow, a
/// `None` edge (or zero width) draws no outline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStyle {
    pub face: Option<Color>,
    pub edge: Option<Color>,
    /// Edge width in points
    pub width_pt: f32,
}

impl LayerStyle {
    pub const fn filled(face: Color, edge: Color, width_pt: f32) -> Self {
        LayerStyle {
            face: Some(face),
            edge: Some(edge),
            width_pt,
        }
    }

    pub const fn fill(face: Color) -> Self {
        LayerStyle {
            face: Some(face),
            edge: None,
            width_pt: 0.0,
        }
    }

    pub const fn outline(edge: Color, width_pt: f32) -> Self {
        LayerStyle {
            face: None,
            edge: Some(edge),
            width_pt,
        }
    }

    pub fn with_face(self, face: Color) -> Self {
        LayerStyle {
            face: Some(face),
            ..self
        }
    }

    pub fn with_edge(self, edge: Color) -> Self {
        LayerStyle {
            edge: Some(edge),
            ..self
        }
    }

    pub fn draws_edge(&self) -> bool {
        self.edge.is_some() && self.width_pt > 0.0
    }
}

/// Continuous colour scales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMap {
    #[default]
    Viridis,
    Plasma,
}

const VIRIDIS: [Color; 10] = [
    Color::rgb(0x44, 0x01, 0x54),
    Color::rgb(0x48, 0x28, 0x78),
    Color::rgb(0x3e, 0x4a, 0x89),
    Color::rgb(0x31, 0x68, 0x8e),
    Color::rgb(0x26, 0x82, 0x8e),
    Color::rgb(0x1f, 0x9e, 0x89),
    Color::rgb(0x35, 0xb7, 0x79),
    Color::rgb(0x6e, 0xce, 0x58),
    Color::rgb(0xb5, 0xde, 0x2b),
    Color::rgb(0xfd, 0xe7, 0x25),
];

const PLASMA: [Color; 10] = [
    Color::rgb(0x0d, 0x08, 0x87),
    Color::rgb(0x46, 0x03, 0x9f),
    Color::rgb(0x72, 0x01, 0xa8),
    Color::rgb(0x9c, 0x17, 0x9e),
    Color::rgb(0xbd, 0x37, 0x86),
    Color::rgb(0xd8, 0x57, 0x6b),
    Color::rgb(0xed, 0x79, 0x53),
    Color::rgb(0xfb, 0x9f, 0x3a),
    Color::rgb(0xfd, 0xca, 0x26),
    Color::rgb(0xf0, 0xf9, 0x21),
];

impl ColorMap {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "viridis" => Some(ColorMap::Viridis),
            "plasma" => Some(ColorMap::Plasma),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorMap::Viridis => "viridis",
            ColorMap::Plasma => "plasma",
        }
    }

    fn stops(&self) -> &'static [Color] {
        match self {
            ColorMap::Viridis => &VIRIDIS,
            ColorMap::Plasma => &PLASMA,
        }
    }

    /// Colour at position `t` in [0, 1], clamped
    pub fn sample(&self, t: f64) -> Color {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let pos = t * (stops.len() - 1) as f64;
        let i = (pos.floor() as usize).min(stops.len() - 2);
        stops[i].lerp(stops[i + 1], pos - i as f64)
    }
}

/// A colour map stretched over the value range of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub cmap: ColorMap,
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    /// Scale over the finite values in `values`; `None` if there are none
    pub fn from_values(cmap: ColorMap, values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        finite.sort_by(f64::total_cmp);
        Some(ColorScale {
            cmap,
            min: *finite.first()?,
            max: *finite.last()?,
        })
    }

    /// Position of `value` in [0, 1]; a constant column sits at 0.5
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            0.5
        } else {
            ((value - self.min) / span).clamp(0.0, 1.0)
        }
    }

    pub fn color(&self, value: f64) -> Color {
        self.cmap.sample(self.normalize(value))
    }

    /// `count` evenly spaced values from min to max
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        match count {
            0 => Vec::new(),
            1 => vec![self.min],
            n => (0..n)
                .map(|i| self.min + (self.max - self.min) * i as f64 / (n - 1) as f64)
                .collect(),
        }
    }
}
