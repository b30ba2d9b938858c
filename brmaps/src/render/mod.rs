pub mod layers;
pub mod legend;
pub mod style;
pub mod surface;
pub mod text;

pub use legend::{ColorBar, LineLegend};
pub use style::{palette, Color, ColorMap, ColorScale, LayerStyle};
pub use surface::{DrawItem, DrawingSurface, Frame};
pub use text::TextPainter;
