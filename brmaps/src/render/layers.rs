//! Layer plotters
//!
//! Each plotter turns a prepared dataset into draw items on the shared
//! surface at a given z-order. Plotters only add paint: they never touch
//! the input geometry or the axes limits.

use geo::Geometry;
use log::{debug, warn};

use crate::error::{MapError, Result};
use crate::geometric::boundary::BoundaryDataset;
use crate::geometric::mask::Mask;
use crate::render::legend::ColorBar;
use crate::render::style::{palette, ColorMap, ColorScale, LayerStyle};
use crate::render::surface::{DrawItem, DrawingSurface};

/// Style of the South America base layer
pub const BASE_MAP_STYLE: LayerStyle = LayerStyle::filled(palette::LAND, palette::LAND_EDGE, 0.4);

/// Paint every record of `dataset` with one style
pub fn plot_polygons(
    surface: &mut DrawingSurface,
    name: &str,
    dataset: &BoundaryDataset,
    z: i32,
    style: LayerStyle,
) -> usize {
    let items = dataset
        .iter()
        .map(|r| DrawItem::new(r.geometry.clone(), style))
        .collect();
    surface.add_layer(name, z, items)
}

/// Paint the countries of South America, or nothing when the base map is
/// unavailable
pub fn plot_base_map(
    surface: &mut DrawingSurface,
    base: Option<&BoundaryDataset>,
    z: i32,
    style: LayerStyle,
) -> usize {
    match base {
        Some(dataset) => plot_polygons(surface, "sulamerica", dataset, z, style),
        None => surface.add_layer("sulamerica", z, Vec::new()),
    }
}

/// Fill the mask of one state
pub fn plot_mask(
    surface: &mut DrawingSurface,
    name: &str,
    mask: &Mask,
    z: i32,
    style: LayerStyle,
) -> usize {
    let item = DrawItem::new(Geometry::MultiPolygon(mask.geometry.clone()), style);
    surface.add_layer(name, z, vec![item])
}

/// Outline the mask of one state
pub fn plot_border(surface: &mut DrawingSurface, mask: &Mask, z: i32, style: LayerStyle) -> usize {
    let outline = LayerStyle {
        face: None,
        ..style
    };
    plot_mask(surface, "border", mask, z, outline)
}

/// Summary of a choropleth layer
#[derive(Debug, Clone, PartialEq)]
pub struct ChoroplethSummary {
    /// Attribute key actually used, after case-insensitive resolution
    pub column: String,
    pub scale: ColorScale,
    /// Records painted from their value
    pub colored: usize,
    /// Records painted in the missing-value colour
    pub missing: usize,
}

/// Colour every record of `dataset` by the numeric value of `column` and
/// attach a colour bar to the surface.
///
/// Fails with a column error if no record carries the column or none of
/// its values is numeric; nothing is added to the surface in that case.
pub fn plot_choropleth(
    surface: &mut DrawingSurface,
    name: &str,
    dataset: &BoundaryDataset,
    z: i32,
    column: &str,
    cmap: ColorMap,
    edge: LayerStyle,
) -> Result<ChoroplethSummary> {
    let key = dataset
        .resolve_column(column)
        .ok_or_else(|| MapError::MissingColumn {
            column: column.to_string(),
            dataset: dataset.name.clone(),
        })?;

    let values: Vec<Option<f64>> = dataset.iter().map(|r| r.numeric(&key)).collect();
    let scale = ColorScale::from_values(cmap, values.iter().flatten().copied()).ok_or_else(|| {
        MapError::InvalidColumn {
            column: key.clone(),
            dataset: dataset.name.clone(),
            reason: "no record holds a numeric value".to_string(),
        }
    })?;

    let items: Vec<DrawItem> = dataset
        .iter()
        .zip(&values)
        .map(|(record, value)| {
            let face = value.map_or(palette::MISSING, |v| scale.color(v));
            DrawItem::new(record.geometry.clone(), edge.with_face(face))
        })
        .collect();
    let missing = values.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        warn!(
            "{} of {} records in '{}' have no numeric '{}'; painted as missing",
            missing,
            values.len(),
            dataset.name,
            key
        );
    }
    debug!(
        "Choropleth '{}' on '{}' using {} [{}, {}]",
        name,
        key,
        cmap.name(),
        scale.min,
        scale.max
    );

    surface.add_layer(name, z, items);
    surface.set_colorbar(ColorBar::new(scale, &key));
    Ok(ChoroplethSummary {
        column: key,
        scale,
        colored: values.len() - missing,
        missing,
    })
}
