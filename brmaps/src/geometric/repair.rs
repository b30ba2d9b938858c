use geo::orient::{Direction, Orient};
use geo::{Area, Coord, Geometry, GeometryCollection, LineString, MultiPolygon, Polygon};
use log::warn;

use crate::geometric::ops::{is_polygonal, polygonal_parts};

/// Zero-distance buffer: rebuild a polygonal geometry so its rings are
/// closed, correctly oriented and free of overlaps between parts.
/// Non-polygonal geometries come back unchanged.
pub fn buffer_zero(geometry: &Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection(
            gc.iter().map(buffer_zero).collect(),
        )),
        g if is_polygonal(g) => Geometry::MultiPolygon(repair_polygonal(&polygonal_parts(g))),
        other => other.clone(),
    }
}

#[cfg(feature = "geos")]
fn repair_polygonal(parts: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    use geos::Geom;

    let cleaned = clean_rings(parts);
    let buffered = (|| -> anyhow::Result<MultiPolygon<f64>> {
        let geos_geom: geos::Geometry = cleaned.clone().try_into()?;
        let buffered = geos_geom.buffer(0.0, 8)?;
        let back: Geometry<f64> = buffered.try_into()?;
        Ok(polygonal_parts(&back))
    })();
    match buffered {
        Ok(mp) => mp,
        Err(e) => {
            warn!("GEOS buffer(0) failed, keeping cleaned rings: {}", e);
            cleaned
        }
    }
}

#[cfg(not(feature = "geos"))]
fn repair_polygonal(parts: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let cleaned = clean_rings(parts);
    let mut dissolved = MultiPolygon::new(Vec::new());
    for polygon in &cleaned.0 {
        let single = MultiPolygon::new(vec![polygon.clone()]);
        match crate::geometric::ops::union(&dissolved, &single) {
            Ok(merged) => dissolved = merged,
            Err(e) => {
                warn!("Dissolving parts failed, keeping cleaned rings: {}", e);
                return cleaned;
            }
        }
    }
    dissolved
}

/// Drop repeated vertices, close open rings, discard rings that enclose no
/// area and orient exteriors counter-clockwise.
fn clean_rings(parts: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let polygons = parts
        .0
        .iter()
        .filter_map(|polygon| {
            let exterior = clean_ring(polygon.exterior())?;
            let interiors = polygon.interiors().iter().filter_map(clean_ring).collect();
            Some(Polygon::new(exterior, interiors).orient(Direction::Default))
        })
        .collect();
    MultiPolygon::new(polygons)
}

fn clean_ring(ring: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in ring.coords() {
        if !(c.x.is_finite() && c.y.is_finite()) {
            continue;
        }
        if coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    if coords.first() != coords.last() {
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
    }
    if coords.len() < 4 {
        return None;
    }
    let ring = LineString::new(coords);
    let area = Polygon::new(ring.clone(), vec![]).unsigned_area();
    (area > 0.0).then_some(ring)
}
