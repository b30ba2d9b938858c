use geo::{Area, BooleanOps, Geometry, GeometryCollection, Intersects};
use geo::{LineString, MultiLineString, MultiPolygon, Point};
use log::debug;

use crate::error::Result;
use crate::geometric::boundary::{BoundaryDataset, BoundaryRecord};
use crate::geometric::mask::Mask;
use crate::geometric::ops::{self, is_polygonal, polygonal_parts};

/// Restrict `dataset` to the area of `mask`.
///
/// Records disjoint from the mask are dropped, records inside it are kept
/// as they are and records straddling its boundary are cut. Attributes are
/// carried over untouched. An empty result is a valid outcome.
pub fn clip(dataset: &BoundaryDataset, mask: &Mask) -> Result<BoundaryDataset> {
    let mut records = Vec::new();
    let mut cut = 0usize;
    for record in dataset.iter() {
        let Some(bbox) = record.bounding_box() else {
            continue;
        };
        if !bbox.intersects(&mask.bbox) {
            continue;
        }
        match clip_geometry(&record.geometry, &mask.geometry)? {
            Clipped::Inside => records.push(record.clone()),
            Clipped::Cut(geometry) => {
                cut += 1;
                records.push(BoundaryRecord::new(geometry, record.properties.clone()));
            }
            Clipped::Outside => {}
        }
    }
    debug!(
        "Clipped '{}' to {}: {} of {} records kept ({} cut)",
        dataset.name,
        mask.code,
        records.len(),
        dataset.len(),
        cut
    );
    Ok(BoundaryDataset::new(&dataset.name, dataset.epsg, records))
}

/// Relative area change under which a polygon counts as fully inside
const AREA_TOLERANCE: f64 = 1e-9;

enum Clipped {
    Inside,
    Cut(Geometry<f64>),
    Outside,
}

fn clip_geometry(geometry: &Geometry<f64>, mask: &MultiPolygon<f64>) -> Result<Clipped> {
    if !is_polygonal(geometry) {
        return Ok(clip_non_polygonal(geometry, mask).map_or(Clipped::Outside, Clipped::Cut));
    }
    let parts = polygonal_parts(geometry);
    let clipped = ops::intersection(&parts, mask)?;
    if clipped.0.is_empty() {
        return Ok(Clipped::Outside);
    }
    let original_area = parts.unsigned_area();
    if (original_area - clipped.unsigned_area()).abs() <= AREA_TOLERANCE * original_area {
        return Ok(Clipped::Inside);
    }
    Ok(Clipped::Cut(Geometry::MultiPolygon(clipped)))
}

fn clip_non_polygonal(geometry: &Geometry<f64>, mask: &MultiPolygon<f64>) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::LineString(ls) => clip_lines(vec![ls.clone()], mask),
        Geometry::MultiLineString(mls) => clip_lines(mls.0.clone(), mask),
        Geometry::Line(l) => clip_lines(vec![LineString::from(*l)], mask),
        Geometry::Point(p) => mask.intersects(p).then(|| Geometry::Point(*p)),
        Geometry::MultiPoint(mp) => {
            let kept: Vec<Point<f64>> =
                mp.iter().filter(|p| mask.intersects(*p)).copied().collect();
            (!kept.is_empty()).then(|| Geometry::MultiPoint(kept.into()))
        }
        Geometry::GeometryCollection(gc) => {
            let mut kept = Vec::new();
            for g in gc.iter() {
                if is_polygonal(g) {
                    if let Ok(parts) = ops::intersection(&polygonal_parts(g), mask) {
                        if !parts.0.is_empty() {
                            kept.push(Geometry::MultiPolygon(parts));
                        }
                    }
                } else if let Some(c) = clip_non_polygonal(g, mask) {
                    kept.push(c);
                }
            }
            (!kept.is_empty()).then(|| Geometry::GeometryCollection(GeometryCollection(kept)))
        }
        _ => None,
    }
}

fn clip_lines(lines: Vec<LineString<f64>>, mask: &MultiPolygon<f64>) -> Option<Geometry<f64>> {
    let clipped = mask.clip(&MultiLineString::new(lines), false);
    let kept: Vec<_> = clipped.0.into_iter().filter(|l| l.0.len() >= 2).collect();
    (!kept.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(kept)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometric::mask::{derive_mask, StateCode};
    use geo::{line_string, polygon};
    use geojson::JsonObject;

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ])
    }

    fn named(geometry: Geometry<f64>, name: &str) -> BoundaryRecord {
        let mut props = JsonObject::new();
        props.insert("name".to_string(), name.into());
        props.insert("abbreviation".to_string(), "PE".into());
        BoundaryRecord::new(geometry, props)
    }

    fn pe_mask() -> Mask {
        let states = BoundaryDataset::new("estados", 3857, vec![named(square(0.0, 0.0, 10.0), "PE")]);
        derive_mask(&states, &StateCode::parse("PE").unwrap(), "abbreviation").unwrap()
    }

    #[test]
    fn test_disjoint_records_are_dropped() {
        let ds = BoundaryDataset::new("municipios", 3857, vec![named(square(20.0, 20.0, 2.0), "far")]);
        let clipped = clip(&ds, &pe_mask()).unwrap();
        assert!(clipped.is_empty());
    }

    #[test]
    fn test_contained_records_are_unchanged() {
        let inner = named(square(2.0, 2.0, 3.0), "inner");
        let ds = BoundaryDataset::new("municipios", 3857, vec![inner.clone()]);
        let clipped = clip(&ds, &pe_mask()).unwrap();
        assert_eq!(clipped.records(), &[inner]);
    }

    #[test]
    fn test_straddling_records_are_cut() {
        let ds = BoundaryDataset::new("municipios", 3857, vec![named(square(8.0, 8.0, 4.0), "edge")]);
        let clipped = clip(&ds, &pe_mask()).unwrap();
        assert_eq!(clipped.len(), 1);
        let record = &clipped.records()[0];
        assert!((record.geometry.unsigned_area() - 4.0).abs() < 1e-9);
        assert_eq!(record.property_str("name"), Some("edge"));
    }

    #[test]
    fn test_lines_are_cut_to_mask() {
        let line = Geometry::LineString(line_string![(x: -5.0, y: 5.0), (x: 15.0, y: 5.0)]);
        let ds = BoundaryDataset::new("rivers", 3857, vec![named(line, "river")]);
        let clipped = clip(&ds, &pe_mask()).unwrap();
        assert_eq!(clipped.len(), 1);
        let bbox = clipped.records()[0].bounding_box().unwrap();
        assert!((bbox.min_x - 0.0).abs() < 1e-9);
        assert!((bbox.max_x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_attributes_preserved_and_order_kept() {
        let ds = BoundaryDataset::new(
            "municipios",
            3857,
            vec![
                named(square(1.0, 1.0, 1.0), "a"),
                named(square(50.0, 50.0, 1.0), "gone"),
                named(square(9.0, 1.0, 2.0), "b"),
            ],
        );
        let clipped = clip(&ds, &pe_mask()).unwrap();
        let names: Vec<_> = clipped.iter().filter_map(|r| r.property_str("name")).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
