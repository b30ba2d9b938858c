use geo::{BooleanOps, Geometry, MultiPolygon, Polygon};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Every polygon contained in `geometry`, flattened into one multipolygon.
/// Points and lines contribute nothing.
pub fn polygonal_parts(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    let mut parts = Vec::new();
    collect_polygons(geometry, &mut parts);
    MultiPolygon::new(parts)
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.iter() {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

/// Whether `geometry` carries any area at all
pub fn is_polygonal(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => true,
        Geometry::GeometryCollection(gc) => gc.iter().any(is_polygonal),
        _ => false,
    }
}

/// Intersection of two multipolygons. The sweep in `geo` can panic on
/// degenerate rings; that surfaces as an error instead of unwinding through
/// the caller.
pub fn intersection(
    a: &MultiPolygon<f64>,
    b: &MultiPolygon<f64>,
) -> anyhow::Result<MultiPolygon<f64>> {
    catch_unwind(AssertUnwindSafe(|| a.intersection(b)))
        .map_err(|_| anyhow::anyhow!("polygon intersection failed on degenerate input"))
}

/// Union of two multipolygons, see `intersection`
pub fn union(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> anyhow::Result<MultiPolygon<f64>> {
    catch_unwind(AssertUnwindSafe(|| a.union(b)))
        .map_err(|_| anyhow::anyhow!("polygon union failed on degenerate input"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, Area, GeometryCollection};

    #[test]
    fn test_polygonal_parts_flattens_collections() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        let gc = Geometry::GeometryCollection(GeometryCollection(vec![
            Geometry::Polygon(square),
            Geometry::Point(point!(x: 5.0, y: 5.0)),
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0)]),
        ]));
        let parts = polygonal_parts(&gc);
        assert_eq!(parts.0.len(), 1);
        assert!(is_polygonal(&gc));
        assert!(!is_polygonal(&Geometry::Point(point!(x: 0.0, y: 0.0))));
    }

    #[test]
    fn test_union_of_overlapping_squares() {
        let a = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ]]);
        let b = MultiPolygon::new(vec![polygon![
            (x: 1.0, y: 0.0),
            (x: 3.0, y: 0.0),
            (x: 3.0, y: 2.0),
            (x: 1.0, y: 2.0),
            (x: 1.0, y: 0.0),
        ]]);
        let u = union(&a, &b).unwrap();
        assert!((u.unsigned_area() - 6.0).abs() < 1e-9);
        let i = intersection(&a, &b).unwrap();
        assert!((i.unsigned_area() - 2.0).abs() < 1e-9);
    }
}
