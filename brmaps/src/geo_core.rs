use anyhow::Result;
use geo::{Coord, Geometry, MapCoords, Rect};

/// Web-Mercator (pseudo-Mercator), the planar CRS every layer is drawn in
pub const WEB_MERCATOR: i32 = 3857;
/// WGS84 geographic coordinates, the RFC 7946 default for GeoJSON
pub const WGS84: i32 = 4326;
/// SIRGAS 2000, the geographic datum IBGE publishes its meshes in
pub const SIRGAS_2000: i32 = 4674;

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Coordinate reference handling for boundary datasets
///
/// Holds the target CRS that every loaded dataset is reprojected to.
/// Geographic <-> Web-Mercator is computed in closed form; any other pair
/// goes through PROJ when the `proj` feature is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoCore {
    /// Target EPSG code
    pub epsg: i32,
}

impl Default for GeoCore {
    fn default() -> Self {
        GeoCore::new(WEB_MERCATOR)
    }
}

impl GeoCore {
    pub fn new(epsg: i32) -> Self {
        GeoCore { epsg }
    }

    pub fn get_epsg(&self) -> i32 {
        self.epsg
    }

    /// Whether a dataset in `from_epsg` can be brought into this CRS
    pub fn supports(&self, from_epsg: i32) -> bool {
        if from_epsg == self.epsg || cfg!(feature = "proj") {
            return true;
        }
        let pair = (canonical(from_epsg), canonical(self.epsg));
        matches!(pair, (WGS84, WEB_MERCATOR) | (WEB_MERCATOR, WGS84) | (WGS84, WGS84))
    }

    /// Transform coordinates from one CRS to another
    pub fn transform_coords(from_epsg: i32, to_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
        if from_epsg == to_epsg {
            return Ok((x, y));
        }
        match (canonical(from_epsg), canonical(to_epsg)) {
            (WGS84, WGS84) => Ok((x, y)),
            (WGS84, WEB_MERCATOR) => Ok(lonlat_to_mercator(x, y)),
            (WEB_MERCATOR, WGS84) => Ok(mercator_to_lonlat(x, y)),
            _ => transform_with_proj(from_epsg, to_epsg, x, y),
        }
    }

    /// Reproject a whole geometry from `from_epsg` into this CRS
    pub fn reproject(&self, geometry: &Geometry<f64>, from_epsg: i32) -> Result<Geometry<f64>> {
        if from_epsg == self.epsg {
            return Ok(geometry.clone());
        }
        let to_epsg = self.epsg;
        match (canonical(from_epsg), canonical(to_epsg)) {
            (WGS84, WGS84) => Ok(geometry.clone()),
            (WGS84, WEB_MERCATOR) => Ok(geometry.map_coords(|c| {
                let (x, y) = lonlat_to_mercator(c.x, c.y);
                Coord { x, y }
            })),
            (WEB_MERCATOR, WGS84) => Ok(geometry.map_coords(|c| {
                let (x, y) = mercator_to_lonlat(c.x, c.y);
                Coord { x, y }
            })),
            _ => reproject_with_proj(geometry, from_epsg, to_epsg),
        }
    }
}

/// Collapse the geographic datums the built-in transform treats as WGS84.
/// SIRGAS 2000 and WGS84 agree to well under a pixel at map scale.
fn canonical(epsg: i32) -> i32 {
    match epsg {
        SIRGAS_2000 => WGS84,
        other => other,
    }
}

fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

#[cfg(feature = "proj")]
fn transform_with_proj(from_epsg: i32, to_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
    use anyhow::Context;
    use proj::Proj;

    let from_crs = format!("EPSG:{}", from_epsg);
    let to_crs = format!("EPSG:{}", to_epsg);
    let proj = Proj::new_known_crs(&from_crs, &to_crs, None)
        .context("Failed to create Proj transformation")?;
    let result = proj
        .convert((x, y))
        .context("Failed to transform coordinates")?;
    Ok(result)
}

#[cfg(not(feature = "proj"))]
fn transform_with_proj(from_epsg: i32, to_epsg: i32, _x: f64, _y: f64) -> Result<(f64, f64)> {
    anyhow::bail!(
        "EPSG:{} -> EPSG:{} needs the `proj` feature",
        from_epsg,
        to_epsg
    )
}

#[cfg(feature = "proj")]
fn reproject_with_proj(
    geometry: &Geometry<f64>,
    from_epsg: i32,
    to_epsg: i32,
) -> Result<Geometry<f64>> {
    use anyhow::Context;
    use proj::Proj;

    let from_crs = format!("EPSG:{}", from_epsg);
    let to_crs = format!("EPSG:{}", to_epsg);
    let proj = Proj::new_known_crs(&from_crs, &to_crs, None)
        .context("Failed to create Proj transformation")?;
    let proj = &proj;
    geometry
        .try_map_coords(|c| proj.convert(c))
        .context("Failed to reproject geometry")
}

#[cfg(not(feature = "proj"))]
fn reproject_with_proj(
    _geometry: &Geometry<f64>,
    from_epsg: i32,
    to_epsg: i32,
) -> Result<Geometry<f64>> {
    anyhow::bail!(
        "EPSG:{} -> EPSG:{} needs the `proj` feature",
        from_epsg,
        to_epsg
    )
}

/// Axis-aligned bounding box in the working CRS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_rect(rect: Rect<f64>) -> Self {
        BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow each side by `fraction` of the box's own width/height
    pub fn expand(&self, fraction: f64) -> Self {
        let dx = self.width() * fraction;
        let dy = self.height() * fraction;
        BoundingBox::new(
            self.min_x - dx,
            self.min_y - dy,
            self.max_x + dx,
            self.max_y + dy,
        )
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Finite with a positive width and height
    pub fn has_area(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }

    /// Widen a zero-extent side so the box can be framed
    pub fn non_degenerate(&self) -> Self {
        let mut bbox = *self;
        if bbox.width() <= f64::EPSILON {
            bbox.min_x -= 0.5;
            bbox.max_x += 0.5;
        }
        if bbox.height() <= f64::EPSILON {
            bbox.min_y -= 0.5;
            bbox.max_y += 0.5;
        }
        bbox
    }

    /// Transform bounding box to another CRS
    pub fn transform(&self, from_epsg: i32, to_epsg: i32) -> Result<Self> {
        let (min_x, min_y) = GeoCore::transform_coords(from_epsg, to_epsg, self.min_x, self.min_y)?;
        let (max_x, max_y) = GeoCore::transform_coords(from_epsg, to_epsg, self.max_x, self.max_y)?;

        Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
    }
}
