use anyhow::{anyhow, Context};
use geo::{BoundingRect, Geometry};
use geojson::{GeoJson, JsonObject, JsonValue};
use log::{debug, info};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{MapError, Result};
use crate::geo_core::{BoundingBox, GeoCore, WGS84};
use crate::geometric::repair::buffer_zero;

/// One named geographic record: a geometry plus its attributes
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRecord {
    pub geometry: Geometry<f64>,
    pub properties: JsonObject,
}

impl BoundaryRecord {
    pub fn new(geometry: Geometry<f64>, properties: JsonObject) -> Self {
        BoundaryRecord {
            geometry,
            properties,
        }
    }

    pub fn property(&self, key: &str) -> Option<&JsonValue> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(JsonValue::as_str)
    }

    /// Attribute as a number. Numeric strings ("1234", " 5.5 ") count;
    /// null, booleans and non-numeric text do not.
    pub fn numeric(&self, key: &str) -> Option<f64> {
        match self.property(key)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.geometry.bounding_rect().map(BoundingBox::from_rect)
    }
}

/// An ordered collection of boundary records in a single CRS
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryDataset {
    /// Logical name, used in messages ("estados", "municipios", ...)
    pub name: String,
    /// EPSG code the geometries are expressed in
    pub epsg: i32,
    records: Vec<BoundaryRecord>,
}

impl BoundaryDataset {
    pub fn new(name: &str, epsg: i32, records: Vec<BoundaryRecord>) -> Self {
        BoundaryDataset {
            name: name.to_string(),
            epsg,
            records,
        }
    }

    /// Read a GeoJSON file and reproject it into `geo_core`'s CRS
    pub fn from_path(name: &str, path: &Path, geo_core: &GeoCore) -> Result<Self> {
        if !path.exists() {
            return Err(MapError::MissingInputFile {
                key: name.to_string(),
                path: path.to_path_buf(),
            });
        }
        info!("Loading '{}' from {}", name, path.display());

        let file = File::open(path)
            .with_context(|| format!("Failed to open GeoJSON file: {}", path.display()))?;
        let geojson = GeoJson::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse GeoJSON file: {}", path.display()))?;

        Self::from_geojson(name, geojson, geo_core)
    }

    /// Parse GeoJSON text and reproject it into `geo_core`'s CRS
    pub fn from_geojson_str(name: &str, content: &str, geo_core: &GeoCore) -> Result<Self> {
        let geojson: GeoJson = content
            .parse()
            .with_context(|| format!("Failed to parse GeoJSON for '{}'", name))?;
        Self::from_geojson(name, geojson, geo_core)
    }

    pub fn from_geojson(name: &str, geojson: GeoJson, geo_core: &GeoCore) -> Result<Self> {
        let (features, foreign_members) = match geojson {
            GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
            GeoJson::Feature(f) => {
                let foreign = f.foreign_members.clone();
                (vec![f], foreign)
            }
            GeoJson::Geometry(g) => (vec![geojson::Feature::from(g)], None),
        };
        let source_epsg = source_epsg(foreign_members.as_ref())?;

        let mut records = Vec::with_capacity(features.len());
        let mut skipped = 0usize;
        for feature in features {
            let Some(geometry) = feature.geometry else {
                skipped += 1;
                continue;
            };
            let geometry = Geometry::<f64>::try_from(geometry)
                .with_context(|| format!("Unsupported geometry in '{}'", name))?;
            let geometry = geo_core.reproject(&geometry, source_epsg).with_context(|| {
                format!(
                    "Failed to reproject '{}' from EPSG:{} to EPSG:{}",
                    name,
                    source_epsg,
                    geo_core.get_epsg()
                )
            })?;
            records.push(BoundaryRecord::new(
                geometry,
                feature.properties.unwrap_or_default(),
            ));
        }
        if skipped > 0 {
            debug!("'{}': skipped {} features without geometry", name, skipped);
        }
        debug!(
            "'{}': {} records reprojected EPSG:{} -> EPSG:{}",
            name,
            records.len(),
            source_epsg,
            geo_core.get_epsg()
        );

        Ok(BoundaryDataset::new(name, geo_core.get_epsg(), records))
    }

    pub fn records(&self) -> &[BoundaryRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundaryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Extent of every record, `None` when the dataset has no geometry
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.records
            .iter()
            .filter_map(BoundaryRecord::bounding_box)
            .reduce(|a, b| a.union(&b))
    }

    /// Copy of the dataset with every geometry passed through a
    /// zero-distance buffer
    pub fn repaired(&self) -> Self {
        let records = self
            .records
            .iter()
            .map(|r| BoundaryRecord::new(buffer_zero(&r.geometry), r.properties.clone()))
            .collect();
        BoundaryDataset::new(&self.name, self.epsg, records)
    }

    /// The attribute key matching `column`: exact match first, then ASCII
    /// case-insensitive. `None` if no record carries it.
    pub fn resolve_column(&self, column: &str) -> Option<String> {
        if self.records.iter().any(|r| r.properties.contains_key(column)) {
            return Some(column.to_string());
        }
        self.records
            .iter()
            .flat_map(|r| r.properties.keys())
            .find(|k| k.eq_ignore_ascii_case(column))
            .cloned()
    }
}

/// EPSG code declared by a legacy `crs` member, WGS84 when absent
fn source_epsg(foreign_members: Option<&JsonObject>) -> Result<i32> {
    let Some(crs) = foreign_members.and_then(|m| m.get("crs")) else {
        return Ok(WGS84);
    };
    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| anyhow!("Malformed 'crs' member: {}", crs))?;
    Ok(parse_crs_name(name).ok_or_else(|| anyhow!("Unrecognised CRS name '{}'", name))?)
}

/// "EPSG:4674", "urn:ogc:def:crs:EPSG::4674", "urn:ogc:def:crs:OGC:1.3:CRS84"
fn parse_crs_name(name: &str) -> Option<i32> {
    if name.ends_with("CRS84") {
        return Some(WGS84);
    }
    let upper = name.to_ascii_uppercase();
    let idx = upper.rfind("EPSG")?;
    upper[idx + 4..]
        .trim_start_matches(':')
        .trim()
        .parse::<i32>()
        .ok()
}
