//! Small GeoJSON fixtures around Pernambuco, written to a temp directory

#![allow(dead_code)]

use brmaps::collect::paths::keys;
use brmaps::{Capabilities, PathBundle, RenderConfig};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// PE bounds in degrees: (min_lon, min_lat, max_lon, max_lat)
pub const PE_BOUNDS: (f64, f64, f64, f64) = (-41.0, -9.5, -35.0, -7.3);

pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y], [min_x, min_y]
        ]]
    })
}

pub fn feature(properties: Value, geometry: Value) -> Value {
    json!({ "type": "Feature", "properties": properties, "geometry": geometry })
}

pub fn collection(features: Vec<Value>) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}

pub fn states() -> Value {
    let (x0, y0, x1, y1) = PE_BOUNDS;
    collection(vec![
        feature(json!({ "abbreviation": "PE", "population": 9674793 }), rect(x0, y0, x1, y1)),
        feature(
            json!({ "abbreviation": "PB", "population": 4059905 }),
            rect(-38.8, -7.3, -34.8, -6.0),
        ),
        feature(
            json!({ "abbreviation": "AL", "population": 3365351 }),
            rect(-38.2, -10.5, -35.2, -9.5),
        ),
    ])
}

/// Four municipalities tiling PE, one of them without a population
pub fn municipalities() -> Value {
    collection(vec![
        feature(json!({ "name": "A", "population": 1000 }), rect(-41.0, -9.5, -38.0, -8.4)),
        feature(json!({ "name": "B", "population": 5000 }), rect(-38.0, -9.5, -35.0, -8.4)),
        feature(json!({ "name": "C", "population": "2500" }), rect(-41.0, -8.4, -38.0, -7.3)),
        feature(json!({ "name": "D", "population": null }), rect(-38.0, -8.4, -35.0, -7.3)),
    ])
}

/// Municipalities that all lie in Paraíba
pub fn municipalities_elsewhere() -> Value {
    collection(vec![feature(
        json!({ "name": "João Pessoa", "population": 833932 }),
        rect(-35.0, -7.2, -34.8, -7.0),
    )])
}

pub fn immediate_regions() -> Value {
    collection(vec![
        feature(json!({ "name": "Recife" }), rect(-38.0, -9.5, -35.0, -7.3)),
        feature(json!({ "name": "Petrolina" }), rect(-41.0, -9.5, -38.0, -7.3)),
        feature(json!({ "name": "João Pessoa" }), rect(-36.0, -7.2, -34.8, -6.0)),
    ])
}

/// Immediate regions of Paraíba only
pub fn immediate_regions_elsewhere() -> Value {
    collection(vec![feature(
        json!({ "name": "João Pessoa" }),
        rect(-36.0, -7.2, -34.8, -6.0),
    )])
}

/// One intermediate region that crosses into Alagoas
pub fn intermediate_regions() -> Value {
    collection(vec![feature(
        json!({ "name": "Recife" }),
        rect(-41.0, -10.0, -35.0, -7.3),
    )])
}

pub fn south_america() -> Value {
    collection(vec![feature(
        json!({ "name": "Brasil" }),
        rect(-74.0, -34.0, -34.5, 5.3),
    )])
}

pub struct Fixture {
    pub dir: TempDir,
    pub paths: PathBundle,
}

impl Fixture {
    /// Every dataset present
    pub fn new() -> Self {
        Fixture::empty()
            .with(keys::ESTADOS, &states())
            .with(keys::MUNICIPIOS, &municipalities())
            .with(keys::IMEDIATAS, &immediate_regions())
            .with(keys::INTERMEDIARIAS, &intermediate_regions())
            .with(keys::SULAMERICA, &south_america())
    }

    pub fn empty() -> Self {
        Fixture {
            dir: TempDir::new().unwrap(),
            paths: PathBundle::new(),
        }
    }

    /// Write `content` for `key` and register it
    pub fn with(mut self, key: &str, content: &Value) -> Self {
        let path = self.dir.path().join(format!("{}.geojson", key));
        fs::write(&path, serde_json::to_string(content).unwrap()).unwrap();
        self.paths.insert(key, path);
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        let mut paths = PathBundle::new();
        for (k, p) in self.paths.iter() {
            if k != key {
                paths.insert(k, p);
            }
        }
        self.paths = paths;
        self
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join("maps").join(name)
    }

    /// Bundle with `saida` pointing at `name` in the fixture's map directory
    pub fn bundle_to(&self, name: &str) -> PathBundle {
        self.paths.clone().with(keys::SAIDA, self.output(name))
    }
}

pub fn config() -> RenderConfig {
    RenderConfig {
        dpi: 30,
        ..RenderConfig::default()
    }
}

pub fn capabilities(config: &RenderConfig) -> Capabilities {
    Capabilities::without_fonts(config)
}

pub fn png_size(path: &Path) -> (u32, u32) {
    let decoder = png::Decoder::new(fs::File::open(path).unwrap());
    let reader = decoder.read_info().unwrap();
    let info = reader.info();
    (info.width, info.height)
}
