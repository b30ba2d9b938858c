//! Rendering configuration and start-up capabilities

use anyhow::Context;
use log::{info, warn};
use resvg::usvg::fontdb;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::geo_core::{GeoCore, WGS84};

/// Figure and data settings shared by every map request
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output resolution in dots per inch
    pub dpi: u32,
    /// Figure width before tight cropping, in inches
    pub figure_width_in: f32,
    /// Figure height before tight cropping, in inches
    pub figure_height_in: f32,
    /// Padding kept around the tight bounding box, in inches
    pub pad_inches: f32,
    /// Planar CRS every layer is reprojected to
    pub target_epsg: i32,
    /// Attribute holding the two-letter state abbreviation
    pub state_field: String,
    /// CSS-style font family list for titles and legends
    pub font_family: String,
    /// Title size in points
    pub title_size_pt: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            dpi: 300,
            figure_width_in: 10.0,
            figure_height_in: 10.0,
            pad_inches: 0.05,
            target_epsg: crate::geo_core::WEB_MERCATOR,
            state_field: "abbreviation".to_string(),
            font_family: "DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif".to_string(),
            title_size_pt: 16.0,
        }
    }
}

impl RenderConfig {
    /// Load a configuration from a JSON file; absent keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: RenderConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn geo_core(&self) -> GeoCore {
        GeoCore::new(self.target_epsg)
    }
}

/// What this process can do, resolved once at start-up and handed to every
/// map request.
#[derive(Clone)]
pub struct Capabilities {
    /// The configured target CRS can be produced from geographic input
    pub maps_available: bool,
    /// Read-only font database used for titles and legends
    pub fonts: Arc<fontdb::Database>,
}

impl Capabilities {
    /// Probe projection support and load the system fonts
    pub fn detect(config: &RenderConfig) -> Self {
        let maps_available = config.geo_core().supports(WGS84);
        if !maps_available {
            warn!(
                "EPSG:{} is not reachable without the `proj` feature; map generation disabled",
                config.target_epsg
            );
        }

        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        if db.is_empty() {
            warn!("No system fonts found; titles and legends will be drawn without text");
        } else {
            info!("Loaded {} font faces", db.len());
        }

        Capabilities {
            maps_available,
            fonts: Arc::new(db),
        }
    }

    /// Capabilities without any font, for headless use
    pub fn without_fonts(config: &RenderConfig) -> Self {
        Capabilities {
            maps_available: config.geo_core().supports(WGS84),
            fonts: Arc::new(fontdb::Database::new()),
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("maps_available", &self.maps_available)
            .field("font_faces", &self.fonts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.target_epsg, 3857);
        assert_eq!(config.state_field, "abbreviation");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("render.json");
        std::fs::write(&path, r#"{ "dpi": 72, "state_field": "sigla" }"#).unwrap();

        let config = RenderConfig::from_json_file(&path).unwrap();
        assert_eq!(config.dpi, 72);
        assert_eq!(config.state_field, "sigla");
        assert_eq!(config.figure_width_in, 10.0);
    }

    #[test]
    fn test_capabilities_without_fonts() {
        let caps = Capabilities::without_fonts(&RenderConfig::default());
        assert!(caps.maps_available);
        assert!(caps.fonts.is_empty());
    }
}
