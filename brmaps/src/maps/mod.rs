//! Map products and the requests that drive them

pub mod driver;
pub mod plan;
pub mod report;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::collect::paths::{keys, PathBundle};
use crate::error::{MapError, Result};
use crate::geo_core::BoundingBox;
use crate::geometric::mask::StateCode;
use crate::render::style::ColorMap;

pub use driver::MapDriver;
pub use plan::MapPlan;
pub use report::{run_state_report, ReportEntry};

/// Which regional division a clipped-region map shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionType {
    Immediate,
    Intermediate,
}

impl RegionType {
    /// Logical dataset name in the path bundle
    pub fn dataset_key(&self) -> &'static str {
        match self {
            RegionType::Immediate => keys::IMEDIATAS,
            RegionType::Intermediate => keys::INTERMEDIARIAS,
        }
    }

    /// Word used in titles
    pub fn title_word(&self) -> &'static str {
        match self {
            RegionType::Immediate => "Imediatas",
            RegionType::Intermediate => "Intermediarias",
        }
    }
}

impl FromStr for RegionType {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" | "imediata" | "imediatas" => Ok(RegionType::Immediate),
            "intermediate" | "intermediaria" | "intermediarias" => Ok(RegionType::Intermediate),
            other => Err(MapError::InvalidRequest(format!(
                "unknown region type '{}' (expected immediate or intermediate)",
                other
            ))),
        }
    }
}

/// The six map products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKind {
    Highlight,
    Zoom,
    MunicipalityChoropleth,
    StateChoropleth,
    RegionalDivision,
    ClippedRegion(RegionType),
}

impl MapKind {
    pub fn needs_state(&self) -> bool {
        !matches!(self, MapKind::StateChoropleth)
    }

    pub fn needs_column(&self) -> bool {
        matches!(
            self,
            MapKind::MunicipalityChoropleth | MapKind::StateChoropleth
        )
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKind::Highlight => f.write_str("highlight"),
            MapKind::Zoom => f.write_str("zoom"),
            MapKind::MunicipalityChoropleth => f.write_str("municipality choropleth"),
            MapKind::StateChoropleth => f.write_str("state choropleth"),
            MapKind::RegionalDivision => f.write_str("regional division"),
            MapKind::ClippedRegion(RegionType::Immediate) => f.write_str("immediate regions"),
            MapKind::ClippedRegion(RegionType::Intermediate) => {
                f.write_str("intermediate regions")
            }
        }
    }
}

/// One map to produce: what, for which state, from which files
#[derive(Debug, Clone, PartialEq)]
pub struct MapRequest {
    pub kind: MapKind,
    pub state: Option<StateCode>,
    pub column: Option<String>,
    /// Overrides the plan's colour map on choropleth layers
    pub cmap: Option<ColorMap>,
    pub paths: PathBundle,
}

impl MapRequest {
    pub fn new(kind: MapKind, paths: PathBundle) -> Self {
        MapRequest {
            kind,
            state: None,
            column: None,
            cmap: None,
            paths,
        }
    }

    pub fn with_state(mut self, state: StateCode) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    pub fn with_cmap(mut self, cmap: ColorMap) -> Self {
        self.cmap = Some(cmap);
        self
    }

    pub fn highlight(state: StateCode, paths: PathBundle) -> Self {
        MapRequest::new(MapKind::Highlight, paths).with_state(state)
    }

    pub fn zoom(state: StateCode, paths: PathBundle) -> Self {
        MapRequest::new(MapKind::Zoom, paths).with_state(state)
    }

    pub fn municipality_choropleth(state: StateCode, column: &str, paths: PathBundle) -> Self {
        MapRequest::new(MapKind::MunicipalityChoropleth, paths)
            .with_state(state)
            .with_column(column)
    }

    pub fn state_choropleth(column: &str, paths: PathBundle) -> Self {
        MapRequest::new(MapKind::StateChoropleth, paths).with_column(column)
    }

    pub fn regional_division(state: StateCode, paths: PathBundle) -> Self {
        MapRequest::new(MapKind::RegionalDivision, paths).with_state(state)
    }

    pub fn clipped_region(state: StateCode, region: RegionType, paths: PathBundle) -> Self {
        MapRequest::new(MapKind::ClippedRegion(region), paths).with_state(state)
    }

    /// State code, or an error for kinds that need one
    pub fn require_state(&self) -> Result<&StateCode> {
        self.state.as_ref().ok_or_else(|| {
            MapError::InvalidRequest(format!("a {} map needs a state code", self.kind))
        })
    }

    /// Non-empty column name, or an error
    pub fn require_column(&self) -> Result<&str> {
        self.column
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                MapError::InvalidRequest(format!("a {} map needs a data column", self.kind))
            })
    }

    /// Check the arguments the kind needs are present
    pub fn validate(&self) -> Result<()> {
        if self.kind.needs_state() {
            self.require_state()?;
        }
        if self.kind.needs_column() {
            self.require_column()?;
        }
        Ok(())
    }
}

/// Default output file name of a map, e.g. `mapa_zoom_municipios_pe.png`
pub fn output_file_name(
    kind: MapKind,
    state: Option<&StateCode>,
    column: Option<&str>,
) -> Result<String> {
    let uf = || {
        state.map(StateCode::lower).ok_or_else(|| {
            MapError::InvalidRequest(format!("a {} map needs a state code", kind))
        })
    };
    let col = || {
        column
            .map(sanitize)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| MapError::InvalidRequest(format!("a {} map needs a data column", kind)))
    };
    Ok(match kind {
        MapKind::Highlight => format!("mapa_destaque_{}.png", uf()?),
        MapKind::Zoom => format!("mapa_zoom_municipios_{}.png", uf()?),
        MapKind::MunicipalityChoropleth => {
            format!("mapa_coropleth_municipios_{}_{}.png", uf()?, col()?)
        }
        MapKind::StateChoropleth => format!("mapa_coropleth_estados_{}.png", col()?),
        MapKind::RegionalDivision => format!("mapa_divisoes_{}.png", uf()?),
        MapKind::ClippedRegion(region) => {
            format!("mapa_regiao_{}_{}.png", region.dataset_key(), uf()?)
        }
    })
}

/// Lowercase ASCII alphanumerics, everything else folded to `_`
fn sanitize(column: &str) -> String {
    column
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// A layer as it was painted
#[derive(Debug, Clone, PartialEq)]
pub struct PaintedLayer {
    pub name: String,
    pub z: i32,
    pub features: usize,
}

/// What a successful map run produced
#[derive(Debug, Clone, PartialEq)]
pub struct MapOutcome {
    pub kind: MapKind,
    pub output: PathBuf,
    pub title: String,
    /// Axis limits in the working CRS
    pub viewport: BoundingBox,
    /// Image size after cropping
    pub size_px: (u32, u32),
    /// Layers in paint order
    pub layers: Vec<PaintedLayer>,
    pub legend: Vec<String>,
    /// An optional layer was replaced by its fallback
    pub fallback_used: bool,
}

impl MapOutcome {
    pub fn layer(&self, name: &str) -> Option<&PaintedLayer> {
        self.layers.iter().find(|l| l.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pe() -> StateCode {
        StateCode::parse("pe").unwrap()
    }

    #[test]
    fn test_output_names() {
        let pe = pe();
        assert_eq!(
            output_file_name(MapKind::Highlight, Some(&pe), None).unwrap(),
            "mapa_destaque_pe.png"
        );
        assert_eq!(
            output_file_name(MapKind::MunicipalityChoropleth, Some(&pe), Some("Population"))
                .unwrap(),
            "mapa_coropleth_municipios_pe_population.png"
        );
        assert_eq!(
            output_file_name(MapKind::StateChoropleth, None, Some("area km2")).unwrap(),
            "mapa_coropleth_estados_area_km2.png"
        );
        assert_eq!(
            output_file_name(MapKind::ClippedRegion(RegionType::Intermediate), Some(&pe), None)
                .unwrap(),
            "mapa_regiao_intermediarias_pe.png"
        );
        assert!(output_file_name(MapKind::Zoom, None, None).is_err());
    }

    #[test]
    fn test_region_type_parsing() {
        assert_eq!("Imediatas".parse::<RegionType>().unwrap(), RegionType::Immediate);
        assert_eq!(
            "intermediate".parse::<RegionType>().unwrap(),
            RegionType::Intermediate
        );
        assert!("metro".parse::<RegionType>().is_err());
    }

    #[test]
    fn test_request_validation() {
        let paths = PathBundle::new();
        assert!(MapRequest::highlight(pe(), paths.clone()).validate().is_ok());
        assert!(MapRequest::new(MapKind::Zoom, paths.clone()).validate().is_err());
        assert!(MapRequest::state_choropleth("  ", paths.clone()).validate().is_err());
        assert!(MapRequest::state_choropleth("population", paths).validate().is_ok());
    }
}
