use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::collect::global_variables::{
    municipalities_file, IMMEDIATE_REGIONS_FILE, INTERMEDIATE_REGIONS_FILE, SOUTH_AMERICA_FILE,
    STATES_FILE,
};
use crate::error::{MapError, Result};

/// Logical dataset names understood by the map driver
pub mod keys {
    pub const ESTADOS: &str = "estados";
    pub const MUNICIPIOS: &str = "municipios";
    pub const IMEDIATAS: &str = "imediatas";
    pub const INTERMEDIARIAS: &str = "intermediarias";
    pub const SULAMERICA: &str = "sulamerica";
    pub const SAIDA: &str = "saida";
}

/// Mapping from logical dataset name to a file path.
/// Supplied by the caller and only ever read by the driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathBundle {
    paths: BTreeMap<String, PathBuf>,
}

/// One line of `PathBundle::diagnose`
#[derive(Debug, Clone, PartialEq)]
pub struct PathStatus {
    pub key: String,
    pub path: PathBuf,
    pub exists: bool,
}

impl PathBundle {
    pub fn new() -> Self {
        PathBundle::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, path: impl Into<PathBuf>) -> Self {
        self.insert(key, path);
        self
    }

    pub fn insert(&mut self, key: &str, path: impl Into<PathBuf>) {
        self.paths.insert(key.to_string(), path.into());
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.paths.get(key).map(PathBuf::as_path)
    }

    /// Path registered under `key`, whether or not the file exists
    pub fn require(&self, key: &str) -> Result<&Path> {
        self.get(key).ok_or_else(|| MapError::MissingPathEntry {
            key: key.to_string(),
        })
    }

    /// Path registered under `key` that also exists on disk
    pub fn require_existing(&self, key: &str) -> Result<&Path> {
        let path = self.require(key)?;
        if !path.exists() {
            return Err(MapError::MissingInputFile {
                key: key.to_string(),
                path: path.to_path_buf(),
            });
        }
        Ok(path)
    }

    /// Path under `key` only if it is registered and present
    pub fn existing(&self, key: &str) -> Option<&Path> {
        self.get(key).filter(|p| p.exists())
    }

    /// Keys among `required` that are unregistered or absent on disk
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|key| self.existing(key).is_none())
            .map(|key| key.to_string())
            .collect()
    }

    /// Where the rendered image goes
    pub fn output(&self) -> Result<&Path> {
        self.require(keys::SAIDA)
    }

    /// Default layout: fetched datasets in `output_dir`, the South America
    /// base layer in `shared_dir`. The municipality mesh is per state, so it
    /// is only registered when a state is given. No `saida` entry is set.
    pub fn standard(output_dir: &Path, shared_dir: &Path, state: Option<&str>) -> Self {
        let mut bundle = PathBundle::new()
            .with(keys::ESTADOS, output_dir.join(STATES_FILE))
            .with(keys::IMEDIATAS, output_dir.join(IMMEDIATE_REGIONS_FILE))
            .with(keys::INTERMEDIARIAS, output_dir.join(INTERMEDIATE_REGIONS_FILE))
            .with(keys::SULAMERICA, shared_dir.join(SOUTH_AMERICA_FILE));
        if let Some(state) = state {
            bundle.insert(keys::MUNICIPIOS, output_dir.join(municipalities_file(state)));
        }
        bundle
    }

    /// Overlay every entry of `other` on top of this bundle
    pub fn merge(&mut self, other: PathBundle) {
        self.paths.extend(other.paths);
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read path bundle: {}", path.display()))?;
        let bundle: PathBundle = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse path bundle: {}", path.display()))?;
        Ok(bundle)
    }

    /// Every registered entry with its existence on disk, sorted by key
    pub fn diagnose(&self) -> Vec<PathStatus> {
        self.paths
            .iter()
            .map(|(key, path)| PathStatus {
                key: key.clone(),
                path: path.clone(),
                exists: path.exists(),
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.paths.iter().map(|(k, p)| (k.as_str(), p.as_path()))
    }
}
