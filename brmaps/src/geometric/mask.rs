use geo::{BoundingRect, MultiPolygon};
use log::info;
use std::fmt;
use std::str::FromStr;

use crate::error::{MapError, Result};
use crate::geo_core::BoundingBox;
use crate::geometric::boundary::BoundaryDataset;
use crate::geometric::ops::{self, polygonal_parts};
use crate::geometric::repair::buffer_zero;

/// Two-letter state abbreviation, always uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateCode(String);

impl StateCode {
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        if trimmed.len() != 2 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MapError::InvalidStateCode(code.to_string()));
        }
        Ok(StateCode(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form used in file names
    pub fn lower(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl FromStr for StateCode {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        StateCode::parse(s)
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single state's repaired boundary, used to clip and frame other layers
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub code: StateCode,
    pub geometry: MultiPolygon<f64>,
    pub bbox: BoundingBox,
}

/// Select the record of `states` whose `field` equals `code` and repair it
/// with a zero-distance buffer. A state stored as several records (islands
/// split into features) is merged into one mask.
pub fn derive_mask(states: &BoundaryDataset, code: &StateCode, field: &str) -> Result<Mask> {
    let matches: Vec<_> = states
        .iter()
        .filter(|r| {
            r.property_str(field)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(code.as_str()))
        })
        .collect();
    if matches.is_empty() {
        return Err(MapError::StateNotFound {
            code: code.to_string(),
            dataset: states.name.clone(),
        });
    }

    let mut geometry = MultiPolygon::new(Vec::new());
    for record in &matches {
        let repaired = polygonal_parts(&buffer_zero(&record.geometry));
        geometry = if geometry.0.is_empty() {
            repaired
        } else {
            ops::union(&geometry, &repaired)?
        };
    }

    let bbox = geometry
        .bounding_rect()
        .map(BoundingBox::from_rect)
        .ok_or_else(|| MapError::StateNotFound {
            code: code.to_string(),
            dataset: states.name.clone(),
        })?;

    info!(
        "Mask for {} derived from {} record(s) of '{}'",
        code,
        matches.len(),
        states.name
    );
    Ok(Mask {
        code: code.clone(),
        geometry,
        bbox,
    })
}
