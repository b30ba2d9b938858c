//! Error taxonomy for map generation
//!
//! Every failure a map request can hit is caught at the driver boundary,
//! logged, and returned as a `MapError`. No variant is ever raised after the
//! output file has started to be written.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for brmaps operations
pub type Result<T> = std::result::Result<T, MapError>;

/// Coarse classification of a `MapError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingInputFile,
    StateNotFound,
    EmptyClipResult,
    MissingOrInvalidColumn,
    InvalidRequest,
    UnexpectedLibrary,
}

#[derive(Error, Debug)]
pub enum MapError {
    #[error("no path registered for dataset '{key}'")]
    MissingPathEntry { key: String },

    #[error("input file for '{key}' not found: {}", path.display())]
    MissingInputFile { key: String, path: PathBuf },

    #[error("required input files missing: {}", keys.join(", "))]
    MissingInputFiles { keys: Vec<String> },

    #[error("state '{code}' not found in {dataset}")]
    StateNotFound { code: String, dataset: String },

    #[error("clipping '{dataset}' to {state} left no geometry")]
    EmptyClip { dataset: String, state: String },

    #[error("column '{column}' not found in {dataset}")]
    MissingColumn { column: String, dataset: String },

    #[error("column '{column}' in {dataset} is unusable: {reason}")]
    InvalidColumn {
        column: String,
        dataset: String,
        reason: String,
    },

    #[error("invalid state code '{0}': expected two ASCII letters")]
    InvalidStateCode(String),

    #[error("invalid map request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Library(#[from] anyhow::Error),
}

impl MapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::MissingPathEntry { .. }
            | MapError::MissingInputFile { .. }
            | MapError::MissingInputFiles { .. } => ErrorKind::MissingInputFile,
            MapError::StateNotFound { .. } => ErrorKind::StateNotFound,
            MapError::EmptyClip { .. } => ErrorKind::EmptyClipResult,
            MapError::MissingColumn { .. } | MapError::InvalidColumn { .. } => {
                ErrorKind::MissingOrInvalidColumn
            }
            MapError::InvalidStateCode(_) | MapError::InvalidRequest(_) => {
                ErrorKind::InvalidRequest
            }
            MapError::Library(_) => ErrorKind::UnexpectedLibrary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = MapError::StateNotFound {
            code: "ZZ".to_string(),
            dataset: "estados".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::StateNotFound);

        let err = MapError::MissingColumn {
            column: "population".to_string(),
            dataset: "municipios".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::MissingOrInvalidColumn);

        let err = MapError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.kind(), ErrorKind::UnexpectedLibrary);
    }

    #[test]
    fn test_missing_files_message_lists_keys() {
        let err = MapError::MissingInputFiles {
            keys: vec!["imediatas".to_string(), "intermediarias".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "required input files missing: imediatas, intermediarias"
        );
    }
}
