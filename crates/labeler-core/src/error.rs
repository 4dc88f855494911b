//! Error taxonomy of the session engine

use thiserror::Error;

/// Errors raised by region, annotation and session operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LabelerError {
    /// Region end must be strictly after its start
    #[error("invalid range: end {end} must be greater than start {start}")]
    InvalidRange { start: f64, end: f64 },

    /// The id is no longer present (a cascade may have removed it first)
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Reading or writing the session file failed
    #[error("failed to persist session to {path}: {message}")]
    Persistence { path: String, message: String },

    /// The stored session file does not match the expected shape
    #[error("malformed session file: {0}")]
    MalformedSession(String),
}

impl LabelerError {
    pub fn region_not_found(id: &str) -> Self {
        LabelerError::NotFound {
            kind: "region",
            id: id.to_string(),
        }
    }

    /// Errors the host may drop after logging
    pub fn is_benign(&self) -> bool {
        matches!(self, LabelerError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, LabelerError>;
