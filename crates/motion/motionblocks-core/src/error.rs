//! Error types for construction and boundary conversions.
//!
//! Runtime operations on the orchestrator never return these: duplicate runs,
//! unknown instruction kinds and missing entities resolve as no-ops. Errors
//! only surface when building an engine or parsing host-provided data.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum MotionError {
    /// A config field is out of its valid range
    #[error("Invalid config: {field} {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Canvas bounds must be finite and strictly positive
    #[error("Invalid canvas bounds: {width} x {height}")]
    InvalidBounds { width: f32, height: f32 },

    /// Entity is not registered with the store
    #[error("Entity not found: {id}")]
    UnknownEntity { id: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl MotionError {
    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } | Self::InvalidBounds { .. } => "config",
            Self::UnknownEntity { .. } => "entity",
            Self::Serialization { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for MotionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
