//! Error types for the indicator pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that stop a pipeline run. No partial report is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdvisorError {
    #[error("invalid parameter {name}={value}: expected {min}..={max}")]
    InvalidParameter {
        name: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },

    #[error("insufficient data: {supplied} bars supplied, at least {required} required")]
    InsufficientData { supplied: usize, required: usize },
}

impl AdvisorError {
    /// Stable identifier for API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            AdvisorError::InvalidParameter { .. } => "invalid_parameter",
            AdvisorError::InsufficientData { .. } => "insufficient_data",
        }
    }
}

/// Degenerate but well-defined input. Reported alongside a successful run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegenerateInput {
    /// Lookback windows where every close was equal (range == 0)
    #[error("flat price window at {positions} positions")]
    FlatWindow { positions: usize },

    /// Oscillator pinned at 0 or 100
    #[error("oscillator saturated at {positions} positions")]
    OscillatorSaturated { positions: usize },
}
