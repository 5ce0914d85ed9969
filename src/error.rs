//! Error taxonomy for culture simulations
//!
//! Every failure the crate can report is a variant of [`SimulationError`].
//! Nothing is recovered internally: configuration, dimensional and statistical
//! errors surface as soon as they are detected, integration failures surface
//! once the run has completed and its diagnostics are available.

use thiserror::Error;

/// Root error type for all simulation failures.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Malformed configuration (bad namespace, wrong value type, absent initial conditions).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required external driver (feed or temperature profile) was not supplied.
    #[error("configuration error: missing external driver ({0} profile)")]
    MissingDriver(&'static str),

    /// Unit-incompatible assignment to a parameter or initial-condition field.
    #[error("dimensionality error in setting {field}, cannot convert from: {from} to: {to}")]
    Dimensionality {
        field: String,
        from: String,
        to: String,
    },

    /// Field name not declared by the target structure.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Unit expression could not be parsed.
    #[error("cannot parse unit expression '{expression}': {reason}")]
    UnitParse { expression: String, reason: String },

    /// Integrator finished with a non-success diagnostic.
    #[error("integration failed: {message}")]
    Integration { message: String },

    /// Invalid statistical input (negative noise scale).
    #[error("statistical error: {0}")]
    Statistical(String),

    /// Invalid numerical input (non-finite values, empty grids, bad tolerances).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimulationError {
    /// True for errors in the configuration class (including missing drivers)
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::MissingDriver(_) | Self::Json(_))
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
