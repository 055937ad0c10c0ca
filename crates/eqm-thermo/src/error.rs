//! Thermodynamic model errors.

use eqm_core::CoreError;
use thiserror::Error;

/// Result type for thermodynamic operations.
pub type ThermoResult<T> = Result<T, ThermoError>;

/// Errors raised by compositions, standard-state data and phase models.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThermoError {
    /// Standard-state data requested outside its tabulated temperature range.
    #[error(
        "Temperature {t_k} K outside data range [{t_min_k}, {t_max_k}] K for {species} ({phase})"
    )]
    DataRange {
        species: String,
        phase: String,
        t_k: f64,
        t_min_k: f64,
        t_max_k: f64,
    },

    /// Division of a composition by zero (or normalisation of an empty one).
    #[error("Division by zero: {what}")]
    Division { what: &'static str },

    /// Temperature inversion did not converge.
    #[error("Root find failed for {what} after {iterations} iterations (residual {residual:e})")]
    RootFind {
        what: &'static str,
        iterations: usize,
        residual: f64,
    },

    /// Operation has no definition for this phase model.
    #[error("Not implemented: {what}")]
    NotImplemented { what: &'static str },

    #[error("Unknown species: {species}")]
    UnknownSpecies { species: String },

    #[error("No {phase} data for species {species}")]
    MissingPhase { species: String, phase: String },

    #[error("Cannot parse formula '{formula}': {reason}")]
    Formula { formula: String, reason: String },

    /// Non-physical values (negative temperature, pressure, etc.).
    #[error("Non-physical value for {what}")]
    NonPhysical { what: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}

impl From<CoreError> for ThermoError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NonFinite { what, .. } => ThermoError::NonPhysical { what },
            CoreError::InvalidArg { what } => ThermoError::InvalidArg { what },
        }
    }
}
