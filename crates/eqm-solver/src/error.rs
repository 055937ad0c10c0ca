//! Error types for equilibrium solving.

use crate::report::FailureReport;
use eqm_thermo::ThermoError;
use thiserror::Error;

/// Errors that can occur while setting up or solving an equilibrium problem.
#[derive(Error, Debug)]
pub enum EquilibriumError {
    /// Bad ensemble flags, bounds or tuning values.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    /// The optimizer stopped without meeting its tolerance.
    #[error("Equilibrium not found: {0}")]
    NotFound(Box<FailureReport>),

    #[error("Thermo error: {0}")]
    Thermo(#[from] ThermoError),

    #[error("Numeric error: {what}")]
    Numeric { what: String },
}

pub type EquilibriumResult<T> = Result<T, EquilibriumError>;

impl EquilibriumError {
    pub(crate) fn configuration(what: impl Into<String>) -> Self {
        Self::Configuration { what: what.into() }
    }

    pub(crate) fn numeric(what: impl Into<String>) -> Self {
        Self::Numeric { what: what.into() }
    }

    /// Failure report for `NotFound`.
    pub fn report(&self) -> Option<&FailureReport> {
        match self {
            Self::NotFound(report) => Some(report),
            _ => None,
        }
    }
}
