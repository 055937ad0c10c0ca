//! Solve diagnostics: iteration records, success summaries, failure reports.

use eqm_thermo::PhaseState;
use std::fmt;

/// State of the optimizer at the start of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    pub objective: f64,
    /// max |c(x)|
    pub feasibility: f64,
    /// Weighted max |∇f + Jᵀλ|
    pub stationarity: f64,
    /// Step length taken from this iterate (0 when it was final).
    pub step_length: f64,
    /// Constraint residuals c(x).
    pub residuals: Vec<f64>,
}

/// Summary of a successful solve.
#[derive(Debug, Clone, PartialEq)]
pub struct EquilibriumReport {
    pub iterations: usize,
    /// Scaled objective at the solution.
    pub objective: f64,
    pub feasibility: f64,
    pub stationarity: f64,
}

/// One constraint of the expanded problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintInfo {
    pub name: String,
    /// Value the unscaled quantity is held at.
    pub target: f64,
    /// Divisor applied to the residual.
    pub scale: f64,
}

/// Full problem description plus the per-iteration trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemTrace {
    pub variables: Vec<String>,
    pub objective: String,
    pub constraints: Vec<ConstraintInfo>,
    pub iterations: Vec<IterationRecord>,
}

/// What is known about a solve that did not converge.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub reason: String,
    pub iterations: usize,
    /// Last iterate in internal coordinates (log amounts when solving in log space).
    pub iterate: Vec<f64>,
    /// Last iterate as phases, when it could be reconstructed.
    pub phases: Option<Vec<PhaseState>>,
    /// Labelled scaled constraint residuals at the last iterate.
    pub residuals: Vec<(String, f64)>,
    pub feasibility: f64,
    pub stationarity: f64,
    /// Present when the solve was run with `debug`.
    pub trace: Option<ProblemTrace>,
}

impl FailureReport {
    /// Largest residual by magnitude.
    pub fn worst_residual(&self) -> Option<(&str, f64)> {
        self.residuals
            .iter()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(name, value)| (name.as_str(), *value))
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} iterations (feasibility {:.3e}, stationarity {:.3e})",
            self.reason, self.iterations, self.feasibility, self.stationarity
        )?;
        if let Some((name, value)) = self.worst_residual() {
            write!(f, ", worst residual {name} = {value:.3e}")?;
        }
        Ok(())
    }
}
