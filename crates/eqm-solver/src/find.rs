//! Entry points for equilibrium searches.

use crate::ensemble::{Ensemble, FixedFlags};
use crate::equilibrium::EquilibriumProblem;
use crate::error::{EquilibriumError, EquilibriumResult};
use crate::problem::NlpProblem;
use crate::report::{EquilibriumReport, FailureReport, ProblemTrace};
use crate::sqp::{ConstrainedOptimizer, OptimizationResult, SqpConfig, SqpOptimizer};
use crate::transform::{AmountTransform, VariableKind};
use eqm_thermo::PhaseState;
use tracing::{debug, warn};

/// Tuning for [`find_equilibrium`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FinderConfig {
    /// Conserve elements (reaction allowed) rather than individual species.
    pub elemental: bool,
    /// Lower bound of a free temperature (K), exclusive
    pub t_min: f64,
    /// Upper bound of a free temperature (K)
    pub t_max: f64,
    /// Upper bound of a free pressure (Pa)
    pub p_max: f64,
    /// Convergence tolerance on scaled residuals
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Work with log amounts so trace species stay positive.
    pub log_molar: bool,
    /// Attach the full problem description and iteration trace to failures.
    pub debug: bool,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            elemental: true,
            t_min: 200.0,
            t_max: 3500.0,
            p_max: 1e9,
            tolerance: 1e-6,
            max_iterations: 1000,
            log_molar: true,
            debug: false,
        }
    }
}

impl FinderConfig {
    pub fn with_elemental(mut self, elemental: bool) -> Self {
        self.elemental = elemental;
        self
    }

    pub fn with_t_min(mut self, t_min: f64) -> Self {
        self.t_min = t_min;
        self
    }

    pub fn with_t_max(mut self, t_max: f64) -> Self {
        self.t_max = t_max;
        self
    }

    pub fn with_p_max(mut self, p_max: f64) -> Self {
        self.p_max = p_max;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_log_molar(mut self, log_molar: bool) -> Self {
        self.log_molar = log_molar;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validate(&self) -> EquilibriumResult<()> {
        if !(self.t_min.is_finite() && self.t_min >= 0.0) {
            return Err(EquilibriumError::configuration(
                "t_min must be finite and non-negative",
            ));
        }
        if !(self.t_max.is_finite() && self.t_max > self.t_min) {
            return Err(EquilibriumError::configuration(
                "t_max must be finite and above t_min",
            ));
        }
        if !(self.p_max.is_finite() && self.p_max > 0.0) {
            return Err(EquilibriumError::configuration(
                "p_max must be positive and finite",
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(EquilibriumError::configuration(
                "tolerance must be positive and finite",
            ));
        }
        Ok(())
    }

    pub fn transform(&self) -> AmountTransform {
        AmountTransform::from_log_molar(self.log_molar)
    }

    /// Optimizer settings implied by this configuration.
    pub fn sqp_config(&self) -> SqpConfig {
        SqpConfig {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            transform: self.transform(),
            record_trace: self.debug,
            ..SqpConfig::default()
        }
    }
}

/// Equilibrate `phases` with the two state variables in `flags` held fixed.
///
/// Returns one phase per input phase, in input order; the inputs are not
/// modified.
///
/// # Errors
/// - `Configuration` for anything but one of the six supported fixed pairs,
///   or for invalid bounds and tolerances
/// - `Thermo` when the input state itself cannot be evaluated
/// - `NotFound` when the optimizer stops without converging, for whatever
///   reason; the report carries the last iterate
pub fn find_equilibrium(
    phases: &[PhaseState],
    flags: FixedFlags,
    config: &FinderConfig,
) -> EquilibriumResult<Vec<PhaseState>> {
    find_equilibrium_with_report(phases, flags, config).map(|(phases, _)| phases)
}

/// [`find_equilibrium`] plus a summary of the solve.
pub fn find_equilibrium_with_report(
    phases: &[PhaseState],
    flags: FixedFlags,
    config: &FinderConfig,
) -> EquilibriumResult<(Vec<PhaseState>, EquilibriumReport)> {
    let optimizer = SqpOptimizer::new(config.sqp_config());
    find_equilibrium_with(&optimizer, phases, flags, config)
}

/// Run the search with a caller-supplied optimizer.
///
/// The trace attached to a failure in `debug` mode holds whatever iteration
/// records the optimizer returned.
pub fn find_equilibrium_with(
    optimizer: &dyn ConstrainedOptimizer,
    phases: &[PhaseState],
    flags: FixedFlags,
    config: &FinderConfig,
) -> EquilibriumResult<(Vec<PhaseState>, EquilibriumReport)> {
    let ensemble = Ensemble::from_flags(&flags)?;
    config.validate()?;
    let problem = EquilibriumProblem::new(phases, ensemble, config)?;
    debug!(
        %ensemble,
        phases = phases.len(),
        variables = problem.num_variables(),
        constraints = problem.constraint_labels().len(),
        objective = %problem.describe_objective(),
        "equilibrium problem built"
    );

    let result = optimizer.minimize(&problem)?;
    if !result.converged {
        let reason = result.failure.as_deref().unwrap_or("optimizer did not converge");
        let report = failure_report(&problem, &result, config, reason);
        warn!(%ensemble, %report, "equilibrium not found");
        return Err(EquilibriumError::NotFound(Box::new(report)));
    }

    let solved = problem.phases_at(&result.x)?;
    let report = EquilibriumReport {
        iterations: result.iterations,
        objective: result.objective,
        feasibility: result.feasibility,
        stationarity: result.stationarity,
    };
    Ok((solved, report))
}

fn failure_report(
    problem: &EquilibriumProblem,
    result: &OptimizationResult,
    config: &FinderConfig,
    reason: &str,
) -> FailureReport {
    let transform = config.transform();
    let iterate = problem
        .variable_kinds()
        .iter()
        .zip(result.x.iter())
        .map(|(kind, v)| match kind {
            VariableKind::Amount => transform.to_internal(*v),
            VariableKind::Bounded { .. } => *v,
        })
        .collect();
    let residuals = problem
        .constraint_labels()
        .into_iter()
        .zip(result.residuals.iter().copied())
        .collect();
    let trace = config.debug.then(|| ProblemTrace {
        variables: problem.variable_labels(),
        objective: problem.describe_objective(),
        constraints: problem.constraint_info(),
        iterations: result.trace.clone(),
    });
    FailureReport {
        reason: reason.to_string(),
        iterations: result.iterations,
        iterate,
        phases: problem.phases_at(&result.x).ok(),
        residuals,
        feasibility: result.feasibility,
        stationarity: result.stationarity,
        trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FinderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transform(), AmountTransform::Log);
        let sqp = config.with_debug(true).with_log_molar(false).sqp_config();
        assert!(sqp.record_trace);
        assert_eq!(sqp.transform, AmountTransform::Linear);
    }

    #[test]
    fn invalid_settings_rejected() {
        let bad = [
            FinderConfig::default().with_tolerance(0.0),
            FinderConfig::default().with_tolerance(f64::NAN),
            FinderConfig::default().with_t_max(100.0),
            FinderConfig::default().with_p_max(-1.0),
            FinderConfig::default().with_t_min(-5.0),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(EquilibriumError::Configuration { .. })),
                "{config:?}"
            );
        }
    }

    #[test]
    fn flags_checked_before_phases() {
        let flags: FixedFlags = "TPH".parse().unwrap();
        let err = find_equilibrium(&[], flags, &FinderConfig::default()).unwrap_err();
        assert!(matches!(err, EquilibriumError::Configuration { .. }));
        let err = find_equilibrium(&[], "TP".parse().unwrap(), &FinderConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("at least one phase"));
    }
}
