//! Damped Newton–KKT (SQP) iteration for equality-constrained problems.
//!
//! Each iteration solves the KKT system of the local quadratic model in
//! scaled variables (amounts measured relative to their current value), then
//! takes the longest step the per-variable limits allow. There is no merit
//! function; the step is halved only when the trial point cannot be evaluated.
//!
//! Convergence is judged on the max-norm of the constraint residuals and of a
//! weighted Lagrangian gradient in which species that have effectively
//! vanished carry proportionally less weight.

use crate::error::{EquilibriumError, EquilibriumResult};
use crate::jacobian::forward_difference_from;
use crate::problem::NlpProblem;
use crate::report::IterationRecord;
use crate::transform::{AmountTransform, StepLimits, VariableKind};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use tracing::{debug, info, warn};

/// Optimizer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SqpConfig {
    /// Bound on both feasibility and weighted stationarity.
    pub tolerance: f64,
    pub max_iterations: usize,
    pub transform: AmountTransform,
    pub limits: StepLimits,
    /// Relative finite-difference step for the Lagrangian Hessian.
    pub hessian_step: f64,
    /// Amount (as a fraction of the system total) below which a species'
    /// stationarity weight starts to fall off.
    pub absent_fraction: f64,
    /// Maximum halvings of a step whose trial point cannot be evaluated.
    pub max_backtracks: usize,
    /// Keep a record of every iteration in the result.
    pub record_trace: bool,
}

impl Default for SqpConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 1000,
            transform: AmountTransform::Log,
            limits: StepLimits::default(),
            hessian_step: 1e-6,
            absent_fraction: 1e-9,
            max_backtracks: 60,
            record_trace: false,
        }
    }
}

/// Reason recorded when `max_iterations` is exhausted.
pub const ITERATION_LIMIT: &str = "iteration limit reached";

/// Outcome of a minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Final iterate (physical amounts, scaled state variables).
    pub x: DVector<f64>,
    pub objective: f64,
    pub residuals: DVector<f64>,
    pub feasibility: f64,
    pub stationarity: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Why the iteration stopped short; `None` when converged.
    pub failure: Option<String>,
    /// Per-iteration records when `record_trace` was set.
    pub trace: Vec<IterationRecord>,
}

/// Anything that can minimise an [`NlpProblem`].
pub trait ConstrainedOptimizer {
    fn minimize(&self, problem: &dyn NlpProblem) -> EquilibriumResult<OptimizationResult>;
}

/// The default optimizer.
#[derive(Debug, Clone, Default)]
pub struct SqpOptimizer {
    pub config: SqpConfig,
}

impl SqpOptimizer {
    pub fn new(config: SqpConfig) -> Self {
        Self { config }
    }
}

impl ConstrainedOptimizer for SqpOptimizer {
    fn minimize(&self, problem: &dyn NlpProblem) -> EquilibriumResult<OptimizationResult> {
        sqp_solve(problem, &self.config)
    }
}

/// Objective, constraints and their derivatives at one point.
struct Evaluation {
    f: f64,
    c: DVector<f64>,
    g: DVector<f64>,
    jac: DMatrix<f64>,
}

fn evaluate<P: NlpProblem + ?Sized>(
    problem: &P,
    x: &DVector<f64>,
) -> EquilibriumResult<Evaluation> {
    let f = problem.objective(x)?;
    let c = problem.constraints(x)?;
    if !f.is_finite() || c.iter().any(|v| !v.is_finite()) {
        return Err(EquilibriumError::numeric("non-finite objective or constraints"));
    }
    let g = problem.gradient(x)?;
    let jac = problem.constraint_jacobian(x)?;
    if g.iter().chain(jac.iter()).any(|v| !v.is_finite()) {
        return Err(EquilibriumError::numeric("non-finite derivatives"));
    }
    Ok(Evaluation { f, c, g, jac })
}

/// Run the iteration from `problem.initial_point()`.
///
/// Errors evaluating the initial point are returned as they are. Once the
/// iteration is under way every breakdown (iteration limit, an unsolvable
/// step, no evaluable trial point) ends it with `converged: false`, the last
/// accepted iterate and the reason in `failure`.
pub fn sqp_solve<P: NlpProblem + ?Sized>(
    problem: &P,
    config: &SqpConfig,
) -> EquilibriumResult<OptimizationResult> {
    let kinds = problem.variable_kinds().to_vec();
    let n = kinds.len();
    let scale = problem.amount_scale();
    let mut x = problem.initial_point();
    if x.len() != n {
        return Err(EquilibriumError::numeric(format!(
            "initial point has {} entries for {n} variables",
            x.len()
        )));
    }
    if !(scale.is_finite() && scale > 0.0) {
        return Err(EquilibriumError::numeric("amount scale must be positive"));
    }

    let mut point = evaluate(problem, &x)?;
    let mut trace = Vec::new();
    let mut iteration = 0;

    loop {
        let weights = stationarity_weights(&kinds, &x, config.absent_fraction * scale);
        let feasibility = max_abs(&point.c);
        let lambda = least_squares_multipliers(&point.g, &point.jac, &weights);
        let stationarity = lambda.as_ref().map_or(f64::INFINITY, |lambda| {
            weighted_max_abs(&(&point.g + point.jac.transpose() * lambda), &weights)
        });

        let mut record = IterationRecord {
            iteration,
            objective: point.f,
            feasibility,
            stationarity,
            step_length: 0.0,
            residuals: point.c.iter().copied().collect(),
        };
        debug!(iteration, objective = point.f, feasibility, stationarity, "sqp iterate");

        let finish = |failure: Option<String>,
                      stationarity: f64,
                      mut trace: Vec<IterationRecord>,
                      record: IterationRecord| {
            if config.record_trace {
                trace.push(record);
            }
            match &failure {
                None => info!(iterations = iteration, objective = point.f, "sqp converged"),
                Some(reason) => warn!(
                    iterations = iteration,
                    feasibility,
                    stationarity,
                    %reason,
                    "sqp stopped without converging"
                ),
            }
            OptimizationResult {
                x: x.clone(),
                objective: point.f,
                residuals: point.c.clone(),
                feasibility,
                stationarity,
                iterations: iteration,
                converged: failure.is_none(),
                failure,
                trace,
            }
        };

        if feasibility <= config.tolerance && stationarity <= config.tolerance {
            return Ok(finish(None, stationarity, trace, record));
        }
        if iteration >= config.max_iterations {
            return Ok(finish(Some(ITERATION_LIMIT.to_string()), stationarity, trace, record));
        }

        let step = lambda
            .and_then(|lambda| newton_direction(problem, &kinds, &x, &point, &lambda, config));
        let (d, lambda_kkt) = match step {
            Ok(step) => step,
            Err(err) => {
                let reason = format!("step computation failed: {err}");
                return Ok(finish(Some(reason), stationarity, trace, record));
            }
        };
        let stationarity_kkt = weighted_max_abs(
            &(&point.g + point.jac.transpose() * &lambda_kkt),
            &weights,
        );
        if feasibility <= config.tolerance && stationarity_kkt <= config.tolerance {
            return Ok(finish(None, stationarity_kkt, trace, record));
        }

        let alpha = max_step(&kinds, &x, &d, scale, config);
        match backtrack(problem, &kinds, &x, &d, alpha, scale, config) {
            Ok((x_next, point_next, alpha)) => {
                record.step_length = alpha;
                if config.record_trace {
                    trace.push(record);
                }
                x = x_next;
                point = point_next;
                iteration += 1;
            }
            Err(err) => {
                let reason = format!("no evaluable step: {err}");
                return Ok(finish(Some(reason), stationarity, trace, record));
            }
        }
    }
}

/// Solve the scaled KKT system at `x` for the step and its multipliers.
fn newton_direction<P: NlpProblem + ?Sized>(
    problem: &P,
    kinds: &[VariableKind],
    x: &DVector<f64>,
    point: &Evaluation,
    lambda: &DVector<f64>,
    config: &SqpConfig,
) -> EquilibriumResult<(DVector<f64>, DVector<f64>)> {
    let n = kinds.len();
    let grad_l = &point.g + point.jac.transpose() * lambda;
    let hessian = lagrangian_hessian(problem, kinds, x, &grad_l, lambda, config)?;
    let s = DVector::from_iterator(
        n,
        kinds.iter().zip(x.iter()).map(|(kind, v)| match kind {
            VariableKind::Amount => *v,
            VariableKind::Bounded { .. } => 1.0,
        }),
    );
    let hs = DMatrix::from_fn(n, n, |i, j| hessian[(i, j)] * s[i] * s[j]);
    let js = DMatrix::from_fn(point.jac.nrows(), n, |a, k| point.jac[(a, k)] * s[k]);
    let gs = point.g.component_mul(&s);
    let hs = convexify(hs, &js);
    solve_kkt(&hs, &js, &gs, &point.c)
}

fn max_abs(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

fn weighted_max_abs(v: &DVector<f64>, w: &DVector<f64>) -> f64 {
    v.iter().zip(w.iter()).fold(0.0, |m, (x, w)| m.max(x.abs() * w))
}

fn stationarity_weights(kinds: &[VariableKind], x: &DVector<f64>, absent: f64) -> DVector<f64> {
    DVector::from_iterator(
        kinds.len(),
        kinds.iter().zip(x.iter()).map(|(kind, v)| match kind {
            VariableKind::Amount => (v / absent).min(1.0),
            VariableKind::Bounded { .. } => 1.0,
        }),
    )
}

/// λ minimising ‖W(g + Jᵀλ)‖ (minimum-norm solution).
fn least_squares_multipliers(
    g: &DVector<f64>,
    jac: &DMatrix<f64>,
    weights: &DVector<f64>,
) -> EquilibriumResult<DVector<f64>> {
    let (m, n) = jac.shape();
    if m == 0 {
        return Ok(DVector::zeros(0));
    }
    let a = DMatrix::from_fn(n, m, |k, row| weights[k] * jac[(row, k)]);
    let b = DVector::from_iterator(n, (0..n).map(|k| -weights[k] * g[k]));
    let svd = a.svd(true, true);
    let s_max = svd.singular_values.max();
    if s_max <= 0.0 {
        return Ok(DVector::zeros(m));
    }
    svd.solve(&b, 1e-12 * s_max)
        .map_err(|e| EquilibriumError::numeric(format!("multiplier estimate failed: {e}")))
}

/// Forward-difference Hessian of the Lagrangian, symmetrised.
///
/// Columns whose perturbed point cannot be evaluated (past a bound or the
/// edge of the property data) are differenced in the opposite direction.
fn lagrangian_hessian<P: NlpProblem + ?Sized>(
    problem: &P,
    kinds: &[VariableKind],
    x: &DVector<f64>,
    grad_l: &DVector<f64>,
    lambda: &DVector<f64>,
    config: &SqpConfig,
) -> EquilibriumResult<DMatrix<f64>> {
    let steps: Vec<f64> = kinds
        .iter()
        .zip(x.iter())
        .map(|(kind, v)| match kind {
            VariableKind::Amount => config.hessian_step * v.abs().max(f64::MIN_POSITIVE),
            VariableKind::Bounded { upper, .. } => {
                let h = config.hessian_step * v.abs().max(1.0);
                // Stay inside the upper bound
                if v + h > *upper { -h } else { h }
            }
        })
        .collect();
    let hessian = forward_difference_from(
        x,
        grad_l,
        |xp| Ok(problem.gradient(xp)? + problem.constraint_jacobian(xp)?.transpose() * lambda),
        &steps,
    )?;
    Ok((&hessian + hessian.transpose()) * 0.5)
}

/// Orthonormal basis of the null space of `js` (n columns when `js` is empty).
fn null_space(js: &DMatrix<f64>, n: usize) -> DMatrix<f64> {
    if js.nrows() == 0 {
        return DMatrix::identity(n, n);
    }
    let eig = SymmetricEigen::new(js.transpose() * js);
    let top = eig.eigenvalues.max().max(f64::MIN_POSITIVE);
    let columns: Vec<usize> = (0..n)
        .filter(|&k| eig.eigenvalues[k] <= 1e-10 * top)
        .collect();
    let mut z = DMatrix::zeros(n, columns.len());
    for (j, &k) in columns.iter().enumerate() {
        z.set_column(j, &eig.eigenvectors.column(k));
    }
    z
}

/// Return `hs` if it is positive definite on the null space of `js`;
/// otherwise a positive definite matrix with the same eigenvectors (after
/// diagonal scaling) and absolute eigenvalues.
fn convexify(hs: DMatrix<f64>, js: &DMatrix<f64>) -> DMatrix<f64> {
    let n = hs.nrows();
    let z = null_space(js, n);
    if z.ncols() == 0 {
        return hs;
    }
    let reduced = z.transpose() * &hs * &z;
    let eig = SymmetricEigen::new(reduced).eigenvalues;
    let largest = eig.iter().fold(0.0_f64, |m, e| m.max(e.abs())).max(f64::MIN_POSITIVE);
    let smallest = eig.iter().fold(f64::INFINITY, |m, e| m.min(*e));
    if smallest > 1e-10 * largest {
        return hs;
    }

    let diag_max = (0..n).fold(0.0_f64, |m, i| m.max(hs[(i, i)].abs()));
    let dj = DVector::from_iterator(
        n,
        (0..n).map(|i| {
            hs[(i, i)]
                .abs()
                .max(1e-8 * diag_max)
                .max(f64::MIN_POSITIVE)
                .sqrt()
        }),
    );
    let scaled = DMatrix::from_fn(n, n, |i, j| hs[(i, j)] / (dj[i] * dj[j]));
    let mut eig = SymmetricEigen::new(scaled);
    let top = eig.eigenvalues.iter().fold(0.0_f64, |m, e| m.max(e.abs()));
    let floor = (1e-8 * top).max(1e-12);
    eig.eigenvalues.apply(|e| *e = e.abs().max(floor));
    let rebuilt = eig.recompose();
    DMatrix::from_fn(n, n, |i, j| rebuilt[(i, j)] * dj[i] * dj[j])
}

/// Solve [H Jᵀ; J 0] [d; λ] = −[g; c].
fn solve_kkt(
    hs: &DMatrix<f64>,
    js: &DMatrix<f64>,
    gs: &DVector<f64>,
    c: &DVector<f64>,
) -> EquilibriumResult<(DVector<f64>, DVector<f64>)> {
    let n = hs.nrows();
    let m = js.nrows();
    let kkt = DMatrix::from_fn(n + m, n + m, |i, j| match (i < n, j < n) {
        (true, true) => hs[(i, j)],
        (true, false) => js[(j - n, i)],
        (false, true) => js[(i - n, j)],
        (false, false) => 0.0,
    });
    let rhs = DVector::from_iterator(n + m, gs.iter().chain(c.iter()).map(|v| -v));

    let solution = match kkt.clone().lu().solve(&rhs) {
        Some(sol) if sol.iter().all(|v| v.is_finite()) => sol,
        _ => {
            let svd = kkt.svd(true, true);
            let s_max = svd.singular_values.max();
            svd.solve(&rhs, 1e-14 * s_max)
                .map_err(|e| EquilibriumError::numeric(format!("KKT solve failed: {e}")))?
        }
    };
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(EquilibriumError::numeric("KKT solve produced non-finite step"));
    }
    Ok((
        solution.rows(0, n).into_owned(),
        solution.rows(n, m).into_owned(),
    ))
}

/// Longest step length in (0, 1] allowed by the per-variable limits.
fn max_step(
    kinds: &[VariableKind],
    x: &DVector<f64>,
    d: &DVector<f64>,
    scale: f64,
    config: &SqpConfig,
) -> f64 {
    kinds
        .iter()
        .enumerate()
        .fold(1.0, |alpha, (i, kind)| match kind {
            VariableKind::Amount => {
                config
                    .transform
                    .limit_step(x[i], d[i], scale, alpha, &config.limits)
            }
            VariableKind::Bounded { .. } => kind.limit_step(x[i], d[i], alpha, &config.limits),
        })
}

fn trial_point(
    kinds: &[VariableKind],
    x: &DVector<f64>,
    d: &DVector<f64>,
    alpha: f64,
    scale: f64,
    config: &SqpConfig,
) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        kinds.iter().enumerate().map(|(i, kind)| match kind {
            VariableKind::Amount => {
                config
                    .transform
                    .advance(x[i], alpha * d[i], scale, &config.limits)
            }
            VariableKind::Bounded { .. } => x[i] + alpha * d[i],
        }),
    )
}

/// Halve the step until the trial point evaluates to finite values.
fn backtrack<P: NlpProblem + ?Sized>(
    problem: &P,
    kinds: &[VariableKind],
    x: &DVector<f64>,
    d: &DVector<f64>,
    alpha: f64,
    scale: f64,
    config: &SqpConfig,
) -> EquilibriumResult<(DVector<f64>, Evaluation, f64)> {
    let mut alpha = alpha;
    let mut last_error = None;
    for _ in 0..=config.max_backtracks {
        let trial = trial_point(kinds, x, d, alpha, scale, config);
        match evaluate(problem, &trial) {
            Ok(point) => return Ok((trial, point, alpha)),
            Err(err) => {
                debug!(alpha, error = %err, "trial point rejected");
                last_error = Some(err);
            }
        }
        alpha *= 0.5;
    }
    Err(last_error.unwrap_or_else(|| {
        EquilibriumError::numeric("no step with finite objective and constraints")
    }))
}
