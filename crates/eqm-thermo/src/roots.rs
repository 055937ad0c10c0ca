//! One-dimensional temperature inversion.
//!
//! Extensive properties are monotone in temperature at fixed composition and
//! pressure (their derivatives are heat capacities). The solver is a Newton
//! iteration guarded by a bracket, over a closure returning value and slope.

use crate::error::{ThermoError, ThermoResult};
use eqm_core::{Tolerances, ensure_finite, ensure_positive, nearly_equal};
use tracing::{trace, warn};

/// Relative gap below which the edge of the data is taken as located.
const EDGE_RESOLUTION: f64 = 1e-9;

/// Temperature root-finder configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RootConfig {
    /// Convergence test on `value(T)` against the target.
    pub tolerances: Tolerances,
    /// Maximum number of function evaluations.
    pub max_iterations: usize,
    /// Largest factor a single step may change T by.
    pub max_step_ratio: f64,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::new(1e-6, 1e-11),
            max_iterations: 100,
            max_step_ratio: 2.0,
        }
    }
}

/// Solve `value(T) = target` for T, starting from `t_guess_k`.
///
/// `eval` returns the property and its temperature derivative. A
/// [`ThermoError::DataRange`] at a trial temperature counts as an overshoot:
/// the iteration retreats toward the last temperature that evaluated and
/// reports the range error only once that edge is pinned down, i.e. when the
/// root lies outside the tabulated data. Other errors from `eval` are returned
/// unchanged. Fails with [`ThermoError::RootFind`] once `max_iterations`
/// evaluations pass without meeting the tolerance.
pub fn solve_temperature<F>(
    mut eval: F,
    target: f64,
    t_guess_k: f64,
    config: &RootConfig,
) -> ThermoResult<f64>
where
    F: FnMut(f64) -> ThermoResult<(f64, f64)>,
{
    ensure_positive(t_guess_k, "temperature guess")?;
    ensure_finite(target, "temperature inversion target")?;

    let ratio = config.max_step_ratio.max(1.0 + f64::EPSILON);
    let mut t = t_guess_k;
    // Largest T known to undershoot and smallest known to overshoot.
    let mut below: Option<f64> = None;
    let mut above: Option<f64> = None;
    // Nearest trial temperatures found outside the data, on either side.
    let mut floor = 0.0_f64;
    let mut ceiling = f64::INFINITY;
    let mut last_valid: Option<f64> = None;
    let mut out_of_range: Option<ThermoError> = None;
    let mut residual = f64::NAN;

    for iteration in 0..config.max_iterations {
        let (value, slope) = match eval(t) {
            Ok(evaluated) => evaluated,
            Err(err @ ThermoError::DataRange { .. }) => {
                let Some(valid) = last_valid else {
                    return Err(err);
                };
                trace!(iteration, t_k = t, "trial temperature outside data range");
                if t > valid {
                    ceiling = ceiling.min(t);
                } else {
                    floor = floor.max(t);
                }
                if (t - valid).abs() <= EDGE_RESOLUTION * valid {
                    return Err(err);
                }
                out_of_range = Some(err);
                t = 0.5 * (t + valid);
                continue;
            }
            Err(err) => return Err(err),
        };
        last_valid = Some(t);
        residual = value - target;
        trace!(iteration, t_k = t, residual, "temperature inversion step");
        if !residual.is_finite() {
            return Err(ThermoError::NonPhysical {
                what: "non-finite property during temperature inversion",
            });
        }
        if nearly_equal(value, target, config.tolerances) {
            return Ok(t);
        }

        if residual < 0.0 {
            below = Some(below.map_or(t, |b| b.max(t)));
        } else {
            above = Some(above.map_or(t, |a| a.min(t)));
        }

        let mut next = if slope.is_finite() && slope > 0.0 {
            t - residual / slope
        } else if residual < 0.0 {
            t * ratio
        } else {
            t / ratio
        };
        next = next.clamp(t / ratio, t * ratio);

        if let (Some(lo), Some(hi)) = (below, above) {
            if !(next > lo.min(hi) && next < lo.max(hi)) {
                next = 0.5 * (lo + hi);
            }
        }

        if next >= ceiling || next <= floor {
            let edge = if next >= ceiling { ceiling } else { floor };
            if (edge - t).abs() <= EDGE_RESOLUTION * t {
                if let Some(err) = out_of_range.take() {
                    return Err(err);
                }
            }
            next = 0.5 * (t + edge);
        }

        if (next - t).abs() <= 4.0 * f64::EPSILON * t {
            // No representable progress left.
            return Ok(next);
        }
        t = next;
    }

    warn!(
        iterations = config.max_iterations,
        t_k = t,
        residual,
        "temperature inversion did not converge"
    );
    Err(ThermoError::RootFind {
        what: "temperature inversion",
        iterations: config.max_iterations,
        residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_root() {
        let t = solve_temperature(
            |t| Ok((t * t * t, 3.0 * t * t)),
            8.0,
            5.0,
            &RootConfig::default(),
        )
        .unwrap();
        assert!((t - 2.0).abs() < 1e-9, "t = {t}");
    }

    #[test]
    fn linear_heat_capacity() {
        // H = 30 (T - 298.15), solve for H = 30 * 1000
        let h = |t: f64| Ok((30.0 * (t - 298.15), 30.0));
        let t = solve_temperature(h, 30_000.0, 300.0, &RootConfig::default()).unwrap();
        assert!((t - 1298.15).abs() < 1e-8);
    }

    #[test]
    fn zero_derivative_uses_bracket() {
        // Derivative reported as zero everywhere; the bracket still closes in.
        let f = |t: f64| Ok((t, 0.0));
        let t = solve_temperature(f, 700.0, 300.0, &RootConfig::default()).unwrap();
        assert!((t - 700.0).abs() < 1e-4, "t = {t}");
    }

    #[test]
    fn constant_function_fails() {
        let err = solve_temperature(|_| Ok((1.0, 0.0)), 5.0, 300.0, &RootConfig::default())
            .unwrap_err();
        assert!(matches!(err, ThermoError::RootFind { .. }));
    }

    #[test]
    fn evaluation_errors_propagate() {
        let f = |t: f64| {
            if t > 400.0 {
                Err(ThermoError::DataRange {
                    species: "X".into(),
                    phase: "Gas".into(),
                    t_k: t,
                    t_min_k: 200.0,
                    t_max_k: 400.0,
                })
            } else {
                Ok((t, 1.0))
            }
        };
        let err = solve_temperature(f, 1000.0, 300.0, &RootConfig::default()).unwrap_err();
        assert!(matches!(err, ThermoError::DataRange { .. }));
    }

    fn limited(t_max: f64) -> impl FnMut(f64) -> ThermoResult<(f64, f64)> {
        move |t: f64| {
            if t > t_max {
                Err(ThermoError::DataRange {
                    species: "X".into(),
                    phase: "Gas".into(),
                    t_k: t,
                    t_min_k: 200.0,
                    t_max_k: t_max,
                })
            } else {
                // Convex, so Newton from below overshoots.
                Ok((t * t, 2.0 * t))
            }
        }
    }

    #[test]
    fn overshoot_past_data_edge_recovers() {
        let target = 3490.0 * 3490.0;
        let t = solve_temperature(limited(3500.0), target, 300.0, &RootConfig::default()).unwrap();
        assert!((t - 3490.0).abs() < 1e-6, "t = {t}");
    }

    #[test]
    fn root_beyond_data_edge_reports_range() {
        let target = 3600.0 * 3600.0;
        let err =
            solve_temperature(limited(3500.0), target, 300.0, &RootConfig::default()).unwrap_err();
        match err {
            ThermoError::DataRange { t_k, .. } => assert!((t_k - 3500.0).abs() < 1e-3, "{t_k}"),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn rejects_bad_guess() {
        let f = |t: f64| Ok((t, 1.0));
        assert!(solve_temperature(f, 1.0, -5.0, &RootConfig::default()).is_err());
    }
}
