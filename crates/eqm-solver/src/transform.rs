//! Variable kinds and the amount reparametrisation.
//!
//! The optimizer computes every amount step in relative units, δ = Δn/n.
//! The transform decides how such a step is applied: additively in amount
//! space, or multiplicatively (a straight line in ln n), which keeps trace
//! species strictly positive.

/// How mole-amount variables are parametrised during a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AmountTransform {
    /// Plain amounts, n.
    Linear,
    /// Log amounts, ln n.
    #[default]
    Log,
}

/// Role of one optimization variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableKind {
    /// Mole amount, implicitly bounded below by zero.
    Amount,
    /// Scaled state variable confined to (lower, upper].
    Bounded { lower: f64, upper: f64 },
}

/// Step-length caps applied per variable before a step is taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLimits {
    /// Largest change of ln n for a non-trace species.
    pub max_log_step: f64,
    /// Largest relative change of a bounded variable.
    pub max_relative_step: f64,
    /// Fraction of the distance to a lower bound that may be covered.
    pub boundary_fraction: f64,
    /// Mole fraction (of the system total) below which a species is trace.
    pub trace_fraction: f64,
    /// Largest mole fraction a trace species may reach in one step.
    pub trace_ceiling: f64,
    /// Smallest amount kept, as a fraction of the system total.
    pub amount_floor: f64,
}

impl Default for StepLimits {
    fn default() -> Self {
        Self {
            max_log_step: 2.0,
            max_relative_step: 0.4,
            boundary_fraction: 0.995,
            trace_fraction: 1e-8,
            trace_ceiling: 1e-4,
            amount_floor: 1e-200,
        }
    }
}

impl AmountTransform {
    pub fn from_log_molar(log_molar: bool) -> Self {
        if log_molar { Self::Log } else { Self::Linear }
    }

    /// Internal coordinate of an amount.
    pub fn to_internal(self, amount: f64) -> f64 {
        match self {
            Self::Linear => amount,
            Self::Log => amount.ln(),
        }
    }

    /// Cap `alpha` so that the relative step `direction` on `amount` stays
    /// within `limits`. `scale` is the system total amount.
    pub fn limit_step(
        self,
        amount: f64,
        direction: f64,
        scale: f64,
        alpha: f64,
        limits: &StepLimits,
    ) -> f64 {
        match self {
            Self::Log => {
                let fraction = amount / scale;
                if fraction >= limits.trace_fraction {
                    if direction.abs() * alpha > limits.max_log_step {
                        return limits.max_log_step / direction.abs();
                    }
                } else if direction > 0.0 {
                    let room = limits.trace_ceiling.ln() - fraction.ln();
                    let limit = room / direction;
                    if limit > 0.0 {
                        return alpha.min(limit);
                    }
                }
                alpha
            }
            Self::Linear => {
                if direction * alpha < -limits.boundary_fraction {
                    limits.boundary_fraction / -direction
                } else {
                    alpha
                }
            }
        }
    }

    /// Apply the relative step `step` (already multiplied by the step length).
    pub fn advance(self, amount: f64, step: f64, scale: f64, limits: &StepLimits) -> f64 {
        match self {
            Self::Log => {
                let moved = amount * step.max(-700.0).exp();
                moved.max(limits.amount_floor * scale)
            }
            Self::Linear => amount * (1.0 + step),
        }
    }
}

impl VariableKind {
    /// Cap `alpha` for a bounded variable at `value` moving along `direction`.
    pub fn limit_step(self, value: f64, direction: f64, alpha: f64, limits: &StepLimits) -> f64 {
        let Self::Bounded { lower, upper } = self else {
            return alpha;
        };
        let mut alpha = alpha;
        let relative = direction.abs() / value.abs().max(1e-12);
        if relative * alpha > limits.max_relative_step {
            alpha = limits.max_relative_step / relative;
        }
        if direction < 0.0 && value + alpha * direction <= lower {
            alpha = alpha.min(limits.boundary_fraction * (value - lower) / -direction);
        }
        if direction > 0.0 && value + alpha * direction > upper {
            alpha = alpha.min((upper - value) / direction);
        }
        alpha
    }
}
