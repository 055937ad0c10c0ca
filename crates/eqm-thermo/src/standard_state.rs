//! Standard-state property models and the evaluator interface.

use crate::composition::Composition;
use crate::error::{ThermoError, ThermoResult};
use eqm_core::constants::R;

/// Per-species, per-phase standard-state properties at a temperature.
///
/// Implementations must be thread-safe (Send + Sync) so an evaluator can be
/// shared between phases. A temperature outside the tabulated validity of a
/// species must fail with [`ThermoError::DataRange`]; callers never clamp.
pub trait StandardStateEvaluator: Send + Sync {
    /// Heat capacity Cp° [J/(mol·K)].
    fn cp0(&self, species: &str, t_k: f64, phase: &str) -> ThermoResult<f64>;

    /// Enthalpy H° including formation [J/mol].
    fn hf0(&self, species: &str, t_k: f64, phase: &str) -> ThermoResult<f64>;

    /// Absolute entropy S° [J/(mol·K)].
    fn s0(&self, species: &str, t_k: f64, phase: &str) -> ThermoResult<f64>;

    fn in_data_range(&self, species: &str, t_k: f64, phase: &str) -> bool;

    /// Element counts per mole of species.
    fn elemental_composition(&self, species: &str) -> ThermoResult<Composition>;

    /// Molar mass [g/mol].
    fn molar_mass(&self, species: &str) -> ThermoResult<f64>;

    /// Standard Gibbs energy G° = H° − T·S° [J/mol].
    fn g0(&self, species: &str, t_k: f64, phase: &str) -> ThermoResult<f64> {
        Ok(self.hf0(species, t_k, phase)? - t_k * self.s0(species, t_k, phase)?)
    }
}

/// Functional form of the standard-state properties over one range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StandardStateModel {
    /// NASA 7-coefficient polynomial `[a1..a7]`.
    Nasa7([f64; 7]),
    /// Constant heat capacity anchored at a reference temperature.
    ConstantCp {
        cp: f64,
        h_ref: f64,
        s_ref: f64,
        t_ref_k: f64,
    },
}

impl StandardStateModel {
    pub fn cp(&self, t: f64) -> f64 {
        match self {
            Self::Nasa7(a) => R * (a[0] + t * (a[1] + t * (a[2] + t * (a[3] + t * a[4])))),
            Self::ConstantCp { cp, .. } => *cp,
        }
    }

    pub fn enthalpy(&self, t: f64) -> f64 {
        match self {
            Self::Nasa7(a) => {
                let h_rt = a[0]
                    + t * (a[1] / 2.0 + t * (a[2] / 3.0 + t * (a[3] / 4.0 + t * a[4] / 5.0)))
                    + a[5] / t;
                R * t * h_rt
            }
            Self::ConstantCp {
                cp, h_ref, t_ref_k, ..
            } => h_ref + cp * (t - t_ref_k),
        }
    }

    pub fn entropy(&self, t: f64) -> f64 {
        match self {
            Self::Nasa7(a) => {
                let s_r = a[0] * t.ln()
                    + t * (a[1] + t * (a[2] / 2.0 + t * (a[3] / 3.0 + t * a[4] / 4.0)))
                    + a[6];
                R * s_r
            }
            Self::ConstantCp {
                cp, s_ref, t_ref_k, ..
            } => s_ref + cp * (t / t_ref_k).ln(),
        }
    }
}

/// One model with its validity interval (inclusive at both ends).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureRange {
    pub t_min_k: f64,
    pub t_max_k: f64,
    pub model: StandardStateModel,
}

impl TemperatureRange {
    pub fn new(t_min_k: f64, t_max_k: f64, model: StandardStateModel) -> Self {
        Self {
            t_min_k,
            t_max_k,
            model,
        }
    }

    pub fn contains(&self, t_k: f64) -> bool {
        t_k >= self.t_min_k && t_k <= self.t_max_k
    }
}

/// All ranges tabulated for one species in one phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseData {
    pub(crate) ranges: Vec<TemperatureRange>,
}

impl PhaseData {
    /// Ranges are kept sorted by lower bound; at a shared boundary the lower
    /// range wins.
    pub fn new(mut ranges: Vec<TemperatureRange>) -> ThermoResult<Self> {
        if ranges.is_empty() {
            return Err(ThermoError::InvalidArg {
                what: "phase data needs at least one temperature range",
            });
        }
        for range in &ranges {
            if !(range.t_min_k.is_finite() && range.t_max_k.is_finite())
                || range.t_min_k <= 0.0
                || range.t_max_k <= range.t_min_k
            {
                return Err(ThermoError::InvalidArg {
                    what: "temperature range must satisfy 0 < t_min < t_max",
                });
            }
        }
        ranges.sort_by(|a, b| a.t_min_k.total_cmp(&b.t_min_k));
        Ok(Self { ranges })
    }

    pub fn range_for(&self, t_k: f64) -> Option<&TemperatureRange> {
        self.ranges.iter().find(|r| r.contains(t_k))
    }

    /// Overall `(t_min, t_max)` covered.
    pub fn bounds(&self) -> (f64, f64) {
        let lo = self.ranges.first().map_or(f64::NAN, |r| r.t_min_k);
        let hi = self.ranges.iter().map(|r| r.t_max_k).fold(f64::NAN, f64::max);
        (lo, hi)
    }

    pub fn ranges(&self) -> &[TemperatureRange] {
        &self.ranges
    }
}
