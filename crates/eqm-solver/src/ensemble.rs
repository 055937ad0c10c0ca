//! Ensemble selection: which two state variables are held fixed.

use crate::error::{EquilibriumError, EquilibriumResult};
use eqm_thermo::Property;
use std::fmt;
use std::str::FromStr;

/// Macroscopic state variable that can be held fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateVar {
    T,
    P,
    H,
    V,
    U,
    S,
}

impl StateVar {
    pub const ALL: [StateVar; 6] = [Self::T, Self::P, Self::H, Self::V, Self::U, Self::S];

    pub fn symbol(self) -> char {
        match self {
            Self::T => 'T',
            Self::P => 'P',
            Self::H => 'H',
            Self::V => 'V',
            Self::U => 'U',
            Self::S => 'S',
        }
    }

    fn from_symbol(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.symbol() == c.to_ascii_uppercase())
    }
}

/// Which of {T, P, H, V, U, S} are held fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedFlags {
    pub t: bool,
    pub p: bool,
    pub h: bool,
    pub v: bool,
    pub u: bool,
    pub s: bool,
}

impl FixedFlags {
    pub fn of(vars: &[StateVar]) -> Self {
        let mut flags = Self::default();
        for var in vars {
            flags.set(*var, true);
        }
        flags
    }

    pub fn is_fixed(&self, var: StateVar) -> bool {
        match var {
            StateVar::T => self.t,
            StateVar::P => self.p,
            StateVar::H => self.h,
            StateVar::V => self.v,
            StateVar::U => self.u,
            StateVar::S => self.s,
        }
    }

    pub fn set(&mut self, var: StateVar, fixed: bool) {
        let slot = match var {
            StateVar::T => &mut self.t,
            StateVar::P => &mut self.p,
            StateVar::H => &mut self.h,
            StateVar::V => &mut self.v,
            StateVar::U => &mut self.u,
            StateVar::S => &mut self.s,
        };
        *slot = fixed;
    }

    /// Fixed variables in T, P, H, V, U, S order.
    pub fn fixed(&self) -> Vec<StateVar> {
        StateVar::ALL
            .into_iter()
            .filter(|v| self.is_fixed(*v))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.fixed().len()
    }
}

impl FromStr for FixedFlags {
    type Err = EquilibriumError;

    /// Parse letters such as `"HP"` or `"t,v"`; separators are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = Self::default();
        for c in s.chars().filter(|c| !c.is_whitespace() && *c != ',') {
            let var = StateVar::from_symbol(c).ok_or_else(|| {
                EquilibriumError::configuration(format!("unknown state variable '{c}'"))
            })?;
            flags.set(var, true);
        }
        Ok(flags)
    }
}

impl fmt::Display for FixedFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for var in self.fixed() {
            write!(f, "{}", var.symbol())?;
        }
        Ok(())
    }
}

/// Quantity minimised for an ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Σ G / (R·T) over phases.
    GibbsOverRt,
    /// Σ A / (R·T) over phases.
    HelmholtzOverRt,
    /// −Σ S / R.
    NegativeEntropy,
    /// Σ U / (R·T_ref).
    InternalEnergy,
    /// Σ H / (R·T_ref).
    Enthalpy,
}

impl Objective {
    /// Phase property the objective is built from.
    pub fn property(self) -> Property {
        match self {
            Self::GibbsOverRt => Property::Gibbs,
            Self::HelmholtzOverRt => Property::Helmholtz,
            Self::NegativeEntropy => Property::Entropy,
            Self::InternalEnergy => Property::InternalEnergy,
            Self::Enthalpy => Property::Enthalpy,
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::GibbsOverRt => "sum G/(R T)",
            Self::HelmholtzOverRt => "sum A/(R T)",
            Self::NegativeEntropy => "-sum S/R",
            Self::InternalEnergy => "sum U/(R T_ref)",
            Self::Enthalpy => "sum H/(R T_ref)",
        };
        f.write_str(text)
    }
}

/// The six supported fixed pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ensemble {
    TP,
    TV,
    HP,
    UV,
    SV,
    SP,
}

struct EnsembleRow {
    ensemble: Ensemble,
    fixed: [StateVar; 2],
    objective: Objective,
    constraints: &'static [Property],
}

const TABLE: [EnsembleRow; 6] = [
    EnsembleRow {
        ensemble: Ensemble::TP,
        fixed: [StateVar::T, StateVar::P],
        objective: Objective::GibbsOverRt,
        constraints: &[],
    },
    EnsembleRow {
        ensemble: Ensemble::TV,
        fixed: [StateVar::T, StateVar::V],
        objective: Objective::HelmholtzOverRt,
        constraints: &[Property::Volume],
    },
    EnsembleRow {
        ensemble: Ensemble::HP,
        fixed: [StateVar::P, StateVar::H],
        objective: Objective::NegativeEntropy,
        constraints: &[Property::Enthalpy],
    },
    EnsembleRow {
        ensemble: Ensemble::UV,
        fixed: [StateVar::V, StateVar::U],
        objective: Objective::NegativeEntropy,
        constraints: &[Property::InternalEnergy, Property::Volume],
    },
    EnsembleRow {
        ensemble: Ensemble::SV,
        fixed: [StateVar::V, StateVar::S],
        objective: Objective::InternalEnergy,
        constraints: &[Property::Entropy, Property::Volume],
    },
    EnsembleRow {
        ensemble: Ensemble::SP,
        fixed: [StateVar::P, StateVar::S],
        objective: Objective::Enthalpy,
        constraints: &[Property::Entropy],
    },
];

impl Ensemble {
    pub const ALL: [Ensemble; 6] = [
        Self::TP,
        Self::TV,
        Self::HP,
        Self::UV,
        Self::SV,
        Self::SP,
    ];

    /// Validate the flags and select the ensemble.
    pub fn from_flags(flags: &FixedFlags) -> EquilibriumResult<Self> {
        let fixed = flags.fixed();
        if fixed.len() != 2 {
            return Err(EquilibriumError::configuration(format!(
                "exactly two state variables must be fixed, got {} ({flags})",
                fixed.len()
            )));
        }
        TABLE
            .iter()
            .find(|row| row.fixed.iter().all(|v| flags.is_fixed(*v)))
            .map(|row| row.ensemble)
            .ok_or_else(|| {
                EquilibriumError::configuration(format!("unsupported fixed pair {flags}"))
            })
    }

    fn row(self) -> &'static EnsembleRow {
        // TABLE is in declaration order
        &TABLE[self as usize]
    }

    pub fn fixed(self) -> [StateVar; 2] {
        self.row().fixed
    }

    pub fn flags(self) -> FixedFlags {
        FixedFlags::of(&self.row().fixed)
    }

    pub fn objective(self) -> Objective {
        self.row().objective
    }

    /// Extensive properties held at their input values by equality constraints.
    pub fn constraints(self) -> &'static [Property] {
        self.row().constraints
    }

    pub fn temperature_free(self) -> bool {
        !self.row().fixed.contains(&StateVar::T)
    }

    pub fn pressure_free(self) -> bool {
        !self.row().fixed.contains(&StateVar::P)
    }
}

impl fmt::Display for Ensemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.fixed();
        write!(f, "{}{}", a.symbol(), b.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flags() {
        let flags: FixedFlags = "HP".parse().unwrap();
        assert!(flags.h && flags.p);
        assert_eq!(flags.count(), 2);
        let flags: FixedFlags = "t, v".parse().unwrap();
        assert_eq!(flags, FixedFlags::of(&[StateVar::T, StateVar::V]));
        assert!("TX".parse::<FixedFlags>().is_err());
    }

    #[test]
    fn every_supported_pair_maps_back() {
        for ensemble in Ensemble::ALL {
            assert_eq!(Ensemble::from_flags(&ensemble.flags()).unwrap(), ensemble);
        }
        let hp: FixedFlags = "PH".parse().unwrap();
        assert_eq!(Ensemble::from_flags(&hp).unwrap(), Ensemble::HP);
    }

    #[test]
    fn three_flags_rejected() {
        let flags = FixedFlags::of(&[StateVar::T, StateVar::P, StateVar::H]);
        assert!(matches!(
            Ensemble::from_flags(&flags),
            Err(EquilibriumError::Configuration { .. })
        ));
        assert!(Ensemble::from_flags(&FixedFlags::default()).is_err());
    }

    #[test]
    fn unsupported_pairs_rejected() {
        for pair in ["TH", "TU", "TS", "PV", "PU", "HV", "HU", "HS", "US"] {
            let flags: FixedFlags = pair.parse().unwrap();
            let err = Ensemble::from_flags(&flags).unwrap_err();
            assert!(
                matches!(err, EquilibriumError::Configuration { .. }),
                "{pair} should be rejected"
            );
        }
    }

    #[test]
    fn free_variables() {
        assert!(!Ensemble::TP.temperature_free() && !Ensemble::TP.pressure_free());
        assert!(Ensemble::HP.temperature_free() && !Ensemble::HP.pressure_free());
        assert!(Ensemble::UV.temperature_free() && Ensemble::UV.pressure_free());
        assert_eq!(Ensemble::SV.constraints(), &[Property::Entropy, Property::Volume]);
        assert_eq!(Ensemble::HP.to_string(), "PH");
    }
}
