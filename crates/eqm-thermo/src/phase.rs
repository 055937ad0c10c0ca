//! Phase states: a composition at (T, P) evaluated through a phase model.
//!
//! All extensive properties are computed on demand from the standard-state
//! evaluator; nothing is cached, so a cloned phase is fully independent of
//! the original.

use crate::catalog::{GAS, LIQUID};
use crate::composition::Composition;
use crate::error::{ThermoError, ThermoResult};
use crate::roots::{RootConfig, solve_temperature};
use crate::standard_state::StandardStateEvaluator;
use eqm_core::constants::{P0_PA, R};
use eqm_core::units::{Pressure, Temperature, k, pa};
use eqm_core::{ensure_positive, x_ln_x};
use std::fmt;
use std::sync::Arc;
use uom::si::pressure::pascal;
use uom::si::thermodynamic_temperature::kelvin;

/// Floor applied to mole fractions inside logarithms.
pub const MOLE_FRACTION_FLOOR: f64 = 1e-300;

/// Equation of state attached to a phase.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PhaseModel {
    /// Ideal-gas mixture: V = nRT/P, pressure enters entropy and potentials.
    IdealGas,
    /// Incompressible ideal solution with one molar volume for every species.
    Incompressible { molar_volume_m3_per_mol: f64 },
    /// Standard-state properties and ideal mixing only. Has no volume.
    StandardState,
}

impl PhaseModel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::IdealGas => "ideal gas",
            Self::Incompressible { .. } => "incompressible",
            Self::StandardState => "standard state",
        }
    }
}

/// Extensive properties a phase can report together with their derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Property {
    Enthalpy,
    Entropy,
    InternalEnergy,
    Volume,
    Gibbs,
    Helmholtz,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enthalpy => "H",
            Self::Entropy => "S",
            Self::InternalEnergy => "U",
            Self::Volume => "V",
            Self::Gibbs => "G",
            Self::Helmholtz => "A",
        };
        f.write_str(name)
    }
}

/// Value of an extensive property and its partial derivatives.
///
/// `amounts` follows the key order of [`PhaseState::composition`]; each
/// derivative is taken with the other state variables held fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyGradient {
    pub value: f64,
    /// ∂/∂nᵢ [unit/mol]
    pub amounts: Vec<f64>,
    /// ∂/∂T [unit/K]
    pub temperature: f64,
    /// ∂/∂P [unit/Pa]
    pub pressure: f64,
}

impl PropertyGradient {
    /// `self − c·other` where `c` is a constant.
    fn minus_scaled(mut self, c: f64, other: &Self) -> Self {
        self.value -= c * other.value;
        for (a, b) in self.amounts.iter_mut().zip(&other.amounts) {
            *a -= c * b;
        }
        self.temperature -= c * other.temperature;
        self.pressure -= c * other.pressure;
        self
    }

    /// `self − T·other`, with T the state temperature.
    fn minus_t_times(self, t: f64, other: &Self) -> Self {
        let mut out = self.minus_scaled(t, other);
        out.temperature -= other.value;
        out
    }

    /// `self − P·other`, with P the state pressure.
    fn minus_p_times(self, p: f64, other: &Self) -> Self {
        let mut out = self.minus_scaled(p, other);
        out.pressure -= other.value;
        out
    }
}

/// Standard-state values of one species at the phase temperature.
struct SpeciesTerm {
    amount: f64,
    cp0: f64,
    h0: f64,
    s0: f64,
    /// ln of the floored mole fraction
    ln_x: f64,
}

/// One thermodynamically homogeneous region.
#[derive(Clone)]
pub struct PhaseState {
    composition: Composition,
    t: Temperature,
    p: Pressure,
    label: String,
    model: PhaseModel,
    evaluator: Arc<dyn StandardStateEvaluator>,
}

impl PhaseState {
    /// Create a phase. `label` selects the standard-state data set.
    pub fn new(
        composition: Composition,
        t: Temperature,
        p: Pressure,
        label: impl Into<String>,
        model: PhaseModel,
        evaluator: Arc<dyn StandardStateEvaluator>,
    ) -> ThermoResult<Self> {
        validate_temperature(t)?;
        validate_pressure(p)?;
        if let PhaseModel::Incompressible {
            molar_volume_m3_per_mol: v,
        } = model
        {
            ensure_positive(v, "molar volume")?;
        }
        Ok(Self {
            composition,
            t,
            p,
            label: label.into(),
            model,
            evaluator,
        })
    }

    /// Ideal-gas phase using the gas data set.
    pub fn ideal_gas(
        composition: Composition,
        t: Temperature,
        p: Pressure,
        evaluator: Arc<dyn StandardStateEvaluator>,
    ) -> ThermoResult<Self> {
        Self::new(composition, t, p, GAS, PhaseModel::IdealGas, evaluator)
    }

    /// Incompressible phase using the liquid data set.
    pub fn incompressible(
        composition: Composition,
        t: Temperature,
        p: Pressure,
        molar_volume_m3_per_mol: f64,
        evaluator: Arc<dyn StandardStateEvaluator>,
    ) -> ThermoResult<Self> {
        Self::new(
            composition,
            t,
            p,
            LIQUID,
            PhaseModel::Incompressible {
                molar_volume_m3_per_mol,
            },
            evaluator,
        )
    }

    pub fn standard_state(
        composition: Composition,
        t: Temperature,
        p: Pressure,
        label: impl Into<String>,
        evaluator: Arc<dyn StandardStateEvaluator>,
    ) -> ThermoResult<Self> {
        Self::new(composition, t, p, label, PhaseModel::StandardState, evaluator)
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn temperature(&self) -> Temperature {
        self.t
    }

    pub fn pressure(&self) -> Pressure {
        self.p
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn model(&self) -> PhaseModel {
        self.model
    }

    pub fn evaluator(&self) -> &Arc<dyn StandardStateEvaluator> {
        &self.evaluator
    }

    /// Independent copy of this phase.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn set_temperature(&mut self, t: Temperature) -> ThermoResult<()> {
        validate_temperature(t)?;
        self.t = t;
        Ok(())
    }

    pub fn set_pressure(&mut self, p: Pressure) -> ThermoResult<()> {
        validate_pressure(p)?;
        self.p = p;
        Ok(())
    }

    pub fn set_composition(&mut self, composition: Composition) {
        self.composition = composition;
    }

    pub fn with_temperature(&self, t: Temperature) -> ThermoResult<Self> {
        let mut out = self.clone();
        out.set_temperature(t)?;
        Ok(out)
    }

    pub fn with_pressure(&self, p: Pressure) -> ThermoResult<Self> {
        let mut out = self.clone();
        out.set_pressure(p)?;
        Ok(out)
    }

    pub fn with_composition(&self, composition: Composition) -> Self {
        let mut out = self.clone();
        out.composition = composition;
        out
    }

    pub fn total_amount(&self) -> f64 {
        self.composition.total()
    }

    pub fn mole_fractions(&self) -> ThermoResult<Composition> {
        self.composition.mole_fractions()
    }

    /// Mass [g].
    pub fn mass(&self) -> ThermoResult<f64> {
        self.composition.mass(self.evaluator.as_ref())
    }

    /// Element amounts held by this phase.
    pub fn elemental_composition(&self) -> ThermoResult<Composition> {
        self.composition
            .elemental_composition(self.evaluator.as_ref())
    }

    /// True when every species has data at the current temperature.
    pub fn in_data_range(&self) -> bool {
        let t = self.t_k();
        self.composition
            .species()
            .all(|s| self.evaluator.in_data_range(s, t, &self.label))
    }

    fn t_k(&self) -> f64 {
        self.t.get::<kelvin>()
    }

    fn p_pa(&self) -> f64 {
        self.p.get::<pascal>()
    }

    fn species_terms(&self) -> ThermoResult<Vec<SpeciesTerm>> {
        let t = self.t_k();
        let total = self.total_amount();
        self.composition
            .iter()
            .map(|(species, amount)| {
                let x = if total > 0.0 { amount / total } else { 0.0 };
                Ok(SpeciesTerm {
                    amount,
                    cp0: self.evaluator.cp0(species, t, &self.label)?,
                    h0: self.evaluator.hf0(species, t, &self.label)?,
                    s0: self.evaluator.s0(species, t, &self.label)?,
                    ln_x: x.max(MOLE_FRACTION_FLOOR).ln(),
                })
            })
            .collect()
    }

    /// Heat capacity at constant pressure [J/K].
    pub fn cp(&self) -> ThermoResult<f64> {
        let t = self.t_k();
        self.composition.iter().try_fold(0.0, |acc, (species, n)| {
            Ok(acc + n * self.evaluator.cp0(species, t, &self.label)?)
        })
    }

    /// Enthalpy [J].
    pub fn enthalpy(&self) -> ThermoResult<f64> {
        let t = self.t_k();
        let base = self.composition.iter().try_fold(0.0, |acc, (species, n)| {
            Ok::<_, ThermoError>(acc + n * self.evaluator.hf0(species, t, &self.label)?)
        })?;
        Ok(match self.model {
            PhaseModel::Incompressible { .. } => base + self.volume()? * (self.p_pa() - P0_PA),
            _ => base,
        })
    }

    /// Entropy [J/K], including ideal mixing.
    pub fn entropy(&self) -> ThermoResult<f64> {
        let t = self.t_k();
        let total = self.total_amount();
        let mut s = 0.0;
        for (species, n) in self.composition.iter() {
            s += n * self.evaluator.s0(species, t, &self.label)?;
            if total > 0.0 {
                s -= R * total * x_ln_x(n / total);
            }
        }
        if self.model == PhaseModel::IdealGas {
            s -= R * total * (self.p_pa() / P0_PA).ln();
        }
        Ok(s)
    }

    /// Chemical potential of every species [J/mol]. Empty when the phase holds
    /// no material.
    pub fn chemical_potentials(&self) -> ThermoResult<Composition> {
        let total = self.total_amount();
        if total == 0.0 {
            return Ok(Composition::new());
        }
        let t = self.t_k();
        let shift = match self.model {
            PhaseModel::IdealGas => R * t * (self.p_pa() / P0_PA).ln(),
            PhaseModel::Incompressible {
                molar_volume_m3_per_mol: v,
            } => v * (self.p_pa() - P0_PA),
            PhaseModel::StandardState => 0.0,
        };
        let mut mu = Composition::new();
        for (species, n) in self.composition.iter() {
            let g0 = self.evaluator.g0(species, t, &self.label)?;
            let x = (n / total).max(MOLE_FRACTION_FLOOR);
            mu.set(species, g0 + R * t * x.ln() + shift);
        }
        Ok(mu)
    }

    /// Gibbs free energy G = H − T·S [J].
    pub fn gibbs(&self) -> ThermoResult<f64> {
        Ok(self.enthalpy()? - self.t_k() * self.entropy()?)
    }

    /// Internal energy U = H − P·V [J].
    pub fn internal_energy(&self) -> ThermoResult<f64> {
        Ok(self.enthalpy()? - self.p_pa() * self.volume()?)
    }

    /// Helmholtz free energy A = G − P·V [J].
    pub fn helmholtz(&self) -> ThermoResult<f64> {
        Ok(self.gibbs()? - self.p_pa() * self.volume()?)
    }

    /// Volume [m³].
    pub fn volume(&self) -> ThermoResult<f64> {
        match self.model {
            PhaseModel::IdealGas => Ok(self.total_amount() * R * self.t_k() / self.p_pa()),
            PhaseModel::Incompressible {
                molar_volume_m3_per_mol: v,
            } => Ok(self.total_amount() * v),
            PhaseModel::StandardState => Err(ThermoError::NotImplemented {
                what: "volume of a standard-state phase",
            }),
        }
    }

    pub fn property(&self, property: Property) -> ThermoResult<f64> {
        match property {
            Property::Enthalpy => self.enthalpy(),
            Property::Entropy => self.entropy(),
            Property::InternalEnergy => self.internal_energy(),
            Property::Volume => self.volume(),
            Property::Gibbs => self.gibbs(),
            Property::Helmholtz => self.helmholtz(),
        }
    }

    /// Property value with analytic derivatives in amounts, T and P.
    pub fn property_gradient(&self, property: Property) -> ThermoResult<PropertyGradient> {
        let terms = self.species_terms()?;
        let (t, p) = (self.t_k(), self.p_pa());
        match property {
            Property::Enthalpy => Ok(self.enthalpy_gradient(&terms)),
            Property::Entropy => Ok(self.entropy_gradient(&terms)),
            Property::Volume => self.volume_gradient(&terms),
            Property::InternalEnergy => {
                let v = self.volume_gradient(&terms)?;
                Ok(self.enthalpy_gradient(&terms).minus_p_times(p, &v))
            }
            Property::Gibbs => {
                let s = self.entropy_gradient(&terms);
                Ok(self.enthalpy_gradient(&terms).minus_t_times(t, &s))
            }
            Property::Helmholtz => {
                let v = self.volume_gradient(&terms)?;
                let s = self.entropy_gradient(&terms);
                Ok(self
                    .enthalpy_gradient(&terms)
                    .minus_t_times(t, &s)
                    .minus_p_times(p, &v))
            }
        }
    }

    fn enthalpy_gradient(&self, terms: &[SpeciesTerm]) -> PropertyGradient {
        let mut value: f64 = terms.iter().map(|s| s.amount * s.h0).sum();
        let cp: f64 = terms.iter().map(|s| s.amount * s.cp0).sum();
        let (extra, pressure) = match self.model {
            PhaseModel::Incompressible {
                molar_volume_m3_per_mol: v,
            } => (v * (self.p_pa() - P0_PA), v * self.total_amount()),
            _ => (0.0, 0.0),
        };
        value += self.total_amount() * extra;
        PropertyGradient {
            value,
            amounts: terms.iter().map(|s| s.h0 + extra).collect(),
            temperature: cp,
            pressure,
        }
    }

    fn entropy_gradient(&self, terms: &[SpeciesTerm]) -> PropertyGradient {
        let total = self.total_amount();
        let t = self.t_k();
        let mut value = 0.0;
        let mut cp = 0.0;
        for s in terms {
            value += s.amount * s.s0;
            if s.amount > 0.0 && total > 0.0 {
                value -= R * s.amount * s.ln_x;
            }
            cp += s.amount * s.cp0;
        }
        let (ln_p, pressure) = match self.model {
            PhaseModel::IdealGas => {
                let p = self.p_pa();
                ((p / P0_PA).ln(), -total * R / p)
            }
            _ => (0.0, 0.0),
        };
        value -= R * total * ln_p;
        PropertyGradient {
            value,
            amounts: terms.iter().map(|s| s.s0 - R * s.ln_x - R * ln_p).collect(),
            temperature: cp / t,
            pressure,
        }
    }

    fn volume_gradient(&self, terms: &[SpeciesTerm]) -> ThermoResult<PropertyGradient> {
        let total = self.total_amount();
        let (t, p) = (self.t_k(), self.p_pa());
        match self.model {
            PhaseModel::IdealGas => {
                let value = total * R * t / p;
                Ok(PropertyGradient {
                    value,
                    amounts: vec![R * t / p; terms.len()],
                    temperature: total * R / p,
                    pressure: -value / p,
                })
            }
            PhaseModel::Incompressible {
                molar_volume_m3_per_mol: v,
            } => Ok(PropertyGradient {
                value: total * v,
                amounts: vec![v; terms.len()],
                temperature: 0.0,
                pressure: 0.0,
            }),
            PhaseModel::StandardState => Err(ThermoError::NotImplemented {
                what: "volume of a standard-state phase",
            }),
        }
    }

    /// Solve for the temperature at which `property` equals `target`, holding
    /// composition and pressure fixed. Leaves `self` untouched on failure.
    fn invert_temperature(
        &mut self,
        property: Property,
        target: f64,
        what: &'static str,
    ) -> ThermoResult<()> {
        let mut trial = self.clone();
        let result = solve_temperature(
            |t_k| {
                trial.t = k(t_k);
                let grad = trial.property_gradient(property)?;
                Ok((grad.value, grad.temperature))
            },
            target,
            self.t_k(),
            &RootConfig::default(),
        );
        let t_k = result.map_err(|err| match err {
            ThermoError::RootFind {
                iterations,
                residual,
                ..
            } => ThermoError::RootFind {
                what,
                iterations,
                residual,
            },
            other => other,
        })?;
        tracing::trace!(label = %self.label, %property, t_k, "temperature inverted");
        self.set_temperature(k(t_k))
    }

    /// Set T so that the enthalpy equals `target` [J].
    pub fn set_enthalpy(&mut self, target: f64) -> ThermoResult<()> {
        self.invert_temperature(Property::Enthalpy, target, "enthalpy inversion")
    }

    /// Set T so that the internal energy equals `target` [J].
    pub fn set_internal_energy(&mut self, target: f64) -> ThermoResult<()> {
        self.invert_temperature(
            Property::InternalEnergy,
            target,
            "internal energy inversion",
        )
    }

    /// Combine two phases of the same kind, conserving enthalpy.
    ///
    /// The result holds the summed composition at the lower of the two
    /// pressures; its temperature is found from the summed enthalpy.
    pub fn merge(&self, other: &PhaseState) -> ThermoResult<PhaseState> {
        if self.model != other.model || self.label != other.label {
            return Err(ThermoError::InvalidArg {
                what: "only phases with the same model and label can be merged",
            });
        }
        let target = self.enthalpy()? + other.enthalpy()?;

        let (na, nb) = (self.total_amount(), other.total_amount());
        let t_seed = if na + nb > 0.0 && na >= 0.0 && nb >= 0.0 {
            (na * self.t_k() + nb * other.t_k()) / (na + nb)
        } else {
            self.t_k()
        };

        let mut merged = self.clone();
        merged.composition = &self.composition + &other.composition;
        merged.p = pa(self.p_pa().min(other.p_pa()));
        merged.t = k(t_seed);
        merged.set_enthalpy(target)?;
        Ok(merged)
    }
}

fn validate_temperature(t: Temperature) -> ThermoResult<()> {
    let t_val = t.get::<kelvin>();
    if !t_val.is_finite() || t_val <= 0.0 {
        return Err(ThermoError::NonPhysical {
            what: "temperature must be positive and finite",
        });
    }
    Ok(())
}

fn validate_pressure(p: Pressure) -> ThermoResult<()> {
    let p_val = p.get::<pascal>();
    if !p_val.is_finite() || p_val <= 0.0 {
        return Err(ThermoError::NonPhysical {
            what: "pressure must be positive and finite",
        });
    }
    Ok(())
}

impl fmt::Debug for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseState")
            .field("composition", &self.composition)
            .field("t_k", &self.t_k())
            .field("p_pa", &self.p_pa())
            .field("label", &self.label)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) at {:.2} K, {:.1} Pa:",
            self.label,
            self.model.name(),
            self.t_k(),
            self.p_pa()
        )?;
        for (species, n) in self.composition.iter() {
            write!(f, " {species}={n:.6e}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SpeciesCatalog;
    use eqm_core::{Tolerances, nearly_equal};

    fn catalog() -> Arc<dyn StandardStateEvaluator> {
        SpeciesCatalog::combustion().shared()
    }

    fn air(t: f64, p: f64) -> PhaseState {
        PhaseState::ideal_gas(
            Composition::from_pairs([("O2", 0.21), ("N2", 0.79)]),
            k(t),
            pa(p),
            catalog(),
        )
        .unwrap()
    }

    fn water(t: f64, p: f64) -> PhaseState {
        PhaseState::incompressible(
            Composition::from_pairs([("H2O", 1.0)]),
            k(t),
            pa(p),
            1.8e-5,
            catalog(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_physical_state() {
        let comp = Composition::from_pairs([("N2", 1.0)]);
        assert!(PhaseState::ideal_gas(comp.clone(), k(0.0), pa(1e5), catalog()).is_err());
        assert!(PhaseState::ideal_gas(comp.clone(), k(300.0), pa(-1.0), catalog()).is_err());
        assert!(PhaseState::ideal_gas(comp.clone(), k(f64::NAN), pa(1e5), catalog()).is_err());
        assert!(PhaseState::incompressible(comp, k(300.0), pa(1e5), 0.0, catalog()).is_err());
    }

    #[test]
    fn ideal_gas_volume() {
        let gas = air(300.0, 1e5);
        let v = gas.volume().unwrap();
        assert!((v - R * 300.0 / 1e5).abs() < 1e-15);
    }

    #[test]
    fn entropy_includes_mixing_and_pressure() {
        let gas = air(300.0, 2e5);
        let t = 300.0;
        let cat = SpeciesCatalog::combustion();
        let s0 = 0.21 * cat.s0("O2", t, GAS).unwrap() + 0.79 * cat.s0("N2", t, GAS).unwrap();
        let mix = -R * (0.21 * 0.21_f64.ln() + 0.79 * 0.79_f64.ln());
        let expected = s0 + mix - R * 2.0_f64.ln();
        let s = gas.entropy().unwrap();
        assert!(nearly_equal(s, expected, Tolerances::new(1e-10, 1e-12)));
    }

    #[test]
    fn zero_amount_species_do_not_diverge() {
        let gas = PhaseState::ideal_gas(
            Composition::from_pairs([("O2", 1.0), ("O", 0.0)]),
            k(1000.0),
            pa(1e5),
            catalog(),
        )
        .unwrap();
        assert!(gas.entropy().unwrap().is_finite());
        let mu = gas.chemical_potentials().unwrap();
        assert!(mu["O"].is_finite());
        assert!(mu["O"] < mu["O2"]);
    }

    #[test]
    fn empty_phase_has_no_potentials() {
        let gas = PhaseState::ideal_gas(Composition::new(), k(300.0), pa(1e5), catalog()).unwrap();
        assert!(gas.chemical_potentials().unwrap().is_empty());
    }

    #[test]
    fn gibbs_is_sum_of_potentials() {
        // G = Σ nᵢ μᵢ for ideal mixtures
        let gas = air(800.0, 3e5);
        let mu = gas.chemical_potentials().unwrap();
        let sum: f64 = gas.composition().iter().map(|(s, n)| n * mu[s]).sum();
        let g = gas.gibbs().unwrap();
        assert!(nearly_equal(g, sum, Tolerances::new(1e-6, 1e-10)), "{g} vs {sum}");

        let liquid = water(350.0, 5e6);
        let mu = liquid.chemical_potentials().unwrap();
        let g = liquid.gibbs().unwrap();
        assert!(nearly_equal(g, mu["H2O"], Tolerances::new(1e-6, 1e-10)));
    }

    #[test]
    fn incompressible_pressure_terms() {
        let low = water(300.0, P0_PA);
        let high = water(300.0, P0_PA + 1e6);
        let dh = high.enthalpy().unwrap() - low.enthalpy().unwrap();
        assert!((dh - 1.8e-5 * 1e6).abs() < 1e-9);
        assert_eq!(low.entropy().unwrap(), high.entropy().unwrap());
        assert!((high.volume().unwrap() - 1.8e-5).abs() < 1e-18);
    }

    #[test]
    fn derived_energies() {
        let gas = air(500.0, 1e5);
        let h = gas.enthalpy().unwrap();
        let pv = 1e5 * gas.volume().unwrap();
        assert!((gas.internal_energy().unwrap() - (h - pv)).abs() < 1e-9);
        let g = gas.gibbs().unwrap();
        assert!((gas.helmholtz().unwrap() - (g - pv)).abs() < 1e-9);
    }

    #[test]
    fn standard_state_phase_has_no_volume() {
        let phase = PhaseState::standard_state(
            Composition::from_pairs([("H2O", 1.0)]),
            k(300.0),
            pa(1e5),
            LIQUID,
            catalog(),
        )
        .unwrap();
        assert!(phase.enthalpy().is_ok());
        assert!(phase.gibbs().is_ok());
        for result in [phase.volume(), phase.internal_energy(), phase.helmholtz()] {
            assert!(matches!(result, Err(ThermoError::NotImplemented { .. })));
        }
    }

    #[test]
    fn set_enthalpy_recovers_temperature() {
        let hot = air(1200.0, 1e5);
        let target = hot.enthalpy().unwrap();
        let mut cold = air(300.0, 1e5);
        cold.set_enthalpy(target).unwrap();
        assert!((cold.temperature().value - 1200.0).abs() < 1e-5);
    }

    #[test]
    fn merge_rejects_mismatched_models() {
        let err = air(300.0, 1e5).merge(&water(300.0, 1e5)).unwrap_err();
        assert!(matches!(err, ThermoError::InvalidArg { .. }));
    }

    #[test]
    fn display_lists_species() {
        let text = air(300.0, 1e5).to_string();
        assert!(text.starts_with("Gas (ideal gas) at 300.00 K"));
        assert!(text.contains("N2="));
    }
}
