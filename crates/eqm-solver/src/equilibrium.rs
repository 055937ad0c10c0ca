//! Translation of a multi-phase equilibrium search into an [`NlpProblem`].
//!
//! Variables are laid out as every phase's species amounts (phase order, then
//! composition key order), followed by a shared scaled temperature T/T_ref
//! when T is free and a shared scaled pressure P/P_ref when P is free. T_ref
//! and P_ref are the first phase's input state.

use crate::ensemble::{Ensemble, Objective};
use crate::error::{EquilibriumError, EquilibriumResult};
use crate::find::FinderConfig;
use crate::problem::NlpProblem;
use crate::report::ConstraintInfo;
use crate::transform::VariableKind;
use eqm_core::constants::R;
use eqm_core::units::{k, pa};
use eqm_thermo::{Composition, PhaseState, Property};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeSet;
use uom::si::pressure::pascal;
use uom::si::thermodynamic_temperature::kelvin;

/// Seed for species present with zero amount, relative to the system total.
pub const ZERO_AMOUNT_SEED: f64 = 1e-8;

/// Rows whose residual after projection falls below this fraction of their
/// norm are dropped as linearly dependent.
const DEPENDENT_ROW_TOLERANCE: f64 = 1e-10;

/// Extensive property held at its input value.
#[derive(Debug, Clone)]
struct PropertyConstraint {
    property: Property,
    target: f64,
    scale: f64,
}

/// The expanded equilibrium problem for one set of phases and one ensemble.
#[derive(Debug, Clone)]
pub struct EquilibriumProblem {
    ensemble: Ensemble,
    /// Input phases, unseeded.
    phases: Vec<PhaseState>,
    species: Vec<Vec<String>>,
    offsets: Vec<usize>,
    num_amounts: usize,
    t_index: Option<usize>,
    p_index: Option<usize>,
    t_ref: f64,
    p_ref: f64,
    kinds: Vec<VariableKind>,
    x0: DVector<f64>,
    total: f64,
    conservation: DMatrix<f64>,
    conserved: DVector<f64>,
    conservation_scale: f64,
    conservation_labels: Vec<String>,
    properties: Vec<PropertyConstraint>,
}

impl EquilibriumProblem {
    /// Build the problem for `phases` held at `ensemble`.
    pub fn new(
        phases: &[PhaseState],
        ensemble: Ensemble,
        config: &FinderConfig,
    ) -> EquilibriumResult<Self> {
        let first = phases
            .first()
            .ok_or_else(|| EquilibriumError::configuration("at least one phase is required"))?;
        let t_ref = first.temperature().get::<kelvin>();
        let p_ref = first.pressure().get::<pascal>();

        let species: Vec<Vec<String>> = phases
            .iter()
            .map(|phase| phase.composition().species().map(str::to_string).collect())
            .collect();
        let mut offsets = Vec::with_capacity(phases.len());
        let mut num_amounts = 0;
        for list in &species {
            offsets.push(num_amounts);
            num_amounts += list.len();
        }
        if num_amounts == 0 {
            return Err(EquilibriumError::configuration(
                "the phases hold no species",
            ));
        }

        let amounts: Vec<f64> = phases
            .iter()
            .flat_map(|phase| phase.composition().iter().map(|(_, n)| n))
            .collect();
        if amounts.iter().any(|n| !n.is_finite() || *n < 0.0) {
            return Err(EquilibriumError::configuration(
                "species amounts must be finite and non-negative",
            ));
        }
        let total: f64 = amounts.iter().sum();
        if total <= 0.0 {
            return Err(EquilibriumError::configuration(
                "the phases hold no material",
            ));
        }

        let mut kinds = vec![VariableKind::Amount; num_amounts];
        let mut x0: Vec<f64> = amounts
            .iter()
            .map(|&n| if n > 0.0 { n } else { ZERO_AMOUNT_SEED * total })
            .collect();
        let mut t_index = None;
        let mut p_index = None;
        if ensemble.temperature_free() {
            if !(t_ref > config.t_min && t_ref <= config.t_max) {
                return Err(EquilibriumError::configuration(format!(
                    "initial temperature {t_ref} K outside ({}, {}] K",
                    config.t_min, config.t_max
                )));
            }
            t_index = Some(kinds.len());
            kinds.push(VariableKind::Bounded {
                lower: config.t_min / t_ref,
                upper: config.t_max / t_ref,
            });
            x0.push(1.0);
        }
        if ensemble.pressure_free() {
            if p_ref > config.p_max {
                return Err(EquilibriumError::configuration(format!(
                    "initial pressure {p_ref} Pa outside (0, {}] Pa",
                    config.p_max
                )));
            }
            p_index = Some(kinds.len());
            kinds.push(VariableKind::Bounded {
                lower: 0.0,
                upper: config.p_max / p_ref,
            });
            x0.push(1.0);
        }

        let (rows, conservation_labels) = if config.elemental {
            element_rows(phases, &species)?
        } else {
            species_rows(&species)
        };
        let input = DVector::from_vec(amounts);
        let kept = independent_rows(&rows);
        let conservation = DMatrix::from_fn(kept.len(), num_amounts, |r, c| rows[kept[r]][c]);
        let conserved = &conservation * &input;
        let conservation_scale = conserved.iter().fold(1.0_f64, |m, b| m.max(b.abs()));
        let conservation_labels = kept
            .iter()
            .map(|&r| conservation_labels[r].clone())
            .collect();

        let mut properties = Vec::new();
        for &property in ensemble.constraints() {
            let target = phases.iter().try_fold(0.0, |acc, phase| {
                Ok::<_, EquilibriumError>(acc + phase.property(property)?)
            })?;
            let scale = match property {
                Property::Enthalpy | Property::InternalEnergy => R * t_ref,
                Property::Entropy => R,
                Property::Volume if target > 0.0 => target,
                Property::Volume => {
                    return Err(EquilibriumError::configuration(
                        "initial volume must be positive",
                    ));
                }
                Property::Gibbs | Property::Helmholtz => R * t_ref,
            };
            properties.push(PropertyConstraint {
                property,
                target,
                scale,
            });
        }

        Ok(Self {
            ensemble,
            phases: phases.to_vec(),
            species,
            offsets,
            num_amounts,
            t_index,
            p_index,
            t_ref,
            p_ref,
            kinds,
            x0: DVector::from_vec(x0),
            total,
            conservation,
            conserved,
            conservation_scale,
            conservation_labels,
            properties,
        })
    }

    pub fn ensemble(&self) -> Ensemble {
        self.ensemble
    }

    pub fn num_amounts(&self) -> usize {
        self.num_amounts
    }

    /// Constraint names, unscaled targets and scales, in residual order.
    pub fn constraint_info(&self) -> Vec<ConstraintInfo> {
        let conservation = self
            .conservation_labels
            .iter()
            .zip(self.conserved.iter())
            .map(|(name, target)| ConstraintInfo {
                name: name.clone(),
                target: *target,
                scale: self.conservation_scale,
            });
        let properties = self.properties.iter().map(|c| ConstraintInfo {
            name: format!("total {}", c.property),
            target: c.target,
            scale: c.scale,
        });
        conservation.chain(properties).collect()
    }

    /// Phases at the variable vector `x`, in input order.
    pub fn phases_at(&self, x: &DVector<f64>) -> EquilibriumResult<Vec<PhaseState>> {
        if x.len() != self.kinds.len() {
            return Err(EquilibriumError::numeric(format!(
                "variable vector has {} entries, expected {}",
                x.len(),
                self.kinds.len()
            )));
        }
        let t = self.t_index.map(|i| x[i] * self.t_ref);
        let p = self.p_index.map(|i| x[i] * self.p_ref);
        self.phases
            .iter()
            .zip(&self.species)
            .zip(&self.offsets)
            .map(|((phase, species), &offset)| {
                let composition = Composition::from_pairs(
                    species
                        .iter()
                        .enumerate()
                        .map(|(i, name)| (name.as_str(), x[offset + i])),
                );
                let mut out = phase.with_composition(composition);
                if let Some(t) = t {
                    out.set_temperature(k(t))?;
                }
                if let Some(p) = p {
                    out.set_pressure(pa(p))?;
                }
                Ok::<_, EquilibriumError>(out)
            })
            .collect()
    }

    /// Σ property over `phases` and its gradient in the problem variables.
    /// With `over_rt` each phase's contribution is divided by R·T of that phase.
    fn sum_property(
        &self,
        phases: &[PhaseState],
        property: Property,
        over_rt: bool,
    ) -> EquilibriumResult<(f64, DVector<f64>)> {
        let mut value = 0.0;
        let mut grad = DVector::zeros(self.kinds.len());
        for (phase, &offset) in phases.iter().zip(&self.offsets) {
            let pg = phase.property_gradient(property)?;
            let t = phase.temperature().get::<kelvin>();
            let (factor, d_factor_dt) = if over_rt {
                (1.0 / (R * t), -1.0 / (R * t * t))
            } else {
                (1.0, 0.0)
            };
            value += pg.value * factor;
            for (i, d) in pg.amounts.iter().enumerate() {
                grad[offset + i] += d * factor;
            }
            if let Some(i) = self.t_index {
                grad[i] += (pg.temperature * factor + pg.value * d_factor_dt) * self.t_ref;
            }
            if let Some(i) = self.p_index {
                grad[i] += pg.pressure * factor * self.p_ref;
            }
        }
        Ok((value, grad))
    }

    fn objective_and_gradient(&self, x: &DVector<f64>) -> EquilibriumResult<(f64, DVector<f64>)> {
        let phases = self.phases_at(x)?;
        let objective = self.ensemble.objective();
        let (over_rt, factor) = match objective {
            Objective::GibbsOverRt | Objective::HelmholtzOverRt => (true, 1.0),
            Objective::NegativeEntropy => (false, -1.0 / R),
            Objective::InternalEnergy | Objective::Enthalpy => (false, 1.0 / (R * self.t_ref)),
        };
        let (value, grad) = self.sum_property(&phases, objective.property(), over_rt)?;
        Ok((value * factor, grad * factor))
    }

    fn constraints_and_jacobian(
        &self,
        x: &DVector<f64>,
        with_jacobian: bool,
    ) -> EquilibriumResult<(DVector<f64>, DMatrix<f64>)> {
        let rows = self.conservation.nrows();
        let m = rows + self.properties.len();
        let n = self.kinds.len();
        let mut c = DVector::zeros(m);
        let mut jac = DMatrix::zeros(if with_jacobian { m } else { 0 }, n);

        let amounts = x.rows(0, self.num_amounts);
        let balance = (&self.conservation * amounts - &self.conserved) / self.conservation_scale;
        c.rows_mut(0, rows).copy_from(&balance);
        if with_jacobian {
            jac.view_mut((0, 0), (rows, self.num_amounts))
                .copy_from(&(&self.conservation / self.conservation_scale));
        }

        if !self.properties.is_empty() {
            let phases = self.phases_at(x)?;
            for (r, constraint) in self.properties.iter().enumerate() {
                let (value, grad) = self.sum_property(&phases, constraint.property, false)?;
                c[rows + r] = (value - constraint.target) / constraint.scale;
                if with_jacobian {
                    jac.set_row(rows + r, &(grad / constraint.scale).transpose());
                }
            }
        }
        Ok((c, jac))
    }
}

impl NlpProblem for EquilibriumProblem {
    fn variable_kinds(&self) -> &[VariableKind] {
        &self.kinds
    }

    fn initial_point(&self) -> DVector<f64> {
        self.x0.clone()
    }

    fn amount_scale(&self) -> f64 {
        self.total
    }

    fn objective(&self, x: &DVector<f64>) -> EquilibriumResult<f64> {
        Ok(self.objective_and_gradient(x)?.0)
    }

    fn constraints(&self, x: &DVector<f64>) -> EquilibriumResult<DVector<f64>> {
        Ok(self.constraints_and_jacobian(x, false)?.0)
    }

    fn gradient(&self, x: &DVector<f64>) -> EquilibriumResult<DVector<f64>> {
        Ok(self.objective_and_gradient(x)?.1)
    }

    fn constraint_jacobian(&self, x: &DVector<f64>) -> EquilibriumResult<DMatrix<f64>> {
        Ok(self.constraints_and_jacobian(x, true)?.1)
    }

    fn variable_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .phases
            .iter()
            .zip(&self.species)
            .enumerate()
            .flat_map(|(j, (phase, species))| {
                species
                    .iter()
                    .map(move |s| format!("n[{s}] ({} #{j})", phase.label()))
            })
            .collect();
        if self.t_index.is_some() {
            labels.push(format!("T/{} K", self.t_ref));
        }
        if self.p_index.is_some() {
            labels.push(format!("P/{} Pa", self.p_ref));
        }
        labels
    }

    fn constraint_labels(&self) -> Vec<String> {
        self.constraint_info().into_iter().map(|c| c.name).collect()
    }

    fn describe_objective(&self) -> String {
        let objective = self.ensemble.objective();
        match objective {
            Objective::InternalEnergy | Objective::Enthalpy => format!(
                "minimise {objective} at fixed {} with T_ref = {} K",
                self.ensemble, self.t_ref
            ),
            _ => format!("minimise {objective} at fixed {}", self.ensemble),
        }
    }
}

type Rows = (Vec<Vec<f64>>, Vec<String>);

/// One row per element, in element name order.
fn element_rows(phases: &[PhaseState], species: &[Vec<String>]) -> EquilibriumResult<Rows> {
    let mut per_species = Vec::new();
    for (phase, list) in phases.iter().zip(species) {
        for name in list {
            per_species.push(phase.evaluator().elemental_composition(name)?);
        }
    }
    let elements: BTreeSet<String> = per_species
        .iter()
        .flat_map(|c| c.species().map(str::to_string).collect::<Vec<_>>())
        .collect();
    let rows = elements
        .iter()
        .map(|e| per_species.iter().map(|c| c.get(e)).collect())
        .collect();
    let labels = elements.into_iter().map(|e| format!("element {e}")).collect();
    Ok((rows, labels))
}

/// One row per distinct species, summed across phases.
fn species_rows(species: &[Vec<String>]) -> Rows {
    let names: BTreeSet<&str> = species.iter().flatten().map(String::as_str).collect();
    let rows = names
        .iter()
        .map(|name| {
            species
                .iter()
                .flatten()
                .map(|s| if s.as_str() == *name { 1.0 } else { 0.0 })
                .collect()
        })
        .collect();
    let labels = names.into_iter().map(|s| format!("species {s}")).collect();
    (rows, labels)
}

/// Indices of a maximal linearly independent subset of `rows` (Gram–Schmidt).
fn independent_rows(rows: &[Vec<f64>]) -> Vec<usize> {
    let mut basis: Vec<DVector<f64>> = Vec::new();
    let mut kept = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let v = DVector::from_column_slice(row);
        let norm = v.norm();
        if norm == 0.0 {
            continue;
        }
        let mut residual = v;
        for q in &basis {
            let projection = q.dot(&residual);
            residual -= q * projection;
        }
        let rest = residual.norm();
        if rest > DEPENDENT_ROW_TOLERANCE * norm {
            basis.push(residual / rest);
            kept.push(i);
        }
    }
    kept
}
