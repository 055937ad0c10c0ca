//! Sparse species → amount algebra.

use crate::error::{ThermoError, ThermoResult};
use crate::standard_state::StandardStateEvaluator;
use std::collections::BTreeMap;
use std::ops::{Add, Index, Mul, Neg, Sub};

/// Amounts [mol] keyed by species (or element) identifier.
///
/// Absent keys read as zero. Every arithmetic operation returns a fresh value;
/// nothing here mutates an argument. Entries may be negative transiently (for
/// example the difference of two compositions).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Composition {
    amounts: BTreeMap<String, f64>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(species, amount)` pairs. Repeated keys accumulate.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut comp = Self::new();
        for (key, amount) in pairs {
            *comp.amounts.entry(key.into()).or_insert(0.0) += amount;
        }
        comp
    }

    /// Amount of `key` (0.0 if absent).
    pub fn get(&self, key: &str) -> f64 {
        self.amounts.get(key).copied().unwrap_or(0.0)
    }

    /// Create or overwrite an entry.
    pub fn set(&mut self, key: impl Into<String>, amount: f64) {
        self.amounts.insert(key.into(), amount);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.amounts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.amounts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Keys in order.
    pub fn species(&self) -> impl Iterator<Item = &str> + '_ {
        self.amounts.keys().map(String::as_str)
    }

    /// Sum of all amounts.
    pub fn total(&self) -> f64 {
        self.amounts.values().sum()
    }

    /// Multiply every entry by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            amounts: self
                .amounts
                .iter()
                .map(|(k, v)| (k.clone(), v * factor))
                .collect(),
        }
    }

    /// Divide every entry by `divisor`.
    pub fn divide(&self, divisor: f64) -> ThermoResult<Self> {
        if divisor == 0.0 {
            return Err(ThermoError::Division {
                what: "composition divided by zero",
            });
        }
        Ok(self.scale(1.0 / divisor))
    }

    /// Scale so that the amounts sum to one.
    pub fn normalised(&self) -> ThermoResult<Self> {
        let total = self.total();
        if total == 0.0 {
            return Err(ThermoError::Division {
                what: "normalising a composition with zero total",
            });
        }
        self.divide(total)
    }

    /// Mole fractions; alias of [`Composition::normalised`].
    pub fn mole_fractions(&self) -> ThermoResult<Self> {
        self.normalised()
    }

    /// Copy without the entries whose magnitude is at or below `threshold`.
    pub fn pruned(&self, threshold: f64) -> Self {
        Self {
            amounts: self
                .amounts
                .iter()
                .filter(|(_, v)| v.abs() > threshold)
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    /// Decompose species amounts into element amounts.
    pub fn elemental_composition(
        &self,
        evaluator: &dyn StandardStateEvaluator,
    ) -> ThermoResult<Self> {
        let mut elements = Self::new();
        for (species, amount) in self.iter() {
            let per_mole = evaluator.elemental_composition(species)?;
            for (element, count) in per_mole.iter() {
                *elements.amounts.entry(element.to_string()).or_insert(0.0) += count * amount;
            }
        }
        Ok(elements)
    }

    /// Total mass [g] of the amounts held.
    pub fn mass(&self, evaluator: &dyn StandardStateEvaluator) -> ThermoResult<f64> {
        self.iter().try_fold(0.0, |acc, (species, amount)| {
            Ok(acc + amount * evaluator.molar_mass(species)?)
        })
    }

    /// Mean molar mass [g/mol] of the mixture.
    pub fn molar_mass(&self, evaluator: &dyn StandardStateEvaluator) -> ThermoResult<f64> {
        let total = self.total();
        if total == 0.0 {
            return Err(ThermoError::Division {
                what: "molar mass of a composition with zero total",
            });
        }
        Ok(self.mass(evaluator)? / total)
    }

    fn zip_with(&self, other: &Self, op: impl Fn(f64, f64) -> f64) -> Self {
        let mut amounts = self.amounts.clone();
        for (key, value) in &other.amounts {
            let entry = amounts.entry(key.clone()).or_insert(0.0);
            *entry = op(*entry, *value);
        }
        for (key, value) in amounts.iter_mut() {
            if !other.amounts.contains_key(key) {
                *value = op(*value, 0.0);
            }
        }
        Self { amounts }
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Composition {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

static ZERO: f64 = 0.0;

impl Index<&str> for Composition {
    type Output = f64;

    fn index(&self, key: &str) -> &f64 {
        self.amounts.get(key).unwrap_or(&ZERO)
    }
}

impl Add for &Composition {
    type Output = Composition;

    fn add(self, rhs: &Composition) -> Composition {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Add for Composition {
    type Output = Composition;

    fn add(self, rhs: Composition) -> Composition {
        &self + &rhs
    }
}

impl Sub for &Composition {
    type Output = Composition;

    fn sub(self, rhs: &Composition) -> Composition {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Sub for Composition {
    type Output = Composition;

    fn sub(self, rhs: Composition) -> Composition {
        &self - &rhs
    }
}

impl Neg for &Composition {
    type Output = Composition;

    fn neg(self) -> Composition {
        self.scale(-1.0)
    }
}

impl Neg for Composition {
    type Output = Composition;

    fn neg(self) -> Composition {
        self.scale(-1.0)
    }
}

impl Mul<f64> for &Composition {
    type Output = Composition;

    fn mul(self, rhs: f64) -> Composition {
        self.scale(rhs)
    }
}

impl Mul<f64> for Composition {
    type Output = Composition;

    fn mul(self, rhs: f64) -> Composition {
        self.scale(rhs)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use eqm_core::numeric::{Tolerances, nearly_equal};
    use proptest::prelude::*;

    const KEYS: [&str; 5] = ["CH4", "O2", "N2", "CO2", "H2O"];

    fn composition() -> impl Strategy<Value = Composition> {
        prop::collection::vec((0usize..KEYS.len(), -10.0_f64..10.0), 0..6)
            .prop_map(|entries| {
                entries
                    .into_iter()
                    .map(|(i, v)| (KEYS[i], v))
                    .collect::<Composition>()
            })
    }

    fn close(a: &Composition, b: &Composition) -> bool {
        let tol = Tolerances::new(1e-9, 1e-9);
        KEYS.iter().all(|k| nearly_equal(a[*k], b[*k], tol))
    }

    proptest! {
        #[test]
        fn add_then_subtract_recovers(a in composition(), b in composition()) {
            let round = &(&a + &b) - &b;
            prop_assert!(close(&round, &a));
        }

        #[test]
        fn scale_then_divide_recovers(a in composition(), k in prop_oneof![-100.0_f64..-0.01, 0.01_f64..100.0]) {
            let round = (&a * k).divide(k).unwrap();
            prop_assert!(close(&round, &a));
        }

        #[test]
        fn total_is_sum_of_values(a in composition()) {
            let sum: f64 = a.iter().map(|(_, v)| v).sum();
            prop_assert!(nearly_equal(a.total(), sum, Tolerances::uniform(1e-12)));
        }

        #[test]
        fn normalised_total_is_one(entries in prop::collection::vec((0usize..KEYS.len(), 0.001_f64..10.0), 1..6)) {
            let a: Composition = entries.into_iter().map(|(i, v)| (KEYS[i], v)).collect();
            let x = a.normalised().unwrap();
            prop_assert!(nearly_equal(x.total(), 1.0, Tolerances::uniform(1e-12)));
        }
    }
}
