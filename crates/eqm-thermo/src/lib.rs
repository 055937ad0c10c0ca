//! eqm-thermo: mixture thermodynamics for the equilibrium workspace.
//!
//! Provides:
//! - Sparse species → amount compositions and formula parsing
//! - The `StandardStateEvaluator` trait and an immutable species catalog
//! - Phase states (ideal gas, incompressible, standard state) with
//!   extensive properties and their analytic derivatives
//! - Temperature inversion of enthalpy / internal energy
//!
//! # Example
//!
//! ```
//! use eqm_core::units::{k, pa};
//! use eqm_thermo::{Composition, PhaseState, SpeciesCatalog};
//!
//! let catalog = SpeciesCatalog::combustion().shared();
//! let air = Composition::from_pairs([("O2", 0.21), ("N2", 0.79)]);
//! let gas = PhaseState::ideal_gas(air, k(300.0), pa(1.0e5), catalog).unwrap();
//! let h = gas.enthalpy().unwrap();
//! println!("H = {h:.1} J");
//! ```

pub mod catalog;
pub mod composition;
pub mod error;
pub mod formula;
pub mod phase;
pub mod roots;
pub mod standard_state;

// Re-exports for ergonomics
pub use catalog::{GAS, LIQUID, SOLID, SpeciesCatalog, SpeciesCatalogBuilder, SpeciesEntry};
pub use composition::Composition;
pub use error::{ThermoError, ThermoResult};
pub use formula::{atomic_mass, parse_formula};
pub use phase::{PhaseModel, PhaseState, Property, PropertyGradient};
pub use roots::{RootConfig, solve_temperature};
pub use standard_state::{PhaseData, StandardStateEvaluator, StandardStateModel, TemperatureRange};
