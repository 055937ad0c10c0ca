//! Chemical and phase equilibrium solver.
//!
//! An equilibrium search holds two of {T, P, H, V, U, S} fixed and minimises
//! the matching thermodynamic potential over the species amounts of every
//! phase (plus the free temperature and pressure), subject to element or
//! species conservation and the fixed extensive properties. The resulting
//! equality-constrained problem is solved by a damped Newton–KKT iteration
//! with analytic first derivatives.
//!
//! # Example
//!
//! ```no_run
//! use eqm_core::units::{k, pa};
//! use eqm_solver::{FinderConfig, find_equilibrium};
//! use eqm_thermo::{Composition, PhaseState, SpeciesCatalog};
//!
//! let catalog = SpeciesCatalog::combustion().shared();
//! let mix = Composition::from_pairs([("H2", 2.0), ("O2", 1.0), ("H2O", 0.0)]);
//! let gas = PhaseState::ideal_gas(mix, k(1000.0), pa(1.0e5), catalog).unwrap();
//! let result = find_equilibrium(&[gas], "TP".parse().unwrap(), &FinderConfig::default()).unwrap();
//! println!("{}", result[0]);
//! ```

pub mod ensemble;
pub mod equilibrium;
pub mod error;
pub mod find;
pub mod jacobian;
pub mod problem;
pub mod report;
pub mod sqp;
pub mod transform;

pub use ensemble::{Ensemble, FixedFlags, Objective, StateVar};
pub use equilibrium::EquilibriumProblem;
pub use error::{EquilibriumError, EquilibriumResult};
pub use find::{FinderConfig, find_equilibrium, find_equilibrium_with, find_equilibrium_with_report};
pub use problem::NlpProblem;
pub use report::{ConstraintInfo, EquilibriumReport, FailureReport, IterationRecord, ProblemTrace};
pub use sqp::{
    ConstrainedOptimizer, ITERATION_LIMIT, OptimizationResult, SqpConfig, SqpOptimizer, sqp_solve,
};
pub use transform::{AmountTransform, StepLimits, VariableKind};
