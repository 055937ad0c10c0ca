//! End-to-end equilibrium searches on the bundled combustion catalog.

use eqm_core::units::{k, pa};
use eqm_core::{Tolerances, nearly_equal};
use eqm_solver::{
    EquilibriumError, FinderConfig, FixedFlags, ITERATION_LIMIT, StateVar, find_equilibrium,
    find_equilibrium_with_report,
};
use eqm_thermo::{Composition, PhaseState, Property, SpeciesCatalog, ThermoError};
use std::sync::Arc;

fn catalog() -> Arc<SpeciesCatalog> {
    SpeciesCatalog::combustion().shared()
}

fn gas(pairs: &[(&str, f64)], t: f64, p: f64) -> PhaseState {
    PhaseState::ideal_gas(
        Composition::from_pairs(pairs.iter().copied()),
        k(t),
        pa(p),
        catalog(),
    )
    .unwrap()
}

fn liquid(amount: f64, t: f64, p: f64) -> PhaseState {
    PhaseState::incompressible(
        Composition::from_pairs([("H2O", amount)]),
        k(t),
        pa(p),
        1.8e-5,
        catalog(),
    )
    .unwrap()
}

/// Stoichiometric methane/air with the usual products present at zero.
fn methane_air(t: f64) -> PhaseState {
    gas(
        &[
            ("CH4", 1.0),
            ("O2", 2.0),
            ("N2", 7.52),
            ("CO2", 0.0),
            ("H2O", 0.0),
            ("CO", 0.0),
            ("OH", 0.0),
            ("O", 0.0),
            ("H", 0.0),
            ("NO", 0.0),
        ],
        t,
        1e5,
    )
}

fn flags(text: &str) -> FixedFlags {
    text.parse().unwrap()
}

fn total(phases: &[PhaseState], property: Property) -> f64 {
    phases.iter().map(|p| p.property(property).unwrap()).sum()
}

fn elements(phases: &[PhaseState]) -> Composition {
    phases.iter().fold(Composition::new(), |acc, p| {
        &acc + &p.elemental_composition().unwrap()
    })
}

fn species_totals(phases: &[PhaseState]) -> Composition {
    phases
        .iter()
        .fold(Composition::new(), |acc, p| &acc + p.composition())
}

fn assert_balanced(before: &Composition, after: &Composition, abs: f64) {
    for (key, amount) in before.iter() {
        assert!(
            (after.get(key) - amount).abs() < abs,
            "{key}: {amount} before, {} after",
            after.get(key)
        );
    }
}

#[test]
fn methane_flame_at_constant_enthalpy_and_pressure() {
    let input = vec![methane_air(298.15)];
    let (result, report) =
        find_equilibrium_with_report(&input, flags("HP"), &FinderConfig::default()).unwrap();
    println!("converged in {} iterations: {}", report.iterations, result[0]);

    assert_eq!(result.len(), 1);
    let flame = &result[0];
    let t = flame.temperature().value;
    assert!(t > 2100.0 && t < 2400.0, "adiabatic flame temperature {t} K");
    assert_eq!(flame.pressure().value, 1e5);

    let n = flame.composition();
    assert!(n["CH4"] < 1e-6, "CH4 left: {}", n["CH4"]);
    assert!(n["CO2"] > 0.8 && n["CO2"] < 1.0, "CO2 {}", n["CO2"]);
    assert!(n["H2O"] > 1.9 && n["H2O"] < 2.05, "H2O {}", n["H2O"]);
    assert!(n["CO"] > 0.0 && n["NO"] > 0.0);

    assert_balanced(&elements(&input), &elements(&result), 1e-4);
    let h_in = total(&input, Property::Enthalpy);
    let h_out = total(&result, Property::Enthalpy);
    assert!((h_out - h_in).abs() < 0.05, "H {h_in} -> {h_out}");
    assert!(report.feasibility <= 1e-6);
}

#[test]
fn every_ensemble_holds_its_fixed_properties() {
    let input = vec![methane_air(2000.0)];
    let config = FinderConfig::default();
    let cases = [
        ("TP", vec![]),
        ("TV", vec![Property::Volume]),
        ("HP", vec![Property::Enthalpy]),
        ("UV", vec![Property::InternalEnergy, Property::Volume]),
        ("SV", vec![Property::Entropy, Property::Volume]),
        ("SP", vec![Property::Entropy]),
    ];
    for (pair, properties) in cases {
        let fixed = flags(pair);
        let result = find_equilibrium(&input, fixed, &config)
            .unwrap_or_else(|e| panic!("{pair}: {e}"));
        println!("{pair}: {}", result[0]);

        if fixed.is_fixed(StateVar::T) {
            assert_eq!(result[0].temperature().value, 2000.0);
        }
        if fixed.is_fixed(StateVar::P) {
            assert_eq!(result[0].pressure().value, 1e5);
        }
        for property in properties {
            let before = total(&input, property);
            let after = total(&result, property);
            assert!(
                nearly_equal(after, before, Tolerances::new(1e-2, 1e-5)),
                "{pair}: {property} {before} -> {after}"
            );
        }
        assert_balanced(&elements(&input), &elements(&result), 1e-4);
        assert!(result[0].composition()["CH4"] < 1e-6);
    }
}

#[test]
fn hydrogen_burns_to_water() {
    let input = vec![gas(&[("H2", 2.0), ("O2", 1.0), ("H2O", 0.0)], 1000.0, 1e5)];
    let result = find_equilibrium(&input, flags("TP"), &FinderConfig::default()).unwrap();
    let n = result[0].composition();
    assert!((n["H2O"] - 2.0).abs() < 1e-4, "H2O {}", n["H2O"]);
    assert!(n["H2"] < 1e-4 && n["O2"] < 1e-4);
    assert_eq!(result[0].temperature().value, 1000.0);
}

#[test]
fn linear_amounts_reach_the_same_equilibrium() {
    let input = vec![methane_air(2000.0)];
    let log = find_equilibrium(&input, flags("TP"), &FinderConfig::default()).unwrap();
    let linear = find_equilibrium(
        &input,
        flags("TP"),
        &FinderConfig::default().with_log_molar(false),
    )
    .unwrap();
    for species in ["CO2", "H2O", "CO", "O2", "OH"] {
        let a = log[0].composition()[species];
        let b = linear[0].composition()[species];
        assert!((a - b).abs() < 1e-5, "{species}: {a} vs {b}");
    }
}

#[test]
fn water_flashes_at_constant_enthalpy() {
    // Liquid water above its boiling point flashes to 373 K
    let input = vec![liquid(1.0, 400.0, 1e5), gas(&[("H2O", 0.0)], 400.0, 1e5)];
    let config = FinderConfig::default().with_elemental(false);
    let result = find_equilibrium(&input, flags("HP"), &config).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result[0].label(), "Liquid");
    assert_eq!(result[1].label(), "Gas");
    let t = result[0].temperature().value;
    assert!((t - 373.2).abs() < 1.0, "flash temperature {t} K");
    assert_eq!(result[1].temperature().value, t);

    let vapour = result[1].composition()["H2O"];
    assert!((vapour - 0.0493).abs() < 2e-3, "vapour {vapour}");
    assert_balanced(&species_totals(&input), &species_totals(&result), 1e-5);
    let h_in = total(&input, Property::Enthalpy);
    let h_out = total(&result, Property::Enthalpy);
    assert!((h_out - h_in).abs() < 0.05, "H {h_in} -> {h_out}");
}

#[test]
fn water_evaporates_into_nitrogen() {
    let input = vec![
        liquid(1.0, 350.0, 1e5),
        gas(&[("H2O", 0.0), ("N2", 1.0)], 350.0, 1e5),
    ];
    let config = FinderConfig::default().with_elemental(false);
    let result = find_equilibrium(&input, flags("TP"), &config).unwrap();

    let vapour = result[1].composition()["H2O"];
    assert!((vapour - 0.7026).abs() < 5e-3, "vapour {vapour}");
    assert!((result[1].composition()["N2"] - 1.0).abs() < 1e-6);
    assert_balanced(&species_totals(&input), &species_totals(&result), 1e-5);

    // Equal chemical potentials across the interface
    let mu_liquid = result[0].chemical_potentials().unwrap()["H2O"];
    let mu_gas = result[1].chemical_potentials().unwrap()["H2O"];
    assert!((mu_liquid - mu_gas).abs() < 1.0, "{mu_liquid} vs {mu_gas}");
}

#[test]
fn combustion_products_condense() {
    let input = vec![
        gas(&[("H2", 2.0), ("O2", 1.0), ("H2O", 0.0), ("N2", 3.76)], 300.0, 1e5),
        liquid(0.0, 300.0, 1e5),
    ];
    let result = find_equilibrium(&input, flags("TP"), &FinderConfig::default()).unwrap();
    let condensed = result[1].composition()["H2O"];
    let vapour = result[0].composition()["H2O"];
    assert!((condensed - 1.8625).abs() < 5e-3, "liquid {condensed}");
    assert!((vapour - 0.1375).abs() < 5e-3, "vapour {vapour}");
    assert_balanced(&elements(&input), &elements(&result), 1e-4);
}

#[test]
fn three_fixed_variables_rejected() {
    let input = vec![methane_air(298.15)];
    let fixed = FixedFlags::of(&[StateVar::T, StateVar::P, StateVar::H]);
    let err = find_equilibrium(&input, fixed, &FinderConfig::default()).unwrap_err();
    assert!(matches!(err, EquilibriumError::Configuration { .. }), "{err}");
}

#[test]
fn unsupported_pair_rejected() {
    let input = vec![methane_air(298.15)];
    for pair in ["TH", "PV", "HS"] {
        let err = find_equilibrium(&input, flags(pair), &FinderConfig::default()).unwrap_err();
        assert!(matches!(err, EquilibriumError::Configuration { .. }), "{pair}: {err}");
    }
}

#[test]
fn inputs_are_not_modified() {
    let input = vec![methane_air(298.15)];
    let before = format!("{:?}", input);
    let result = find_equilibrium(&input, flags("HP"), &FinderConfig::default()).unwrap();
    assert_eq!(format!("{:?}", input), before);
    assert_eq!(input[0].temperature().value, 298.15);
    assert_eq!(input[0].composition()["CO2"], 0.0);
    assert!(result[0].composition()["CO2"] > 0.5);
}

#[test]
fn data_range_errors_propagate() {
    let input = vec![gas(&[("CH4", 1.0), ("O2", 2.0), ("CO2", 0.0), ("H2O", 0.0)], 4000.0, 1e5)];
    let err = find_equilibrium(&input, flags("TP"), &FinderConfig::default()).unwrap_err();
    assert!(
        matches!(err, EquilibriumError::Thermo(ThermoError::DataRange { .. })),
        "{err}"
    );
}

#[test]
fn failure_carries_debug_trace() {
    let input = vec![methane_air(298.15)];
    let config = FinderConfig::default()
        .with_max_iterations(2)
        .with_debug(true);
    let err = find_equilibrium(&input, flags("HP"), &config).unwrap_err();
    println!("{err}");
    let report = err.report().expect("failure report");
    assert_eq!(report.reason, ITERATION_LIMIT);
    assert_eq!(report.iterations, 2);
    assert_eq!(report.iterate.len(), 11);
    assert!(report.phases.is_some());
    let names: Vec<&str> = report.residuals.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["element C", "element H", "element N", "element O", "total H"]);

    let trace = report.trace.as_ref().expect("debug trace");
    assert_eq!(trace.variables.len(), 11);
    assert_eq!(trace.constraints.len(), 5);
    assert!(trace.objective.contains("-sum S/R"));
    assert_eq!(trace.iterations.len(), 3);
    assert_eq!(trace.iterations[0].iteration, 0);
    assert_eq!(trace.iterations[0].residuals.len(), 5);
}

#[test]
fn failure_without_debug_has_no_trace() {
    let input = vec![methane_air(298.15)];
    let config = FinderConfig::default().with_max_iterations(1);
    let err = find_equilibrium(&input, flags("HP"), &config).unwrap_err();
    let report = err.report().expect("failure report");
    assert!(report.trace.is_none());
    // Raw iterate holds log amounts; CO is still a trace species
    assert!(report.iterate[1] < 0.0);
}

#[test]
fn liquid_past_its_data_fails_with_report() {
    // Burning H2 drives T far beyond the liquid water data (600 K), so the
    // optimizer runs into the edge of the data instead of an equilibrium.
    let input = vec![
        gas(&[("H2", 2.0), ("O2", 1.0), ("H2O", 0.0)], 300.0, 1e5),
        liquid(1.0, 300.0, 1e5),
    ];
    let config = FinderConfig::default()
        .with_max_iterations(200)
        .with_debug(true);
    let err = find_equilibrium(&input, flags("HP"), &config).unwrap_err();
    println!("{err}");
    let report = err.report().expect("failure report");
    assert!(!report.reason.is_empty());
    // H2, H2O, O2 in the gas, H2O in the liquid, then T
    assert_eq!(report.iterate.len(), 5);
    let names: Vec<&str> = report.residuals.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["element H", "element O", "total H"]);
    let trace = report.trace.as_ref().expect("debug trace");
    assert_eq!(trace.variables.len(), 5);
    assert!(!trace.iterations.is_empty());
    let t = report.iterate[4];
    assert!(t <= 600.0 / 300.0 + 1e-9, "scaled T {t}");
}
