//! Immutable chemistry catalog: species, their elements and standard-state data.

use crate::composition::Composition;
use crate::error::{ThermoError, ThermoResult};
use crate::formula::{molar_mass_of_elements, parse_formula};
use crate::standard_state::{PhaseData, StandardStateEvaluator, StandardStateModel, TemperatureRange};
use eqm_core::constants::T0_K;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Phase label for ideal-gas data.
pub const GAS: &str = "Gas";
/// Phase label for liquid data.
pub const LIQUID: &str = "Liquid";
/// Phase label for solid data.
pub const SOLID: &str = "Solid";

/// One species: elements, molar mass and per-phase data.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesEntry {
    name: String,
    elements: Composition,
    molar_mass: f64,
    phases: BTreeMap<String, PhaseData>,
}

impl SpeciesEntry {
    /// Species whose name is its formula; elements and molar mass are derived.
    pub fn from_formula(name: &str) -> ThermoResult<Self> {
        let elements = parse_formula(name)?;
        Self::with_elements(name, elements)
    }

    /// Species with an explicit elemental composition.
    pub fn with_elements(name: &str, elements: Composition) -> ThermoResult<Self> {
        let molar_mass = molar_mass_of_elements(&elements)?;
        Ok(Self {
            name: name.to_string(),
            elements,
            molar_mass,
            phases: BTreeMap::new(),
        })
    }

    /// Attach (or replace) data for a phase label.
    pub fn phase(mut self, label: &str, ranges: Vec<TemperatureRange>) -> ThermoResult<Self> {
        self.phases.insert(label.to_string(), PhaseData::new(ranges)?);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &Composition {
        &self.elements
    }

    pub fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    pub fn phase_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.phases.keys().map(String::as_str)
    }

    pub fn phase_data(&self, label: &str) -> ThermoResult<&PhaseData> {
        self.phases
            .get(label)
            .ok_or_else(|| ThermoError::MissingPhase {
                species: self.name.clone(),
                phase: label.to_string(),
            })
    }
}

/// Immutable set of species, passed explicitly to every phase and solve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeciesCatalog {
    species: BTreeMap<String, SpeciesEntry>,
}

/// Builder for [`SpeciesCatalog`].
#[derive(Debug, Default)]
pub struct SpeciesCatalogBuilder {
    species: BTreeMap<String, SpeciesEntry>,
}

impl SpeciesCatalogBuilder {
    pub fn species(mut self, entry: SpeciesEntry) -> Self {
        self.species.insert(entry.name.clone(), entry);
        self
    }

    pub fn build(self) -> SpeciesCatalog {
        SpeciesCatalog {
            species: self.species,
        }
    }
}

impl SpeciesCatalog {
    pub fn builder() -> SpeciesCatalogBuilder {
        SpeciesCatalogBuilder::default()
    }

    pub fn get(&self, species: &str) -> ThermoResult<&SpeciesEntry> {
        self.species
            .get(species)
            .ok_or_else(|| ThermoError::UnknownSpecies {
                species: species.to_string(),
            })
    }

    pub fn contains(&self, species: &str) -> bool {
        self.species.contains_key(species)
    }

    pub fn species_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.species.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Wrap for sharing between phases.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn range(&self, species: &str, t_k: f64, phase: &str) -> ThermoResult<&TemperatureRange> {
        let data = self.get(species)?.phase_data(phase)?;
        data.range_for(t_k).ok_or_else(|| {
            let (t_min_k, t_max_k) = data.bounds();
            ThermoError::DataRange {
                species: species.to_string(),
                phase: phase.to_string(),
                t_k,
                t_min_k,
                t_max_k,
            }
        })
    }

    /// Ideal-gas combustion species (GRI-Mech 3.0 polynomials) plus liquid water.
    pub fn combustion() -> Self {
        let mut species = BTreeMap::new();
        for row in COMBUSTION_GASES {
            let mut phases = BTreeMap::new();
            phases.insert(
                GAS.to_string(),
                nasa_phase(row.t_min, row.t_mid, row.t_max, row.low, row.high),
            );
            if row.name == "H2O" {
                phases.insert(LIQUID.to_string(), liquid_water());
            }
            species.insert(
                row.name.to_string(),
                SpeciesEntry {
                    name: row.name.to_string(),
                    elements: Composition::from_pairs(row.elements.iter().copied()),
                    molar_mass: row.molar_mass,
                    phases,
                },
            );
        }
        Self { species }
    }
}

impl StandardStateEvaluator for SpeciesCatalog {
    fn cp0(&self, species: &str, t_k: f64, phase: &str) -> ThermoResult<f64> {
        Ok(self.range(species, t_k, phase)?.model.cp(t_k))
    }

    fn hf0(&self, species: &str, t_k: f64, phase: &str) -> ThermoResult<f64> {
        Ok(self.range(species, t_k, phase)?.model.enthalpy(t_k))
    }

    fn s0(&self, species: &str, t_k: f64, phase: &str) -> ThermoResult<f64> {
        Ok(self.range(species, t_k, phase)?.model.entropy(t_k))
    }

    fn in_data_range(&self, species: &str, t_k: f64, phase: &str) -> bool {
        self.range(species, t_k, phase).is_ok()
    }

    fn elemental_composition(&self, species: &str) -> ThermoResult<Composition> {
        Ok(self.get(species)?.elements.clone())
    }

    fn molar_mass(&self, species: &str) -> ThermoResult<f64> {
        Ok(self.get(species)?.molar_mass)
    }
}

struct NasaRow {
    name: &'static str,
    elements: &'static [(&'static str, f64)],
    molar_mass: f64,
    t_min: f64,
    t_mid: f64,
    t_max: f64,
    low: [f64; 7],
    high: [f64; 7],
}

fn nasa_phase(t_min: f64, t_mid: f64, t_max: f64, low: [f64; 7], high: [f64; 7]) -> PhaseData {
    PhaseData {
        ranges: vec![
            TemperatureRange::new(t_min, t_mid, StandardStateModel::Nasa7(low)),
            TemperatureRange::new(t_mid, t_max, StandardStateModel::Nasa7(high)),
        ],
    }
}

fn liquid_water() -> PhaseData {
    PhaseData {
        ranges: vec![TemperatureRange::new(
            273.15,
            600.0,
            StandardStateModel::ConstantCp {
                cp: 75.3,
                h_ref: -285_830.0,
                s_ref: 69.95,
                t_ref_k: T0_K,
            },
        )],
    }
}

const COMBUSTION_GASES: [NasaRow; 12] = [
    NasaRow {
        name: "Ar",
        elements: &[("Ar", 1.0)],
        molar_mass: 39.948,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 6000.0,
        low: [2.5, 0.0, 0.0, 0.0, 0.0, -745.375, 4.366],
        high: [2.5, 0.0, 0.0, 0.0, 0.0, -745.375, 4.366],
    },
    NasaRow {
        name: "CH4",
        elements: &[("C", 1.0), ("H", 4.0)],
        molar_mass: 16.043,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 3500.0,
        low: [
            5.149_876_13,
            -1.367_097_88e-2,
            4.918_005_99e-5,
            -4.847_430_26e-8,
            1.666_939_56e-11,
            -1.024_664_76e4,
            -4.641_303_76,
        ],
        high: [
            7.485_149_50e-2,
            1.339_094_67e-2,
            -5.732_858_09e-6,
            1.222_925_35e-9,
            -1.018_152_30e-13,
            -9.468_344_59e3,
            1.843_731_80e1,
        ],
    },
    NasaRow {
        name: "CO",
        elements: &[("C", 1.0), ("O", 1.0)],
        molar_mass: 28.010,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 3500.0,
        low: [
            3.579_533_47,
            -6.103_536_80e-4,
            1.016_814_33e-6,
            9.070_058_84e-10,
            -9.044_244_99e-13,
            -1.434_408_60e4,
            3.508_409_28,
        ],
        high: [
            2.715_185_61,
            2.062_527_43e-3,
            -9.988_257_71e-7,
            2.300_530_08e-10,
            -2.036_477_16e-14,
            -1.415_187_24e4,
            7.818_687_72,
        ],
    },
    NasaRow {
        name: "CO2",
        elements: &[("C", 1.0), ("O", 2.0)],
        molar_mass: 44.009,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 3500.0,
        low: [
            2.356_773_52,
            8.984_596_77e-3,
            -7.123_562_69e-6,
            2.459_190_22e-9,
            -1.436_995_48e-13,
            -4.837_196_97e4,
            9.901_052_22,
        ],
        high: [
            3.857_460_29,
            4.414_370_26e-3,
            -2.214_814_04e-6,
            5.234_901_88e-10,
            -4.720_841_64e-14,
            -4.875_916_60e4,
            2.271_638_06,
        ],
    },
    NasaRow {
        name: "H",
        elements: &[("H", 1.0)],
        molar_mass: 1.008,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 3500.0,
        low: [
            2.5,
            7.053_328_19e-13,
            -1.995_919_64e-15,
            2.300_816_32e-18,
            -9.277_323_32e-22,
            2.547_365_99e4,
            -4.466_828_53e-1,
        ],
        high: [
            2.500_000_01,
            -2.308_429_73e-11,
            1.615_619_48e-14,
            -4.735_152_35e-18,
            4.981_973_57e-22,
            2.547_365_99e4,
            -4.466_829_14e-1,
        ],
    },
    NasaRow {
        name: "H2",
        elements: &[("H", 2.0)],
        molar_mass: 2.016,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 3500.0,
        low: [
            2.344_331_12,
            7.980_520_75e-3,
            -1.947_815_10e-5,
            2.015_720_94e-8,
            -7.376_117_61e-12,
            -9.179_351_73e2,
            6.830_102_38e-1,
        ],
        high: [
            3.337_279_20,
            -4.940_247_31e-5,
            4.994_567_78e-7,
            -1.795_663_94e-10,
            2.002_553_76e-14,
            -9.501_589_22e2,
            -3.205_023_31,
        ],
    },
    NasaRow {
        name: "H2O",
        elements: &[("H", 2.0), ("O", 1.0)],
        molar_mass: 18.015,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 3500.0,
        low: [
            4.198_640_56,
            -2.036_434_10e-3,
            6.520_402_11e-6,
            -5.487_970_62e-9,
            1.771_978_17e-12,
            -3.029_372_67e4,
            -8.490_322_08e-1,
        ],
        high: [
            3.033_992_49,
            2.176_918_04e-3,
            -1.640_725_18e-7,
            -9.704_198_70e-11,
            1.682_009_92e-14,
            -3.000_429_71e4,
            4.966_770_10,
        ],
    },
    NasaRow {
        name: "N2",
        elements: &[("N", 2.0)],
        molar_mass: 28.014,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 5000.0,
        low: [
            3.298_677,
            1.408_240_4e-3,
            -3.963_222e-6,
            5.641_515e-9,
            -2.444_854e-12,
            -1.020_899_9e3,
            3.950_372,
        ],
        high: [
            2.926_64,
            1.487_976_8e-3,
            -5.684_760e-7,
            1.009_703_8e-10,
            -6.753_351e-15,
            -9.227_977e2,
            5.980_528,
        ],
    },
    NasaRow {
        name: "NO",
        elements: &[("N", 1.0), ("O", 1.0)],
        molar_mass: 30.006,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 6000.0,
        low: [
            4.218_476_30,
            -4.638_976_00e-3,
            1.104_102_20e-5,
            -9.336_135_40e-9,
            2.803_577_00e-12,
            9.844_623_00e3,
            2.280_846_40,
        ],
        high: [
            3.260_605_60,
            1.191_104_30e-3,
            -4.291_704_80e-7,
            6.945_766_90e-11,
            -4.033_609_90e-15,
            9.920_974_60e3,
            6.369_302_70,
        ],
    },
    NasaRow {
        name: "O",
        elements: &[("O", 1.0)],
        molar_mass: 15.999,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 3500.0,
        low: [
            3.168_267_10,
            -3.279_318_84e-3,
            6.643_063_96e-6,
            -6.128_066_24e-9,
            2.112_659_71e-12,
            2.912_225_92e4,
            2.051_933_46,
        ],
        high: [
            2.569_420_78,
            -8.597_411_37e-5,
            4.194_845_89e-8,
            -1.001_777_99e-11,
            1.228_336_91e-15,
            2.921_757_91e4,
            4.784_338_64,
        ],
    },
    NasaRow {
        name: "O2",
        elements: &[("O", 2.0)],
        molar_mass: 31.998,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 3500.0,
        low: [
            3.782_456_36,
            -2.996_734_16e-3,
            9.847_302_01e-6,
            -9.681_295_09e-9,
            3.243_728_37e-12,
            -1.063_943_56e3,
            3.657_675_73,
        ],
        high: [
            3.282_537_84,
            1.483_087_54e-3,
            -7.579_666_69e-7,
            2.094_705_55e-10,
            -2.167_177_94e-14,
            -1.088_457_72e3,
            5.453_231_29,
        ],
    },
    NasaRow {
        name: "OH",
        elements: &[("O", 1.0), ("H", 1.0)],
        molar_mass: 17.007,
        t_min: 200.0,
        t_mid: 1000.0,
        t_max: 3500.0,
        low: [
            3.992_015_43,
            -2.401_317_52e-3,
            4.617_938_41e-6,
            -3.881_133_33e-9,
            1.364_114_70e-12,
            3.615_080_56e3,
            -1.039_254_58e-1,
        ],
        high: [
            3.092_887_67,
            5.484_297_16e-4,
            1.265_052_28e-7,
            -8.794_615_56e-11,
            1.174_123_76e-14,
            3.858_657_00e3,
            4.476_696_10,
        ],
    },
];
