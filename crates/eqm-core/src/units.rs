// eqm-core/src/units.rs

use uom::si::f64::{
    Pressure as UomPressure, ThermodynamicTemperature as UomThermodynamicTemperature,
};

// Public canonical unit types (SI, f64)
pub type Pressure = UomPressure;
pub type Temperature = UomThermodynamicTemperature;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uom::si::pressure::{bar, pascal};
    use uom::si::thermodynamic_temperature::{degree_celsius, kelvin};

    #[test]
    fn base_units_are_si() {
        assert_eq!(pa(1.0e5).value, 1.0e5);
        assert_eq!(k(298.15).value, 298.15);
    }

    #[test]
    fn standard_state_in_other_units() {
        assert!((pa(1.0e5).get::<bar>() - 1.0).abs() < 1e-12);
        assert!((k(298.15).get::<degree_celsius>() - 25.0).abs() < 1e-9);
        assert_eq!(k(300.0).get::<kelvin>(), 300.0);
        assert_eq!(pa(5.0).get::<pascal>(), 5.0);
    }
}
