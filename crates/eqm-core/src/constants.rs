//! Physical constants and the standard reference state.

/// Molar gas constant [J/(mol·K)].
pub const R: f64 = 8.314_462_618;

/// Standard-state temperature [K].
pub const T0_K: f64 = 298.15;

/// Standard-state pressure [Pa].
pub const P0_PA: f64 = 1.0e5;
