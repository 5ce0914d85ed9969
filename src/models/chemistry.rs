//! Species constants and dissolved-gas thermodynamics

/// Chemical species tracked by the culture model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Species {
    pub formula: &'static str,
    /// Molar mass \[g/mol\]
    pub molar_mass: f64,
    /// Osmotic coefficient (particles per dissolved molecule)
    pub phi: f64,
}

impl Species {
    pub const GLUCOSE: Species = Species { formula: "C6H12O6", molar_mass: 180.0, phi: 1.0 };
    pub const GLUTAMINE: Species = Species { formula: "C5H10N2O3", molar_mass: 146.14, phi: 1.0 };
    pub const LACTATE: Species = Species { formula: "C3H6O3", molar_mass: 90.08, phi: 2.0 };
    pub const AMMONIA: Species = Species { formula: "NH3", molar_mass: 17.031, phi: 1.0 };
    pub const OXYGEN: Species = Species { formula: "O2", molar_mass: 31.999, phi: 1.0 };
}

/// Offset between degrees Celsius and kelvin
pub const CELSIUS_OFFSET: f64 = 273.15;

/// Oxygen saturation concentration in water \[mmol/L\] at `temperature` \[°C\]
///
/// Benson & Krause correlation for air-saturated fresh water:
///
/// ```text
/// ln C* = -139.34410 + 1.575701e5/T - 6.642308e7/T² + 1.243800e10/T³ - 8.621949e11/T⁴
/// ```
///
/// with T in kelvin and C* in mg/L, divided by the O₂ molar mass.
pub fn csat_oxygen(temperature: f64) -> f64 {
    let t = temperature + CELSIUS_OFFSET;
    let ln_c = -139.34410 + 1.575701e5 / t - 6.642308e7 / t.powi(2) + 1.243800e10 / t.powi(3)
        - 8.621949e11 / t.powi(4);
    ln_c.exp() / Species::OXYGEN.molar_mass
}

/// Molar to molal conversion for dilute solutions (solution density in kg/L)
pub fn molar_to_molal(molar: f64, density: f64) -> f64 {
    molar / density
}
