//! Unit-validated parameter model
//!
//! Kinetic constants and initial conditions are stored as magnitudes in a
//! single canonical unit system. Values may be assigned bare (already
//! canonical) or unit-tagged; unit-tagged values are converted on every
//! assignment, and dimensionally impossible conversions are rejected.
//!
//! ```rust
//! use cho_rs::parameters::{InitialConditions, InputParameters, UnitValidated};
//!
//! let mut params = InputParameters::default();
//! params.set_field_by_name("Cglc_feed", "0.2 M").unwrap();
//! assert!((params.cglc_feed - 200.0).abs() < 1e-9);
//!
//! let mut ic = InitialConditions::default();
//! assert!(ic.set_field_by_name("V", "1 1/hr").is_err());
//! ```

pub mod config;
pub mod initial;
pub mod input;
pub mod units;
pub mod value;

pub use config::SimulationConfig;
pub use initial::{InitialConditions, InitialField};
pub use input::{InputParameters, ParameterField};
pub use units::Quantity;
pub use value::{FieldSpec, ParamValue, UnitValidated};

/// Small positive floor for concentrations (canonical units)
pub const EPSILON: f64 = 1e-12;
