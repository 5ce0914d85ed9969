//! Culture models
//!
//! The culture model implements the [`PhysicalModel`](crate::physics::PhysicalModel)
//! trait. The solver calls `compute_physics` inside every step; the model is
//! responsible for the biology (growth, uptake, production), the solver for
//! the time integration.
//!
//! # Layers
//!
//! ## [`kinetics`]: rate-law engine
//!
//! Pure functions mapping state, parameters and driver values to the specific
//! rates (`mu`, `mu_d`, `q_*`) and osmolarity.
//!
//! ## [`CultureModel`]: mass balances
//!
//! Combines the rates with feed dilution into the ten state derivatives.
//!
//! ## [`Profile`]: external drivers
//!
//! Feed rate and temperature over time, supplied by the caller.
//!
//! ## [`chemistry`]: species data
//!
//! Molar masses, osmotic coefficients and oxygen solubility.

// =================================================================================================
// Module Declarations
// =================================================================================================

pub mod chemistry;
pub mod culture;
pub mod kinetics;
pub mod profiles;

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use chemistry::{csat_oxygen, Species};
pub use culture::{rhs, rhs_from_flat, CultureModel};
pub use kinetics::{gaussian_decay, monod, state_vars, ProcessVariables};
pub use profiles::{Profile, VESSEL_VOLUME};
