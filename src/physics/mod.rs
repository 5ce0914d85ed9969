//! Physics layer: model trait and culture state layout
//!
//! - [`PhysicalModel`]: right-hand side of an ODE system (WHAT to solve)
//! - [`StateVariable`], [`ProcessVariable`]: names, order and units of the
//!   integrated and auxiliary culture channels
//! - [`CultureState`]: typed view of one state vector

pub mod state;
pub mod traits;

pub use state::{CultureState, ProcessVariable, StateVariable, PROCESS_DIM, STATE_DIM};
pub use traits::PhysicalModel;
