//! Numerical solvers
//!
//! This module provides traits and implementations for numerical solvers.
//! A numerical solver applies a numerical method to integrate the equations
//! provided by a physical model over an output time grid.
//!
//! # Core Concepts
//!
//! ## The Architecture (WHAT vs HOW)
//!
//! 1. **Scenario** (`Scenario`) - WHAT to solve
//!    - Physical model (equations)
//!    - Initial state
//!    - Output time grid
//!
//! 2. **Configuration** (`SolverConfiguration`) - HOW to solve
//!    - Integration method (BDF, Dormand-Prince, Auto)
//!    - Tolerances, maximum step size, work limit
//!
//! 3. **Solver** (`Solver` trait) - The numerical method
//!    - Applies the numerical scheme
//!    - Returns the trajectory and its diagnostics
//!    - Independent of the culture biology
//!
//! The [`integrate`] driver ties them together: it picks the solver from
//! the configuration and evaluates the model's auxiliary channels at every
//! output point once the trajectory is known.
//!
//! # Module Organization
//!
//! - **`traits`**: `Solver`, `IntegrationMethod`, `SolverConfiguration`,
//!   `SimulationResult`, `IntegrationInfo`
//! - **`grid`**: `TimeGrid`, the strictly increasing output times
//! - **`scenario`**: `Scenario`, model + initial state + grid
//! - **`methods`**: `BdfSolver`, `DormandPrinceSolver`, `AutoSolver`
//! - **`driver`**: `integrate`, `integrate_culture`
//!
//! # Quick Start Example
//!
//! ```rust
//! use cho_rs::models::{CultureModel, Profile};
//! use cho_rs::parameters::{InitialConditions, InputParameters};
//! use cho_rs::solver::{integrate, Scenario, SolverConfiguration, TimeGrid};
//!
//! fn main() -> cho_rs::Result<()> {
//!     // 1. Create scenario (WHAT to solve)
//!     let model = CultureModel::new(
//!         InputParameters::default(),
//!         InitialConditions::default(),
//!         Profile::constant(0.0),
//!         Profile::constant(36.4),
//!     )?;
//!     let scenario = Scenario::new(Box::new(model), TimeGrid::linspace(0.0, 24.0, 25)?);
//!
//!     // 2. Create configuration (HOW to solve)
//!     let config = SolverConfiguration::auto();
//!
//!     // 3. Integrate
//!     let result = integrate(&scenario, &config)?;
//!
//!     // 4. Access results
//!     assert!(result.is_success());
//!     assert_eq!(result.len(), 25);
//!     assert_eq!(result.auxiliary.len(), 25);
//!     Ok(())
//! }
//! ```
//!
//! # Workflow Diagram
//!
//! ```text
//! ┌─────────────────┐   ┌───────────┐
//! │  Physical Model │   │ Time Grid │
//! └────────┬────────┘   └─────┬─────┘
//!          └────────┬─────────┘
//!          ┌────────▼────────┐
//!          │ Scenario        │ ← WHAT to solve
//!          └────────┬────────┘
//!          ┌────────▼─────────────┐
//!          │ Solver Configuration │ ← HOW to solve
//!          └────────┬─────────────┘
//!          ┌────────▼────────┐
//!          │ integrate       │ ← solver + auxiliary pass
//!          └────────┬────────┘
//!          ┌────────▼────────────┐
//!          │ Simulation Result   │ ← trajectory + auxiliary + diagnostics
//!          └─────────────────────┘
//! ```
//!
//! # Choosing a Method
//!
//! - **Dormand-Prince**: non-stiff problems; cheap steps, no Jacobian
//! - **BDF**: stiff problems; expensive steps, but step sizes follow accuracy
//!   instead of stability
//! - **Auto**: culture runs are non-stiff most of the time and stiff around
//!   substrate depletion, so the default switches between the two
//!
//! # Error Handling
//!
//! `solve` and `integrate` return `Err` only for inputs they cannot start
//! from. A run that stops early returns `Ok` with `info.success == false`:
//!
//! ```rust,ignore
//! let result = integrate(&scenario, &config)?;
//! if !result.is_success() {
//!     eprintln!("stopped after {} of {} points: {}", result.len(), scenario.grid.len(), result.info.message);
//! }
//! ```

// =================================================================================================
// Module Declarations
// =================================================================================================

mod driver;
mod grid;
mod methods;
mod scenario;
mod traits;

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use traits::{
    IntegrationInfo,
    IntegrationMethod,
    IntegrationStatus,
    SimulationResult,
    Solver,
    SolverConfiguration,
    DEFAULT_MAX_STEPS,
    DEFAULT_TOLERANCE,
    SUCCESS_MESSAGE,
};

pub use driver::{integrate, integrate_culture, solver_for};
pub use grid::TimeGrid;
pub use methods::{AutoSolver, BdfSolver, DormandPrinceSolver};
pub use scenario::Scenario;

// =================================================================================================
// Helper Functions
// =================================================================================================

use nalgebra::DVector;

use crate::error::{Result, SimulationError};

/// Validate a state vector for numerical issues
///
/// Checks that the state does not contain NaN or Inf values, which would
/// indicate numerical instability or a singular right-hand side.
///
/// # Arguments
///
/// * `state` - State vector after an accepted step
/// * `step` - Number of accepted steps so far (for error reporting)
///
/// # Example
///
/// ```rust,ignore
/// validate_state(&y, 42)?;  // Validates the state after step 42
/// ```
pub(crate) fn validate_state(state: &DVector<f64>, step: usize) -> Result<()> {
    if let Some(index) = state.iter().position(|x| x.is_nan()) {
        return Err(SimulationError::Integration {
            message: format!(
                "NaN detected in component {} at step {}. The right-hand side is undefined there; \
                 try a smaller maximum step size.",
                index, step
            ),
        });
    }

    if let Some(index) = state.iter().position(|x| x.is_infinite()) {
        return Err(SimulationError::Integration {
            message: format!(
                "Infinity detected in component {} at step {}. This indicates numerical overflow; \
                 check the model for division by zero.",
                index, step
            ),
        });
    }

    Ok(())
}

// =================================================================================================
// Tests
// =================================================================================================
