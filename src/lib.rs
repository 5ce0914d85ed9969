//! cho-rs: Fed-batch CHO Cell Culture Simulation
//!
//! Simulates fed-batch mammalian (CHO) cell cultures: cell growth and death,
//! substrate consumption, metabolite and antibody production, driven by
//! feed-rate and temperature profiles. Results are dense trajectories for
//! analysis or sparse noisy observations for design-of-experiments work.
//!
//! # Architecture
//!
//! cho-rs is built on two core principles:
//!
//! 1. **Separation of Physics and Numerics**
//!    - The culture model defines the equations (what to solve)
//!    - Numerical solvers provide methods (how to solve)
//!
//! 2. **Units checked at the boundary**
//!    - Parameters accept bare magnitudes or unit-tagged strings
//!    - Everything past assignment is a canonical-unit `f64`
//!
//! # Quick Start
//!
//! ```rust
//! use cho_rs::prelude::*;
//!
//! fn main() -> cho_rs::Result<()> {
//!     // 1. Parameters, with a unit-tagged override
//!     let mut params = InputParameters::default();
//!     params.set_field_by_name("Cglc_feed", "0.2 M")?;
//!
//!     // 2. Culture model with its drivers
//!     let model = CultureModel::new(
//!         params,
//!         InitialConditions::default(),
//!         Profile::constant(0.0005),
//!         Profile::constant(36.4),
//!     )?;
//!
//!     // 3. One day, hourly output
//!     let scenario = Scenario::new(Box::new(model), TimeGrid::linspace(0.0, 24.0, 25)?);
//!     let result = integrate(&scenario, &SolverConfiguration::auto())?;
//!
//!     // 4. Access results
//!     assert!(result.is_success());
//!     let volume = result.state_series(StateVariable::V.index());
//!     assert!((volume[24] - 0.062).abs() < 1e-9);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`parameters`]: unit-validated kinetic parameters and initial conditions
//! - [`physics`]: state layout and the `PhysicalModel` trait
//! - [`models`]: rate laws, the culture ODE and external driver profiles
//! - [`solver`]: numerical methods (Dormand-Prince, BDF, Auto) and the integration driver
//! - [`stochastic`]: parameter perturbation and noisy sampling
//! - [`simulation`]: end-to-end seeded runs
//! - [`output`]: CSV export

pub mod error;

// Core modules
pub mod parameters;
pub mod physics;

pub mod models;
pub mod solver;
pub mod stochastic;

pub mod simulation;

pub mod output;

pub use error::{Result, SimulationError};

pub mod prelude {
    //! Convenient imports for common usage
    //!
    //! ```rust
    //! use cho_rs::prelude::*;
    //! ```
    pub use crate::error::{Result, SimulationError};
    pub use crate::models::{CultureModel, Profile};
    pub use crate::parameters::{InitialConditions, InputParameters, SimulationConfig, UnitValidated};
    pub use crate::physics::{PhysicalModel, ProcessVariable, StateVariable};
    pub use crate::simulation::{CultureSimulation, SimulationOptions};
    pub use crate::solver::{
        integrate,
        IntegrationMethod,
        Scenario,
        SimulationResult,
        Solver,
        SolverConfiguration,
        TimeGrid,
    };
    pub use crate::stochastic::Observations;
}
