//! Adaptive integration methods
//!
//! This module contains concrete implementations of the [`Solver`](crate::solver::Solver) trait.
//!
//! # Architecture
//!
//! Every method is split in two:
//! - a *stepper* (crate-private) that advances one accepted step at a time
//!   and can interpolate inside the step it just took
//! - a public *solver* that builds the stepper and hands it to the shared
//!   driving loop in `common`, which walks the output grid
//!
//! The loop never forces a step to land on an output time: output points are
//! served by each method's dense output.
//!
//! # Available Methods
//!
//! - **[`DormandPrinceSolver`]**: explicit Runge-Kutta 5(4)
//!   - Cost: 6 right-hand side evaluations per step, no linear algebra
//!   - Use: non-stiff problems, cheap right-hand sides
//!
//! - **[`BdfSolver`]**: variable-order (1 to 5) backward differentiation
//!   - Cost: one Newton solve per step, Jacobian and LU on demand
//!   - Use: stiff problems
//!
//! - **[`AutoSolver`]**: starts with Dormand-Prince, hands over to BDF when
//!   stiffness is detected and back when it fades
//!   - Use: **default for culture runs**
//!
//! # Example
//!
//! ```rust
//! use cho_rs::physics::PhysicalModel;
//! use cho_rs::solver::{AutoSolver, Scenario, Solver, SolverConfiguration, TimeGrid};
//! use nalgebra::DVector;
//!
//! struct Decay;
//!
//! impl PhysicalModel for Decay {
//!     fn dimension(&self) -> usize { 1 }
//!     fn compute_physics(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> { -y }
//!     fn setup_initial_state(&self) -> DVector<f64> { DVector::from_element(1, 1.0) }
//!     fn name(&self) -> &str { "Decay" }
//! }
//!
//! fn main() -> cho_rs::Result<()> {
//!     let scenario = Scenario::new(Box::new(Decay), TimeGrid::linspace(0.0, 5.0, 51)?);
//!     let result = AutoSolver::new().solve(&scenario, &SolverConfiguration::auto())?;
//!
//!     assert!(result.is_success());
//!     assert!((result.final_state().unwrap()[0] - (-5.0f64).exp()).abs() < 1e-6);
//!     Ok(())
//! }
//! ```

mod auto;
mod bdf;
mod common;
mod dopri;

pub use auto::AutoSolver;
pub use bdf::BdfSolver;
pub use dopri::DormandPrinceSolver;
