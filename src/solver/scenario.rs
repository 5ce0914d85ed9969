//! Simulation scenario definition
//!
//! A scenario combines a physical model with its initial state and the
//! output time grid.
use nalgebra::DVector;

use crate::error::{Result, SimulationError};
use crate::physics::traits::PhysicalModel;
use crate::solver::grid::TimeGrid;

/// Simulation scenario
///
/// Defines a specific case to simulate:
/// - Physical model (equations)
/// - Initial state at the first grid point
/// - Output time grid
///
/// # Design
///
/// The same scenario can be solved with different numerical methods.
/// This is the "WHAT to solve" (not "HOW to solve").
///
/// # Examples
///
/// ```rust,ignore
/// let scenario = Scenario::new(model, TimeGrid::linspace(0.0, 96.0, 4000)?);
///
/// let stiff = BdfSolver::new().solve(&scenario, &SolverConfiguration::bdf())?;
/// let explicit = DormandPrinceSolver::new().solve(&scenario, &SolverConfiguration::dormand_prince())?;
/// ```
pub struct Scenario {
    /// Physical model (equations)
    pub model: Box<dyn PhysicalModel>,

    /// State at `grid.start()`
    pub initial_state: DVector<f64>,

    /// Output times
    pub grid: TimeGrid,
}

impl Scenario {
    /// Create a scenario starting from the model's own initial state
    pub fn new(model: Box<dyn PhysicalModel>, grid: TimeGrid) -> Self {
        let initial_state = model.setup_initial_state();
        Self { model, initial_state, grid }
    }

    /// Builder pattern: replace the initial state
    pub fn with_initial_state(mut self, initial_state: DVector<f64>) -> Self {
        self.initial_state = initial_state;
        self
    }

    /// Check that the initial state fits the model
    pub fn validate(&self) -> Result<()> {
        if self.initial_state.len() != self.model.dimension() {
            return Err(SimulationError::InvalidInput(format!(
                "initial state has {} entries, model '{}' expects {}",
                self.initial_state.len(),
                self.model.name(),
                self.model.dimension()
            )));
        }
        if self.initial_state.iter().any(|v| !v.is_finite()) {
            return Err(SimulationError::InvalidInput(
                "initial state contains a non-finite value".to_string(),
            ));
        }
        Ok(())
    }

    /// Get model name
    pub fn get_model_name(&self) -> &str {
        self.model.name()
    }

    /// Dimension of the state vector
    pub fn ndim(&self) -> usize {
        self.model.dimension()
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.get_model_name())
            .field("dimension", &self.ndim())
            .field("start", &self.grid.start())
            .field("end", &self.grid.end())
            .field("output points", &self.grid.len())
            .finish()
    }
}

// ================================================================================================
// Tests
// ================================================================================================
