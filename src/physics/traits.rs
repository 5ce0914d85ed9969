//! Physical model trait
//!
//! A physical model provides the right-hand side of `dy/dt = f(t, y)` for a
//! fixed-size state vector. It does NOT integrate it: that is the solver's
//! job. The culture model and the analytical test models all implement the
//! same trait, so any solver runs any model.

use nalgebra::DVector;

// =================================================================================================
// Physical Model Trait
// =================================================================================================

/// Trait for time-dependent physical models
///
/// # Responsibility
/// Evaluates the physics of a system at a given time and state.
/// Does NOT solve it.
///
/// # Purity
/// `compute_physics` must be a pure function of its arguments: it is called
/// from inside solver stages, Jacobian columns and output passes, possibly
/// from several threads on independent runs.
pub trait PhysicalModel: Send + Sync {

    /// Length of the state vector
    ///
    /// Used by the solver to allocate vectors and Jacobians
    fn dimension(&self) -> usize;

    /// Computes the time derivative at `(t, state)`
    ///
    /// # Arguments
    /// * `t` - Elapsed time
    /// * `state` - Current state vector, `dimension()` entries
    ///
    /// # Returns
    /// Right-hand side f(t, y) of dy/dt = f(t, y)
    fn compute_physics(&self, t: f64, state: &DVector<f64>) -> DVector<f64>;

    /// Creates the initial state for this model
    fn setup_initial_state(&self) -> DVector<f64>;

    /// Name of the model (used to display and logging)
    fn name(&self) -> &str;

    /// Description of the model (option)
    fn description(&self) -> Option<&str> {
        None
    }

    /// Number of auxiliary output channels
    ///
    /// Auxiliary channels are derived quantities reported alongside the
    /// state (rates, driver values) that are not integrated themselves.
    fn auxiliary_dimension(&self) -> usize {
        0
    }

    /// Evaluates the auxiliary channels at `(t, state)`
    fn compute_auxiliary(&self, _t: f64, _state: &DVector<f64>) -> DVector<f64> {
        DVector::zeros(self.auxiliary_dimension())
    }
}
