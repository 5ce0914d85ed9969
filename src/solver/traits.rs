//! Numerical solver traits and types
//!
//! # Design Philosophy
//!
//! - `IntegrationMethod` names HOW the ODE system is integrated
//! - `SolverConfiguration` carries the method and its tolerances
//! - `SimulationResult` carries the dense trajectory and the diagnostics
//! - `Solver` is the single entry point every method implements
//!
//! A numerical failure (step size collapse, Newton divergence, excess work)
//! is NOT an `Err`: the solver returns the trajectory reached so far with an
//! unsuccessful [`IntegrationInfo`]. `Err` is reserved for inputs the solver
//! cannot start from.

use std::collections::HashMap;

use nalgebra::DVector;

use crate::error::{Result, SimulationError};
use crate::solver::scenario::Scenario;

// =================================================================================================
// Integration Method
// =================================================================================================

/// Time integration method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntegrationMethod {
    /// Variable-order (1 to 5) backward differentiation formulas, for stiff systems
    Bdf,

    /// Explicit Runge-Kutta 5(4) pair of Dormand and Prince, for non-stiff systems
    DormandPrince,

    /// Starts explicit and switches to BDF and back as stiffness comes and goes
    #[default]
    Auto,
}

impl IntegrationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            IntegrationMethod::Bdf => "BDF",
            IntegrationMethod::DormandPrince => "Dormand-Prince",
            IntegrationMethod::Auto => "Auto (Dormand-Prince/BDF)",
        }
    }
}

impl std::fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =================================================================================================
// Solver configuration
// =================================================================================================

/// Default relative and absolute tolerance
pub const DEFAULT_TOLERANCE: f64 = 1.49012e-8;

/// Default limit on the number of accepted steps for one integration
pub const DEFAULT_MAX_STEPS: usize = 500_000;

/// Configuration for the numerical solver
///
/// # Example
///
/// ```rust
/// use cho_rs::solver::{IntegrationMethod, SolverConfiguration};
///
/// let config = SolverConfiguration::bdf()
///     .with_tolerances(1e-6, 1e-9)
///     .with_max_step(0.5);
///
/// assert_eq!(config.method, IntegrationMethod::Bdf);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfiguration {
    /// Integration method, read by the driver to pick the solver
    pub method: IntegrationMethod,

    /// Relative tolerance
    pub rtol: f64,

    /// Absolute tolerance
    pub atol: f64,

    /// Largest allowed internal step (`f64::INFINITY` for no limit)
    pub max_step: f64,

    /// First internal step, selected automatically when `None`
    pub first_step: Option<f64>,

    /// Largest number of accepted internal steps
    pub max_steps: usize,
}

impl Default for SolverConfiguration {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::default(),
            rtol: DEFAULT_TOLERANCE,
            atol: DEFAULT_TOLERANCE,
            max_step: f64::INFINITY,
            first_step: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl SolverConfiguration {
    /// Create a configuration for the given method with default tolerances
    pub fn new(method: IntegrationMethod) -> Self {
        Self { method, ..Default::default() }
    }

    pub fn bdf() -> Self {
        Self::new(IntegrationMethod::Bdf)
    }

    pub fn dormand_prince() -> Self {
        Self::new(IntegrationMethod::DormandPrince)
    }

    pub fn auto() -> Self {
        Self::new(IntegrationMethod::Auto)
    }

    /// Builder pattern: set relative and absolute tolerances
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    /// Builder pattern: set the maximum internal step
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Builder pattern: set the first internal step
    pub fn with_first_step(mut self, first_step: f64) -> Self {
        self.first_step = Some(first_step);
        self
    }

    /// Builder pattern: set the step limit
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.rtol > 0.0) || !self.rtol.is_finite() {
            return Err(SimulationError::Configuration(format!(
                "relative tolerance must be positive and finite, got {}",
                self.rtol
            )));
        }
        if !(self.atol > 0.0) || !self.atol.is_finite() {
            return Err(SimulationError::Configuration(format!(
                "absolute tolerance must be positive and finite, got {}",
                self.atol
            )));
        }
        if !(self.max_step > 0.0) {
            return Err(SimulationError::Configuration(format!(
                "maximum step must be positive, got {}",
                self.max_step
            )));
        }
        if let Some(first_step) = self.first_step
            && (!(first_step > 0.0) || first_step > self.max_step)
        {
            return Err(SimulationError::Configuration(format!(
                "first step must be in (0, max_step], got {}",
                first_step
            )));
        }
        if self.max_steps == 0 {
            return Err(SimulationError::Configuration(
                "maximum number of steps must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =================================================================================================
// Diagnostics
// =================================================================================================

/// Final status of one integration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStatus {
    Success,
    ExcessWork,
    StepTooSmall,
    ConvergenceFailure,
    NonFinite,
}

impl IntegrationStatus {
    /// Human-readable status message
    pub fn message(&self) -> &'static str {
        match self {
            IntegrationStatus::Success => "Integration successful.",
            IntegrationStatus::ExcessWork => "Excess work done on this call.",
            IntegrationStatus::StepTooSmall => "Step size became too small.",
            IntegrationStatus::ConvergenceFailure => "Repeated convergence failures.",
            IntegrationStatus::NonFinite => "Non-finite state encountered.",
        }
    }
}

/// Canonical message of a successful integration
pub const SUCCESS_MESSAGE: &str = "Integration successful.";

/// Integration diagnostics
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntegrationInfo {
    /// Status message; anything but [`SUCCESS_MESSAGE`] is a failed run
    pub message: String,
    pub success: bool,
    /// Method that produced the result (the last active one for `Auto`)
    pub method_used: String,
    /// Accepted internal steps
    pub n_steps: usize,
    /// Rejected step attempts (error test or Newton failures)
    pub n_rejected: usize,
    /// Right-hand side evaluations, Jacobian columns included
    pub n_rhs_evals: usize,
    pub n_jac_evals: usize,
    /// LU decompositions
    pub n_lu: usize,
    /// Size of the last accepted step
    pub last_step: f64,
    /// Order of the last accepted step
    pub last_order: usize,
    /// Times at which the method changed
    pub method_switches: Vec<f64>,
}

impl IntegrationInfo {
    pub(crate) fn set_status(&mut self, status: IntegrationStatus) {
        self.message = status.message().to_string();
        self.success = status == IntegrationStatus::Success;
    }
}

// =================================================================================================
// Simulation Result
// =================================================================================================

/// Dense trajectory and diagnostics of one integration
///
/// `trajectory[i]` is the state at `time_points[i]`. `auxiliary` is empty
/// until the driver fills it with one vector of auxiliary channels per
/// output point.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub time_points: Vec<f64>,
    pub trajectory: Vec<DVector<f64>>,
    pub auxiliary: Vec<DVector<f64>>,
    pub info: IntegrationInfo,
    pub metadata: HashMap<String, String>,
}

impl SimulationResult {
    pub fn new(time_points: Vec<f64>, trajectory: Vec<DVector<f64>>, info: IntegrationInfo) -> Self {
        Self {
            time_points,
            trajectory,
            auxiliary: Vec::new(),
            info,
            metadata: HashMap::new(),
        }
    }

    /// Number of output points reached
    pub fn len(&self) -> usize {
        self.time_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_points.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.info.success
    }

    /// Last state reached
    pub fn final_state(&self) -> Option<&DVector<f64>> {
        self.trajectory.last()
    }

    /// Time series of one state component
    pub fn state_series(&self, index: usize) -> Vec<f64> {
        self.trajectory.iter().map(|state| state[index]).collect()
    }

    /// Time series of one auxiliary channel
    pub fn auxiliary_series(&self, index: usize) -> Vec<f64> {
        self.auxiliary.iter().map(|aux| aux[index]).collect()
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }
}

// =================================================================================================
// Solver Trait
// =================================================================================================

/// Numerical solver
///
/// # Contract
///
/// - Returns `Err` only if the configuration or scenario is invalid
/// - On numerical failure returns `Ok` with `info.success == false` and the
///   trajectory truncated to the output points reached
/// - Never mutates the scenario
pub trait Solver: Send + Sync {
    fn solve(&self, scenario: &Scenario, config: &SolverConfiguration) -> Result<SimulationResult>;

    fn name(&self) -> &str;
}
