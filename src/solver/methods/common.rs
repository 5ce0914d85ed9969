//! Machinery shared by the adaptive methods
//!
//! - [`Rhs`]: counted access to the model's right-hand side
//! - [`Stepper`]: one adaptive method advancing one accepted step at a time
//! - [`run`]: drives a stepper across the output grid and collects the result
//! - norms, initial step selection, finite-difference Jacobian

use nalgebra::{DMatrix, DVector};

use crate::physics::traits::PhysicalModel;
use crate::solver::scenario::Scenario;
use crate::solver::traits::{IntegrationInfo, IntegrationStatus, SimulationResult, SolverConfiguration};
use crate::solver::validate_state;

/// Largest step growth factor
pub(crate) const MAX_FACTOR: f64 = 10.0;

/// Smallest step reduction factor
pub(crate) const MIN_FACTOR: f64 = 0.2;

/// Safety factor on the optimal step
pub(crate) const SAFETY: f64 = 0.9;

// =================================================================================================
// Counted right-hand side
// =================================================================================================

/// Model right-hand side with evaluation statistics
pub(crate) struct Rhs<'a> {
    model: &'a dyn PhysicalModel,
    pub(crate) info: IntegrationInfo,
}

impl<'a> Rhs<'a> {
    pub(crate) fn new(model: &'a dyn PhysicalModel) -> Self {
        Self { model, info: IntegrationInfo::default() }
    }

    pub(crate) fn eval(&mut self, t: f64, y: &DVector<f64>) -> DVector<f64> {
        self.info.n_rhs_evals += 1;
        self.model.compute_physics(t, y)
    }

    pub(crate) fn dimension(&self) -> usize {
        self.model.dimension()
    }

    /// Forward-difference Jacobian at `(t, y)` with `f = f(t, y)`
    ///
    /// Increment per column: `max(√u·|y_j|, r0·s_j)` with
    /// `r0 = 1000·|h|·u·n·‖f‖` and `s_j` the error scale of component `j`.
    pub(crate) fn jacobian(
        &mut self,
        t: f64,
        y: &DVector<f64>,
        f: &DVector<f64>,
        h: f64,
        scale: &DVector<f64>,
    ) -> DMatrix<f64> {
        self.info.n_jac_evals += 1;
        let n = y.len();
        let sqrt_eps = f64::EPSILON.sqrt();

        let mut r0 = 1000.0 * h.abs() * f64::EPSILON * n as f64 * rms_norm(f, scale);
        if r0 == 0.0 || !r0.is_finite() {
            r0 = 1.0;
        }

        let mut jacobian = DMatrix::zeros(n, n);
        let mut y_perturbed = y.clone();
        for j in 0..n {
            let delta = (sqrt_eps * y[j].abs()).max(r0 * scale[j]);
            y_perturbed[j] = y[j] + delta;
            // Exact representable increment
            let delta = y_perturbed[j] - y[j];
            let f_perturbed = self.eval(t, &y_perturbed);
            for i in 0..n {
                jacobian[(i, j)] = (f_perturbed[i] - f[i]) / delta;
            }
            y_perturbed[j] = y[j];
        }
        jacobian
    }
}

// =================================================================================================
// Norms and scales
// =================================================================================================

/// Root-mean-square norm of `v / scale`
pub(crate) fn rms_norm(v: &DVector<f64>, scale: &DVector<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().zip(scale.iter()).map(|(x, s)| (x / s).powi(2)).sum();
    (sum / v.len() as f64).sqrt()
}

/// Error scale `atol + rtol·|y|`
pub(crate) fn error_scale(y: &DVector<f64>, rtol: f64, atol: f64) -> DVector<f64> {
    y.map(|v| atol + rtol * v.abs())
}

/// Smallest step allowed at time `t`
pub(crate) fn min_step(t: f64) -> f64 {
    10.0 * (next_up(t) - t)
}

fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Empirical first step for a method of the given order
///
/// Hairer, Nørsett & Wanner, *Solving ODEs I*, section II.4.
pub(crate) fn select_initial_step(
    rhs: &mut Rhs,
    t0: f64,
    y0: &DVector<f64>,
    f0: &DVector<f64>,
    t_bound: f64,
    order: usize,
    config: &SolverConfiguration,
) -> f64 {
    let interval = (t_bound - t0).abs();
    if interval == 0.0 {
        return 0.0;
    }
    if let Some(first_step) = config.first_step {
        return first_step.min(interval);
    }

    let scale = error_scale(y0, config.rtol, config.atol);
    let d0 = rms_norm(y0, &scale);
    let d1 = rms_norm(f0, &scale);
    let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
    let h0 = h0.min(interval);

    let y1 = y0 + f0 * h0;
    let f1 = rhs.eval(t0 + h0, &y1);
    let d2 = rms_norm(&(&f1 - f0), &scale) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / (order as f64 + 1.0))
    };

    (100.0 * h0).min(h1).min(interval).min(config.max_step)
}

/// Spectral radius estimate of `jacobian` by power iteration
///
/// Iterates on `S⁻¹·J·S` with `S = diag(scale)`, which has the same
/// eigenvalues as `J` but comparable row magnitudes.
pub(crate) fn spectral_radius(jacobian: &DMatrix<f64>, scale: &DVector<f64>) -> f64 {
    const ITERATIONS: usize = 20;

    let n = jacobian.nrows();
    if n == 0 {
        return 0.0;
    }
    let scaled = DMatrix::from_fn(n, n, |i, j| jacobian[(i, j)] * scale[j] / scale[i]);

    let mut v = DVector::from_fn(n, |i, _| 1.0 + 0.1 * i as f64);
    v /= v.norm();
    let mut radius = 0.0;
    for _ in 0..ITERATIONS {
        let w = &scaled * &v;
        let norm = w.norm();
        if norm == 0.0 || !norm.is_finite() {
            return if norm.is_finite() { radius } else { f64::INFINITY };
        }
        radius = norm;
        v = w / norm;
    }
    radius
}

// =================================================================================================
// Stepper
// =================================================================================================

/// Reason a stepper could not complete a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepFailure {
    StepTooSmall,
    ConvergenceFailure,
    NonFinite,
    /// Newton failed on a non-stiff step; the caller may change method
    Yield,
}

impl From<StepFailure> for IntegrationStatus {
    fn from(failure: StepFailure) -> Self {
        match failure {
            StepFailure::StepTooSmall => IntegrationStatus::StepTooSmall,
            StepFailure::ConvergenceFailure | StepFailure::Yield => IntegrationStatus::ConvergenceFailure,
            StepFailure::NonFinite => IntegrationStatus::NonFinite,
        }
    }
}

/// One adaptive method, advancing one accepted step per call
///
/// Steps never go past the end of the grid. After a successful
/// [`Stepper::step`], [`Stepper::interpolate`] covers the step just taken.
pub(crate) trait Stepper {
    fn t(&self) -> f64;

    fn y(&self) -> &DVector<f64>;

    /// Size of the last accepted step
    fn last_step(&self) -> f64;

    fn order(&self) -> usize;

    fn method_name(&self) -> &'static str;

    fn step(&mut self, rhs: &mut Rhs) -> Result<(), StepFailure>;

    /// State at `t` within the last accepted step
    fn interpolate(&self, t: f64) -> DVector<f64>;

    /// Times at which the active method changed
    fn switches(&self) -> &[f64] {
        &[]
    }
}

/// Drive `stepper` across the scenario grid
pub(crate) fn run<S: Stepper>(
    stepper: &mut S,
    rhs: &mut Rhs,
    scenario: &Scenario,
    config: &SolverConfiguration,
) -> SimulationResult {
    let grid = scenario.grid.points();
    let mut time_points = Vec::with_capacity(grid.len());
    let mut trajectory = Vec::with_capacity(grid.len());

    time_points.push(grid[0]);
    trajectory.push(scenario.initial_state.clone());

    let mut status = IntegrationStatus::Success;
    let mut next = 1;

    while next < grid.len() {
        if rhs.info.n_steps >= config.max_steps {
            status = IntegrationStatus::ExcessWork;
            break;
        }

        if let Err(failure) = stepper.step(rhs) {
            status = failure.into();
            break;
        }
        rhs.info.n_steps += 1;

        if let Err(e) = validate_state(stepper.y(), rhs.info.n_steps) {
            log::warn!("{}", e);
            status = IntegrationStatus::NonFinite;
            break;
        }

        let t = stepper.t();
        while next < grid.len() && grid[next] <= t {
            let state = if grid[next] == t {
                stepper.y().clone()
            } else {
                stepper.interpolate(grid[next])
            };
            time_points.push(grid[next]);
            trajectory.push(state);
            next += 1;
        }
    }

    let mut info = std::mem::take(&mut rhs.info);
    info.set_status(status);
    info.method_used = stepper.method_name().to_string();
    info.last_step = stepper.last_step();
    info.last_order = stepper.order();
    info.method_switches = stepper.switches().to_vec();

    if !info.success {
        log::warn!(
            "{} stopped at t = {}: {} ({} of {} output points)",
            info.method_used,
            stepper.t(),
            info.message,
            time_points.len(),
            grid.len()
        );
    }

    SimulationResult::new(time_points, trajectory, info)
}
