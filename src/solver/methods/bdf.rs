//! Variable-order BDF solver for stiff systems
//!
//! # Mathematical Background
//!
//! Backward differentiation formulas of order 1 to 5 in the quasi-constant
//! step form of Shampine & Reichelt (NDF variant, `kappa` coefficients).
//! The history is stored as backward differences `D`; a step size change by
//! `factor` rescales `D` through the matrices `R(factor)·U`.
//!
//! Each step solves the implicit system
//!
//! ```text
//! (I − c·J)·Δ = c·f(tₙ₊₁, y) − ψ − d        c = h / α_k
//! ```
//!
//! by a simplified Newton iteration with a finite-difference Jacobian `J`
//! that is only refreshed when the iteration fails to converge.
//!
//! # Newton Convergence
//!
//! With `ρ = ‖Δₘ‖/‖Δₘ₋₁‖` the observed contraction rate and
//! `tol = max(10·u/rtol, min(0.03, √rtol))`:
//!
//! ```text
//! converged  ⇔  ρ/(1 − ρ)·‖Δₘ‖ < tol
//! diverged   ⇔  ρ ≥ 1  or  ρ^(4 − m)/(1 − ρ)·‖Δₘ‖ > tol
//! ```
//!
//! At most four iterations per attempt, so at least two right-hand side
//! evaluations per step. A failed attempt with a fresh Jacobian halves the
//! step; ten failures in one step abort the integration. A converged state
//! whose magnitude jumps by more than three decades counts as a failure.
//!
//! # Order and Step Selection
//!
//! After `k + 1` steps of equal size, the error estimates at orders
//! `k − 1`, `k`, `k + 1` are compared and the order with the largest
//! admissible step is taken.
//!
//! # When to Use
//!
//! - Stiff problems (fast transients next to slow dynamics)
//! - Problems where an explicit method is limited by stability, not accuracy

use nalgebra::{linalg::LU, DMatrix, DVector, Dyn};

use crate::error::Result;
use crate::solver::methods::common::{
    error_scale, min_step, rms_norm, run, select_initial_step, spectral_radius, Rhs, StepFailure,
    Stepper, MAX_FACTOR, MIN_FACTOR,
};
use crate::solver::scenario::Scenario;
use crate::solver::traits::{SimulationResult, Solver, SolverConfiguration};

/// Highest BDF order
pub(crate) const MAX_ORDER: usize = 5;

const NEWTON_MAXITER: usize = 4;

/// Newton failures tolerated within one step
const MAX_CONVERGENCE_FAILURES: usize = 10;

const KAPPA: [f64; MAX_ORDER + 1] = [0.0, -0.1850, -1.0 / 9.0, -0.0823, -0.0415, 0.0];

/// Largest change of magnitude a single accepted step may produce
const MAX_GROWTH: f64 = 1e3;

/// `h·ρ` below which a step is considered non-stiff
pub(crate) const NONSTIFF_THRESHOLD: f64 = 2.0;

/// Newton tolerance on the scaled correction norm
fn newton_tolerance(rtol: f64) -> f64 {
    (10.0 * f64::EPSILON / rtol).max(0.03f64.min(rtol.sqrt()))
}

/// `true` when every component of `y_new` is finite and within reach of `y`
fn bounded_step(y: &DVector<f64>, y_new: &DVector<f64>) -> bool {
    y.iter()
        .zip(y_new.iter())
        .all(|(old, new)| new.is_finite() && new.abs() <= MAX_GROWTH * (1.0 + old.abs()))
}

// =================================================================================================
// Difference array rescaling
// =================================================================================================

fn compute_r(order: usize, factor: f64) -> DMatrix<f64> {
    let mut m = DMatrix::zeros(order + 1, order + 1);
    for j in 0..=order {
        m[(0, j)] = 1.0;
    }
    for i in 1..=order {
        for j in 1..=order {
            m[(i, j)] = (i as f64 - 1.0 - factor * j as f64) / i as f64;
        }
    }
    // Cumulative product down each column
    for i in 1..=order {
        for j in 0..=order {
            m[(i, j)] *= m[(i - 1, j)];
        }
    }
    m
}

/// Rescale the first `order + 1` differences to a step `factor` times larger
fn change_d(d: &mut [DVector<f64>], order: usize, factor: f64) {
    let r = compute_r(order, factor);
    let u = compute_r(order, 1.0);
    let ru = r * u;

    let old: Vec<DVector<f64>> = d[..=order].to_vec();
    for (i, row) in d.iter_mut().take(order + 1).enumerate() {
        row.fill(0.0);
        for (k, previous) in old.iter().enumerate() {
            row.axpy(ru[(k, i)], previous, 1.0);
        }
    }
}

// =================================================================================================
// Stepper
// =================================================================================================

pub(crate) struct BdfStepper {
    t: f64,
    y: DVector<f64>,
    h_abs: f64,
    last_step: f64,
    t_bound: f64,
    rtol: f64,
    atol: f64,
    max_step: f64,
    newton_tol: f64,

    order: usize,
    n_equal_steps: usize,
    d: Vec<DVector<f64>>,

    gamma: [f64; MAX_ORDER + 1],
    alpha: [f64; MAX_ORDER + 1],
    error_const: [f64; MAX_ORDER + 1],

    jacobian: DMatrix<f64>,
    lu: Option<LU<f64, Dyn, Dyn>>,

    /// Spectral radius estimate of the current Jacobian
    spectral_radius: f64,

    /// Give up a step on Newton failure when it looks non-stiff
    yield_when_nonstiff: bool,
}

impl BdfStepper {
    /// Start at `(t0, y0)`; the first step is selected automatically unless
    /// `h_abs` is given
    pub(crate) fn new(
        rhs: &mut Rhs,
        t0: f64,
        y0: DVector<f64>,
        t_bound: f64,
        h_abs: Option<f64>,
        config: &SolverConfiguration,
    ) -> Self {
        let n = y0.len();
        let f0 = rhs.eval(t0, &y0);
        let h_abs = match h_abs {
            Some(h) => h.min(config.max_step).min(t_bound - t0),
            None => select_initial_step(rhs, t0, &y0, &f0, t_bound, 1, config),
        };

        let mut gamma = [0.0; MAX_ORDER + 1];
        for k in 1..=MAX_ORDER {
            gamma[k] = gamma[k - 1] + 1.0 / k as f64;
        }
        let alpha = std::array::from_fn(|k| (1.0 - KAPPA[k]) * gamma[k]);
        let error_const = std::array::from_fn(|k| KAPPA[k] * gamma[k] + 1.0 / (k as f64 + 1.0));

        let mut d = vec![DVector::zeros(n); MAX_ORDER + 3];
        d[0] = y0.clone();
        d[1] = &f0 * h_abs;

        let scale = error_scale(&y0, config.rtol, config.atol);
        let jacobian = rhs.jacobian(t0, &y0, &f0, h_abs, &scale);
        let radius = spectral_radius(&jacobian, &scale);

        Self {
            t: t0,
            y: y0,
            h_abs,
            last_step: 0.0,
            t_bound,
            rtol: config.rtol,
            atol: config.atol,
            max_step: config.max_step,
            newton_tol: newton_tolerance(config.rtol),
            order: 1,
            n_equal_steps: 0,
            d,
            gamma,
            alpha,
            error_const,
            jacobian,
            lu: None,
            spectral_radius: radius,
            yield_when_nonstiff: false,
        }
    }

    /// Builder pattern: return [`StepFailure::Yield`] instead of halving the
    /// step when Newton fails on a step that an explicit method could take
    pub(crate) fn yielding(mut self) -> Self {
        self.yield_when_nonstiff = true;
        self
    }

    /// `h·ρ` of the last accepted step
    pub(crate) fn stiffness(&self) -> f64 {
        self.last_step * self.spectral_radius
    }

    /// Proposed size of the next step
    pub(crate) fn h_abs(&self) -> f64 {
        self.h_abs
    }

    fn rescale(&mut self, factor: f64) {
        change_d(&mut self.d, self.order, factor);
        self.n_equal_steps = 0;
    }

    fn refresh_jacobian(&mut self, rhs: &mut Rhs, t: f64, y: &DVector<f64>, h: f64) {
        let f = rhs.eval(t, y);
        let scale = error_scale(y, self.rtol, self.atol);
        self.jacobian = rhs.jacobian(t, y, &f, h, &scale);
        self.spectral_radius = spectral_radius(&self.jacobian, &scale);
        self.lu = None;
    }

    /// Simplified Newton iteration; `Some((iterations, y, d))` on convergence
    fn solve_system(
        &self,
        rhs: &mut Rhs,
        t_new: f64,
        y_predict: &DVector<f64>,
        c: f64,
        psi: &DVector<f64>,
        scale: &DVector<f64>,
    ) -> Option<(usize, DVector<f64>, DVector<f64>)> {
        let lu = self.lu.as_ref()?;

        let mut y = y_predict.clone();
        let mut d = DVector::zeros(y.len());
        let mut dy_norm_old: Option<f64> = None;

        for k in 0..NEWTON_MAXITER {
            let f = rhs.eval(t_new, &y);
            if f.iter().any(|v| !v.is_finite()) {
                return None;
            }

            let dy = lu.solve(&(&f * c - psi - &d))?;
            let dy_norm = rms_norm(&dy, scale);
            if !dy_norm.is_finite() {
                return None;
            }

            let rate = dy_norm_old.map(|old| dy_norm / old);
            if let Some(rate) = rate
                && (rate >= 1.0 || rate.powi((NEWTON_MAXITER - k) as i32) / (1.0 - rate) * dy_norm > self.newton_tol)
            {
                return None;
            }

            y += &dy;
            d += &dy;

            if dy_norm == 0.0 || rate.is_some_and(|rate| rate / (1.0 - rate) * dy_norm < self.newton_tol) {
                return Some((k + 1, y, d));
            }
            dy_norm_old = Some(dy_norm);
        }
        None
    }
}

impl Stepper for BdfStepper {
    fn t(&self) -> f64 {
        self.t
    }

    fn y(&self) -> &DVector<f64> {
        &self.y
    }

    fn last_step(&self) -> f64 {
        self.last_step
    }

    fn order(&self) -> usize {
        self.order
    }

    fn method_name(&self) -> &'static str {
        "BDF"
    }

    fn step(&mut self, rhs: &mut Rhs) -> std::result::Result<(), StepFailure> {
        let t = self.t;
        let min_step = min_step(t);

        let mut h_abs = self.h_abs;
        if h_abs > self.max_step {
            self.rescale(self.max_step / h_abs);
            h_abs = self.max_step;
        } else if h_abs < min_step {
            self.rescale(min_step / h_abs);
            h_abs = min_step;
        }

        let mut current_jacobian = false;
        let mut convergence_failures = 0;

        let (t_new, y_new, d, error_norm, safety, scale) = loop {
            if h_abs < min_step {
                return Err(StepFailure::StepTooSmall);
            }

            let mut t_new = t + h_abs;
            if t_new > self.t_bound {
                t_new = self.t_bound;
                self.rescale((t_new - t) / h_abs);
                self.lu = None;
            }
            let h = t_new - t;
            h_abs = h;

            let order = self.order;
            let y_predict = self.d[..=order].iter().fold(DVector::zeros(self.y.len()), |acc, row| acc + row);
            let scale = error_scale(&y_predict, self.rtol, self.atol);
            let mut psi = DVector::zeros(self.y.len());
            for i in 1..=order {
                psi.axpy(self.gamma[i], &self.d[i], 1.0);
            }
            psi /= self.alpha[order];
            let c = h / self.alpha[order];

            let converged = loop {
                if self.lu.is_none() {
                    let n = self.y.len();
                    let matrix = DMatrix::identity(n, n) - &self.jacobian * c;
                    self.lu = Some(matrix.lu());
                    rhs.info.n_lu += 1;
                }

                match self.solve_system(rhs, t_new, &y_predict, c, &psi, &scale) {
                    Some(solution) if bounded_step(&self.y, &solution.1) => break Some(solution),
                    Some(_) if current_jacobian => break None,
                    Some(_) => {
                        self.refresh_jacobian(rhs, t_new, &y_predict, h);
                        current_jacobian = true;
                    }
                    None if current_jacobian => break None,
                    None => {
                        self.refresh_jacobian(rhs, t_new, &y_predict, h);
                        current_jacobian = true;
                    }
                }
            };

            let Some((n_iter, y_new, d)) = converged else {
                rhs.info.n_rejected += 1;
                convergence_failures += 1;
                if self.yield_when_nonstiff && h_abs * self.spectral_radius < NONSTIFF_THRESHOLD {
                    return Err(StepFailure::Yield);
                }
                if convergence_failures >= MAX_CONVERGENCE_FAILURES {
                    return Err(StepFailure::ConvergenceFailure);
                }
                h_abs *= 0.5;
                self.rescale(0.5);
                self.lu = None;
                continue;
            };

            let safety = 0.9 * (2 * NEWTON_MAXITER + 1) as f64 / (2 * NEWTON_MAXITER + n_iter) as f64;
            let scale = error_scale(&y_new, self.rtol, self.atol);
            let error_norm = rms_norm(&(&d * self.error_const[order]), &scale);

            if error_norm > 1.0 {
                let factor = (safety * error_norm.powf(-1.0 / (order as f64 + 1.0))).max(MIN_FACTOR);
                h_abs *= factor;
                self.rescale(factor);
                self.lu = None;
                rhs.info.n_rejected += 1;
                continue;
            }

            break (t_new, y_new, d, error_norm, safety, scale);
        };

        // ====== Accept ======

        self.n_equal_steps += 1;
        self.last_step = t_new - t;
        self.t = t_new;
        self.y = y_new;
        self.h_abs = h_abs;

        let order = self.order;
        self.d[order + 2] = &d - &self.d[order + 1];
        self.d[order + 1] = d;
        for i in (0..=order).rev() {
            let next = self.d[i + 1].clone();
            self.d[i] += next;
        }

        if self.n_equal_steps < order + 1 {
            return Ok(());
        }

        // ====== Order selection ======

        let error_m_norm = if order > 1 {
            rms_norm(&(&self.d[order] * self.error_const[order - 1]), &scale)
        } else {
            f64::INFINITY
        };
        let error_p_norm = if order < MAX_ORDER {
            rms_norm(&(&self.d[order + 2] * self.error_const[order + 1]), &scale)
        } else {
            f64::INFINITY
        };

        let factors = [
            error_m_norm.powf(-1.0 / order as f64),
            error_norm.powf(-1.0 / (order as f64 + 1.0)),
            error_p_norm.powf(-1.0 / (order as f64 + 2.0)),
        ];
        let (best, max_factor) = factors
            .iter()
            .copied()
            .enumerate()
            .fold((1, factors[1]), |acc, (i, f)| if f > acc.1 { (i, f) } else { acc });

        self.order = order + best - 1;
        let factor = (safety * max_factor).min(MAX_FACTOR);
        self.h_abs *= factor;
        self.rescale(factor);
        self.lu = None;

        Ok(())
    }

    fn interpolate(&self, t: f64) -> DVector<f64> {
        let h = self.h_abs;
        let mut y = self.d[0].clone();
        let mut product = 1.0;
        for i in 0..self.order {
            let shift = self.t - h * i as f64;
            product *= (t - shift) / (h * (i as f64 + 1.0));
            y.axpy(product, &self.d[i + 1], 1.0);
        }
        y
    }
}

// =================================================================================================
// BDF Solver
// =================================================================================================

/// Variable-order, variable-step BDF solver
#[derive(Debug, Clone, Copy, Default)]
pub struct BdfSolver;

impl BdfSolver {
    /// Create a new BDF solver
    ///
    /// # Example
    ///
    /// ```rust
    /// use cho_rs::solver::{BdfSolver, Solver};
    ///
    /// let solver = BdfSolver::new();
    /// assert_eq!(solver.name(), "BDF (orders 1-5)");
    /// ```
    pub fn new() -> Self {
        Self
    }
}

impl Solver for BdfSolver {
    fn solve(&self, scenario: &Scenario, config: &SolverConfiguration) -> Result<SimulationResult> {
        config.validate()?;
        scenario.validate()?;

        let mut rhs = Rhs::new(scenario.model.as_ref());
        let mut stepper = BdfStepper::new(
            &mut rhs,
            scenario.grid.start(),
            scenario.initial_state.clone(),
            scenario.grid.end(),
            None,
            config,
        );

        let mut result = run(&mut stepper, &mut rhs, scenario, config);
        result.add_metadata("solver", self.name());
        result.add_metadata("rtol", &config.rtol.to_string());
        result.add_metadata("atol", &config.atol.to_string());
        Ok(result)
    }

    fn name(&self) -> &str {
        "BDF (orders 1-5)"
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::PhysicalModel;
    use crate::solver::grid::TimeGrid;
    use approx::assert_relative_eq;

    /// Stiff linear pair: y₁' = −1000·y₁ + y₂, y₂' = −y₂
    struct StiffLinear;

    impl PhysicalModel for StiffLinear {
        fn dimension(&self) -> usize {
            2
        }

        fn compute_physics(&self, _t: f64, y: &DVector<f64>) -> DVector<f64> {
            DVector::from_vec(vec![-1000.0 * y[0] + y[1], -y[1]])
        }

        fn setup_initial_state(&self) -> DVector<f64> {
            DVector::from_vec(vec![1.0, 1.0])
        }

        fn name(&self) -> &str {
            "Stiff Linear"
        }
    }

    /// y' = −λ·(y − cos t) − sin t, solution cos t
    struct ProtheroRobinson(f64);

    impl PhysicalModel for ProtheroRobinson {
        fn dimension(&self) -> usize {
            1
        }

        fn compute_physics(&self, t: f64, y: &DVector<f64>) -> DVector<f64> {
            DVector::from_element(1, -self.0 * (y[0] - t.cos()) - t.sin())
        }

        fn setup_initial_state(&self) -> DVector<f64> {
            DVector::from_element(1, 1.0)
        }

        fn name(&self) -> &str {
            "Prothero-Robinson"
        }
    }

    fn exact(t: f64) -> (f64, f64) {
        let y2 = (-t).exp();
        let y1 = y2 / 999.0 + (1.0 - 1.0 / 999.0) * (-1000.0 * t).exp();
        (y1, y2)
    }

    #[test]
    fn test_compute_r_identity() {
        let r = compute_r(3, 1.0);
        let u = compute_r(3, 1.0);
        let ru = r * u;
        let identity = DMatrix::<f64>::identity(4, 4);
        for (a, b) in ru.iter().zip(identity.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_change_d_unit_factor_is_noop() {
        let mut d: Vec<DVector<f64>> = (0..MAX_ORDER + 3).map(|i| DVector::from_element(2, i as f64 + 1.0)).collect();
        let before = d.clone();
        change_d(&mut d, 3, 1.0);
        for (a, b) in d.iter().zip(before.iter()) {
            assert_relative_eq!(a[0], b[0], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_error_constants() {
        let model = StiffLinear;
        let mut rhs = Rhs::new(&model);
        let stepper = BdfStepper::new(&mut rhs, 0.0, model.setup_initial_state(), 1.0, None, &SolverConfiguration::bdf());
        assert_relative_eq!(stepper.gamma[2], 1.5);
        assert_relative_eq!(stepper.alpha[1], 1.0 - KAPPA[1]);
        assert_relative_eq!(stepper.error_const[1], KAPPA[1] + 0.5);
        assert_relative_eq!(stepper.error_const[MAX_ORDER], 1.0 / 6.0);
    }

    #[test]
    fn test_stiff_linear_accuracy() {
        let scenario = Scenario::new(Box::new(StiffLinear), TimeGrid::linspace(0.0, 5.0, 51).unwrap());
        let config = SolverConfiguration::bdf().with_tolerances(1e-8, 1e-10);
        let result = BdfSolver::new().solve(&scenario, &config).unwrap();

        assert!(result.is_success(), "{}", result.info.message);
        for (t, y) in result.time_points.iter().zip(&result.trajectory).skip(1) {
            let (y1, y2) = exact(*t);
            assert_relative_eq!(y[0], y1, epsilon = 1e-6);
            assert_relative_eq!(y[1], y2, epsilon = 1e-6);
        }
        assert!(result.info.last_order > 1);
        assert!(result.info.n_lu > 0);
    }

    #[test]
    fn test_newton_tolerance() {
        assert_relative_eq!(newton_tolerance(1e-3), 0.03);
        assert_relative_eq!(newton_tolerance(1e-6), 1e-3);
        assert_relative_eq!(newton_tolerance(1e-16), 10.0 * f64::EPSILON / 1e-16);
    }

    #[test]
    fn test_bounded_step() {
        let y = DVector::from_vec(vec![1.0, 0.0, -2.0]);
        assert!(bounded_step(&y, &DVector::from_vec(vec![1500.0, 900.0, -2500.0])));
        assert!(!bounded_step(&y, &DVector::from_vec(vec![2500.0, 0.0, 0.0])));
        assert!(!bounded_step(&y, &DVector::from_vec(vec![1.0, f64::NAN, 0.0])));
    }

    #[test]
    fn test_prothero_robinson_across_stiffness() {
        for stiffness in [1e2, 1e4] {
            let scenario = Scenario::new(Box::new(ProtheroRobinson(stiffness)), TimeGrid::linspace(0.0, 10.0, 101).unwrap());
            let config = SolverConfiguration::bdf().with_tolerances(1e-6, 1e-9);
            let result = BdfSolver::new().solve(&scenario, &config).unwrap();

            assert!(result.is_success(), "lambda = {}: {}", stiffness, result.info.message);
            for (t, y) in result.time_points.iter().zip(&result.trajectory) {
                assert!((y[0] - t.cos()).abs() < 1e-4, "lambda = {}, t = {}: {}", stiffness, t, y[0]);
            }
            assert!(result.info.n_steps < 2000, "{} steps", result.info.n_steps);
        }
    }

    #[test]
    fn test_stiff_problem_needs_few_steps() {
        let scenario = Scenario::new(Box::new(StiffLinear), TimeGrid::linspace(0.0, 100.0, 11).unwrap());
        let config = SolverConfiguration::bdf().with_tolerances(1e-6, 1e-9);
        let result = BdfSolver::new().solve(&scenario, &config).unwrap();

        assert!(result.is_success());
        // An explicit method needs > 30 000 steps here
        assert!(result.info.n_steps < 2000, "{} steps", result.info.n_steps);
    }
}
