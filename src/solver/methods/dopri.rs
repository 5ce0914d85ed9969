//! Dormand-Prince 5(4) explicit Runge-Kutta solver
//!
//! # Mathematical Background
//!
//! Seven-stage embedded pair with the First-Same-As-Last property: the
//! derivative at the end of an accepted step is the first stage of the next.
//!
//! ```text
//! k₁ = f(tₙ, yₙ)
//! kᵢ = f(tₙ + cᵢ·h, yₙ + h·Σⱼ aᵢⱼ·kⱼ)          i = 2..6
//! yₙ₊₁ = yₙ + h·Σᵢ bᵢ·kᵢ                        (order 5)
//! k₇ = f(tₙ + h, yₙ₊₁)
//! err = h·Σᵢ eᵢ·kᵢ                              (5th minus 4th order)
//! ```
//!
//! # Step Size Control
//!
//! ```text
//! ‖err‖ = rms(err / (atol + rtol·max(|yₙ|, |yₙ₊₁|)))
//! h_new = h · clamp(0.9·‖err‖^(-1/5), 0.2, 10)
//! ```
//!
//! Growth is capped at 1 right after a rejection.
//!
//! # Dense Output
//!
//! Fourth-order continuous extension of Hairer's DOPRI5, so output points
//! never constrain the step size.
//!
//! # Stiffness Detection
//!
//! Each accepted step estimates `h·ρ` (ρ the dominant eigenvalue magnitude
//! along the step) from `‖k₇ − k₆‖ / ‖yₙ₊₁ − y⁽⁶⁾‖`, both stage points sitting
//! at `tₙ + h`. Values above 3.25 mean the step is limited by stability,
//! not accuracy.
//!
//! # When to Use
//!
//! - Non-stiff or mildly stiff problems
//! - Cheap right-hand sides; no Jacobian, no linear algebra
//!
//! # Example
//!
//! ```rust,ignore
//! use cho_rs::solver::{DormandPrinceSolver, Solver, SolverConfiguration};
//!
//! let solver = DormandPrinceSolver::new();
//! let result = solver.solve(&scenario, &SolverConfiguration::dormand_prince())?;
//! ```

use nalgebra::DVector;

use crate::error::Result;
use crate::solver::methods::common::{
    error_scale, min_step, rms_norm, run, select_initial_step, Rhs, StepFailure, Stepper,
    MAX_FACTOR, MIN_FACTOR, SAFETY,
};
use crate::solver::scenario::Scenario;
use crate::solver::traits::{SimulationResult, Solver, SolverConfiguration};

// =================================================================================================
// Butcher tableau
// =================================================================================================

const C: [f64; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];

const A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0],
    [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0],
    [9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
];

const B: [f64; 6] = [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0];

const E: [f64; 7] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

/// Dense output weights
const D: [f64; 7] = [
    -12715105075.0 / 11282082432.0,
    0.0,
    87487479700.0 / 32700410799.0,
    -10690763975.0 / 1880347072.0,
    701980252875.0 / 199316789632.0,
    -1453857185.0 / 822651844.0,
    69997945.0 / 29380423.0,
];

/// Order of the embedded error estimator
const ERROR_ORDER: f64 = 4.0;

/// Order of the propagated solution
const ORDER: usize = 5;

/// Boundary of the stability region along the negative real axis (approx.)
pub(crate) const STIFFNESS_THRESHOLD: f64 = 3.25;

// =================================================================================================
// Stepper
// =================================================================================================

pub(crate) struct DormandPrinceStepper {
    t: f64,
    y: DVector<f64>,
    f: DVector<f64>,
    h_abs: f64,
    last_step: f64,
    t_bound: f64,
    rtol: f64,
    atol: f64,
    max_step: f64,

    t_old: f64,
    rcont: [DVector<f64>; 5],

    /// `h·ρ` of the last accepted step
    pub(crate) stiffness: f64,
}

impl DormandPrinceStepper {
    pub(crate) fn new(
        rhs: &mut Rhs,
        t0: f64,
        y0: DVector<f64>,
        t_bound: f64,
        config: &SolverConfiguration,
    ) -> Self {
        let f0 = rhs.eval(t0, &y0);
        let h_abs = select_initial_step(rhs, t0, &y0, &f0, t_bound, ORDER - 1, config);
        Self::from_parts(t0, y0, f0, h_abs, t_bound, config)
    }

    /// Restart from `(t, y)` with step `h_abs`
    pub(crate) fn restart(
        rhs: &mut Rhs,
        t: f64,
        y: DVector<f64>,
        h_abs: f64,
        t_bound: f64,
        config: &SolverConfiguration,
    ) -> Self {
        let f = rhs.eval(t, &y);
        Self::from_parts(t, y, f, h_abs, t_bound, config)
    }

    fn from_parts(
        t: f64,
        y: DVector<f64>,
        f: DVector<f64>,
        h_abs: f64,
        t_bound: f64,
        config: &SolverConfiguration,
    ) -> Self {
        let n = y.len();
        let rcont = [
            y.clone(),
            DVector::zeros(n),
            DVector::zeros(n),
            DVector::zeros(n),
            DVector::zeros(n),
        ];
        Self {
            t,
            y,
            f,
            h_abs,
            last_step: 0.0,
            t_bound,
            rtol: config.rtol,
            atol: config.atol,
            max_step: config.max_step,
            t_old: t,
            rcont,
            stiffness: 0.0,
        }
    }

    /// Proposed size of the next step
    pub(crate) fn h_abs(&self) -> f64 {
        self.h_abs
    }
}

impl Stepper for DormandPrinceStepper {
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
        ORDER
    }

    fn method_name(&self) -> &'static str {
        "Dormand-Prince"
    }

    fn step(&mut self, rhs: &mut Rhs) -> std::result::Result<(), StepFailure> {
        let t = self.t;
        let min_step = min_step(t);
        let mut h_abs = self.h_abs.clamp(min_step, self.max_step.max(min_step));

        let mut rejected = false;
        let mut non_finite = false;

        loop {
            if h_abs < min_step {
                return Err(if non_finite { StepFailure::NonFinite } else { StepFailure::StepTooSmall });
            }

            let t_new = (t + h_abs).min(self.t_bound);
            let h = t_new - t;
            h_abs = h;

            // ====== Stages ======

            let mut k: Vec<DVector<f64>> = Vec::with_capacity(7);
            k.push(self.f.clone());
            let mut y_stage = self.y.clone();
            for i in 1..6 {
                y_stage.copy_from(&self.y);
                for (j, kj) in k.iter().enumerate().take(i) {
                    y_stage.axpy(h * A[i][j], kj, 1.0);
                }
                let ki = rhs.eval(t + C[i] * h, &y_stage);
                k.push(ki);
            }
            // y_stage now holds the sixth stage point, at t + h

            let mut y_new = self.y.clone();
            for (bi, ki) in B.iter().zip(k.iter()) {
                y_new.axpy(h * bi, ki, 1.0);
            }
            let f_new = rhs.eval(t_new, &y_new);
            k.push(f_new);

            // ====== Error estimate ======

            let mut err = DVector::zeros(self.y.len());
            for (ei, ki) in E.iter().zip(k.iter()) {
                err.axpy(h * ei, ki, 1.0);
            }
            let scale = self.y.zip_map(&y_new, |a, b| self.atol + self.rtol * a.abs().max(b.abs()));
            let error_norm = rms_norm(&err, &scale);

            if !error_norm.is_finite() {
                non_finite = true;
            }

            if error_norm < 1.0 {
                let mut factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * error_norm.powf(-1.0 / (ERROR_ORDER + 1.0))).min(MAX_FACTOR)
                };
                if rejected {
                    factor = factor.min(1.0);
                }

                // ====== Stiffness estimate ======

                let stage_scale = error_scale(&y_new, self.rtol, self.atol);
                let denominator = rms_norm(&(&y_new - &y_stage), &stage_scale);
                self.stiffness = if denominator > 0.0 {
                    h * rms_norm(&(&k[6] - &k[5]), &stage_scale) / denominator
                } else {
                    0.0
                };

                // ====== Dense output ======

                let ydiff = &y_new - &self.y;
                let bspl = &k[0] * h - &ydiff;
                let mut dense = DVector::zeros(self.y.len());
                for (di, ki) in D.iter().zip(k.iter()) {
                    dense.axpy(h * di, ki, 1.0);
                }
                self.rcont = [
                    self.y.clone(),
                    ydiff.clone(),
                    bspl.clone(),
                    &ydiff - &k[6] * h - &bspl,
                    dense,
                ];

                self.t_old = t;
                self.t = t_new;
                self.last_step = h;
                self.h_abs = h_abs * factor;
                self.y = y_new;
                self.f = k.swap_remove(6);
                return Ok(());
            }

            h_abs *= (SAFETY * error_norm.powf(-1.0 / (ERROR_ORDER + 1.0))).max(MIN_FACTOR);
            rhs.info.n_rejected += 1;
            rejected = true;
        }
    }

    fn interpolate(&self, t: f64) -> DVector<f64> {
        let h = self.t - self.t_old;
        if h == 0.0 {
            return self.y.clone();
        }
        let theta = (t - self.t_old) / h;
        let theta1 = 1.0 - theta;
        let [r1, r2, r3, r4, r5] = &self.rcont;
        r1 + (r2 + (r3 + (r4 + r5 * theta1) * theta) * theta1) * theta
    }
}

// =================================================================================================
// Dormand-Prince Solver
// =================================================================================================

/// Adaptive Dormand-Prince 5(4) solver
#[derive(Debug, Clone, Copy, Default)]
pub struct DormandPrinceSolver;

impl DormandPrinceSolver {
    /// Create a new Dormand-Prince solver
    ///
    /// # Example
    ///
    /// ```rust
    /// use cho_rs::solver::{DormandPrinceSolver, Solver};
    ///
    /// let solver = DormandPrinceSolver::new();
    /// assert_eq!(solver.name(), "Dormand-Prince (RK45)");
    /// ```
    pub fn new() -> Self {
        Self
    }
}

impl Solver for DormandPrinceSolver {
    fn solve(&self, scenario: &Scenario, config: &SolverConfiguration) -> Result<SimulationResult> {
        config.validate()?;
        scenario.validate()?;

        let mut rhs = Rhs::new(scenario.model.as_ref());
        let mut stepper = DormandPrinceStepper::new(
            &mut rhs,
            scenario.grid.start(),
            scenario.initial_state.clone(),
            scenario.grid.end(),
            config,
        );

        let mut result = run(&mut stepper, &mut rhs, scenario, config);
        result.add_metadata("solver", self.name());
        result.add_metadata("rtol", &config.rtol.to_string());
        result.add_metadata("atol", &config.atol.to_string());
        Ok(result)
    }

    fn name(&self) -> &str {
        "Dormand-Prince (RK45)"
    }
}

// =================================================================================================
// Tests
// =================================================================================================
