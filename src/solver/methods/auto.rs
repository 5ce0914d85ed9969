//! Automatic stiff/non-stiff method switching
//!
//! # Strategy
//!
//! Integration starts with Dormand-Prince. Every accepted explicit step
//! carries an estimate of `h·ρ`; once 15 steps in a row (tolerating up to 5
//! quiet steps in between) sit beyond the stability boundary, the remaining
//! interval is handed to BDF with the current step size.
//!
//! BDF goes back to Dormand-Prince when
//! - 15 consecutive accepted steps have `h·ρ < 2` with `ρ` the spectral
//!   radius of the current Jacobian, or
//! - Newton fails on a step the explicit method could take anyway.
//!
//! A switch is carried out at the start of the next step, so the dense output
//! of the step just accepted stays valid for the driver.
//!
//! # When to Use
//!
//! - Culture runs: long non-stiff growth phases with stiff stretches around
//!   substrate depletion
//! - Anything whose stiffness is not known in advance

use nalgebra::DVector;

use crate::error::Result;
use crate::solver::methods::bdf::{BdfStepper, NONSTIFF_THRESHOLD};
use crate::solver::methods::common::{run, Rhs, StepFailure, Stepper};
use crate::solver::methods::dopri::{DormandPrinceStepper, STIFFNESS_THRESHOLD};
use crate::solver::scenario::Scenario;
use crate::solver::traits::{SimulationResult, Solver, SolverConfiguration};

/// Consecutive steps confirming a stiffness change before switching
const SWITCH_AFTER: usize = 15;

/// Non-stiff explicit steps that reset the stiffness count
const STIFF_COUNT_RESET: usize = 6;

enum Active {
    Explicit(DormandPrinceStepper),
    Implicit(BdfStepper),
}

pub(crate) struct AutoStepper {
    active: Active,
    t_bound: f64,
    config: SolverConfiguration,

    stiff_steps: usize,
    nonstiff_steps: usize,
    switch_pending: bool,
    switches: Vec<f64>,
}

impl AutoStepper {
    pub(crate) fn new(
        rhs: &mut Rhs,
        t0: f64,
        y0: DVector<f64>,
        t_bound: f64,
        config: &SolverConfiguration,
    ) -> Self {
        let explicit = DormandPrinceStepper::new(rhs, t0, y0, t_bound, config);
        Self {
            active: Active::Explicit(explicit),
            t_bound,
            config: config.clone(),
            stiff_steps: 0,
            nonstiff_steps: 0,
            switch_pending: false,
            switches: Vec::new(),
        }
    }

    fn active(&self) -> &dyn Stepper {
        match &self.active {
            Active::Explicit(stepper) => stepper,
            Active::Implicit(stepper) => stepper,
        }
    }

    fn switch_method(&mut self, rhs: &mut Rhs) {
        let t = self.active().t();
        let y = self.active().y().clone();

        self.active = match &self.active {
            Active::Explicit(explicit) => Active::Implicit(
                BdfStepper::new(rhs, t, y, self.t_bound, Some(explicit.h_abs()), &self.config).yielding(),
            ),
            Active::Implicit(implicit) => Active::Explicit(DormandPrinceStepper::restart(
                rhs,
                t,
                y,
                implicit.h_abs(),
                self.t_bound,
                &self.config,
            )),
        };
        log::debug!("switched to {} at t = {}", self.active().method_name(), t);

        self.switches.push(t);
        self.stiff_steps = 0;
        self.nonstiff_steps = 0;
        self.switch_pending = false;
    }
}

impl Stepper for AutoStepper {
    fn t(&self) -> f64 {
        self.active().t()
    }

    fn y(&self) -> &DVector<f64> {
        self.active().y()
    }

    fn last_step(&self) -> f64 {
        self.active().last_step()
    }

    fn order(&self) -> usize {
        self.active().order()
    }

    fn method_name(&self) -> &'static str {
        self.active().method_name()
    }

    fn step(&mut self, rhs: &mut Rhs) -> std::result::Result<(), StepFailure> {
        if self.switch_pending {
            self.switch_method(rhs);
        }

        match &mut self.active {
            Active::Explicit(explicit) => {
                explicit.step(rhs)?;
                if explicit.stiffness > STIFFNESS_THRESHOLD {
                    self.stiff_steps += 1;
                    self.nonstiff_steps = 0;
                    self.switch_pending = self.stiff_steps >= SWITCH_AFTER;
                } else {
                    self.nonstiff_steps += 1;
                    if self.nonstiff_steps >= STIFF_COUNT_RESET {
                        self.stiff_steps = 0;
                    }
                }
            }
            Active::Implicit(implicit) => match implicit.step(rhs) {
                Ok(()) => {
                    if implicit.stiffness() < NONSTIFF_THRESHOLD {
                        self.nonstiff_steps += 1;
                        self.switch_pending = self.nonstiff_steps >= SWITCH_AFTER;
                    } else {
                        self.nonstiff_steps = 0;
                    }
                }
                Err(StepFailure::Yield) => {
                    self.switch_method(rhs);
                    return self.step(rhs);
                }
                Err(failure) => return Err(failure),
            },
        }
        Ok(())
    }

    fn interpolate(&self, t: f64) -> DVector<f64> {
        self.active().interpolate(t)
    }

    fn switches(&self) -> &[f64] {
        &self.switches
    }
}

// =================================================================================================
// Auto Solver
// =================================================================================================

/// Dormand-Prince with automatic hand-over to BDF on stiff stretches
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSolver;

impl AutoSolver {
    /// Create a new switching solver
    ///
    /// # Example
    ///
    /// ```rust
    /// use cho_rs::solver::{AutoSolver, Solver};
    ///
    /// let solver = AutoSolver::new();
    /// assert_eq!(solver.name(), "Auto (Dormand-Prince/BDF)");
    /// ```
    pub fn new() -> Self {
        Self
    }
}

impl Solver for AutoSolver {
    fn solve(&self, scenario: &Scenario, config: &SolverConfiguration) -> Result<SimulationResult> {
        config.validate()?;
        scenario.validate()?;

        let mut rhs = Rhs::new(scenario.model.as_ref());
        let mut stepper = AutoStepper::new(
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
        result.add_metadata("method_switches", &result.info.method_switches.len().to_string());
        Ok(result)
    }

    fn name(&self) -> &str {
        "Auto (Dormand-Prince/BDF)"
    }
}

// =================================================================================================
// Tests
// =================================================================================================
