//! Mock physical models for testing
//!
//! These models have known analytical solutions, making them
//! ideal for validating numerical solver accuracy.

#![allow(dead_code)]

use cho_rs::physics::PhysicalModel;
use nalgebra::DVector;

// =================================================================================================
// Exponential Decay: dy/dt = -k*y
// =================================================================================================

/// Exponential decay model: dy/dt = -k*y
///
/// Analytical solution: y(t) = y₀ * exp(-k*t)
pub struct ExponentialDecay {
    pub points: usize,
    pub decay_rate: f64,
}

impl ExponentialDecay {
    pub fn new(points: usize, decay_rate: f64) -> Self {
        Self { points, decay_rate }
    }

    /// Compute analytical solution at time t
    pub fn analytical_solution(&self, t: f64, y0: f64) -> f64 {
        y0 * (-self.decay_rate * t).exp()
    }
}

impl PhysicalModel for ExponentialDecay {
    fn dimension(&self) -> usize {
        self.points
    }

    fn compute_physics(&self, _t: f64, state: &DVector<f64>) -> DVector<f64> {
        state * -self.decay_rate
    }

    fn setup_initial_state(&self) -> DVector<f64> {
        DVector::from_element(self.points, 1.0)
    }

    fn name(&self) -> &str {
        "Exponential Decay"
    }
}

// =================================================================================================
// Harmonic Oscillator: x'' = -ω²x
// =================================================================================================

/// Undamped oscillator as a first-order system `(x, v)`
///
/// Analytical solution from x(0) = 1, v(0) = 0: x(t) = cos(ωt)
pub struct HarmonicOscillator {
    pub omega: f64,
}

impl HarmonicOscillator {
    pub fn new(omega: f64) -> Self {
        Self { omega }
    }

    pub fn analytical_solution(&self, t: f64) -> f64 {
        (self.omega * t).cos()
    }
}

impl PhysicalModel for HarmonicOscillator {
    fn dimension(&self) -> usize {
        2
    }

    fn compute_physics(&self, _t: f64, state: &DVector<f64>) -> DVector<f64> {
        DVector::from_vec(vec![state[1], -self.omega * self.omega * state[0]])
    }

    fn setup_initial_state(&self) -> DVector<f64> {
        DVector::from_vec(vec![1.0, 0.0])
    }

    fn name(&self) -> &str {
        "Harmonic Oscillator"
    }

    fn auxiliary_dimension(&self) -> usize {
        1
    }

    /// Total energy, conserved by the exact flow
    fn compute_auxiliary(&self, _t: f64, state: &DVector<f64>) -> DVector<f64> {
        let energy = 0.5 * (state[1] * state[1] + self.omega * self.omega * state[0] * state[0]);
        DVector::from_element(1, energy)
    }
}

// =================================================================================================
// Prothero-Robinson: y' = -λ(y - cos t) - sin t
// =================================================================================================

/// Stiff scalar problem whose smooth solution is `cos t`
///
/// With y(0) = 1 the solution is exactly cos t; the stiffness λ only limits
/// the step size of explicit methods.
pub struct ProtheroRobinson {
    pub stiffness: f64,
}

impl ProtheroRobinson {
    pub fn new(stiffness: f64) -> Self {
        Self { stiffness }
    }
}

impl PhysicalModel for ProtheroRobinson {
    fn dimension(&self) -> usize {
        1
    }

    fn compute_physics(&self, t: f64, state: &DVector<f64>) -> DVector<f64> {
        DVector::from_element(1, -self.stiffness * (state[0] - t.cos()) - t.sin())
    }

    fn setup_initial_state(&self) -> DVector<f64> {
        DVector::from_element(1, 1.0)
    }

    fn name(&self) -> &str {
        "Prothero-Robinson"
    }
}
