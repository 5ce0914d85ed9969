//! Helper functions for integration tests

#![allow(dead_code)]

use cho_rs::models::Profile;
use cho_rs::parameters::SimulationConfig;
use cho_rs::physics::PhysicalModel;
use cho_rs::solver::{Scenario, TimeGrid};

/// Scenario over `[0, end]` with `points` evenly spaced outputs
pub fn create_simple_scenario(model: Box<dyn PhysicalModel>, end: f64, points: usize) -> Scenario {
    let grid = TimeGrid::linspace(0.0, end, points).expect("valid grid");
    Scenario::new(model, grid)
}

/// Compute relative error: |actual - expected| / |expected|
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-10 {
        (actual - expected).abs()
    } else {
        (actual - expected).abs() / expected.abs()
    }
}

/// Default configuration shortened to `ndays`
pub fn short_config(ndays: u32) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.parameters.ndays = ndays;
    config
}

/// Batch culture drivers: no feed, constant 36.4 °C
pub fn batch_culture() -> (Profile, Profile) {
    (Profile::constant(0.0), Profile::constant(36.4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_error() {
        assert!((relative_error(1.0, 1.0) - 0.0).abs() < 1e-10);
        assert!((relative_error(1.1, 1.0) - 0.1).abs() < 1e-10);
        assert!((relative_error(0.9, 1.0) - 0.1).abs() < 1e-10);
    }
}
