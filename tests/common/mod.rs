//! Common utilities for integration tests

pub mod mock_models;
pub mod test_helpers;

// Re-export commonly used items
pub use mock_models::{ExponentialDecay, HarmonicOscillator, ProtheroRobinson};
pub use test_helpers::{batch_culture, create_simple_scenario, relative_error, short_config};
