//! Stochastic layer
//!
//! Two independent sources of randomness:
//!
//! - [`perturbation`]: biological variability, one multiplicative draw per
//!   intrinsic kinetic constant before a run
//! - [`sampling`]: measurement noise on sparse observations of the finished
//!   trajectory
//!
//! Generators are explicit `&mut` values, never global. The simulation
//! facade uses [`ChaCha8Rng`](rand_chacha::ChaCha8Rng), so a seed reproduces
//! the same draws on every platform.

pub mod perturbation;
pub mod sampling;

pub use perturbation::{add_relative_noise, perturb_parameters};
pub use sampling::{sample_indices, sample_trajectory, Channel, ChannelSource, Observations, CHANNELS, TIME_CHANNEL};
