//! Export module for simulation results.
//!
//! # Architecture
//!
//! This module defines the [`Exporter`] trait that abstracts the export format.
//! Each format is an independent implementation in its own sub-module.
//!
//! | Format  | Module          |
//! |---------|-----------------|
//! | CSV     | [`csv`]         |
//!
//! # Usage example
//!
//! ```rust,ignore
//! use cho_rs::output::export::{CsvExporter, Exporter};
//!
//! let exporter = CsvExporter::default();
//!
//! // Dense trajectory, every output point
//! exporter.export_trajectory(&result, None, "run.csv")?;
//!
//! // Downsampled to 500 points
//! exporter.export_trajectory(&result, Some(500), "run_light.csv")?;
//!
//! // Sparse noisy observations
//! exporter.export_observations(&observations, "samples.csv")?;
//! ```

pub mod csv;

pub use csv::{CsvConfig, CsvExporter, CsvMetadata};

use std::path::Path;

use crate::solver::SimulationResult;
use crate::stochastic::Observations;

/// Abstraction trait for all export formats.
///
/// # Parameter `n_points`
///
/// - `None`: exports every output point
/// - `Some(n)`: uniformly downsamples to `n` points, always keeping the
///   **first and last** points
pub trait Exporter {
    /// Error type specific to this export format.
    type Error: std::error::Error;

    /// Exports a dense trajectory.
    ///
    /// Columns are time, every state channel and, when present, every
    /// auxiliary channel.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the path is invalid or the directory does not exist
    /// - `result` contains no data or non-finite values
    fn export_trajectory(
        &self,
        result: &SimulationResult,
        n_points: Option<usize>,
        path: impl AsRef<Path>,
    ) -> Result<(), Self::Error>;

    /// Exports sampled observations, one column per channel.
    fn export_observations(&self, observations: &Observations, path: impl AsRef<Path>) -> Result<(), Self::Error>;
}
