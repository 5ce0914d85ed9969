//! Output module for simulation results
//!
//! Writes dense trajectories and sparse observations to files for external
//! analysis (spreadsheets, pandas, R).
//!
//! # Architecture
//!
//! ```text
//! output/
//! ├── mod.rs              ← This file
//! └── export/             ← Data export
//!     ├── mod.rs          ← Exporter trait
//!     └── csv.rs
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cho_rs::output::export::{CsvExporter, Exporter};
//!
//! CsvExporter::default().export_observations(&observations, "samples.csv")?;
//! ```
//!
//! Observations also serialize directly with serde (see
//! [`Observations`](crate::stochastic::Observations)), which is the
//! preferred format for programmatic consumers.

pub mod export;
