//! CSV export of culture simulation results
//!
//! Output is compatible with Excel, Python pandas, R and most data analysis tools.
//!
//! # Features
//!
//! - **Dense trajectories**: every state channel, then every auxiliary channel
//! - **Observations**: the sampled channels, time first
//! - **Metadata support**: optional `#` comment header with run information
//! - **Customizable**: delimiter, decimal separator, precision
//! - **Validation**: empty data, NaN/Inf and ragged columns are rejected
//!
//! # Quick Examples
//!
//! ## Dense trajectory
//!
//! ```rust,ignore
//! use cho_rs::output::export::{CsvExporter, Exporter};
//!
//! let exporter = CsvExporter::default();
//! exporter.export_trajectory(&result, None, "run.csv")?;
//!
//! // One row per day of a 12-day run, first and last point kept
//! exporter.export_trajectory(&result, Some(13), "run_daily.csv")?;
//! ```
//!
//! **Output** (`run.csv`):
//! ```csv
//! time (hr),Xv (1/L),Xt (1/L),Cglc (mmol/L),...,Osmolarity (mOsm/L)
//! 0.000000,8000000000.000000,8000000000.000000,100.000000,...
//! ```
//!
//! ## With Metadata
//!
//! ```rust,ignore
//! use cho_rs::output::export::{CsvConfig, CsvExporter, CsvMetadata};
//!
//! let metadata = CsvMetadata::from_result("Fed-batch CHO culture", &result);
//! let exporter = CsvExporter::new(CsvConfig::default().with_metadata(metadata));
//! exporter.export_observations(&observations, "samples.csv")?;
//! ```
//!
//! **Output** (`samples.csv`):
//! ```csv
//! # CHO Culture Simulation Data
//! # Generated: 2026-10-19T15:30:00Z
//! # Model: Fed-batch CHO culture
//! # Solver: Dormand-Prince
//! # Total Time: 288 hr
//! # Output Points: 12000
//! # Status: Integration successful.
//! #
//! time,Xv,Xt,Cglc,...
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SimulationError};
use crate::output::export::Exporter;
use crate::physics::state::{ProcessVariable, StateVariable};
use crate::solver::SimulationResult;
use crate::stochastic::{sample_indices, Observations, CHANNELS, TIME_CHANNEL};

// =============================================================================
// Configuration Structures
// =============================================================================

/// Configuration for CSV export
///
/// # Example
///
/// ```rust
/// use cho_rs::output::export::CsvConfig;
///
/// let config = CsvConfig {
///     delimiter: ';',
///     precision: 10,
///     ..Default::default()
/// };
/// assert!(!config.include_metadata);
/// ```
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Column delimiter (default: ',')
    pub delimiter: char,

    /// Decimal separator (default: '.')
    pub decimal_separator: char,

    /// Number of decimal places for floating-point values (default: 6)
    pub precision: usize,

    /// Include metadata header comments (default: false)
    pub include_metadata: bool,

    /// Metadata to include in header
    pub metadata: Option<CsvMetadata>,

    /// Append the canonical unit to trajectory column headers (default: true)
    pub units_in_header: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal_separator: '.',
            precision: 6,
            include_metadata: false,
            metadata: None,
            units_in_header: true,
        }
    }
}

impl CsvConfig {
    /// European CSV format (semicolon, comma for decimal)
    pub fn european() -> Self {
        Self {
            delimiter: ';',
            decimal_separator: ',',
            ..Default::default()
        }
    }

    /// Builder pattern: set precision
    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Builder pattern: enable metadata
    pub fn with_metadata(mut self, metadata: CsvMetadata) -> Self {
        self.include_metadata = true;
        self.metadata = Some(metadata);
        self
    }
}

/// Metadata for CSV header comments
///
/// Only fields that are set appear in the header.
#[derive(Debug, Clone, Default)]
pub struct CsvMetadata {
    pub model_name: Option<String>,

    /// Method that produced the result
    pub solver_name: Option<String>,

    /// Simulated time \[hr\]
    pub total_time: Option<f64>,

    pub output_points: Option<usize>,

    /// Integration status message
    pub status: Option<String>,

    /// Seed of the run's random generator
    pub seed: Option<u64>,

    /// Additional custom entries
    pub custom: Vec<(String, String)>,
}

impl CsvMetadata {
    /// Metadata describing `result`
    pub fn from_result(model: &str, result: &SimulationResult) -> Self {
        Self {
            model_name: Some(model.to_string()),
            solver_name: Some(result.info.method_used.clone()),
            total_time: result.time_points.last().copied(),
            output_points: Some(result.len()),
            status: Some(result.info.message.clone()),
            ..Default::default()
        }
    }

    /// Add custom entry
    pub fn add_custom(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom.push((key.into(), value.into()));
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn write_metadata_header<W: Write>(out: &mut W, metadata: &CsvMetadata) -> std::io::Result<()> {
    writeln!(out, "# CHO Culture Simulation Data")?;
    writeln!(out, "# Generated: {}", chrono::Utc::now().to_rfc3339())?;

    if let Some(model) = &metadata.model_name {
        writeln!(out, "# Model: {}", model)?;
    }
    if let Some(solver) = &metadata.solver_name {
        writeln!(out, "# Solver: {}", solver)?;
    }
    if let Some(total_time) = metadata.total_time {
        writeln!(out, "# Total Time: {} hr", total_time)?;
    }
    if let Some(points) = metadata.output_points {
        writeln!(out, "# Output Points: {}", points)?;
    }
    if let Some(status) = &metadata.status {
        writeln!(out, "# Status: {}", status)?;
    }
    if let Some(seed) = metadata.seed {
        writeln!(out, "# Seed: {}", seed)?;
    }
    for (key, value) in &metadata.custom {
        writeln!(out, "# {}: {}", key, value)?;
    }
    writeln!(out, "#")
}

/// Format number with configured precision and decimal separator
fn format_number(value: f64, config: &CsvConfig) -> String {
    let formatted = format!("{:.prec$}", value, prec = config.precision);
    if config.decimal_separator != '.' {
        formatted.replace('.', &config.decimal_separator.to_string())
    } else {
        formatted
    }
}

/// Write a header row and data columns of equal length
fn write_table(
    path: &Path,
    headers: &[String],
    columns: &[Vec<f64>],
    config: &CsvConfig,
) -> Result<()> {
    // ============================= Validation =============================

    let rows = columns.first().map_or(0, Vec::len);
    if rows == 0 {
        return Err(SimulationError::InvalidInput("nothing to export: no data rows".to_string()));
    }
    for (header, column) in headers.iter().zip(columns) {
        if column.len() != rows {
            return Err(SimulationError::InvalidInput(format!(
                "column '{}' has {} values, expected {}",
                header,
                column.len(),
                rows
            )));
        }
        if column.iter().any(|v| !v.is_finite()) {
            return Err(SimulationError::InvalidInput(format!(
                "NaN or Inf detected in column '{}'",
                header
            )));
        }
    }

    // ============================= Write ==================================

    let mut out = BufWriter::new(File::create(path)?);

    if config.include_metadata
        && let Some(metadata) = &config.metadata
    {
        write_metadata_header(&mut out, metadata)?;
    }

    let delimiter = config.delimiter.to_string();
    writeln!(out, "{}", headers.join(&delimiter))?;

    for row in 0..rows {
        let line: Vec<String> = columns.iter().map(|column| format_number(column[row], config)).collect();
        writeln!(out, "{}", line.join(&delimiter))?;
    }
    out.flush()?;

    log::debug!("wrote {} rows x {} columns to {}", rows, columns.len(), path.display());
    Ok(())
}

// =============================================================================
// CSV Exporter
// =============================================================================

/// CSV implementation of [`Exporter`]
#[derive(Debug, Clone, Default)]
pub struct CsvExporter {
    pub config: CsvConfig,
}

impl CsvExporter {
    pub fn new(config: CsvConfig) -> Self {
        Self { config }
    }

    fn header(&self, name: &str, unit: &str) -> String {
        if self.config.units_in_header {
            format!("{} ({})", name, unit)
        } else {
            name.to_string()
        }
    }
}

impl Exporter for CsvExporter {
    type Error = SimulationError;

    fn export_trajectory(
        &self,
        result: &SimulationResult,
        n_points: Option<usize>,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let rows = match n_points {
            Some(n) => sample_indices(result.len(), n.min(result.len())),
            None => (0..result.len()).collect(),
        };

        let mut headers = vec![self.header(TIME_CHANNEL, "hr")];
        let mut columns = vec![rows.iter().map(|&i| result.time_points[i]).collect::<Vec<_>>()];

        for variable in StateVariable::ALL {
            headers.push(self.header(variable.name(), variable.unit()));
            columns.push(rows.iter().map(|&i| result.trajectory[i][variable.index()]).collect());
        }

        if result.auxiliary.len() == result.len() {
            for variable in ProcessVariable::ALL {
                headers.push(self.header(variable.name(), variable.unit()));
                columns.push(rows.iter().map(|&i| result.auxiliary[i][variable.index()]).collect());
            }
        }

        write_table(path.as_ref(), &headers, &columns, &self.config)
    }

    fn export_observations(&self, observations: &Observations, path: impl AsRef<Path>) -> Result<()> {
        // Known channels in reporting order, anything else after them
        let mut names: Vec<&str> = CHANNELS
            .iter()
            .map(|channel| channel.name)
            .filter(|name| observations.channel(name).is_some())
            .collect();
        names.extend(observations.channel_names().filter(|name| !CHANNELS.iter().any(|c| c.name == *name)));

        let headers: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        let columns: Vec<Vec<f64>> = names
            .iter()
            .filter_map(|name| observations.channel(name).map(<[f64]>::to_vec))
            .collect();

        write_table(path.as_ref(), &headers, &columns, &self.config)
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::state::{PROCESS_DIM, STATE_DIM};
    use crate::solver::IntegrationInfo;
    use nalgebra::DVector;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::NamedTempFile;

    fn result(n: usize, with_auxiliary: bool) -> SimulationResult {
        let times = (0..n).map(|i| i as f64).collect();
        let states = (0..n).map(|i| DVector::from_element(STATE_DIM, 0.5 * i as f64)).collect();
        let info = IntegrationInfo {
            method_used: "Dormand-Prince".to_string(),
            message: "Integration successful.".to_string(),
            ..Default::default()
        };
        let mut result = SimulationResult::new(times, states, info);
        if with_auxiliary {
            result.auxiliary = (0..n).map(|_| DVector::from_element(PROCESS_DIM, 2.0)).collect();
        }
        result
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn test_trajectory_columns() {
        let file = NamedTempFile::new().unwrap();
        CsvExporter::default().export_trajectory(&result(4, true), None, file.path()).unwrap();

        let lines = lines(file.path());
        assert_eq!(lines.len(), 5);
        let header: Vec<&str> = lines[0].split(',').collect();
        assert_eq!(header.len(), 1 + STATE_DIM + PROCESS_DIM);
        assert_eq!(header[0], "time (hr)");
        assert_eq!(header[1], "Xv (1/L)");
        assert_eq!(header[STATE_DIM + 1], "F (L/hr)");
        assert_eq!(lines[2], format!("1.000000{}", ",0.500000".repeat(STATE_DIM) + &",2.000000".repeat(PROCESS_DIM)));
    }

    #[test]
    fn test_trajectory_without_auxiliary() {
        let file = NamedTempFile::new().unwrap();
        let exporter = CsvExporter::new(CsvConfig { units_in_header: false, ..Default::default() });
        exporter.export_trajectory(&result(3, false), None, file.path()).unwrap();

        let lines = lines(file.path());
        assert_eq!(lines[0], "time,Xv,Xt,Cglc,Cgln,Clac,Camm,Cmab,Coxygen,V,pH");
    }

    #[test]
    fn test_downsampled_trajectory_keeps_endpoints() {
        let file = NamedTempFile::new().unwrap();
        CsvExporter::default().export_trajectory(&result(101, true), Some(5), file.path()).unwrap();

        let lines = lines(file.path());
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("0.000000,"));
        assert!(lines[3].starts_with("50.000000,"));
        assert!(lines[5].starts_with("100.000000,"));
    }

    #[test]
    fn test_metadata_header() {
        let file = NamedTempFile::new().unwrap();
        let data = result(3, true);
        let mut metadata = CsvMetadata::from_result("Fed-batch CHO culture", &data);
        metadata.seed = Some(42);
        metadata.add_custom("Feed", "constant 1 mL/hr");
        let exporter = CsvExporter::new(CsvConfig::default().with_metadata(metadata));
        exporter.export_trajectory(&data, None, file.path()).unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("# CHO Culture Simulation Data\n# Generated: "));
        assert!(content.contains("# Model: Fed-batch CHO culture\n"));
        assert!(content.contains("# Solver: Dormand-Prince\n"));
        assert!(content.contains("# Total Time: 2 hr\n"));
        assert!(content.contains("# Status: Integration successful.\n"));
        assert!(content.contains("# Seed: 42\n"));
        assert!(content.contains("# Feed: constant 1 mL/hr\n"));
        assert!(content.contains("#\ntime (hr),"));
    }

    #[test]
    fn test_european_format() {
        let file = NamedTempFile::new().unwrap();
        let exporter = CsvExporter::new(CsvConfig::european().precision(2));
        exporter.export_trajectory(&result(2, false), None, file.path()).unwrap();

        let lines = lines(file.path());
        assert!(lines[0].starts_with("time (hr);Xv (1/L);"));
        assert!(lines[2].starts_with("1,00;0,50;"));
    }

    #[test]
    fn test_observations_in_channel_order() {
        let mut map = BTreeMap::new();
        map.insert("Xv".to_string(), vec![1.0, 2.0]);
        map.insert(TIME_CHANNEL.to_string(), vec![0.0, 24.0]);
        map.insert("Cglc".to_string(), vec![3.0, 4.0]);
        map.insert("extra".to_string(), vec![5.0, 6.0]);
        let observations = Observations::from(map);

        let file = NamedTempFile::new().unwrap();
        CsvExporter::new(CsvConfig::default().precision(1))
            .export_observations(&observations, file.path())
            .unwrap();

        let lines = lines(file.path());
        assert_eq!(lines, vec!["time,Xv,Cglc,extra", "0.0,1.0,3.0,5.0", "24.0,2.0,4.0,6.0"]);
    }

    #[test]
    fn test_invalid_data_rejected() {
        let file = NamedTempFile::new().unwrap();
        let exporter = CsvExporter::default();

        let empty = SimulationResult::new(Vec::new(), Vec::new(), IntegrationInfo::default());
        assert!(exporter.export_trajectory(&empty, None, file.path()).is_err());

        let mut bad = result(3, false);
        bad.trajectory[1][0] = f64::NAN;
        let err = exporter.export_trajectory(&bad, None, file.path()).unwrap_err();
        assert!(err.to_string().contains("Xv"));

        let mut ragged = BTreeMap::new();
        ragged.insert(TIME_CHANNEL.to_string(), vec![0.0, 1.0]);
        ragged.insert("Xv".to_string(), vec![1.0]);
        assert!(exporter.export_observations(&Observations::from(ragged), file.path()).is_err());
    }

    #[test]
    fn test_io_error_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no_such_dir").join("out.csv");
        let err = CsvExporter::default().export_trajectory(&result(2, false), None, &missing).unwrap_err();
        assert!(matches!(err, SimulationError::Io(_)));
    }
}
