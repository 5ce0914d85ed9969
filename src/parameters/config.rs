//! Two-namespace simulation configuration
//!
//! ```json
//! {
//!     "parameters":         { "mu_max": "0.2 1/hr", "Cglc_feed": 150 },
//!     "initial_conditions": { "V": "50 mL", "Xv": 8e9 }
//! }
//! ```
//!
//! Each namespace maps field names to bare numbers or unit-tagged strings.
//! Unknown keys are ignored, missing keys keep their defaults, a missing or
//! empty namespace yields the defaults of that structure.

use serde_json::{Map, Value};

use crate::error::{Result, SimulationError};
use crate::parameters::initial::InitialConditions;
use crate::parameters::input::InputParameters;
use crate::parameters::value::UnitValidated;

/// Namespace holding kinetic parameters
pub const PARAMETERS_KEY: &str = "parameters";

/// Namespace holding initial conditions
pub const INITIAL_CONDITIONS_KEY: &str = "initial_conditions";

/// Parsed configuration: kinetic parameters and initial conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationConfig {
    pub parameters: InputParameters,
    pub initial_conditions: InitialConditions,
}

impl SimulationConfig {
    /// Build from a JSON value with the two namespaces
    ///
    /// # Errors
    ///
    /// - `Configuration` if the root or a namespace is not an object
    /// - `Dimensionality` / `UnitParse` for invalid field values
    pub fn from_value(value: &Value) -> Result<Self> {
        let root = match value {
            Value::Object(root) => root,
            Value::Null => return Ok(Self::default()),
            other => {
                return Err(SimulationError::Configuration(format!(
                    "configuration root must be an object, found {}",
                    other
                )));
            }
        };

        let parameters = InputParameters::from_mapping(namespace(root, PARAMETERS_KEY)?)?
            .unwrap_or_default();
        let initial_conditions =
            InitialConditions::from_mapping(namespace(root, INITIAL_CONDITIONS_KEY)?)?
                .unwrap_or_default();

        Ok(Self { parameters, initial_conditions })
    }

    /// Parse a JSON document
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Read a JSON configuration file
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

fn namespace<'a>(root: &'a Map<String, Value>, key: &str) -> Result<Option<&'a Map<String, Value>>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(mapping)) => Ok(Some(mapping)),
        Some(other) => Err(SimulationError::Configuration(format!(
            "'{}' must be a mapping, found {}",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_two_namespaces() {
        let config = SimulationConfig::from_value(&json!({
            "parameters": { "mu_max": "0.25 1/hr", "Ndays": 4, "unknown": 1 },
            "initial_conditions": { "V": "100 mL", "Cglc": 80 },
            "doe": { "ranges": [] }
        }))
        .unwrap();

        assert_eq!(config.parameters.mu_max, 0.25);
        assert_eq!(config.parameters.ndays, 4);
        assert_relative_eq!(config.initial_conditions.v, 0.1, epsilon = 1e-12);
        assert_eq!(config.initial_conditions.cglc, 80.0);
    }

    #[test]
    fn test_missing_namespaces_use_defaults() {
        let config = SimulationConfig::from_value(&json!({})).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_malformed_namespace() {
        let err = SimulationConfig::from_value(&json!({ "parameters": [1, 2] })).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_malformed_json() {
        let err = SimulationConfig::from_json_str("{ parameters: ").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_dimension_error_propagates() {
        let err = SimulationConfig::from_value(&json!({
            "parameters": { "Ki_amm": "3 hr" }
        }))
        .unwrap_err();
        assert!(matches!(err, SimulationError::Dimensionality { .. }));
    }
}
