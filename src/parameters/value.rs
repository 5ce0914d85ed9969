//! Field values and the unit-validated assignment contract
//!
//! Both parameter structures ([`InputParameters`](super::InputParameters) and
//! [`InitialConditions`](super::InitialConditions)) share one contract:
//!
//! - every field has a compile-time canonical unit (see [`FieldSpec`])
//! - a bare magnitude is stored unchanged
//! - a unit-tagged string is converted to the canonical unit or rejected
//!   with a dimensionality error naming the field and both units
//!
//! After any successful assignment the field holds a canonical magnitude.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SimulationError};
use crate::parameters::units::Quantity;

// =================================================================================================
// Parameter value
// =================================================================================================

/// Value assigned to a field: bare magnitude or unit-tagged expression
///
/// Deserializes untagged, so configuration maps can mix `0.2` and `"0.2 1/hr"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Magnitude already expressed in the canonical unit
    Magnitude(f64),

    /// Unit-tagged expression, e.g. `"4.8 1/day"`
    Quantity(String),
}

impl ParamValue {
    /// Magnitude of this value in `canonical_unit`
    ///
    /// A string holding only a number (`"0.2"`) is read as a bare magnitude.
    pub fn to_canonical(&self, field: &str, canonical_unit: &str) -> Result<f64> {
        match self {
            Self::Magnitude(value) => Ok(*value),
            Self::Quantity(expression) => {
                if let Ok(value) = expression.trim().parse::<f64>() {
                    return Ok(value);
                }
                let quantity = Quantity::parse(expression)?;
                quantity.to(canonical_unit).map_err(|err| match err {
                    SimulationError::Dimensionality { from, to, .. } => {
                        SimulationError::Dimensionality {
                            field: field.to_string(),
                            from,
                            to,
                        }
                    }
                    other => other,
                })
            }
        }
    }

    /// Read a JSON configuration value
    pub fn from_json(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Number(number) => number.as_f64().map(Self::Magnitude).ok_or_else(|| {
                SimulationError::Configuration(format!("{}: number out of range", field))
            }),
            Value::String(expression) => Ok(Self::Quantity(expression.clone())),
            other => Err(SimulationError::Configuration(format!(
                "{}: expected a number or a unit string, found {}",
                field, other
            ))),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Magnitude(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Magnitude(value as f64)
    }
}

impl From<&str> for ParamValue {
    fn from(expression: &str) -> Self {
        Self::Quantity(expression.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(expression: String) -> Self {
        Self::Quantity(expression)
    }
}

// =================================================================================================
// Field table
// =================================================================================================

/// Compile-time description of a structure's fields
pub trait FieldSpec: Copy + Eq + std::fmt::Debug + 'static {
    /// All fields, in declaration order
    const ALL: &'static [Self];

    /// Configuration key
    fn name(self) -> &'static str;

    /// Unit the magnitude is stored in
    fn canonical_unit(self) -> &'static str;

    /// Lookup by configuration key, case-sensitive
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.name() == name)
    }
}

// =================================================================================================
// Unit-validated structures
// =================================================================================================

/// Structure whose fields are assigned through unit validation
pub trait UnitValidated: Default + Sized {
    type Field: FieldSpec;

    /// Structure name used in log messages
    const NAME: &'static str;

    /// Store a canonical magnitude (field-specific range checks apply)
    fn store(&mut self, field: Self::Field, value: f64) -> Result<()>;

    /// Read a canonical magnitude
    fn get(&self, field: Self::Field) -> f64;

    /// Assign a bare or unit-tagged value to `field`
    fn set_field(&mut self, field: Self::Field, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        let magnitude = value.to_canonical(field.name(), field.canonical_unit())?;
        self.store(field, magnitude)
    }

    /// Assign by configuration key
    fn set_field_by_name(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        let field = Self::Field::from_name(name)
            .ok_or_else(|| SimulationError::UnknownField(name.to_string()))?;
        self.set_field(field, value)
    }

    /// Read by configuration key
    fn get_by_name(&self, name: &str) -> Result<f64> {
        Self::Field::from_name(name)
            .map(|field| self.get(field))
            .ok_or_else(|| SimulationError::UnknownField(name.to_string()))
    }

    /// All magnitudes in declaration order
    fn to_vec(&self) -> Vec<f64> {
        Self::Field::ALL.iter().map(|&field| self.get(field)).collect()
    }

    /// Rebuild from magnitudes in declaration order
    fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != Self::Field::ALL.len() {
            return Err(SimulationError::InvalidInput(format!(
                "{} expects {} values, got {}",
                Self::NAME,
                Self::Field::ALL.len(),
                values.len()
            )));
        }
        let mut result = Self::default();
        for (&field, &value) in Self::Field::ALL.iter().zip(values) {
            result.store(field, value)?;
        }
        Ok(result)
    }

    /// Build from a key-value mapping restricted to declared fields
    ///
    /// Unknown keys are dropped, missing keys keep their defaults. Returns
    /// `Ok(None)` for an absent or empty mapping.
    fn from_mapping(mapping: Option<&Map<String, Value>>) -> Result<Option<Self>> {
        let mapping = match mapping {
            Some(mapping) if !mapping.is_empty() => mapping,
            _ => return Ok(None),
        };

        let mut result = Self::default();
        for (key, value) in mapping {
            match Self::Field::from_name(key) {
                Some(field) => result.set_field(field, ParamValue::from_json(key, value)?)?,
                None => log::debug!("{}: ignoring unknown key '{}'", Self::NAME, key),
            }
        }
        Ok(Some(result))
    }

    /// Apply every recognised key of `mapping` in place
    fn update_from_mapping(&mut self, mapping: &Map<String, Value>) -> Result<()> {
        for (key, value) in mapping {
            if let Some(field) = Self::Field::from_name(key) {
                self.set_field(field, ParamValue::from_json(key, value)?)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude_is_unchanged() {
        let value = ParamValue::from(0.25e-9);
        assert_eq!(value.to_canonical("q_glc_max", "mmol/L/hr").unwrap(), 0.25e-9);
    }

    #[test]
    fn test_numeric_string_is_magnitude() {
        let value = ParamValue::from("7.05");
        assert_eq!(value.to_canonical("pH_optimal", "dimensionless").unwrap(), 7.05);
    }

    #[test]
    fn test_dimensionality_error_names_field() {
        let value = ParamValue::from("3 L");
        let err = value.to_canonical("mu_max", "1/hr").unwrap_err();
        match err {
            SimulationError::Dimensionality { field, from, to } => {
                assert_eq!(field, "mu_max");
                assert_eq!(from, "3 L");
                assert_eq!(to, "1/hr");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_untagged_deserialization() {
        let bare: ParamValue = serde_json::from_str("0.2").unwrap();
        let tagged: ParamValue = serde_json::from_str("\"0.2 1/hr\"").unwrap();
        assert_eq!(bare, ParamValue::Magnitude(0.2));
        assert_eq!(tagged, ParamValue::Quantity("0.2 1/hr".to_string()));
    }

    #[test]
    fn test_from_json_rejects_non_scalar() {
        let err = ParamValue::from_json("mu_max", &serde_json::json!([1, 2])).unwrap_err();
        assert!(err.is_configuration());
    }
}
