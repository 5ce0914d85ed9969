//! Culture state at inoculation

use nalgebra::DVector;

use crate::error::{Result, SimulationError};
use crate::models::chemistry::csat_oxygen;
use crate::parameters::value::{FieldSpec, UnitValidated};
use crate::parameters::EPSILON;
use crate::physics::state::{StateVariable, STATE_DIM};

/// Declared fields of [`InitialConditions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitialField {
    V,
    Xv,
    Xt,
    Cglc,
    Cgln,
    Clac,
    Camm,
    Cmab,
    Coxygen,
    PH,
}

impl FieldSpec for InitialField {
    const ALL: &'static [Self] = &[
        Self::V,
        Self::Xv,
        Self::Xt,
        Self::Cglc,
        Self::Cgln,
        Self::Clac,
        Self::Camm,
        Self::Cmab,
        Self::Coxygen,
        Self::PH,
    ];

    fn name(self) -> &'static str {
        self.state_variable().name()
    }

    fn canonical_unit(self) -> &'static str {
        self.state_variable().unit()
    }
}

impl InitialField {
    /// State channel initialised by this field
    pub fn state_variable(self) -> StateVariable {
        match self {
            Self::V => StateVariable::V,
            Self::Xv => StateVariable::Xv,
            Self::Xt => StateVariable::Xt,
            Self::Cglc => StateVariable::Cglc,
            Self::Cgln => StateVariable::Cgln,
            Self::Clac => StateVariable::Clac,
            Self::Camm => StateVariable::Camm,
            Self::Cmab => StateVariable::Cmab,
            Self::Coxygen => StateVariable::Coxygen,
            Self::PH => StateVariable::PH,
        }
    }
}

/// Initial values of the ten state channels, in canonical units
#[derive(Debug, Clone, PartialEq)]
pub struct InitialConditions {
    /// Culture volume \[L\]
    pub v: f64,
    /// Viable cell density \[cells/L\]
    pub xv: f64,
    /// Total cell density \[cells/L\]
    pub xt: f64,
    pub cglc: f64,
    pub cgln: f64,
    pub clac: f64,
    pub camm: f64,
    /// Product titer \[mg/L\]
    pub cmab: f64,
    pub coxygen: f64,
    pub ph: f64,
}

impl Default for InitialConditions {
    fn default() -> Self {
        Self {
            v: 50.0 / 1000.0,
            xv: 8e9,
            xt: 8e9,
            cglc: 100.0,
            cgln: 100.0,
            clac: EPSILON,
            camm: EPSILON,
            cmab: EPSILON,
            coxygen: csat_oxygen(35.0),
            ph: 7.0,
        }
    }
}

impl UnitValidated for InitialConditions {
    type Field = InitialField;

    const NAME: &'static str = "InitialConditions";

    fn store(&mut self, field: InitialField, value: f64) -> Result<()> {
        let slot = match field {
            InitialField::V => &mut self.v,
            InitialField::Xv => &mut self.xv,
            InitialField::Xt => &mut self.xt,
            InitialField::Cglc => &mut self.cglc,
            InitialField::Cgln => &mut self.cgln,
            InitialField::Clac => &mut self.clac,
            InitialField::Camm => &mut self.camm,
            InitialField::Cmab => &mut self.cmab,
            InitialField::Coxygen => &mut self.coxygen,
            InitialField::PH => &mut self.ph,
        };
        *slot = value;
        Ok(())
    }

    fn get(&self, field: InitialField) -> f64 {
        match field {
            InitialField::V => self.v,
            InitialField::Xv => self.xv,
            InitialField::Xt => self.xt,
            InitialField::Cglc => self.cglc,
            InitialField::Cgln => self.cgln,
            InitialField::Clac => self.clac,
            InitialField::Camm => self.camm,
            InitialField::Cmab => self.cmab,
            InitialField::Coxygen => self.coxygen,
            InitialField::PH => self.ph,
        }
    }
}

impl InitialConditions {
    /// State vector at t = 0, in state order
    pub fn to_state(&self) -> DVector<f64> {
        let mut state = DVector::zeros(STATE_DIM);
        for &field in InitialField::ALL {
            state[field.state_variable().index()] = self.get(field);
        }
        state
    }

    /// Reject values an integration cannot start from
    pub fn validate(&self) -> Result<()> {
        for &field in InitialField::ALL {
            let value = self.get(field);
            if !value.is_finite() || value < 0.0 {
                return Err(SimulationError::InvalidInput(format!(
                    "initial {} must be finite and non-negative, got {}",
                    field.name(),
                    value
                )));
            }
        }
        if self.v <= 0.0 {
            return Err(SimulationError::InvalidInput("initial volume must be positive".into()));
        }
        if self.xt < self.xv {
            log::warn!("initial Xt ({}) is below Xv ({})", self.xt, self.xv);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_defaults_map_to_state_order() {
        let ic = InitialConditions::default();
        let state = ic.to_state();
        assert_eq!(state.len(), STATE_DIM);
        assert_eq!(state[StateVariable::Xv.index()], 8e9);
        assert_eq!(state[StateVariable::V.index()], 0.05);
        assert_eq!(state[StateVariable::PH.index()], 7.0);
        assert!(ic.validate().is_ok());
    }

    #[test]
    fn test_volume_in_millilitres() {
        let mut ic = InitialConditions::default();
        ic.set_field(InitialField::V, "250 mL").unwrap();
        assert_relative_eq!(ic.v, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_cell_density_units() {
        let mut ic = InitialConditions::default();
        ic.set_field_by_name("Xv", "1e6 cells/mL").unwrap();
        assert_relative_eq!(ic.xv, 1e9, epsilon = 1e-3);
        assert!(ic.set_field_by_name("Xv", "5 mmol/L").is_err());
    }

    #[test]
    fn test_from_mapping_shares_keys_with_parameters() {
        let mapping = json!({ "Cglc": "50 mmol/L", "mu_max": 0.3 });
        let ic = InitialConditions::from_mapping(mapping.as_object()).unwrap().unwrap();
        assert_eq!(ic.cglc, 50.0);
        assert_eq!(ic.cgln, 100.0);
    }

    #[test]
    fn test_validate_rejects_negative() {
        let mut ic = InitialConditions::default();
        ic.cglc = -1.0;
        assert!(ic.validate().is_err());
    }
}
