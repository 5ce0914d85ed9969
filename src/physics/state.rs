//! Culture state layout
//!
//! The integrator works on a flat `DVector<f64>` of ten entries. This module
//! fixes the order of those entries and gives them names and units:
//!
//! | index | channel   | unit       |
//! |-------|-----------|------------|
//! | 0     | `Xv`      | cells/L    |
//! | 1     | `Xt`      | cells/L    |
//! | 2     | `Cglc`    | mmol/L     |
//! | 3     | `Cgln`    | mmol/L     |
//! | 4     | `Clac`    | mmol/L     |
//! | 5     | `Camm`    | mmol/L     |
//! | 6     | `Cmab`    | mg/L       |
//! | 7     | `Coxygen` | mmol/L     |
//! | 8     | `V`       | L          |
//! | 9     | `pH`      | -          |
//!
//! Auxiliary process variables (feed rate, temperature, specific rates,
//! osmolarity) are recomputed at output points and use [`ProcessVariable`].

use nalgebra::DVector;

/// Number of state channels
pub const STATE_DIM: usize = 10;

/// Number of auxiliary process variables
pub const PROCESS_DIM: usize = 10;

// =================================================================================================
// State channels
// =================================================================================================

/// Integrated state channel (type-safe index into the state vector)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateVariable {
    /// Viable cell density
    Xv,
    /// Total cell density (viable + dead, not yet lysed)
    Xt,
    /// Glucose
    Cglc,
    /// Glutamine
    Cgln,
    /// Lactate
    Clac,
    /// Ammonia
    Camm,
    /// Antibody titer
    Cmab,
    /// Dissolved oxygen
    Coxygen,
    /// Culture volume
    V,
    /// Culture pH (held constant)
    PH,
}

impl StateVariable {
    pub const ALL: [StateVariable; STATE_DIM] = [
        Self::Xv,
        Self::Xt,
        Self::Cglc,
        Self::Cgln,
        Self::Clac,
        Self::Camm,
        Self::Cmab,
        Self::Coxygen,
        Self::V,
        Self::PH,
    ];

    /// Position in the state vector
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Xv => "Xv",
            Self::Xt => "Xt",
            Self::Cglc => "Cglc",
            Self::Cgln => "Cgln",
            Self::Clac => "Clac",
            Self::Camm => "Camm",
            Self::Cmab => "Cmab",
            Self::Coxygen => "Coxygen",
            Self::V => "V",
            Self::PH => "pH",
        }
    }

    /// Canonical unit
    pub fn unit(self) -> &'static str {
        match self {
            Self::Xv | Self::Xt => "1/L",
            Self::Cglc | Self::Cgln | Self::Clac | Self::Camm | Self::Coxygen => "mmol/L",
            Self::Cmab => "mg/L",
            Self::V => "L",
            Self::PH => "dimensionless",
        }
    }

    /// Concentrations protected by the near-zero derivative floor
    pub fn is_floored(self) -> bool {
        matches!(self, Self::Cglc | Self::Cgln | Self::Clac | Self::Camm)
    }
}

// =================================================================================================
// Process variables
// =================================================================================================

/// Auxiliary process variable, recomputed at each output point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcessVariable {
    /// Feed rate \[L/hr\]
    F,
    /// Temperature \[°C\]
    T,
    /// Specific growth rate \[1/hr\]
    Mu,
    /// Specific death rate \[1/hr\]
    MuD,
    QGlc,
    QGln,
    QLac,
    QAmm,
    QMab,
    /// Bulk osmolarity \[mOsm/L\]
    Osmolarity,
}

impl ProcessVariable {
    pub const ALL: [ProcessVariable; PROCESS_DIM] = [
        Self::F,
        Self::T,
        Self::Mu,
        Self::MuD,
        Self::QGlc,
        Self::QGln,
        Self::QLac,
        Self::QAmm,
        Self::QMab,
        Self::Osmolarity,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::F => "F",
            Self::T => "T",
            Self::Mu => "mu",
            Self::MuD => "mu_d",
            Self::QGlc => "q_glc",
            Self::QGln => "q_gln",
            Self::QLac => "q_lac",
            Self::QAmm => "q_amm",
            Self::QMab => "q_mab",
            Self::Osmolarity => "Osmolarity",
        }
    }

    /// Canonical unit
    pub fn unit(self) -> &'static str {
        match self {
            Self::F => "L/hr",
            Self::T => "degC",
            Self::Mu | Self::MuD => "1/hr",
            Self::QGlc | Self::QGln | Self::QLac | Self::QAmm => "mmol/cell/hr",
            Self::QMab => "mg/cell/hr",
            Self::Osmolarity => "mOsm/L",
        }
    }
}

// =================================================================================================
// Typed view
// =================================================================================================

/// Named view of one state vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CultureState {
    pub xv: f64,
    pub xt: f64,
    pub cglc: f64,
    pub cgln: f64,
    pub clac: f64,
    pub camm: f64,
    pub cmab: f64,
    pub coxygen: f64,
    pub v: f64,
    pub ph: f64,
}

impl CultureState {
    /// Read the first ten entries of `state`
    ///
    /// # Panics
    ///
    /// If `state` holds fewer than ten entries.
    pub fn from_slice(state: &[f64]) -> Self {
        Self {
            xv: state[0],
            xt: state[1],
            cglc: state[2],
            cgln: state[3],
            clac: state[4],
            camm: state[5],
            cmab: state[6],
            coxygen: state[7],
            v: state[8],
            ph: state[9],
        }
    }

    pub fn get(&self, variable: StateVariable) -> f64 {
        match variable {
            StateVariable::Xv => self.xv,
            StateVariable::Xt => self.xt,
            StateVariable::Cglc => self.cglc,
            StateVariable::Cgln => self.cgln,
            StateVariable::Clac => self.clac,
            StateVariable::Camm => self.camm,
            StateVariable::Cmab => self.cmab,
            StateVariable::Coxygen => self.coxygen,
            StateVariable::V => self.v,
            StateVariable::PH => self.ph,
        }
    }

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_iterator(STATE_DIM, StateVariable::ALL.iter().map(|&v| self.get(v)))
    }
}

impl From<&DVector<f64>> for CultureState {
    fn from(state: &DVector<f64>) -> Self {
        Self::from_slice(state.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_declaration_order() {
        for (i, variable) in StateVariable::ALL.iter().enumerate() {
            assert_eq!(variable.index(), i);
        }
        for (i, variable) in ProcessVariable::ALL.iter().enumerate() {
            assert_eq!(variable.index(), i);
        }
    }

    #[test]
    fn test_culture_state_vector_round_trip() {
        let vector = DVector::from_iterator(STATE_DIM, (0..STATE_DIM).map(|i| i as f64 + 0.5));
        let state = CultureState::from(&vector);
        assert_eq!(state.cmab, 6.5);
        assert_eq!(state.ph, 9.5);
        assert_eq!(state.to_vector(), vector);
    }

    #[test]
    fn test_floored_channels() {
        let floored: Vec<_> = StateVariable::ALL.iter().filter(|v| v.is_floored()).collect();
        assert_eq!(floored.len(), 4);
        assert!(!StateVariable::Cmab.is_floored());
    }
}
