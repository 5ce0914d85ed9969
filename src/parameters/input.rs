//! Kinetic parameters of the culture model
//!
//! Defaults follow the CHO kinetics table of "Animal Cell Biotechnology"
//! (Table 3, p. 241), extended with temperature and pH optimum/spread
//! constants.

use std::cmp::Ordering;

use crate::error::{Result, SimulationError};
use crate::parameters::value::{FieldSpec, UnitValidated};

// =================================================================================================
// Field table
// =================================================================================================

/// Declared fields of [`InputParameters`], in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterField {
    MuMax,
    MuDMax,
    MuDMin,
    KGlc,
    KGln,
    KLys,
    KsAmm,
    KiAmm,
    KsGlc,
    KsGln,
    QGlcMax,
    QGlnMax,
    QLacMax,
    MabTimeDecay,
    CglcFeed,
    CglnFeed,
    TOptimal,
    DeltaT,
    PhOptimal,
    DeltaPh,
    YAmmGln,
    YLacGlc,
    YMabCell,
    Ndays,
    Nsamples,
}

impl FieldSpec for ParameterField {
    const ALL: &'static [Self] = &[
        Self::MuMax,
        Self::MuDMax,
        Self::MuDMin,
        Self::KGlc,
        Self::KGln,
        Self::KLys,
        Self::KsAmm,
        Self::KiAmm,
        Self::KsGlc,
        Self::KsGln,
        Self::QGlcMax,
        Self::QGlnMax,
        Self::QLacMax,
        Self::MabTimeDecay,
        Self::CglcFeed,
        Self::CglnFeed,
        Self::TOptimal,
        Self::DeltaT,
        Self::PhOptimal,
        Self::DeltaPh,
        Self::YAmmGln,
        Self::YLacGlc,
        Self::YMabCell,
        Self::Ndays,
        Self::Nsamples,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::MuMax => "mu_max",
            Self::MuDMax => "mu_d_max",
            Self::MuDMin => "mu_d_min",
            Self::KGlc => "k_glc",
            Self::KGln => "k_gln",
            Self::KLys => "K_lys",
            Self::KsAmm => "Ks_amm",
            Self::KiAmm => "Ki_amm",
            Self::KsGlc => "Ks_glc",
            Self::KsGln => "Ks_gln",
            Self::QGlcMax => "q_glc_max",
            Self::QGlnMax => "q_gln_max",
            Self::QLacMax => "q_lac_max",
            Self::MabTimeDecay => "mab_time_decay",
            Self::CglcFeed => "Cglc_feed",
            Self::CglnFeed => "Cgln_feed",
            Self::TOptimal => "T_optimal",
            Self::DeltaT => "delta_T",
            Self::PhOptimal => "pH_optimal",
            Self::DeltaPh => "delta_pH",
            Self::YAmmGln => "Y_amm_gln",
            Self::YLacGlc => "Y_lac_glc",
            Self::YMabCell => "Y_mab_cell",
            Self::Ndays => "Ndays",
            Self::Nsamples => "Nsamples",
        }
    }

    fn canonical_unit(self) -> &'static str {
        match self {
            Self::MuMax | Self::MuDMax | Self::MuDMin | Self::KLys => "1/hr",
            Self::KGlc
            | Self::KGln
            | Self::KsAmm
            | Self::KiAmm
            | Self::KsGlc
            | Self::KsGln
            | Self::CglcFeed
            | Self::CglnFeed => "mmol/L",
            Self::QGlcMax | Self::QGlnMax | Self::QLacMax => "mmol/L/hr",
            Self::MabTimeDecay => "1/(hr*(mmol/L)^.2)",
            Self::TOptimal => "degC",
            Self::DeltaT => "delta_degC",
            Self::PhOptimal
            | Self::DeltaPh
            | Self::YAmmGln
            | Self::YLacGlc
            | Self::YMabCell
            | Self::Ndays
            | Self::Nsamples => "dimensionless",
        }
    }
}

impl ParameterField {
    /// Intrinsic cell-line kinetics, subject to biological variability
    ///
    /// Feed concentrations, temperature/pH setpoints, yields and the
    /// simulation counts are process settings and never perturbed.
    pub fn is_perturbable(self) -> bool {
        self <= Self::MabTimeDecay
    }

    /// Integral count fields
    pub fn is_count(self) -> bool {
        matches!(self, Self::Ndays | Self::Nsamples)
    }
}

// =================================================================================================
// Input parameters
// =================================================================================================

/// Kinetic constants, stored as canonical magnitudes
///
/// # Example
///
/// ```rust
/// use cho_rs::parameters::{InputParameters, ParameterField, UnitValidated};
///
/// let mut params = InputParameters::default();
/// params.set_field(ParameterField::MuMax, "4.8 1/day").unwrap();
/// assert!((params.mu_max - 0.2).abs() < 1e-12);
///
/// // A volume is not a rate
/// assert!(params.set_field_by_name("mu_max", "1 L").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct InputParameters {
    /// Maximum specific growth rate \[1/hr\]
    pub mu_max: f64,
    /// Maximum specific death rate \[1/hr\]
    pub mu_d_max: f64,
    /// Minimum specific death rate \[1/hr\]
    pub mu_d_min: f64,
    /// Glucose uptake half-saturation \[mmol/L\]
    pub k_glc: f64,
    /// Glutamine uptake half-saturation \[mmol/L\]
    pub k_gln: f64,
    /// Lysis rate of dead cells \[1/hr\]
    pub k_lys: f64,
    /// Ammonia saturation constant \[mmol/L\]; the rate laws use `ki_amm`
    pub ks_amm: f64,
    /// Ammonia inhibition constant of growth \[mmol/L\]
    pub ki_amm: f64,
    /// Glucose growth half-saturation \[mmol/L\]
    pub ks_glc: f64,
    /// Glutamine growth half-saturation \[mmol/L\]
    pub ks_gln: f64,
    /// Maximum specific glucose uptake \[mmol/L/hr\] per cell
    pub q_glc_max: f64,
    /// Maximum specific glutamine uptake \[mmol/L/hr\] per cell
    pub q_gln_max: f64,
    /// Lactate uptake rate after the lactate shift \[mmol/L/hr\] per cell
    pub q_lac_max: f64,
    /// Product degradation constant \[1/(hr·(mmol/L)^0.2)\]
    pub mab_time_decay: f64,
    /// Glucose concentration of the feed \[mmol/L\]
    pub cglc_feed: f64,
    /// Glutamine concentration of the feed \[mmol/L\]
    pub cgln_feed: f64,
    /// Optimal growth temperature \[°C\]
    pub t_optimal: f64,
    /// Temperature sensitivity spread \[Δ°C\]
    pub delta_t: f64,
    /// Optimal growth pH
    pub ph_optimal: f64,
    /// pH sensitivity spread
    pub delta_ph: f64,
    /// Ammonia produced per glutamine consumed
    pub y_amm_gln: f64,
    /// Lactate produced per glucose consumed
    pub y_lac_glc: f64,
    /// Specific product formation rate per cell
    pub y_mab_cell: f64,
    /// Simulated culture duration \[days\]
    pub ndays: u32,
    /// Samples drawn per day
    pub nsamples: u32,
}

impl Default for InputParameters {
    fn default() -> Self {
        Self {
            mu_max: 0.20,
            mu_d_max: 0.03,
            mu_d_min: 0.003,
            k_glc: 0.19,
            k_gln: 1.0,
            k_lys: 0.005,
            ks_amm: 10.0,
            ki_amm: 10.0,
            ks_glc: 0.03,
            ks_gln: 0.03,
            q_glc_max: 0.25e-9,
            q_gln_max: 0.085e-9,
            q_lac_max: 0.1e-9,
            mab_time_decay: 1e-3,
            cglc_feed: 150.0,
            cgln_feed: 150.0,
            t_optimal: 36.4,
            delta_t: 1.0,
            ph_optimal: 7.05,
            delta_ph: 0.89,
            y_amm_gln: 2.0,
            y_lac_glc: 2.0,
            y_mab_cell: 1e-9,
            ndays: 12,
            nsamples: 1,
        }
    }
}

/// Validate a count field value
fn to_count(field: ParameterField, value: f64) -> Result<u32> {
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(SimulationError::InvalidInput(format!(
            "{} must be a positive integer, got {}",
            field.name(),
            value
        )));
    }
    Ok(value as u32)
}

impl UnitValidated for InputParameters {
    type Field = ParameterField;

    const NAME: &'static str = "InputParameters";

    fn store(&mut self, field: ParameterField, value: f64) -> Result<()> {
        use ParameterField::*;
        match field {
            MuMax => self.mu_max = value,
            MuDMax => self.mu_d_max = value,
            MuDMin => self.mu_d_min = value,
            KGlc => self.k_glc = value,
            KGln => self.k_gln = value,
            KLys => self.k_lys = value,
            KsAmm => self.ks_amm = value,
            KiAmm => self.ki_amm = value,
            KsGlc => self.ks_glc = value,
            KsGln => self.ks_gln = value,
            QGlcMax => self.q_glc_max = value,
            QGlnMax => self.q_gln_max = value,
            QLacMax => self.q_lac_max = value,
            MabTimeDecay => self.mab_time_decay = value,
            CglcFeed => self.cglc_feed = value,
            CglnFeed => self.cgln_feed = value,
            TOptimal => self.t_optimal = value,
            DeltaT => self.delta_t = value,
            PhOptimal => self.ph_optimal = value,
            DeltaPh => self.delta_ph = value,
            YAmmGln => self.y_amm_gln = value,
            YLacGlc => self.y_lac_glc = value,
            YMabCell => self.y_mab_cell = value,
            Ndays => self.ndays = to_count(field, value)?,
            Nsamples => self.nsamples = to_count(field, value)?,
        }
        Ok(())
    }

    fn get(&self, field: ParameterField) -> f64 {
        use ParameterField::*;
        match field {
            MuMax => self.mu_max,
            MuDMax => self.mu_d_max,
            MuDMin => self.mu_d_min,
            KGlc => self.k_glc,
            KGln => self.k_gln,
            KLys => self.k_lys,
            KsAmm => self.ks_amm,
            KiAmm => self.ki_amm,
            KsGlc => self.ks_glc,
            KsGln => self.ks_gln,
            QGlcMax => self.q_glc_max,
            QGlnMax => self.q_gln_max,
            QLacMax => self.q_lac_max,
            MabTimeDecay => self.mab_time_decay,
            CglcFeed => self.cglc_feed,
            CglnFeed => self.cgln_feed,
            TOptimal => self.t_optimal,
            DeltaT => self.delta_t,
            PhOptimal => self.ph_optimal,
            DeltaPh => self.delta_ph,
            YAmmGln => self.y_amm_gln,
            YLacGlc => self.y_lac_glc,
            YMabCell => self.y_mab_cell,
            Ndays => self.ndays as f64,
            Nsamples => self.nsamples as f64,
        }
    }
}

impl InputParameters {
    /// Fields eligible for biological perturbation
    pub fn perturbable_fields() -> impl Iterator<Item = ParameterField> {
        ParameterField::ALL.iter().copied().filter(|f| f.is_perturbable())
    }

    /// Total simulated time \[hr\]
    pub fn total_hours(&self) -> f64 {
        24.0 * self.ndays as f64
    }

    /// `per_day · Ndays`
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `Ndays` is zero (the fields are public, so the
    /// assignment check can be bypassed) or the product overflows.
    pub fn points_over_campaign(&self, per_day: usize) -> Result<usize> {
        let ndays = to_count(ParameterField::Ndays, self.ndays as f64)?;
        (ndays as usize).checked_mul(per_day).ok_or_else(|| {
            SimulationError::InvalidInput(format!("{} points per day over {} days overflows", per_day, ndays))
        })
    }

    /// Number of observation times, `Ndays · Nsamples + 1`
    ///
    /// # Errors
    ///
    /// `InvalidInput` if either count is zero or the product overflows.
    pub fn sample_count(&self) -> Result<usize> {
        let nsamples = to_count(ParameterField::Nsamples, self.nsamples as f64)?;
        self.points_over_campaign(nsamples as usize)?
            .checked_add(1)
            .ok_or_else(|| SimulationError::InvalidInput("sample count overflows".to_string()))
    }
}

// ====== Total ordering ======
//
// Fields compare lexicographically in declaration order with `f64::total_cmp`,
// so two parameter sets are equal exactly when every magnitude is bit-equal.

impl Ord for InputParameters {
    fn cmp(&self, other: &Self) -> Ordering {
        ParameterField::ALL
            .iter()
            .map(|&field| self.get(field).total_cmp(&other.get(field)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for InputParameters {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for InputParameters {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for InputParameters {}
