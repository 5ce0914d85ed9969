//! Kinetic rate-law engine
//!
//! Maps the instantaneous culture state, the kinetic parameters and the two
//! external drivers (feed rate, temperature) to the ten auxiliary process
//! variables: feed rate, temperature, specific growth and death rates,
//! specific uptake/production rates and osmolarity.
//!
//! # Rate laws
//!
//! ```text
//! Osm   = φ_glc·Cglc + φ_gln·Cgln + φ_lac·Clac + φ_amm·Camm
//!
//! mu    = mu_max · M(Cglc, Ks_glc) · M(Cgln, Ks_gln) · Ki_amm/(Camm + Ki_amm)
//!               · G(T, T_opt, ΔT) · G(pH, pH_opt, ΔpH)
//!
//! mu_d  = mu_d_min + mu_d_max · Ks_glc/(Cglc + Ks_glc) · Ks_gln/(Cgln + Ks_gln)
//!                             · Camm/(Camm + Ki_amm)
//!
//! q_glc = q_glc_max · M(Cglc, k_glc) · (mu/(mu + mu_max) + 0.5)
//! q_gln = q_gln_max · M(Cgln, k_gln)
//! q_lac = Y_lac_glc · Cglc/(Clac + ε) · q_glc − [Cglc < 0.5] · q_lac_max
//! q_amm = Y_amm_gln · q_gln
//! q_mab = Y_mab_cell · exp(−max(0, Osm − 320)/(400 − 320))
//!         ÷ 100 when Cglc < 1, Cgln < 0.05 or Camm > Ki_amm
//! ```
//!
//! with `M(C, K) = C/(C + K)` and `G(x, x0, s) = exp(−(x − x0)²/s²)`.
//!
//! Every function here is pure: the solver calls them inside stage and
//! Jacobian evaluations, and once more per reported output point.

use crate::error::{Result, SimulationError};
use crate::models::chemistry::{molar_to_molal, Species};
use crate::models::profiles::Profile;
use crate::parameters::{InputParameters, EPSILON};
use crate::physics::state::{CultureState, ProcessVariable, PROCESS_DIM};

/// Glucose level below which cells start consuming lactate \[mmol/L\]
pub const LACTATE_SHIFT_GLUCOSE: f64 = 0.5;

/// Osmolality of an isotonic medium \[mOsm/kg\]
pub const ISOTONIC_OSMOLALITY: f64 = 320.0;

/// Osmolality at which product formation has dropped by 1/e \[mOsm/kg\]
pub const CRITICAL_OSMOLALITY: f64 = 400.0;

/// Glucose level below which product formation is throttled \[mmol/L\]
pub const PRODUCT_GLUCOSE_LIMIT: f64 = 1.0;

/// Glutamine level below which product formation is throttled \[mmol/L\]
pub const PRODUCT_GLUTAMINE_LIMIT: f64 = 0.05;

/// Throttling divisor for product formation under nutrient or ammonia stress
pub const PRODUCT_STRESS_DIVISOR: f64 = 100.0;

/// Medium density used for the molar to molal conversion \[kg/L\]
const MEDIUM_DENSITY: f64 = 1.0;

// =================================================================================================
// Elementary factors
// =================================================================================================

/// Gaussian sensitivity `exp(-(x - optimum)² / spread²)`
///
/// Exactly 1 at the optimum, strictly decreasing on both sides. Used for the
/// temperature and pH dependence of the growth rate.
pub fn gaussian_decay(x: f64, optimum: f64, spread: f64) -> f64 {
    let deviation = (x - optimum) / spread;
    (-(deviation * deviation)).exp()
}

/// Monod saturation `C / (C + K)`
pub fn monod(concentration: f64, half_saturation: f64) -> f64 {
    concentration / (concentration + half_saturation)
}

/// Bulk osmolarity \[mOsm/L\] from the dissolved substrates and metabolites
pub fn osmolarity(state: &CultureState) -> f64 {
    state.cglc * Species::GLUCOSE.phi
        + state.cgln * Species::GLUTAMINE.phi
        + state.clac * Species::LACTATE.phi
        + state.camm * Species::AMMONIA.phi
}

/// Product-formation penalty for hyperosmotic media
pub fn osmolarity_dependence(osmolarity: f64) -> f64 {
    let osmolality = molar_to_molal(osmolarity, MEDIUM_DENSITY);
    (-(osmolality - ISOTONIC_OSMOLALITY).max(0.0) / (CRITICAL_OSMOLALITY - ISOTONIC_OSMOLALITY))
        .exp()
}

// =================================================================================================
// Process variables
// =================================================================================================

/// Auxiliary process variables at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessVariables {
    /// Feed rate \[L/hr\]
    pub f: f64,
    /// Temperature \[°C\]
    pub t: f64,
    pub mu: f64,
    pub mu_d: f64,
    pub q_glc: f64,
    pub q_gln: f64,
    pub q_lac: f64,
    pub q_amm: f64,
    pub q_mab: f64,
    pub osmolarity: f64,
}

impl ProcessVariables {
    pub fn get(&self, variable: ProcessVariable) -> f64 {
        match variable {
            ProcessVariable::F => self.f,
            ProcessVariable::T => self.t,
            ProcessVariable::Mu => self.mu,
            ProcessVariable::MuD => self.mu_d,
            ProcessVariable::QGlc => self.q_glc,
            ProcessVariable::QGln => self.q_gln,
            ProcessVariable::QLac => self.q_lac,
            ProcessVariable::QAmm => self.q_amm,
            ProcessVariable::QMab => self.q_mab,
            ProcessVariable::Osmolarity => self.osmolarity,
        }
    }

    /// Values in [`ProcessVariable::ALL`] order
    pub fn to_array(&self) -> [f64; PROCESS_DIM] {
        ProcessVariable::ALL.map(|variable| self.get(variable))
    }
}

// =================================================================================================
// Rate laws
// =================================================================================================

/// Rate laws for an already-evaluated feed rate and temperature
pub fn rates(
    state: &CultureState,
    params: &InputParameters,
    feed_rate: f64,
    temperature: f64,
) -> ProcessVariables {
    let osmolarity = osmolarity(state);

    // ====== Growth and death ======

    let mu = params.mu_max
        * monod(state.cglc, params.ks_glc)
        * monod(state.cgln, params.ks_gln)
        * params.ki_amm / (state.camm + params.ki_amm)
        * gaussian_decay(temperature, params.t_optimal, params.delta_t)
        * gaussian_decay(state.ph, params.ph_optimal, params.delta_ph);

    let mu_d = params.mu_d_min
        + params.mu_d_max
            * params.ks_glc / (state.cglc + params.ks_glc)
            * params.ks_gln / (state.cgln + params.ks_gln)
            * state.camm / (state.camm + params.ki_amm);

    // ====== Substrate uptake ======

    // Uptake persists at zero growth through the 0.5 floor
    let q_glc = params.q_glc_max * monod(state.cglc, params.k_glc) * (mu / (mu + params.mu_max) + 0.5);
    let q_gln = params.q_gln_max * monod(state.cgln, params.k_gln);

    // ====== Metabolite production ======

    let lactate_uptake = if state.cglc < LACTATE_SHIFT_GLUCOSE {
        params.q_lac_max
    } else {
        0.0
    };
    let q_lac = params.y_lac_glc * state.cglc / (state.clac.max(0.0) + EPSILON) * q_glc - lactate_uptake;
    let q_amm = params.y_amm_gln * q_gln;

    // ====== Product formation ======

    let mut q_mab = params.y_mab_cell * osmolarity_dependence(osmolarity);
    if state.cglc < PRODUCT_GLUCOSE_LIMIT
        || state.cgln < PRODUCT_GLUTAMINE_LIMIT
        || state.camm > params.ki_amm
    {
        q_mab /= PRODUCT_STRESS_DIVISOR;
    }

    ProcessVariables {
        f: feed_rate,
        t: temperature,
        mu,
        mu_d,
        q_glc,
        q_gln,
        q_lac,
        q_amm,
        q_mab,
        osmolarity,
    }
}

/// Auxiliary process variables at time `t`
///
/// Evaluates the feed profile at `(t, V)` and the temperature profile at `t`,
/// then applies the rate laws.
///
/// # Errors
///
/// `MissingDriver` if either profile is absent (`None` or [`Profile::None`]).
pub fn state_vars(
    t: f64,
    state: &CultureState,
    params: &InputParameters,
    feed: Option<&Profile>,
    temperature: Option<&Profile>,
) -> Result<ProcessVariables> {
    let feed = feed
        .filter(|profile| profile.is_present())
        .ok_or(SimulationError::MissingDriver("feed"))?;
    let temperature = temperature
        .filter(|profile| profile.is_present())
        .ok_or(SimulationError::MissingDriver("temperature"))?;

    Ok(rates(
        state,
        params,
        feed.evaluate(t, state.v),
        temperature.evaluate(t, state.v),
    ))
}

// =================================================================================================
// Tests
// =================================================================================================
