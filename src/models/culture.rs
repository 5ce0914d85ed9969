//! Fed-batch CHO culture model
//!
//! # Mass balances
//!
//! ```text
//! dXv/dt    = (mu − mu_d − F/V)·Xv
//! dXt/dt    = mu·Xv − K_lys·(Xt − Xv) − F/V·Xt
//! dCglc/dt  = −q_glc·Xv + F·(Cglc_feed − Cglc)/V
//! dCgln/dt  = −q_gln·Xv + F·(Cgln_feed − Cgln)/V
//! dClac/dt  =  q_lac·Xv − F·Clac/V
//! dCamm/dt  =  q_amm·Xv − F·Camm/V
//! dCmab/dt  =  q_mab·Xv − F·Cmab/V − mab_time_decay·Cmab^1.2
//! dCO2/dt   = 0
//! dV/dt     = F
//! dpH/dt    = 0
//! ```
//!
//! Glucose, glutamine, lactate and ammonia are kept from integrating below
//! [`EPSILON`]: once one of them has dropped under the floor its derivative
//! is replaced by `EPSILON`. A concentration sitting exactly on the floor,
//! as lactate does at inoculation, keeps its mass balance.
//!
//! # Example
//!
//! ```rust
//! use cho_rs::models::{CultureModel, Profile};
//! use cho_rs::parameters::{InitialConditions, InputParameters};
//! use cho_rs::physics::PhysicalModel;
//!
//! let model = CultureModel::new(
//!     InputParameters::default(),
//!     InitialConditions::default(),
//!     Profile::constant(0.0),
//!     Profile::constant(36.4),
//! ).unwrap();
//!
//! let y0 = model.setup_initial_state();
//! let dy = model.compute_physics(0.0, &y0);
//! assert_eq!(dy.len(), 10);
//! ```

use nalgebra::DVector;

use crate::error::{Result, SimulationError};
use crate::models::kinetics::{self, ProcessVariables};
use crate::models::profiles::Profile;
use crate::parameters::{InitialConditions, InputParameters, UnitValidated, EPSILON};
use crate::physics::state::{CultureState, StateVariable, PROCESS_DIM, STATE_DIM};
use crate::physics::traits::PhysicalModel;

/// Exponent of the product degradation term
const MAB_DECAY_EXPONENT: f64 = 1.2;

// =================================================================================================
// Right-hand side
// =================================================================================================

/// Derivatives for already-evaluated process variables
fn mass_balance(state: &CultureState, params: &InputParameters, pv: &ProcessVariables) -> DVector<f64> {
    let dilution = pv.f / state.v;

    let mut dy = DVector::zeros(STATE_DIM);
    dy[StateVariable::Xv.index()] = (pv.mu - pv.mu_d - dilution) * state.xv;
    dy[StateVariable::Xt.index()] =
        pv.mu * state.xv - params.k_lys * (state.xt - state.xv) - dilution * state.xt;
    dy[StateVariable::Cglc.index()] =
        -pv.q_glc * state.xv + dilution * (params.cglc_feed - state.cglc);
    dy[StateVariable::Cgln.index()] =
        -pv.q_gln * state.xv + dilution * (params.cgln_feed - state.cgln);
    dy[StateVariable::Clac.index()] = pv.q_lac * state.xv - dilution * state.clac;
    dy[StateVariable::Camm.index()] = pv.q_amm * state.xv - dilution * state.camm;
    dy[StateVariable::Cmab.index()] = pv.q_mab * state.xv
        - dilution * state.cmab
        - params.mab_time_decay * state.cmab.max(0.0).powf(MAB_DECAY_EXPONENT);
    dy[StateVariable::V.index()] = pv.f;

    for variable in StateVariable::ALL {
        if variable.is_floored() && state.get(variable) < EPSILON {
            dy[variable.index()] = EPSILON;
        }
    }

    dy
}

/// Time derivative of the culture state
///
/// # Errors
///
/// `MissingDriver` if either profile is absent.
pub fn rhs(
    t: f64,
    y: &DVector<f64>,
    params: &InputParameters,
    feed: Option<&Profile>,
    temperature: Option<&Profile>,
) -> Result<DVector<f64>> {
    check_state_len(y)?;
    let state = CultureState::from(y);
    let pv = kinetics::state_vars(t, &state, params, feed, temperature)?;
    Ok(mass_balance(&state, params, &pv))
}

/// [`rhs`] with the parameters packed in declaration order
///
/// This is the positional form handed to external solvers; `flat` must come
/// from [`UnitValidated::to_vec`].
pub fn rhs_from_flat(
    t: f64,
    y: &DVector<f64>,
    flat: &[f64],
    feed: Option<&Profile>,
    temperature: Option<&Profile>,
) -> Result<DVector<f64>> {
    let params = InputParameters::from_slice(flat)?;
    rhs(t, y, &params, feed, temperature)
}

fn check_state_len(y: &DVector<f64>) -> Result<()> {
    if y.len() != STATE_DIM {
        return Err(SimulationError::InvalidInput(format!(
            "culture state must have {} entries, got {}",
            STATE_DIM,
            y.len()
        )));
    }
    Ok(())
}

// =================================================================================================
// Culture Model
// =================================================================================================

/// Fed-batch culture with its kinetic parameters and process drivers
///
/// Both drivers are checked at construction, so evaluating the model can no
/// longer fail on a missing profile.
#[derive(Debug, Clone)]
pub struct CultureModel {
    params: InputParameters,
    initial: InitialConditions,
    feed: Profile,
    temperature: Profile,
}

impl CultureModel {
    /// # Errors
    ///
    /// - `MissingDriver` if `feed` or `temperature` is [`Profile::None`]
    /// - `InvalidInput` if the initial conditions cannot start an integration
    pub fn new(
        params: InputParameters,
        initial: InitialConditions,
        feed: Profile,
        temperature: Profile,
    ) -> Result<Self> {
        if !feed.is_present() {
            return Err(SimulationError::MissingDriver("feed"));
        }
        if !temperature.is_present() {
            return Err(SimulationError::MissingDriver("temperature"));
        }
        initial.validate()?;

        Ok(Self { params, initial, feed, temperature })
    }

    pub fn params(&self) -> &InputParameters {
        &self.params
    }

    pub fn initial_conditions(&self) -> &InitialConditions {
        &self.initial
    }

    pub fn feed(&self) -> &Profile {
        &self.feed
    }

    pub fn temperature(&self) -> &Profile {
        &self.temperature
    }

    /// Auxiliary process variables at `(t, y)`
    pub fn process_variables(&self, t: f64, y: &DVector<f64>) -> ProcessVariables {
        let state = CultureState::from(y);
        kinetics::rates(
            &state,
            &self.params,
            self.feed.evaluate(t, state.v),
            self.temperature.evaluate(t, state.v),
        )
    }
}

impl PhysicalModel for CultureModel {
    fn dimension(&self) -> usize {
        STATE_DIM
    }

    fn compute_physics(&self, t: f64, state: &DVector<f64>) -> DVector<f64> {
        let pv = self.process_variables(t, state);
        mass_balance(&CultureState::from(state), &self.params, &pv)
    }

    fn setup_initial_state(&self) -> DVector<f64> {
        self.initial.to_state()
    }

    fn name(&self) -> &str {
        "Fed-batch CHO culture"
    }

    fn description(&self) -> Option<&str> {
        Some("Monod-type growth, death, uptake and production kinetics with feed dilution")
    }

    fn auxiliary_dimension(&self) -> usize {
        PROCESS_DIM
    }

    fn compute_auxiliary(&self, t: f64, state: &DVector<f64>) -> DVector<f64> {
        DVector::from_row_slice(&self.process_variables(t, state).to_array())
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::state::ProcessVariable;
    use approx::assert_relative_eq;

    fn batch_model() -> CultureModel {
        CultureModel::new(
            InputParameters::default(),
            InitialConditions::default(),
            Profile::constant(0.0),
            Profile::constant(36.4),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_drivers_rejected() {
        let err = CultureModel::new(
            InputParameters::default(),
            InitialConditions::default(),
            Profile::None,
            Profile::constant(36.4),
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::MissingDriver("feed")));

        let err = rhs(
            0.0,
            &InitialConditions::default().to_state(),
            &InputParameters::default(),
            Some(&Profile::constant(0.0)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::MissingDriver("temperature")));
    }

    #[test]
    fn test_batch_culture_conserves_volume() {
        let model = batch_model();
        let dy = model.compute_physics(0.0, &model.setup_initial_state());

        assert_eq!(dy[StateVariable::V.index()], 0.0);
        assert_eq!(dy[StateVariable::Coxygen.index()], 0.0);
        assert_eq!(dy[StateVariable::PH.index()], 0.0);
        assert!(dy[StateVariable::Cglc.index()] < 0.0);
        assert!(dy[StateVariable::Cgln.index()] < 0.0);
    }

    #[test]
    fn test_feed_dilutes_and_supplies() {
        let mut params = InputParameters::default();
        params.q_glc_max = 0.0;
        let mut initial = InitialConditions::default();
        initial.cglc = 10.0;

        let model = CultureModel::new(params.clone(), initial.clone(), Profile::constant(0.01), Profile::constant(36.4))
            .unwrap();
        let dy = model.compute_physics(0.0, &model.setup_initial_state());

        let expected = 0.01 * (params.cglc_feed - initial.cglc) / initial.v;
        assert_relative_eq!(dy[StateVariable::Cglc.index()], expected, max_relative = 1e-12);
        assert_eq!(dy[StateVariable::V.index()], 0.01);
    }

    #[test]
    fn test_floor_clamp_below_epsilon() {
        let model = batch_model();
        let mut y = model.setup_initial_state();
        y[StateVariable::Cglc.index()] = 0.0;
        y[StateVariable::Clac.index()] = -1e-9;
        y[StateVariable::Camm.index()] = EPSILON;

        let dy = model.compute_physics(0.0, &y);
        assert_eq!(dy[StateVariable::Cglc.index()], EPSILON);
        assert_eq!(dy[StateVariable::Clac.index()], EPSILON);
        assert!(dy.iter().all(|v| v.is_finite()));

        // On the floor itself the mass balance still applies
        assert!(dy[StateVariable::Camm.index()] > EPSILON);
    }

    #[test]
    fn test_flat_parameters_match_typed() {
        let mut params = InputParameters::default();
        params.mu_max = 0.17;
        params.q_lac_max = 0.2e-9;
        params.y_mab_cell = 2e-9;
        let feed = Profile::constant(0.002);
        let temperature = Profile::constant(35.0);
        let y = InitialConditions::default().to_state();

        let typed = rhs(3.0, &y, &params, Some(&feed), Some(&temperature)).unwrap();
        let flat = rhs_from_flat(3.0, &y, &params.to_vec(), Some(&feed), Some(&temperature)).unwrap();
        assert_eq!(typed, flat);
    }

    #[test]
    fn test_model_matches_free_function() {
        let model = batch_model();
        let y = model.setup_initial_state();
        let free = rhs(1.0, &y, model.params(), Some(model.feed()), Some(model.temperature())).unwrap();
        assert_eq!(model.compute_physics(1.0, &y), free);
    }

    #[test]
    fn test_wrong_state_length() {
        let y = DVector::zeros(3);
        let err = rhs(0.0, &y, &InputParameters::default(), Some(&Profile::constant(0.0)), Some(&Profile::constant(36.4)))
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidInput(_)));
    }

    #[test]
    fn test_auxiliary_channels() {
        let model = batch_model();
        let aux = model.compute_auxiliary(0.0, &model.setup_initial_state());
        assert_eq!(aux.len(), PROCESS_DIM);
        assert_eq!(aux[ProcessVariable::T.index()], 36.4);
        assert_eq!(aux[ProcessVariable::F.index()], 0.0);
        assert!(aux[ProcessVariable::Mu.index()] > 0.0);
    }
}
