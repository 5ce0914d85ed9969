//! End-to-end culture simulation
//!
//! [`CultureSimulation`] ties the layers together for one configured culture:
//!
//! ```text
//! SimulationConfig ──► perturb parameters ──► integrate ──► sample ──► Observations
//!                        (seeded ChaCha8)      (Auto)        (same generator)
//! ```
//!
//! The generator is seeded once in [`CultureSimulation::new`] and owned by
//! the simulation, so a seed together with the sequence of calls fixes every
//! draw. Two simulations built from the same inputs produce bit-identical
//! observations.
//!
//! # Example
//!
//! ```rust,no_run
//! use cho_rs::models::Profile;
//! use cho_rs::parameters::SimulationConfig;
//! use cho_rs::simulation::{CultureSimulation, SimulationOptions};
//!
//! fn main() -> cho_rs::Result<()> {
//!     let config = SimulationConfig::from_json_str(r#"{ "parameters": { "Ndays": 6 } }"#)?;
//!     let mut simulation = CultureSimulation::new(
//!         config,
//!         Profile::constant(0.0005),
//!         Profile::temperature_shift(36.4, 32.0, 96.0),
//!         SimulationOptions::default(),
//!     )?;
//!
//!     let observations = simulation.execute(None, 0.05)?;
//!     assert_eq!(observations.len(), 7);
//!     Ok(())
//! }
//! ```

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};

use crate::error::{Result, SimulationError};
use crate::models::Profile;
use crate::parameters::{InitialConditions, InputParameters, SimulationConfig, UnitValidated};
use crate::solver::{integrate_culture, IntegrationMethod, SimulationResult, SolverConfiguration, TimeGrid};
use crate::stochastic::{perturb_parameters, sample_trajectory, Observations};

/// Dense output points per simulated day
pub const POINTS_PER_DAY: usize = 1000;

// =================================================================================================
// Options
// =================================================================================================

/// Run options of a [`CultureSimulation`]
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    /// Seed of the simulation's generator
    pub seed: u64,

    /// Relative standard deviation of the parameter perturbation (default: 0.05)
    pub param_rel_stddev: f64,

    /// Largest internal solver step \[hr\] (default: unlimited)
    pub max_step: f64,

    pub method: IntegrationMethod,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            param_rel_stddev: 0.05,
            max_step: f64::INFINITY,
            method: IntegrationMethod::Auto,
        }
    }
}

impl SimulationOptions {
    /// Builder pattern: set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder pattern: set the parameter perturbation level
    pub fn with_param_rel_stddev(mut self, rel_stddev: f64) -> Self {
        self.param_rel_stddev = rel_stddev;
        self
    }

    /// Builder pattern: set the maximum internal step
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Builder pattern: set the integration method
    pub fn with_method(mut self, method: IntegrationMethod) -> Self {
        self.method = method;
        self
    }

    fn solver_configuration(&self) -> SolverConfiguration {
        SolverConfiguration::new(self.method).with_max_step(self.max_step)
    }
}

/// Seed of replicate `index` in a batch started from `seed`
///
/// SplitMix64 finaliser over `seed ⊕ (index · γ)`. Replicates get
/// decorrelated streams that depend only on `(seed, index)`.
pub fn derive_seed(seed: u64, index: u64) -> u64 {
    const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

    let mut z = (seed ^ index.wrapping_mul(GOLDEN_GAMMA)).wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Output grid of a campaign: `linspace(0, 24·Ndays, 1000·Ndays)`
pub fn campaign_grid(params: &InputParameters) -> Result<TimeGrid> {
    TimeGrid::linspace(0.0, params.total_hours(), params.points_over_campaign(POINTS_PER_DAY)?)
}

// =================================================================================================
// Simulation
// =================================================================================================

/// One configured culture: parameters, initial conditions, drivers and generator
pub struct CultureSimulation {
    /// Parameters as configured, before perturbation
    base_params: InputParameters,
    params: InputParameters,
    initial_conditions: Option<InitialConditions>,
    feed: Profile,
    temperature: Profile,
    options: SimulationOptions,
    rng: ChaCha8Rng,
    full_result: Option<SimulationResult>,
}

impl CultureSimulation {
    /// Build a simulation and perturb its parameters
    ///
    /// Drivers are only checked when the culture is integrated, so a
    /// simulation can be built before its profiles are final.
    ///
    /// # Errors
    ///
    /// `Statistical` if `options.param_rel_stddev` is negative.
    pub fn new(config: SimulationConfig, feed: Profile, temperature: Profile, options: SimulationOptions) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
        let mut params = config.parameters.clone();
        perturb_parameters(&mut params, options.param_rel_stddev, &mut rng)?;

        if config.initial_conditions.xt < config.initial_conditions.xv {
            log::warn!(
                "initial total cell density {:e} is below viable density {:e}",
                config.initial_conditions.xt,
                config.initial_conditions.xv
            );
        }

        Ok(Self {
            base_params: config.parameters,
            params,
            initial_conditions: Some(config.initial_conditions),
            feed,
            temperature,
            options,
            rng,
            full_result: None,
        })
    }

    /// Perturbed parameters used by the next run
    pub fn params(&self) -> &InputParameters {
        &self.params
    }

    /// Mutable access for overrides between runs (e.g. feed concentrations)
    pub fn params_mut(&mut self) -> &mut InputParameters {
        &mut self.params
    }

    pub fn initial_conditions(&self) -> Option<&InitialConditions> {
        self.initial_conditions.as_ref()
    }

    /// Replace the initial conditions; `None` leaves the simulation unable to run
    pub fn set_initial_conditions(&mut self, initial_conditions: Option<InitialConditions>) {
        self.initial_conditions = initial_conditions;
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    /// Dense result of the last run, also kept when that run failed
    pub fn full_result(&self) -> Option<&SimulationResult> {
        self.full_result.as_ref()
    }

    /// Integrate the culture and return noisy sparse observations
    ///
    /// A non-empty `initial_overrides` mapping replaces the initial
    /// conditions before the run (fields it omits take their defaults).
    ///
    /// # Errors
    ///
    /// - `Configuration` if no initial conditions are set
    /// - `MissingDriver` if the feed or temperature profile is absent
    /// - `Dimensionality` / `UnitParse` for invalid overrides
    /// - `Integration` if the solver did not succeed; [`full_result`](Self::full_result)
    ///   then holds the truncated trajectory
    /// - `Statistical` if `sampling_stddev` is negative
    pub fn execute(&mut self, initial_overrides: Option<&Map<String, Value>>, sampling_stddev: f64) -> Result<Observations> {
        if let Some(initial) = InitialConditions::from_mapping(initial_overrides)? {
            self.initial_conditions = Some(initial);
        }
        let initial = self
            .initial_conditions
            .as_ref()
            .ok_or_else(|| SimulationError::Configuration("initial conditions undefined for simulation".to_string()))?;

        let result = run_culture(&self.params, initial, &self.feed, &self.temperature, &self.options)?;
        let result = self.full_result.insert(result);
        if !result.is_success() {
            return Err(SimulationError::Integration { message: result.info.message.clone() });
        }

        sample_trajectory(result, &self.params, sampling_stddev, &mut self.rng)
    }

    /// Run `n` independent replicates of this culture
    ///
    /// Replicate `i` perturbs the configured parameters and samples its
    /// trajectory with its own generator seeded by
    /// [`derive_seed`]`(seed, i)`. The simulation's own generator,
    /// parameters and last result are left untouched. With the `parallel`
    /// feature the replicates run on the rayon pool; the output is the same
    /// in either case.
    ///
    /// # Errors
    ///
    /// `Configuration` if no initial conditions are set. Failures of single
    /// replicates are reported in their slot.
    pub fn run_batch(&self, n: usize, sampling_stddev: f64) -> Result<Vec<Result<Observations>>> {
        let initial = self
            .initial_conditions
            .as_ref()
            .ok_or_else(|| SimulationError::Configuration("initial conditions undefined for simulation".to_string()))?;

        let replicate = |index: usize| -> Result<Observations> {
            let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(self.options.seed, index as u64));
            let mut params = self.base_params.clone();
            perturb_parameters(&mut params, self.options.param_rel_stddev, &mut rng)?;

            let result = run_culture(&params, initial, &self.feed, &self.temperature, &self.options)?;
            if !result.is_success() {
                return Err(SimulationError::Integration { message: result.info.message });
            }
            sample_trajectory(&result, &params, sampling_stddev, &mut rng)
        };

        #[cfg(feature = "parallel")]
        let observations = {
            use rayon::prelude::*;
            (0..n).into_par_iter().map(replicate).collect::<Vec<_>>()
        };

        #[cfg(not(feature = "parallel"))]
        let observations = (0..n).map(replicate).collect::<Vec<_>>();

        let failed = observations.iter().filter(|r| r.is_err()).count();
        log::info!("batch of {} replicates finished, {} failed", n, failed);
        Ok(observations)
    }
}

fn run_culture(
    params: &InputParameters,
    initial: &InitialConditions,
    feed: &Profile,
    temperature: &Profile,
    options: &SimulationOptions,
) -> Result<SimulationResult> {
    let grid = campaign_grid(params)?;
    integrate_culture(params, initial, grid, feed, temperature, &options.solver_configuration())
}

// =================================================================================================
// Tests
// =================================================================================================
