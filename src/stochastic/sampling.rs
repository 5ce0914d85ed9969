//! Sparse noisy observations of a dense trajectory
//!
//! A simulated campaign is observed `Nsamples` times per day over `Ndays`
//! days, both endpoints included. Each observed channel carries the same
//! multiplicative Gaussian measurement noise, except elapsed time and culture
//! volume, which are noise-free. Every reported value, those two included, is
//! floored at [`EPSILON`]: the first observation time reads `EPSILON`, not 0.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::parameters::{InputParameters, EPSILON};
use crate::physics::state::{ProcessVariable, StateVariable};
use crate::solver::SimulationResult;
use crate::stochastic::perturbation::{add_relative_noise, check_relative_stddev};

/// Name of the elapsed-time channel
pub const TIME_CHANNEL: &str = "time";

// =================================================================================================
// Channels
// =================================================================================================

/// Source of one observed channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSource {
    Time,
    State(StateVariable),
    Process(ProcessVariable),
}

/// Observed channel: its reported name and where the value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub name: &'static str,
    pub source: ChannelSource,
}

impl Channel {
    const fn state(variable: StateVariable, name: &'static str) -> Self {
        Self { name, source: ChannelSource::State(variable) }
    }

    /// Recorded without measurement noise
    pub fn is_exact(&self) -> bool {
        matches!(self.source, ChannelSource::Time | ChannelSource::State(StateVariable::V))
    }
}

/// Observed channels, in reporting order
pub const CHANNELS: [Channel; 11] = [
    Channel { name: TIME_CHANNEL, source: ChannelSource::Time },
    Channel::state(StateVariable::Xv, "Xv"),
    Channel::state(StateVariable::Xt, "Xt"),
    Channel::state(StateVariable::Cglc, "Cglc"),
    Channel::state(StateVariable::Cgln, "Cgln"),
    Channel::state(StateVariable::Clac, "Clac"),
    Channel::state(StateVariable::Camm, "Camm"),
    Channel::state(StateVariable::Cmab, "Cmab"),
    Channel::state(StateVariable::V, "V"),
    Channel::state(StateVariable::PH, "pH"),
    Channel { name: "Osmolarity", source: ChannelSource::Process(ProcessVariable::Osmolarity) },
];

// =================================================================================================
// Observations
// =================================================================================================

/// Sampled channels, each holding one value per sampling time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observations {
    channels: BTreeMap<String, Vec<f64>>,
}

impl Observations {
    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(Vec::as_slice)
    }

    /// Sampling times \[hr\]
    pub fn times(&self) -> &[f64] {
        self.channel(TIME_CHANNEL).unwrap_or(&[])
    }

    /// Number of sampling times
    pub fn len(&self) -> usize {
        self.times().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.channels.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<f64>> {
        self.channels
    }
}

impl From<BTreeMap<String, Vec<f64>>> for Observations {
    fn from(channels: BTreeMap<String, Vec<f64>>) -> Self {
        Self { channels }
    }
}

// =================================================================================================
// Sampling
// =================================================================================================

/// `count` evenly spaced indices into `0..n_points`, both ends included
///
/// Positions `i·(n − 1)/(count − 1)` are rounded half to even. With
/// `count == 1` only index 0 is returned.
pub fn sample_indices(n_points: usize, count: usize) -> Vec<usize> {
    if n_points == 0 || count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![0];
    }
    let last = (n_points - 1) as f64;
    let step = last / (count - 1) as f64;
    (0..count)
        .map(|i| {
            let position = if i == count - 1 { last } else { i as f64 * step };
            position.round_ties_even() as usize
        })
        .collect()
}

/// Observe `result` at `Ndays × Nsamples + 1` evenly spaced output points
///
/// `result.auxiliary` must be filled (see [`integrate`](crate::solver::integrate)).
///
/// # Errors
///
/// - `Statistical` if `sampling_stddev` is negative
/// - `InvalidInput` if the result is empty or has no auxiliary channels
///
/// # Example
///
/// ```rust,ignore
/// let mut rng = ChaCha8Rng::seed_from_u64(0);
/// let observations = sample_trajectory(&result, &params, 0.05, &mut rng)?;
/// assert_eq!(observations.len(), (params.ndays * params.nsamples + 1) as usize);
/// ```
pub fn sample_trajectory<R: Rng + ?Sized>(
    result: &SimulationResult,
    params: &InputParameters,
    sampling_stddev: f64,
    rng: &mut R,
) -> Result<Observations> {
    check_relative_stddev(sampling_stddev)?;
    if result.is_empty() {
        return Err(SimulationError::InvalidInput("cannot sample an empty trajectory".to_string()));
    }
    if result.auxiliary.len() != result.len() {
        return Err(SimulationError::InvalidInput(format!(
            "auxiliary channels cover {} of {} output points",
            result.auxiliary.len(),
            result.len()
        )));
    }

    let count = params.sample_count()?;
    let indices = sample_indices(result.len(), count);

    let mut channels = BTreeMap::new();
    for channel in &CHANNELS {
        let mut values = Vec::with_capacity(indices.len());
        for &i in &indices {
            let exact = match channel.source {
                ChannelSource::Time => result.time_points[i],
                ChannelSource::State(variable) => result.trajectory[i][variable.index()],
                ChannelSource::Process(variable) => result.auxiliary[i][variable.index()],
            };
            let observed = if channel.is_exact() {
                exact
            } else {
                add_relative_noise(exact, sampling_stddev, rng)?
            };
            values.push(observed.max(EPSILON));
        }
        channels.insert(channel.name.to_string(), values);
    }

    Ok(Observations { channels })
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
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Synthetic result: state entry `k` at point `i` is `i + k`, auxiliary `-i`
    fn synthetic_result(n: usize) -> SimulationResult {
        let times: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
        let states = (0..n)
            .map(|i| DVector::from_fn(STATE_DIM, |k, _| i as f64 + k as f64))
            .collect();
        let mut result = SimulationResult::new(times, states, IntegrationInfo::default());
        result.auxiliary = (0..n).map(|i| DVector::from_element(PROCESS_DIM, -(i as f64))).collect();
        result
    }

    fn params(ndays: u32, nsamples: u32) -> InputParameters {
        InputParameters { ndays, nsamples, ..InputParameters::default() }
    }

    #[test]
    fn test_sample_indices_include_endpoints() {
        let indices = sample_indices(12_000, 13);
        assert_eq!(indices.len(), 13);
        assert_eq!(indices[0], 0);
        assert_eq!(indices[12], 11_999);
        assert!(indices.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(indices[1], 1000);
    }

    #[test]
    fn test_sample_indices_round_half_to_even() {
        // positions 0, 2.5, 5
        assert_eq!(sample_indices(6, 3), vec![0, 2, 5]);
        // positions 0, 1.5, 3
        assert_eq!(sample_indices(4, 3), vec![0, 2, 3]);
        assert_eq!(sample_indices(10, 1), vec![0]);
        assert!(sample_indices(0, 5).is_empty());
    }

    #[test]
    fn test_noise_free_sampling_is_exact() {
        let result = synthetic_result(101);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let observations = sample_trajectory(&result, &params(4, 1), 0.0, &mut rng).unwrap();

        assert_eq!(observations.len(), 5);
        assert_eq!(observations.channel_names().count(), CHANNELS.len());
        // Time is noise-free but floored like every channel
        assert_eq!(observations.times(), &[EPSILON, 12.5, 25.0, 37.5, 50.0]);

        let xt = observations.channel("Xt").unwrap();
        assert_eq!(xt, &[1.0, 26.0, 51.0, 76.0, 101.0]);

        // Auxiliary osmolarity is negative here and floored
        let osmolarity = observations.channel("Osmolarity").unwrap();
        assert!(osmolarity.iter().all(|&v| v == EPSILON));

        // Xv is 0 at the first point
        assert_eq!(observations.channel("Xv").unwrap()[0], EPSILON);
    }

    #[test]
    fn test_noise_spares_exact_channels() {
        let result = synthetic_result(49);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let noisy = sample_trajectory(&result, &params(2, 2), 0.1, &mut rng).unwrap();
        let exact = sample_trajectory(&result, &params(2, 2), 0.0, &mut rng).unwrap();

        assert_eq!(noisy.len(), 5);
        assert_eq!(noisy.times(), exact.times());
        assert_eq!(noisy.channel("V"), exact.channel("V"));
        for name in ["Xt", "Cglc", "Cmab", "pH"] {
            let a = noisy.channel(name).unwrap();
            let b = exact.channel(name).unwrap();
            assert!(a.iter().zip(b).all(|(x, y)| x != y), "{}", name);
        }
    }

    #[test]
    fn test_same_seed_same_observations() {
        let result = synthetic_result(49);
        let sample = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            sample_trajectory(&result, &params(2, 1), 0.05, &mut rng).unwrap()
        };
        assert_eq!(sample(11), sample(11));
        assert_ne!(sample(11), sample(12));
    }

    #[test]
    fn test_seeded_observations_match_recorded_values() {
        let result = synthetic_result(101);
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let observations = sample_trajectory(&result, &params(2, 2), 0.05, &mut rng).unwrap();

        assert_eq!(observations.times(), &[EPSILON, 12.5, 25.0, 37.5, 50.0]);
        assert_eq!(
            observations.channel("Xv").unwrap(),
            &[EPSILON, 26.730288669524317, 51.09857806772856, 80.67135739160562, 101.85952669776131]
        );
        assert_eq!(
            observations.channel("Cglc").unwrap(),
            &[2.1697859500347474, 28.01896754117439, 54.5525395173192, 76.4722880118916, 105.10311836940829]
        );
        assert_eq!(
            observations.channel("Cmab").unwrap(),
            &[6.051607061923455, 30.409413057762542, 57.31970878035551, 82.35107736343245, 108.62231423589135]
        );
        assert_eq!(observations.channel("V").unwrap(), &[8.0, 33.0, 58.0, 83.0, 108.0]);
    }

    #[test]
    fn test_invalid_inputs() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let result = synthetic_result(10);
        let err = sample_trajectory(&result, &params(1, 1), -0.1, &mut rng).unwrap_err();
        assert!(matches!(err, SimulationError::Statistical(_)));

        let mut missing_aux = synthetic_result(10);
        missing_aux.auxiliary.clear();
        assert!(sample_trajectory(&missing_aux, &params(1, 1), 0.0, &mut rng).is_err());

        let empty = SimulationResult::new(Vec::new(), Vec::new(), IntegrationInfo::default());
        assert!(sample_trajectory(&empty, &params(1, 1), 0.0, &mut rng).is_err());

        // Counts assigned directly, past the unit-validated setter
        let err = sample_trajectory(&result, &params(1, 0), 0.0, &mut rng).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidInput(_)));
        assert!(sample_trajectory(&result, &params(0, 1), 0.0, &mut rng).is_err());
    }

    #[test]
    fn test_observations_serialize_as_plain_map() {
        let result = synthetic_result(3);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let observations = sample_trajectory(&result, &params(1, 1), 0.0, &mut rng).unwrap();

        let json = serde_json::to_value(&observations).unwrap();
        assert_eq!(json["time"], serde_json::json!([EPSILON, 1.0]));
        let back: Observations = serde_json::from_value(json).unwrap();
        assert_eq!(back, observations);
    }
}
