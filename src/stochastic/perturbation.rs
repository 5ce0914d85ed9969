//! Multiplicative Gaussian noise and parameter perturbation
//!
//! Biological variability between runs is modelled by scaling every
//! intrinsic kinetic constant by an independent draw from `N(1, σ_rel²)`.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{Result, SimulationError};
use crate::parameters::{InputParameters, UnitValidated};

/// Reject negative or non-finite relative standard deviations
pub(crate) fn check_relative_stddev(rel_stddev: f64) -> Result<()> {
    if !rel_stddev.is_finite() || rel_stddev < 0.0 {
        return Err(SimulationError::Statistical(format!(
            "relative standard deviation must be finite and non-negative, got {}",
            rel_stddev
        )));
    }
    Ok(())
}

/// `value · (1 + σ_rel·z)` with `z ~ N(0, 1)`
///
/// Draws exactly one normal sample from `rng`, also when `rel_stddev` is 0,
/// so the stream position does not depend on the noise level.
///
/// # Errors
///
/// `Statistical` if `rel_stddev` is negative or not finite.
///
/// # Example
///
/// ```rust
/// use cho_rs::stochastic::add_relative_noise;
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(7);
/// assert_eq!(add_relative_noise(3.5, 0.0, &mut rng).unwrap(), 3.5);
/// assert!(add_relative_noise(3.5, -0.1, &mut rng).is_err());
/// ```
pub fn add_relative_noise<R: Rng + ?Sized>(value: f64, rel_stddev: f64, rng: &mut R) -> Result<f64> {
    check_relative_stddev(rel_stddev)?;
    let z: f64 = rng.sample(StandardNormal);
    Ok(value * (1.0 + rel_stddev * z))
}

/// Perturb every perturbable field of `params` in place
///
/// Fields are visited in declaration order, one draw each. Feed
/// concentrations, setpoints, yields and the simulation counts are left
/// untouched.
///
/// # Errors
///
/// `Statistical` if `rel_stddev` is negative; `params` is then unchanged.
pub fn perturb_parameters<R: Rng + ?Sized>(
    params: &mut InputParameters,
    rel_stddev: f64,
    rng: &mut R,
) -> Result<()> {
    check_relative_stddev(rel_stddev)?;

    for field in InputParameters::perturbable_fields() {
        let perturbed = add_relative_noise(params.get(field), rel_stddev, rng)?;
        params.store(field, perturbed)?;
    }
    log::debug!("perturbed kinetic parameters (relative stddev {})", rel_stddev);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{FieldSpec, ParameterField};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_negative_stddev_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = add_relative_noise(1.0, -0.01, &mut rng).unwrap_err();
        assert!(matches!(err, SimulationError::Statistical(_)));
        assert!(add_relative_noise(1.0, f64::NAN, &mut rng).is_err());

        let mut params = InputParameters::default();
        assert!(perturb_parameters(&mut params, -0.05, &mut rng).is_err());
        assert_eq!(params, InputParameters::default());
    }

    #[test]
    fn test_noise_is_reproducible() {
        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..5).map(|_| add_relative_noise(10.0, 0.1, &mut rng).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(draw(42), draw(42));
        assert_ne!(draw(42), draw(43));
    }

    #[test]
    fn test_noise_statistics() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| add_relative_noise(2.0, 0.05, &mut rng).unwrap()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;

        assert!((mean - 2.0).abs() < 0.005, "mean {}", mean);
        assert!((variance.sqrt() - 0.1).abs() < 0.005, "stddev {}", variance.sqrt());
    }

    #[test]
    fn test_only_perturbable_fields_change() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut params = InputParameters::default();
        perturb_parameters(&mut params, 0.05, &mut rng).unwrap();

        let defaults = InputParameters::default();
        for &field in ParameterField::ALL {
            if field.is_perturbable() {
                assert_ne!(params.get(field), defaults.get(field), "{:?}", field);
            } else {
                assert_eq!(params.get(field), defaults.get(field), "{:?}", field);
            }
        }
    }

    #[test]
    fn test_seeded_perturbation_matches_recorded_values() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut params = InputParameters::default();
        perturb_parameters(&mut params, 0.05, &mut rng).unwrap();

        assert_eq!(params.mu_max, 0.19224628066782204);
        assert_eq!(params.mu_d_max, 0.027924867419987388);
        assert_eq!(params.k_glc, 0.19341790105426823);
        assert_eq!(params.ks_amm, 9.435360316806104);
        assert_eq!(params.ki_amm, 10.541023822551523);
        assert_eq!(params.q_glc_max, 2.372402628666005e-10);
        assert_eq!(params.mab_time_decay, 0.0009829954377899358);
        assert_eq!(params.cglc_feed, 150.0);
    }

    #[test]
    fn test_zero_stddev_keeps_values() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut params = InputParameters::default();
        perturb_parameters(&mut params, 0.0, &mut rng).unwrap();
        assert_eq!(params, InputParameters::default());
    }
}
