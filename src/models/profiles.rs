//! External driver profiles: feed rate and temperature over time
//!
//! The culture model does not own its process schedule. The caller supplies
//! two profiles:
//!
//! - **feed**: volumetric feed rate F(t) \[L/hr\], optionally volume-aware
//! - **temperature**: culture temperature T(t) \[°C\]
//!
//! # Example
//!
//! ```rust
//! use cho_rs::models::Profile;
//!
//! // 1 mL/hr on day 0, 2 mL/hr from day 1 on
//! let feed = Profile::daily_schedule(vec![0.001, 0.002]);
//! assert_eq!(feed.evaluate(10.0, 0.05), 0.001);
//! assert_eq!(feed.evaluate(100.0, 0.05), 0.002);
//!
//! // Production phase at 34 °C after 48 hours
//! let temperature = Profile::temperature_shift(36.5, 34.0, 48.0);
//! assert_eq!(temperature.evaluate(47.9, 0.05), 36.5);
//! assert_eq!(temperature.evaluate(48.0, 0.05), 34.0);
//! ```

use std::sync::Arc;

use crate::error::{Result, SimulationError};

/// Working volume of the bioreactor vessel \[L\]
pub const VESSEL_VOLUME: f64 = 0.25;

/// Sharpness of the tent functions approximating bolus pulses \[1/hr\]
const BOLUS_SHARPNESS: f64 = 10.0;

/// Time profile of an external process driver
///
/// # Types
///
/// - **Constant**: fixed value
/// - **Piecewise**: step function over breakpoints (daily feed plans, temperature shifts)
/// - **Bolus**: train of narrow pulses delivering a fixed volume each
/// - **Custom** / **CustomWithVolume**: user-defined functions
/// - **None**: absent driver
#[derive(Default)]
pub enum Profile {
    /// Constant value
    Constant(f64),

    /// Piecewise-constant value
    ///
    /// `values[i]` applies on `[breakpoints[i], breakpoints[i + 1])`; the
    /// first value also applies before the first breakpoint and the last one
    /// is held forever.
    Piecewise {
        breakpoints: Vec<f64>,
        values: Vec<f64>,
    },

    /// Bolus feeding
    ///
    /// # Parameters
    ///
    /// - `size` : volume delivered per bolus \[L\]
    /// - `count` : number of boluses
    /// - `frequency` : period between boluses \[hr\], first bolus at `frequency`
    ///
    /// # Formula
    ///
    /// ```text
    /// F(t) = size · Σᵢ N · max(0, 1 - |N (t - (i+1)·frequency)|)     N = 10 /hr
    /// ```
    ///
    /// Each tent integrates to exactly `size`. Feeding stops once the culture
    /// fills the vessel.
    Bolus {
        size: f64,
        count: usize,
        frequency: f64,
    },

    /// Custom time-only profile
    Custom(Arc<dyn Fn(f64) -> f64 + Send + Sync>),

    /// Custom profile depending on time and culture volume
    CustomWithVolume(Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>),

    /// No driver supplied
    #[default]
    None,
}

// ==================== Manual Clone Implementation ====================

impl Clone for Profile {
    fn clone(&self) -> Self {
        match self {
            Self::Constant(value) => Self::Constant(*value),
            Self::Piecewise { breakpoints, values } => Self::Piecewise {
                breakpoints: breakpoints.clone(),
                values: values.clone(),
            },
            Self::Bolus { size, count, frequency } => Self::Bolus {
                size: *size,
                count: *count,
                frequency: *frequency,
            },
            Self::Custom(f) => Self::Custom(Arc::clone(f)),
            Self::CustomWithVolume(f) => Self::CustomWithVolume(Arc::clone(f)),
            Self::None => Self::None,
        }
    }
}

// ==================== Manual Debug Implementation ====================

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Piecewise { breakpoints, values } => f
                .debug_struct("Piecewise")
                .field("breakpoints", breakpoints)
                .field("values", values)
                .finish(),
            Self::Bolus { size, count, frequency } => f
                .debug_struct("Bolus")
                .field("size", size)
                .field("count", count)
                .field("frequency", frequency)
                .finish(),
            Self::Custom(_) => f
                .debug_struct("Custom")
                .field("function", &"<user-defined>")
                .finish(),
            Self::CustomWithVolume(_) => f
                .debug_struct("CustomWithVolume")
                .field("function", &"<user-defined>")
                .finish(),
            Self::None => f.debug_struct("None").finish(),
        }
    }
}

// ==================== Implementation ====================

impl Profile {
    /// Constant profile
    pub fn constant(value: f64) -> Self {
        Self::Constant(value)
    }

    /// Piecewise-constant profile over increasing breakpoints
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the vectors are empty, differ in length, or the
    /// breakpoints are not strictly increasing.
    pub fn piecewise(breakpoints: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() || breakpoints.len() != values.len() {
            return Err(SimulationError::InvalidInput(format!(
                "piecewise profile needs one value per breakpoint ({} breakpoints, {} values)",
                breakpoints.len(),
                values.len()
            )));
        }
        if breakpoints.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(SimulationError::InvalidInput(
                "piecewise breakpoints must be strictly increasing".to_string(),
            ));
        }
        Ok(Self::Piecewise { breakpoints, values })
    }

    /// One value per 24-hour window starting at t = 0, last value held
    pub fn daily_schedule(values: Vec<f64>) -> Self {
        let breakpoints = (0..values.len()).map(|day| 24.0 * day as f64).collect();
        Self::Piecewise { breakpoints, values }
    }

    /// `initial` before `shift_time`, `shifted` from `shift_time` on
    pub fn temperature_shift(initial: f64, shifted: f64, shift_time: f64) -> Self {
        if shift_time <= 0.0 {
            return Self::Constant(shifted);
        }
        Self::Piecewise {
            breakpoints: vec![0.0, shift_time],
            values: vec![initial, shifted],
        }
    }

    /// Train of `count` boluses of `size` litres every `frequency` hours
    pub fn bolus(size: f64, count: usize, frequency: f64) -> Self {
        Self::Bolus { size, count, frequency }
    }

    /// Time-only user function
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Time-and-volume user function
    pub fn custom_with_volume<F>(f: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        Self::CustomWithVolume(Arc::new(f))
    }

    /// True unless this is [`Profile::None`]
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Evaluate at elapsed time `t` \[hr\] and culture volume `volume` \[L\]
    ///
    /// `Profile::None` evaluates to 0.
    pub fn evaluate(&self, t: f64, volume: f64) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Piecewise { breakpoints, values } => {
                if values.is_empty() {
                    return 0.0;
                }
                let index = breakpoints.partition_point(|&b| b <= t);
                values[index.saturating_sub(1).min(values.len() - 1)]
            }
            Self::Bolus { size, count, frequency } => {
                if volume <= 0.0 || volume > VESSEL_VOLUME {
                    return 0.0;
                }
                let pulses: f64 = (0..*count)
                    .map(|i| {
                        let center = (i + 1) as f64 * frequency;
                        BOLUS_SHARPNESS * (1.0 - (BOLUS_SHARPNESS * (t - center)).abs()).max(0.0)
                    })
                    .sum();
                size * pulses
            }
            Self::Custom(f) => f(t),
            Self::CustomWithVolume(f) => f(t, volume),
            Self::None => 0.0,
        }
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant() {
        let profile = Profile::constant(36.4);
        assert_eq!(profile.evaluate(0.0, 0.05), 36.4);
        assert_eq!(profile.evaluate(1e3, 0.05), 36.4);
        assert!(profile.is_present());
    }

    #[test]
    fn test_daily_schedule_holds_last_value() {
        let profile = Profile::daily_schedule(vec![0.0, 0.001, 0.003]);
        assert_eq!(profile.evaluate(0.0, 0.1), 0.0);
        assert_eq!(profile.evaluate(23.99, 0.1), 0.0);
        assert_eq!(profile.evaluate(24.0, 0.1), 0.001);
        assert_eq!(profile.evaluate(50.0, 0.1), 0.003);
        assert_eq!(profile.evaluate(500.0, 0.1), 0.003);
    }

    #[test]
    fn test_piecewise_before_first_breakpoint() {
        let profile = Profile::piecewise(vec![10.0, 20.0], vec![1.0, 2.0]).unwrap();
        assert_eq!(profile.evaluate(0.0, 0.1), 1.0);
        assert_eq!(profile.evaluate(15.0, 0.1), 1.0);
        assert_eq!(profile.evaluate(25.0, 0.1), 2.0);
    }

    #[test]
    fn test_piecewise_validation() {
        assert!(Profile::piecewise(vec![], vec![]).is_err());
        assert!(Profile::piecewise(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(Profile::piecewise(vec![1.0, 1.0], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_temperature_shift() {
        let profile = Profile::temperature_shift(37.0, 33.0, 72.0);
        assert_eq!(profile.evaluate(71.0, 0.1), 37.0);
        assert_eq!(profile.evaluate(72.0, 0.1), 33.0);

        let immediate = Profile::temperature_shift(37.0, 33.0, 0.0);
        assert_eq!(immediate.evaluate(0.0, 0.1), 33.0);
    }

    #[test]
    fn test_bolus_delivers_size_per_pulse() {
        let profile = Profile::bolus(0.03, 2, 24.0);

        // Peak at the bolus time, zero between pulses
        assert_relative_eq!(profile.evaluate(24.0, 0.1), 0.03 * BOLUS_SHARPNESS);
        assert_eq!(profile.evaluate(30.0, 0.1), 0.0);

        // Trapezoidal integral over both pulses
        let dt = 1e-3;
        let steps = (60.0 / dt) as usize;
        let delivered: f64 = (0..steps)
            .map(|i| profile.evaluate(i as f64 * dt, 0.1) * dt)
            .sum();
        assert_relative_eq!(delivered, 0.06, epsilon = 1e-4);
    }

    #[test]
    fn test_bolus_stops_when_vessel_full() {
        let profile = Profile::bolus(0.03, 1, 24.0);
        assert_eq!(profile.evaluate(24.0, VESSEL_VOLUME + 0.01), 0.0);
        assert_eq!(profile.evaluate(24.0, 0.0), 0.0);
    }

    #[test]
    fn test_custom_profiles() {
        let ramp = Profile::custom(|t| 0.001 * t);
        assert_relative_eq!(ramp.evaluate(10.0, 0.1), 0.01);

        let volume_limited = Profile::custom_with_volume(|_t, v| if v < 0.2 { 0.002 } else { 0.0 });
        assert_eq!(volume_limited.evaluate(0.0, 0.1), 0.002);
        assert_eq!(volume_limited.evaluate(0.0, 0.3), 0.0);

        let cloned = ramp.clone();
        assert_eq!(cloned.evaluate(5.0, 0.1), ramp.evaluate(5.0, 0.1));
    }

    #[test]
    fn test_none_is_absent() {
        let profile = Profile::default();
        assert!(!profile.is_present());
        assert_eq!(format!("{:?}", profile), "None");
    }
}
