//! Output time grid
//!
//! The solver chooses its own internal steps; the grid only says where the
//! trajectory is reported.

use crate::error::{Result, SimulationError};

/// Strictly increasing sequence of output times
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    points: Vec<f64>,
}

impl TimeGrid {
    /// # Errors
    ///
    /// `InvalidInput` if `points` is empty, contains a non-finite value, or
    /// is not strictly increasing.
    pub fn new(points: Vec<f64>) -> Result<Self> {
        if points.is_empty() {
            return Err(SimulationError::InvalidInput("time grid is empty".to_string()));
        }
        if points.iter().any(|t| !t.is_finite()) {
            return Err(SimulationError::InvalidInput(
                "time grid contains a non-finite value".to_string(),
            ));
        }
        if let Some(i) = points.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SimulationError::InvalidInput(format!(
                "time grid must be strictly increasing (t[{}] = {}, t[{}] = {})",
                i,
                points[i],
                i + 1,
                points[i + 1]
            )));
        }
        Ok(Self { points })
    }

    /// `count` evenly spaced points from `start` to `end`, both included
    ///
    /// The last point is exactly `end`.
    pub fn linspace(start: f64, end: f64, count: usize) -> Result<Self> {
        if count < 2 {
            return Err(SimulationError::InvalidInput(format!(
                "linspace needs at least 2 points, got {}",
                count
            )));
        }
        let step = (end - start) / (count - 1) as f64;
        let mut points: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
        points[count - 1] = end;
        Self::new(points)
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn start(&self) -> f64 {
        self.points[0]
    }

    pub fn end(&self) -> f64 {
        self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_endpoints() {
        let grid = TimeGrid::linspace(0.0, 96.0, 4000).unwrap();
        assert_eq!(grid.len(), 4000);
        assert_eq!(grid.start(), 0.0);
        assert_eq!(grid.end(), 96.0);
        assert!(grid.points().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_rejects_non_monotonic() {
        assert!(TimeGrid::new(vec![0.0, 1.0, 1.0]).is_err());
        assert!(TimeGrid::new(vec![0.0, 2.0, 1.0]).is_err());
        assert!(TimeGrid::new(vec![]).is_err());
        assert!(TimeGrid::new(vec![0.0, f64::NAN]).is_err());
        assert!(TimeGrid::linspace(0.0, 1.0, 1).is_err());
        assert!(TimeGrid::linspace(1.0, 1.0, 5).is_err());
    }

    #[test]
    fn test_single_point() {
        let grid = TimeGrid::new(vec![3.0]).unwrap();
        assert_eq!(grid.start(), grid.end());
    }
}
