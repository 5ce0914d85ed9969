//! Integration driver
//!
//! Picks the solver named by the configuration, integrates the scenario and
//! then walks the accepted output points a second time to evaluate the
//! model's auxiliary channels there. Internal steps do not coincide with the
//! output grid, so nothing is reused from the solver's own evaluations.

use nalgebra::DVector;

use crate::error::Result;
use crate::models::{CultureModel, Profile};
use crate::parameters::{InitialConditions, InputParameters};
use crate::solver::grid::TimeGrid;
use crate::solver::methods::{AutoSolver, BdfSolver, DormandPrinceSolver};
use crate::solver::scenario::Scenario;
use crate::solver::traits::{IntegrationMethod, SimulationResult, Solver, SolverConfiguration};

/// Solver implementing `method`
pub fn solver_for(method: IntegrationMethod) -> Box<dyn Solver> {
    match method {
        IntegrationMethod::Bdf => Box::new(BdfSolver::new()),
        IntegrationMethod::DormandPrince => Box::new(DormandPrinceSolver::new()),
        IntegrationMethod::Auto => Box::new(AutoSolver::new()),
    }
}

/// Integrate `scenario` and fill in the auxiliary channels
///
/// A numerical failure is not an `Err`: the returned result carries the
/// truncated trajectory, its auxiliary channels and an unsuccessful
/// [`IntegrationInfo`](crate::solver::IntegrationInfo).
///
/// # Errors
///
/// Whatever the solver reports for an invalid configuration or scenario.
pub fn integrate(scenario: &Scenario, config: &SolverConfiguration) -> Result<SimulationResult> {
    let solver = solver_for(config.method);
    log::debug!(
        "integrating '{}' with {} over [{}, {}] ({} output points, rtol = {:e}, atol = {:e}, max_step = {})",
        scenario.get_model_name(),
        solver.name(),
        scenario.grid.start(),
        scenario.grid.end(),
        scenario.grid.len(),
        config.rtol,
        config.atol,
        config.max_step
    );

    let mut result = solver.solve(scenario, config)?;

    // ====== Auxiliary channels ======

    result.auxiliary = result
        .time_points
        .iter()
        .zip(&result.trajectory)
        .map(|(&t, state)| scenario.model.compute_auxiliary(t, state))
        .collect::<Vec<DVector<f64>>>();

    log::info!(
        "{}: {} ({} steps, {} rejected, {} rhs evaluations, {} method switches)",
        solver.name(),
        result.info.message,
        result.info.n_steps,
        result.info.n_rejected,
        result.info.n_rhs_evals,
        result.info.method_switches.len()
    );

    Ok(result)
}

/// Integrate a culture from explicit parameters and drivers
///
/// Convenience over [`integrate`] for callers that do not hold a
/// [`CultureModel`] yet.
///
/// # Errors
///
/// - `MissingDriver` if a profile is [`Profile::None`]
/// - `InvalidInput` for unusable initial conditions
/// - Configuration errors from the solver
pub fn integrate_culture(
    params: &InputParameters,
    initial: &InitialConditions,
    grid: TimeGrid,
    feed: &Profile,
    temperature: &Profile,
    config: &SolverConfiguration,
) -> Result<SimulationResult> {
    let model = CultureModel::new(params.clone(), initial.clone(), feed.clone(), temperature.clone())?;
    let scenario = Scenario::new(Box::new(model), grid);
    integrate(&scenario, config)
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationError;
    use crate::physics::state::{ProcessVariable, StateVariable, PROCESS_DIM};
    use approx::assert_relative_eq;

    #[test]
    fn test_solver_for_each_method() {
        assert_eq!(solver_for(IntegrationMethod::Bdf).name(), "BDF (orders 1-5)");
        assert_eq!(solver_for(IntegrationMethod::DormandPrince).name(), "Dormand-Prince (RK45)");
        assert_eq!(solver_for(IntegrationMethod::Auto).name(), "Auto (Dormand-Prince/BDF)");
    }

    #[test]
    fn test_batch_culture_two_days() {
        let params = InputParameters::default();
        let initial = InitialConditions::default();
        let grid = TimeGrid::linspace(0.0, 48.0, 97).unwrap();

        let result = integrate_culture(
            &params,
            &initial,
            grid,
            &Profile::constant(0.0),
            &Profile::constant(36.4),
            &SolverConfiguration::auto(),
        )
        .unwrap();

        assert!(result.is_success(), "{}", result.info.message);
        assert_eq!(result.len(), 97);
        assert_eq!(result.auxiliary.len(), 97);
        assert!(result.auxiliary.iter().all(|aux| aux.len() == PROCESS_DIM));

        let temperature = result.auxiliary_series(ProcessVariable::T.index());
        assert!(temperature.iter().all(|&t| t == 36.4));

        // No feed: constant volume, growing culture, glucose consumed
        let final_state = result.final_state().unwrap();
        assert_relative_eq!(final_state[StateVariable::V.index()], initial.v, max_relative = 1e-12);
        assert!(final_state[StateVariable::Xv.index()] > initial.xv);
        assert!(final_state[StateVariable::Cglc.index()] < initial.cglc);
    }

    #[test]
    fn test_auxiliary_recomputed_at_output_points() {
        let grid = TimeGrid::linspace(0.0, 12.0, 13).unwrap();
        let feed = Profile::custom(|t| if t >= 6.0 { 0.001 } else { 0.0 });
        let result = integrate_culture(
            &InputParameters::default(),
            &InitialConditions::default(),
            grid,
            &feed,
            &Profile::constant(36.4),
            &SolverConfiguration::auto(),
        )
        .unwrap();

        let feed_series = result.auxiliary_series(ProcessVariable::F.index());
        for (t, f) in result.time_points.iter().zip(feed_series) {
            assert_eq!(f, if *t >= 6.0 { 0.001 } else { 0.0 });
        }
    }

    #[test]
    fn test_missing_driver_is_configuration_error() {
        let err = integrate_culture(
            &InputParameters::default(),
            &InitialConditions::default(),
            TimeGrid::linspace(0.0, 1.0, 2).unwrap(),
            &Profile::constant(0.0),
            &Profile::None,
            &SolverConfiguration::auto(),
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::MissingDriver("temperature")));
    }

    #[test]
    fn test_failed_run_still_has_auxiliary() {
        let grid = TimeGrid::linspace(0.0, 48.0, 49).unwrap();
        let config = SolverConfiguration::dormand_prince().with_max_step(0.01).with_max_steps(100);
        let result = integrate_culture(
            &InputParameters::default(),
            &InitialConditions::default(),
            grid,
            &Profile::constant(0.0),
            &Profile::constant(36.4),
            &config,
        )
        .unwrap();

        assert!(!result.is_success());
        assert!(result.len() < 49);
        assert_eq!(result.auxiliary.len(), result.len());
    }
}
