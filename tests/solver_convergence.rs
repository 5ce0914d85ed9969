//! Convergence tests for numerical solvers
//!
//! These tests verify that the adaptive solvers follow their tolerances:
//! tightening the tolerance shrinks the global error, and stiff problems are
//! handled by the implicit methods in far fewer steps.

use cho_rs::solver::{integrate, AutoSolver, BdfSolver, DormandPrinceSolver, Solver, SolverConfiguration};

mod common;
use common::{create_simple_scenario, relative_error, ExponentialDecay, HarmonicOscillator, ProtheroRobinson};

const TOLERANCES: [f64; 3] = [1e-4, 1e-6, 1e-8];

fn decay_errors(solver: &dyn Solver, method: SolverConfiguration) -> Vec<f64> {
    let decay_rate = 0.3;
    let total_time = 10.0;
    let model = ExponentialDecay::new(3, decay_rate);
    let exact = model.analytical_solution(total_time, 1.0);
    let scenario = create_simple_scenario(Box::new(model), total_time, 11);

    TOLERANCES
        .iter()
        .map(|&rtol| {
            let config = method.clone().with_tolerances(rtol, 1e-14);
            let result = solver.solve(&scenario, &config).unwrap();
            assert!(result.is_success());
            relative_error(result.final_state().unwrap()[0], exact)
        })
        .collect()
}

#[test]
fn test_dormand_prince_error_follows_tolerance() {
    let errors = decay_errors(&DormandPrinceSolver::new(), SolverConfiguration::dormand_prince());

    for (i, (&error, &rtol)) in errors.iter().zip(&TOLERANCES).enumerate() {
        println!("Dormand-Prince rtol {:e}: error {:e}", rtol, error);
        assert!(error < 100.0 * rtol, "error {} too large for rtol {}", error, rtol);
        if i > 0 {
            assert!(error < errors[i - 1]);
        }
    }
}

#[test]
fn test_bdf_error_follows_tolerance() {
    let errors = decay_errors(&BdfSolver::new(), SolverConfiguration::bdf());

    for (i, (&error, &rtol)) in errors.iter().zip(&TOLERANCES).enumerate() {
        println!("BDF rtol {:e}: error {:e}", rtol, error);
        assert!(error < 1000.0 * rtol, "error {} too large for rtol {}", error, rtol);
        if i > 0 {
            assert!(error < errors[i - 1]);
        }
    }
}

#[test]
fn test_oscillator_energy_conserved() {
    let model = HarmonicOscillator::new(2.0);
    let scenario = create_simple_scenario(Box::new(HarmonicOscillator::new(2.0)), 10.0, 201);
    let config = SolverConfiguration::dormand_prince().with_tolerances(1e-10, 1e-12);

    let result = integrate(&scenario, &config).unwrap();

    assert_eq!(result.auxiliary.len(), 201);
    let initial_energy = result.auxiliary[0][0];
    assert!((initial_energy - 2.0).abs() < 1e-12);
    for (t, energy) in result.time_points.iter().zip(result.auxiliary_series(0)) {
        assert!(relative_error(energy, initial_energy) < 1e-6, "energy drift at t = {}", t);
    }

    let x_final = result.final_state().unwrap()[0];
    assert!((x_final - model.analytical_solution(10.0)).abs() < 1e-6);
}

#[test]
fn test_bdf_tracks_prothero_robinson() {
    for stiffness in [1e2, 1e4] {
        let scenario = create_simple_scenario(Box::new(ProtheroRobinson::new(stiffness)), 10.0, 101);
        let config = SolverConfiguration::bdf().with_tolerances(1e-6, 1e-9);

        let result = BdfSolver::new().solve(&scenario, &config).unwrap();

        assert!(result.is_success(), "lambda = {}: {}", stiffness, result.info.message);
        assert_eq!(result.len(), 101);
        for (&t, state) in result.time_points.iter().zip(&result.trajectory) {
            assert!((state[0] - t.cos()).abs() < 1e-4, "lambda = {}, t = {}: {}", stiffness, t, state[0]);
        }
    }
}

#[test]
fn test_stiff_problem_needs_implicit_method() {
    let scenario = create_simple_scenario(Box::new(ProtheroRobinson::new(1e4)), 10.0, 101);
    let config = SolverConfiguration::default().with_tolerances(1e-6, 1e-9);

    let explicit = DormandPrinceSolver::new().solve(&scenario, &config).unwrap();
    let implicit = BdfSolver::new().solve(&scenario, &config).unwrap();
    let auto = AutoSolver::new().solve(&scenario, &config).unwrap();

    for result in [&explicit, &implicit, &auto] {
        assert!(result.is_success(), "{}", result.info.method_used);
        let y_final = result.final_state().unwrap()[0];
        assert!((y_final - 10.0f64.cos()).abs() < 1e-4, "{}: {}", result.info.method_used, y_final);
    }

    println!(
        "steps: Dormand-Prince {}, BDF {}, Auto {}",
        explicit.info.n_steps, implicit.info.n_steps, auto.info.n_steps
    );
    assert!(implicit.info.n_steps * 10 < explicit.info.n_steps);
    assert!(auto.info.n_steps * 5 < explicit.info.n_steps);
    assert_eq!(auto.info.method_used, "BDF");
    assert!(!auto.info.method_switches.is_empty());
}
