//! Example: Fed-batch CHO culture - feeding strategies
//!
//! Simulates a 12-day CHO antibody campaign under three feeding strategies
//! and a temperature shift, then samples one replicate the way a DOE study
//! would observe it.
//!
//! - Feeds: batch (none), constant 0.5 mL/hr, daily boluses of 10 mL
//! - Temperature: 36.4 °C, shifted to 32 °C on day 5
//! - Solver: Auto (Dormand-Prince / BDF)
//!
//! Results are written as CSV files to the system temp directory.

use cho_rs::{
    models::Profile,
    output::export::{CsvConfig, CsvExporter, CsvMetadata, Exporter},
    parameters::SimulationConfig,
    physics::{ProcessVariable, StateVariable},
    simulation::{CultureSimulation, SimulationOptions},
    solver::{integrate_culture, SolverConfiguration},
};

use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("═══════════════════════════════════════════════════════");
    println!("  Fed-batch CHO Culture - Feeding Strategies");
    println!("═══════════════════════════════════════════════════════\n");

    // ====== Configuration ======

    let config = SimulationConfig::from_json_str(
        r#"{
            "parameters": {
                "Ndays": 12,
                "Nsamples": 2,
                "Cglc_feed": "150 mmol/L",
                "Cgln_feed": "150 mmol/L"
            },
            "initial_conditions": {
                "V": "50 mL",
                "Xv": "8e9 1/L",
                "Xt": "8e9 1/L",
                "Cglc": "100 mmol/L",
                "Cgln": "100 mmol/L"
            }
        }"#,
    )?;
    let params = &config.parameters;
    let initial = &config.initial_conditions;

    println!("Culture:");
    println!("  Duration     : {} days", params.ndays);
    println!("  Volume       : {} L", initial.v);
    println!("  Seeding      : {:e} cells/L", initial.xv);
    println!("  Glucose feed : {} mmol/L\n", params.cglc_feed);

    let temperature = Profile::temperature_shift(36.4, 32.0, 120.0);
    let grid = cho_rs::simulation::campaign_grid(params)?;
    let solver = SolverConfiguration::auto();
    let tmp_dir = std::env::temp_dir();

    // =============================================================================================
    // Feeding strategies
    // =============================================================================================

    let feeds = [
        ("batch", Profile::constant(0.0)),
        ("constant", Profile::constant(0.0005)),
        ("bolus", Profile::bolus(0.01, 10, 24.0)),
    ];

    println!("{:<10} {:>12} {:>12} {:>10} {:>8} {:>9}", "Feed", "Peak Xv", "Titer", "Volume", "Steps", "Time (s)");
    println!("{:-<66}", "");

    let exporter = CsvExporter::default();

    for (name, feed) in &feeds {
        let started = Instant::now();
        let result = integrate_culture(params, initial, grid.clone(), feed, &temperature, &solver)?;
        let elapsed = started.elapsed().as_secs_f64();

        if !result.is_success() {
            println!("{:<10} failed: {}", name, result.info.message);
            continue;
        }

        let peak_xv = result
            .state_series(StateVariable::Xv.index())
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        let final_state = result.final_state().ok_or("empty trajectory")?;

        println!(
            "{:<10} {:>12.3e} {:>12.2} {:>10.4} {:>8} {:>9.2}",
            name,
            peak_xv,
            final_state[StateVariable::Cmab.index()],
            final_state[StateVariable::V.index()],
            result.info.n_steps,
            elapsed
        );

        let path = tmp_dir.join(format!("cho_{}.csv", name));
        exporter.export_trajectory(&result, Some(289), &path)?;
    }

    // =============================================================================================
    // Sampled replicate
    // =============================================================================================

    println!("\n═══════════════════════════════════════════════════════");
    println!("  Sampled Replicate (seed 42, 5% noise)");
    println!("═══════════════════════════════════════════════════════\n");

    let mut simulation = CultureSimulation::new(
        config.clone(),
        Profile::constant(0.0005),
        temperature.clone(),
        SimulationOptions::default().with_seed(42),
    )?;
    let observations = simulation.execute(None, 0.05)?;

    println!("{:>8} {:>12} {:>10} {:>10} {:>12}", "t (hr)", "Xv (1/L)", "Cglc", "Cmab", "Osmolarity");
    println!("{:-<56}", "");
    let times = observations.times();
    let xv = observations.channel("Xv").unwrap_or(&[]);
    let glucose = observations.channel("Cglc").unwrap_or(&[]);
    let titer = observations.channel("Cmab").unwrap_or(&[]);
    let osmolarity = observations.channel("Osmolarity").unwrap_or(&[]);
    for i in 0..observations.len() {
        println!(
            "{:>8.1} {:>12.3e} {:>10.2} {:>10.2} {:>12.1}",
            times[i], xv[i], glucose[i], titer[i], osmolarity[i]
        );
    }

    if let Some(full) = simulation.full_result() {
        let mu = full.auxiliary_series(ProcessVariable::Mu.index());
        let mu_max = mu.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        println!("\nMaximum specific growth rate: {:.4} 1/hr", mu_max);
        println!("Method switches: {:?}", full.info.method_switches);

        let mut metadata = CsvMetadata::from_result("Fed-batch CHO culture", full);
        metadata.seed = Some(42);
        metadata.add_custom("Feed", "constant 0.5 mL/hr");
        metadata.add_custom("Temperature", "36.4 degC, 32 degC from 120 hr");
        let path = tmp_dir.join("cho_samples.csv");
        CsvExporter::new(CsvConfig::default().with_metadata(metadata)).export_observations(&observations, &path)?;
        println!("\nObservations written to {:?}", path);
    }

    Ok(())
}
