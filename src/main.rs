use anyhow::{Context, Result};
use clap::Parser;
use dynamic_replan::config::{Config, Selection};
use dynamic_replan::simulation::{Scenario, Simulation};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let config = Config::parse();
    config.validate().context("invalid configuration")?;
    init_tracing(&config);

    let scenario = Scenario::generate(&config);
    if !config.quiet {
        println!("Starting replanning simulation...");
        println!(
            "Grid size: {}x{} ({} nodes, spacing {})",
            config.grid_size,
            config.grid_size,
            config.node_count(),
            config.spacing
        );
        println!(
            "Obstacles: {} per wave every {} steps, lasting {} steps",
            config.obstacles_per_wave, config.obstacle_interval, config.obstacle_lifespan
        );
        println!("Scenario seed: {} (for reproducibility)", scenario.seed);
        println!("Start: {}, Goal: {}", scenario.start, scenario.goal);
        println!();
    }

    let kinds = config.algorithm.kinds();
    let reports = Simulation::run_all(&scenario, &kinds).context("simulation failed")?;

    match config.algorithm {
        Selection::All => Simulation::print_comparison_results(&reports),
        Selection::Only(_) => {
            for report in &reports {
                println!("\n=== FINAL RESULTS ===");
                println!(
                    "{}",
                    if report.success {
                        "SUCCESS: Agent reached the goal!"
                    } else {
                        "FAILED: Agent did not reach the goal"
                    }
                );
                println!("{}", report.statistics);

                println!("=== TIMING ANALYSIS ===");
                println!("Total search calls: {}", report.statistics.total_calls());
                println!("Total time in search: {:.2?}", report.statistics.total_search_time());
                if let Some(optimal) = report.statistics.optimal_path_length {
                    let extra = report.statistics.distance_travelled - optimal;
                    println!("Extra distance due to obstacles: {:.2}", extra.max(0.0));
                }
            }
        }
    }
    Ok(())
}
