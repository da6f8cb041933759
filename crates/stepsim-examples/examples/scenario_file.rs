//! Load a scenario from a RON, TOML or JSON file and run it with the stop
//! rules the file declares.
//!
//! Run with: `cargo run -p stepsim-examples --example scenario_file -- [path]`
//!
//! Without a path, the bundled `data/making_cakes.ron` is used.

use std::error::Error;
use std::path::PathBuf;
use stepsim_data::{Scenario, load_scenario, run_scenario};

fn init_logging() {
    let target = if std::env::var("STEPSIM_LOG_STDOUT").is_ok_and(|v| v == "1") {
        env_logger::Target::Stdout
    } else {
        env_logger::Target::Stderr
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(target)
        .format_timestamp(None)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let path = std::env::args_os().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/making_cakes.ron")
    });

    let Scenario {
        mut simulation,
        run,
    } = load_scenario(&path)?;
    let ticks = run_scenario(&mut simulation, &run)?;

    println!("Ran {ticks} steps of {}", path.display());
    for (_, container) in simulation.registered_containers() {
        println!("  {container}");
    }
    for converter in simulation.converters() {
        println!(
            "  {}: {} delivered",
            converter.name(),
            converter.delivered_total()
        );
    }
    Ok(())
}
