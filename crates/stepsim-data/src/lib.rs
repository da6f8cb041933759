//! Scenario files for StepSim: containers, converters and run settings in
//! RON, TOML or JSON, resolved by name into a [`stepsim_core::simulation::Simulation`].

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, Scenario, build_simulation, load_scenario, run_scenario};
