//! Making cakes: five buyers spend a cashbox on ingredients, two dough
//! makers of different speed compete for them, and an oven bakes cakes.
//!
//! Plans the milestones for ten cakes, predicts when they will be done, runs
//! until they are, and writes the graph to `making_cakes.dot`.
//!
//! Run with: `cargo run -p stepsim-examples --example making_cakes`
//!
//! Set `RUST_LOG=debug` for more verbose output, `STEPSIM_LOG_STDOUT=1` to
//! log to stdout instead of stderr, and `STEPSIM_DELAY_MS` to pace the ticks.

use std::error::Error;
use std::time::Duration;
use stepsim_core::container::{Container, Containers};
use stepsim_core::converter::Converter;
use stepsim_core::dot::{DotOptions, save_dot};
use stepsim_core::fixed::fixed64_to_f64;
use stepsim_core::simulation::Simulation;

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

    // --- Containers. Money is counted in cents. ---

    let mut containers = Containers::new();
    let cashbox = containers.insert(Container::new("Cashbox", "cents", 10_000))?;
    let butter = containers.insert(Container::new("Butter", "gram", 0))?;
    let sugar = containers.insert(Container::new("Sugar", "gram", 0))?;
    let eggs = containers.insert(Container::new("Eggs", "eggs", 0))?;
    let flour = containers.insert(Container::new("Flour", "gram", 0))?;
    let milk = containers.insert(Container::new("Milk", "ml", 0))?;
    let dough = containers.insert(Container::new("Dough", "gram", 0))?;
    let cakes = containers.insert(Container::new("Cakes", "cakes", 0))?;

    // --- Buyers ---

    let buyers = [
        Converter::new("Butter Buyer", 1, (cashbox, 135), (butter, 250))?,
        Converter::new("Sugar Buyer", 1, (cashbox, 119), (sugar, 1000))?,
        Converter::new("Eggs Buyer", 1, (cashbox, 214), (eggs, 6))?,
        Converter::new("Flour Buyer", 1, (cashbox, 69), (flour, 1000))?,
        Converter::new("Milk Buyer", 1, (cashbox, 95), (milk, 1000))?,
    ];

    // --- Dough makers and the oven ---

    let mut dough_maker_slow = Converter::new("Dough Maker Slow", 5, (butter, 250), (dough, 1000))?;
    dough_maker_slow
        .draw_from(sugar, 50)
        .draw_from(eggs, 6)
        .draw_from(flour, 500)
        .draw_from(milk, 125);

    let mut dough_maker_fast = Converter::new("Dough Maker Fast", 2, (butter, 250), (dough, 1000))?;
    dough_maker_fast
        .draw_from(sugar, 50)
        .draw_from(eggs, 6)
        .draw_from(flour, 500)
        .draw_from(milk, 125);

    let oven = Converter::new("Oven 1", 9, (dough, 1000), (cakes, 1))?;

    let mut sim = Simulation::with_converters(containers, buyers)?;
    sim.add_converter(dough_maker_slow)?;
    sim.add_converter(dough_maker_fast)?;
    sim.add_converter(oven)?;
    println!("{sim}");

    // --- Plan ---

    let goal = "Cakes == 10";
    let milestones = sim.milestones(goal)?;
    println!("\nMilestones for '{goal}':");
    for (i, milestone) in milestones.iter().enumerate() {
        let entries: Vec<String> = milestone
            .entries()
            .iter()
            .map(|&(id, required)| {
                format!(
                    "{} {:.0}",
                    sim.containers().name_of(id),
                    fixed64_to_f64(required)
                )
            })
            .collect();
        println!("  {}. {}", i + 1, entries.join(", "));
    }

    let estimate = sim.estimate_finish(goal, 10_000)?;
    println!("\nEstimated to finish after {estimate} steps.\n");

    // --- Run ---

    let delay = std::env::var("STEPSIM_DELAY_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis);
    sim.run(
        |s| s.container("Cakes").is_some_and(|c| c.stock() == 10),
        delay,
    );

    println!("\nProgress towards each milestone:");
    for (i, milestone) in milestones.iter().enumerate() {
        println!(
            "  {}. {:.1}%",
            i + 1,
            fixed64_to_f64(milestone.total_percent(sim.containers()))
        );
    }

    save_dot(&sim, "making_cakes.dot", &DotOptions::default())?;
    println!("\nGraph written to making_cakes.dot");
    Ok(())
}
