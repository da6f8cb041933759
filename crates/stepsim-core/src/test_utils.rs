//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::container::{Container, Containers};
use crate::converter::Converter;
use crate::fixed::Fixed64;
use crate::id::ContainerId;
use crate::simulation::Simulation;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Converter constructors
// ===========================================================================

/// A converter with one source per `(container, units)` pair.
pub fn make_converter(
    name: &str,
    cycle_length: u32,
    sources: &[(ContainerId, u64)],
    target: (ContainerId, u64),
) -> Converter {
    let (&first, rest) = sources.split_first().expect("at least one source");
    let mut converter =
        Converter::new(name, cycle_length, first, target).expect("valid converter");
    for &(id, units) in rest {
        converter.draw_from(id, units);
    }
    converter
}

// ===========================================================================
// Scenarios
// ===========================================================================

/// cashbox (10 EUR) -> buyer (3 EUR per part, 2 processing ticks) -> storage.
pub fn cashbox_scenario() -> Simulation {
    let mut containers = Containers::new();
    let cashbox = containers
        .insert(Container::new("cashbox", "EUR", 10))
        .expect("fresh arena");
    let storage = containers
        .insert(Container::new("storage", "parts", 0))
        .expect("fresh arena");
    let buyer = make_converter("buyer", 2, &[(cashbox, 3)], (storage, 1));
    Simulation::with_converters(containers, [buyer]).expect("valid scenario")
}

/// The cake bakery: five buyers spend the cashbox (in cents) on
/// ingredients, two equivalent dough makers and one oven.
pub fn cake_factory() -> Simulation {
    let mut containers = Containers::new();
    let mut add = |name: &str, kind: &str, stock: u64| {
        containers
            .insert(Container::new(name, kind, stock))
            .expect("unique names")
    };
    let cashbox = add("Cashbox", "cents", 10_000);
    let butter = add("Butter", "gram", 0);
    let sugar = add("Sugar", "gram", 0);
    let eggs = add("Eggs", "eggs", 0);
    let flour = add("Flour", "gram", 0);
    let milk = add("Milk", "ml", 0);
    let dough = add("Dough", "gram", 0);
    let cakes = add("Cakes", "cakes", 0);

    let recipe = [
        (butter, 250),
        (sugar, 50),
        (eggs, 6),
        (flour, 500),
        (milk, 125),
    ];
    let converters = [
        make_converter("Butter Buyer", 1, &[(cashbox, 135)], (butter, 250)),
        make_converter("Sugar Buyer", 1, &[(cashbox, 119)], (sugar, 1000)),
        make_converter("Eggs Buyer", 1, &[(cashbox, 214)], (eggs, 6)),
        make_converter("Flour Buyer", 1, &[(cashbox, 69)], (flour, 1000)),
        make_converter("Milk Buyer", 1, &[(cashbox, 95)], (milk, 1000)),
        make_converter("Dough Maker Slow", 5, &recipe, (dough, 1000)),
        make_converter("Dough Maker Fast", 2, &recipe, (dough, 1000)),
        make_converter("Oven 1", 9, &[(dough, 1000)], (cakes, 1)),
    ];
    Simulation::with_converters(containers, converters).expect("valid scenario")
}

/// `stages` relays in a line: stage0 -> relay 0 -> stage1 -> ... with
/// `stock` units in stage0. Each relay moves one unit per cycle.
pub fn relay_chain(stages: usize, stock: u64, cycle_length: u32) -> Simulation {
    let mut containers = Containers::new();
    let ids: Vec<ContainerId> = (0..=stages)
        .map(|i| {
            let initial = if i == 0 { stock } else { 0 };
            containers
                .insert(Container::new(format!("stage{i}"), "units", initial))
                .expect("unique names")
        })
        .collect();
    let converters: Vec<Converter> = ids
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            make_converter(&format!("relay {i}"), cycle_length, &[(pair[0], 1)], (pair[1], 1))
        })
        .collect();
    Simulation::with_converters(containers, converters).expect("valid scenario")
}

/// Stock of a named container, panicking if it does not exist.
pub fn stock_of(sim: &Simulation, name: &str) -> u64 {
    sim.container(name)
        .unwrap_or_else(|| panic!("no container named {name}"))
        .stock()
}
