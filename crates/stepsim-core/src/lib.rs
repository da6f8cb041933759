//! StepSim Core -- a discrete, step-based resource-flow simulator.
//!
//! A directed graph of [`container::Container`]s (typed integer stocks)
//! connected by [`converter::Converter`]s (timed draw -> process -> deliver
//! state machines) is advanced one tick at a time, strictly single-threaded
//! and in a fixed order.
//!
//! # Three-Phase Tick Barrier
//!
//! Each call to [`simulation::Simulation::tick`] runs three phases over all
//! registered converters, each phase in insertion order:
//!
//! 1. **Process** -- converters with a conversion in flight count down.
//! 2. **Draw** -- idle converters try to draw their inputs (all-or-nothing).
//! 3. **Deliver** -- ready converters deliver to their target.
//!
//! Units delivered in phase 3 are never visible to a draw in the same tick.
//!
//! # Key Types
//!
//! - [`container::Containers`] -- arena of containers addressed by
//!   [`id::ContainerId`]; converters hold keys, never the containers.
//! - [`converter::Converter`] -- the per-converter state machine.
//! - [`condition::Condition`] -- parsed `NAME OP VALUE` conditions.
//! - [`simulation::Simulation`] -- ordered converter registry, tick loop,
//!   and the non-mutating lookahead [`simulation::Simulation::estimate_finish`].
//! - [`planner::Planner`] -- backward chaining of resource milestones.
//! - [`dot`] -- Graphviz export of the converter graph.

pub mod condition;
pub mod container;
pub mod converter;
pub mod dot;
pub mod fixed;
pub mod id;
pub mod planner;
pub mod sim;
pub mod simulation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
