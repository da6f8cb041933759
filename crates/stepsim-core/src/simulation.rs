//! The simulation: owns the container arena and an ordered set of
//! converters, and advances them under a three-phase barrier.
//!
//! # Architecture
//!
//! The `Simulation` owns:
//! - A [`Containers`] arena (every container converters may reference)
//! - Converters keyed by name, plus their insertion order
//! - A derived container registry, rebuilt whenever converters change
//! - The tick counter
//!
//! # Three-Phase Tick
//!
//! Each `tick()` runs, every phase over all converters in insertion order:
//! 1. **Process** -- in-flight conversions count down
//! 2. **Draw** -- converters that did not process try to draw
//! 3. **Deliver** -- converters that neither processed nor drew try to deliver
//!
//! Stock delivered in phase 3 first becomes drawable on the next tick.

use crate::condition::{Condition, ConditionError};
use crate::container::{Container, ContainerError, Containers};
use crate::converter::{Converter, ConverterError, DrawOutcome};
use crate::fixed::Ticks;
use crate::id::ContainerId;
use crate::planner::{Milestone, Planner, PlannerError};
use crate::sim::{StateHash, TickReport};
use log::{Level, debug, log};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by simulation operations. Resource shortfalls are never
/// errors; they show up in [`TickReport`] and on the converter.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("unknown container '{0}'")]
    UnknownContainer(String),
    #[error("converter '{0}' references a container outside this simulation")]
    UnknownContainerId(String),
    #[error("unknown converter '{0}'")]
    UnknownConverter(String),
    #[error("a converter named '{0}' is already registered")]
    DuplicateConverter(String),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Condition(#[from] ConditionError),
    #[error(transparent)]
    Converter(#[from] ConverterError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Simulation {
    containers: Containers,

    /// Registered converters, keyed by name.
    converters: HashMap<String, Converter>,

    /// Insertion order of converter names. Source of all determinism.
    converter_order: Vec<String>,

    /// Containers reachable from registered converters, first-seen order.
    registry: Vec<ContainerId>,

    /// Name lookup over `registry`.
    registry_by_name: HashMap<String, ContainerId>,

    tick_count: Ticks,

    /// Set on forks made for lookahead. Their tick and converter events log
    /// at trace level so they cannot be mistaken for the live run.
    lookahead: bool,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a simulation from an arena and converters registered in order.
    pub fn with_converters(
        containers: Containers,
        converters: impl IntoIterator<Item = Converter>,
    ) -> Result<Self, SimError> {
        let mut sim = Self {
            containers,
            ..Self::default()
        };
        for converter in converters {
            sim.add_converter(converter)?;
        }
        Ok(sim)
    }

    // -----------------------------------------------------------------------
    // Containers
    // -----------------------------------------------------------------------

    pub fn add_container(&mut self, container: Container) -> Result<ContainerId, SimError> {
        Ok(self.containers.insert(container)?)
    }

    pub fn containers(&self) -> &Containers {
        &self.containers
    }

    /// Mutable access to the arena, e.g. to top up a stock between ticks.
    pub fn containers_mut(&mut self) -> &mut Containers {
        &mut self.containers
    }

    /// Look up any container in the arena by name.
    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers
            .by_name(name)
            .and_then(|id| self.containers.get(id))
    }

    /// Containers reachable from registered converters, in registry order.
    pub fn registered_containers(&self) -> impl Iterator<Item = (ContainerId, &Container)> {
        self.registry
            .iter()
            .filter_map(move |&id| self.containers.get(id).map(|c| (id, c)))
    }

    // -----------------------------------------------------------------------
    // Converter management
    // -----------------------------------------------------------------------

    /// Register a converter. Every container it references must live in this
    /// simulation's arena, and its name must not already be registered.
    pub fn add_converter(&mut self, converter: Converter) -> Result<(), SimError> {
        if self.converters.contains_key(converter.name()) {
            return Err(SimError::DuplicateConverter(converter.name().to_string()));
        }
        if !converter.containers().all(|id| self.containers.contains(id)) {
            return Err(SimError::UnknownContainerId(converter.name().to_string()));
        }

        debug!("adding converter '{}' to simulation", converter.name());
        let name = converter.name().to_string();
        self.converters.insert(name.clone(), converter);
        self.converter_order.push(name);
        self.rebuild_container_registry();
        Ok(())
    }

    /// Unregister a converter, reverting any conversion in flight so drawn
    /// units return to their sources. Returns `None` if not registered.
    pub fn remove_converter(&mut self, name: &str) -> Option<Converter> {
        let Some(mut converter) = self.converters.remove(name) else {
            debug!("'{name}' not found, nothing removed");
            return None;
        };
        debug!("removing converter '{name}' from simulation");
        converter.revert(&mut self.containers);
        self.converter_order.retain(|n| n != name);
        self.rebuild_container_registry();
        Some(converter)
    }

    pub fn converter(&self, name: &str) -> Option<&Converter> {
        self.converters.get(name)
    }

    /// Registered converters in insertion order.
    pub fn converters(&self) -> impl Iterator<Item = &Converter> {
        self.converter_order
            .iter()
            .filter_map(move |name| self.converters.get(name))
    }

    pub fn converter_count(&self) -> usize {
        self.converter_order.len()
    }

    pub fn set_throttle(&mut self, name: &str, max: Option<u64>) -> Result<(), SimError> {
        let converter = self
            .converters
            .get_mut(name)
            .ok_or_else(|| SimError::UnknownConverter(name.to_string()))?;
        converter.set_throttle(max);
        Ok(())
    }

    pub fn set_temporary_cycle_length(
        &mut self,
        name: &str,
        value: u32,
        duration: u32,
    ) -> Result<(), SimError> {
        let converter = self
            .converters
            .get_mut(name)
            .ok_or_else(|| SimError::UnknownConverter(name.to_string()))?;
        Ok(converter.set_temporary_cycle_length(value, duration)?)
    }

    /// Recompute the container registry in one pass over insertion order:
    /// each converter's unseen sources, then its target.
    fn rebuild_container_registry(&mut self) {
        self.registry.clear();
        self.registry_by_name.clear();
        let mut seen = HashSet::new();

        for name in &self.converter_order {
            let Some(converter) = self.converters.get(name) else {
                continue;
            };
            for id in converter.containers() {
                if seen.insert(id) {
                    self.registry.push(id);
                    self.registry_by_name
                        .insert(self.containers.name_of(id).to_string(), id);
                }
            }
        }

        debug!(
            "current containers: {:?}",
            self.registry
                .iter()
                .map(|&id| self.containers.name_of(id))
                .collect::<Vec<_>>()
        );
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    pub fn tick_count(&self) -> Ticks {
        self.tick_count
    }

    /// Whether this simulation is a lookahead fork.
    pub fn is_lookahead(&self) -> bool {
        self.lookahead
    }

    fn level(&self, level: Level) -> Level {
        if self.lookahead { Level::Trace } else { level }
    }

    /// Advance one tick through the process, draw and deliver phases.
    pub fn tick(&mut self) -> TickReport {
        let level = self.level(Level::Info);
        let Self {
            containers,
            converters,
            converter_order,
            tick_count,
            ..
        } = self;

        let mut report = TickReport {
            tick: *tick_count + 1,
            ..TickReport::default()
        };
        log!(level, "--- Step {} ---", report.tick);

        let mut acted = vec![false; converter_order.len()];

        // Phase 1: Process.
        for (i, name) in converter_order.iter().enumerate() {
            let Some(converter) = converters.get_mut(name) else {
                continue;
            };
            if converter.process_phase() {
                acted[i] = true;
                report.processed += 1;
            }
        }

        // Phase 2: Draw.
        for (i, name) in converter_order.iter().enumerate() {
            if acted[i] {
                continue;
            }
            let Some(converter) = converters.get_mut(name) else {
                continue;
            };
            let outcome = converter.draw_phase(containers);
            match outcome {
                DrawOutcome::Drawn => report.drawn += 1,
                DrawOutcome::Shortfall { .. } => report.shortfalls += 1,
                DrawOutcome::Throttled => report.throttled += 1,
                DrawOutcome::NotIdle => {}
            }
            acted[i] = outcome.acted();
        }

        // Phase 3: Deliver.
        for (i, name) in converter_order.iter().enumerate() {
            if acted[i] {
                continue;
            }
            let Some(converter) = converters.get_mut(name) else {
                continue;
            };
            if converter.deliver_phase(containers).is_some() {
                report.delivered += 1;
            }
        }

        *tick_count += 1;
        report
    }

    /// Tick until `break_check` returns true, checked before every tick.
    /// Optionally sleeps `delay` between ticks. Returns the ticks executed.
    ///
    /// There is no iteration cap: a predicate that never becomes true loops
    /// forever.
    pub fn run<F>(&mut self, mut break_check: F, delay: Option<Duration>) -> Ticks
    where
        F: FnMut(&Simulation) -> bool,
    {
        let level = self.level(Level::Info);
        log!(level, "starting simulation");
        let start = self.tick_count;

        while !break_check(self) {
            let report = self.tick();
            if report.is_quiet() {
                log!(self.level(Level::Debug), "step {}: no stock moved", report.tick);
            }
            if let Some(delay) = delay.filter(|d| !d.is_zero()) {
                std::thread::sleep(delay);
            }
        }

        log!(level, "--- break condition met, simulation finished ---");
        log!(
            level,
            "final state after {} steps:\n{}",
            self.tick_count,
            self.registered_containers()
                .map(|(_, c)| c.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        );
        self.tick_count - start
    }

    /// Run until `condition` holds or the tick count reaches `max_ticks`.
    pub fn run_until(&mut self, condition: &str, max_ticks: Ticks) -> Result<Ticks, SimError> {
        let condition = self.parse_condition(condition)?;
        let id = self.resolve(&condition)?;
        Ok(self.run(
            |sim| sim.holds(id, &condition) || sim.tick_count >= max_ticks,
            None,
        ))
    }

    // -----------------------------------------------------------------------
    // Conditions
    // -----------------------------------------------------------------------

    /// Parse a condition whose container must be registered.
    pub fn parse_condition(&self, input: &str) -> Result<Condition, SimError> {
        let condition = Condition::parse(input)?;
        self.resolve(&condition)?;
        Ok(condition)
    }

    /// Evaluate a condition string against current stock.
    pub fn check(&self, input: &str) -> Result<bool, SimError> {
        let condition = Condition::parse(input)?;
        self.evaluate(&condition)
    }

    /// Evaluate a parsed condition against current stock.
    pub fn evaluate(&self, condition: &Condition) -> Result<bool, SimError> {
        let id = self.resolve(condition)?;
        Ok(self.holds(id, condition))
    }

    fn resolve(&self, condition: &Condition) -> Result<ContainerId, SimError> {
        self.registry_by_name
            .get(&condition.container)
            .copied()
            .ok_or_else(|| SimError::UnknownContainer(condition.container.clone()))
    }

    fn holds(&self, id: ContainerId, condition: &Condition) -> bool {
        self.containers
            .get(id)
            .is_some_and(|c| condition.holds_for(c.stock()))
    }

    // -----------------------------------------------------------------------
    // Lookahead
    // -----------------------------------------------------------------------

    /// Lookahead copy: a [`Clone`] whose tick and converter events are
    /// demoted to trace level. Nothing is shared with `self`.
    pub fn fork(&self) -> Simulation {
        let mut fork = self.clone();
        fork.lookahead = true;
        for converter in fork.converters.values_mut() {
            converter.mark_lookahead();
        }
        fork
    }

    /// Deep copy: the arena is cloned first, then the converters, whose keys
    /// resolve against the cloned arena.
    fn deep_copy(&self) -> Simulation {
        let containers = self.containers.clone();
        let converters: HashMap<String, Converter> = self
            .converter_order
            .iter()
            .filter_map(|name| self.converters.get(name).map(|c| (name.clone(), c.clone())))
            .collect();
        debug_assert!(
            converters
                .values()
                .all(|c| c.containers().all(|id| containers.contains(id)))
        );

        Simulation {
            containers,
            converters,
            converter_order: self.converter_order.clone(),
            registry: self.registry.clone(),
            registry_by_name: self.registry_by_name.clone(),
            tick_count: self.tick_count,
            lookahead: self.lookahead,
        }
    }

    /// Predict the tick at which `condition` first holds, capped at
    /// `max_ticks`, by running a fork. The live simulation is untouched.
    ///
    /// If the condition already holds, the current tick count is returned,
    /// even if it will stop holding and hold again later.
    pub fn estimate_finish(&self, condition: &str, max_ticks: Ticks) -> Result<Ticks, SimError> {
        let condition = Condition::parse(condition)?;
        let id = self.resolve(&condition)?;
        if self.holds(id, &condition) {
            return Ok(self.tick_count);
        }

        debug!("estimating '{condition}' on a fork, capped at tick {max_ticks}");
        let mut lookahead = self.fork();
        lookahead.run(
            |sim| sim.holds(id, &condition) || sim.tick_count >= max_ticks,
            None,
        );
        Ok(lookahead.tick_count)
    }

    // -----------------------------------------------------------------------
    // Planning
    // -----------------------------------------------------------------------

    /// Backward-chain milestones for `condition` over the registered converters.
    pub fn milestones(&self, condition: &str) -> Result<Vec<Milestone>, PlannerError> {
        let converters: Vec<&Converter> = self.converters().collect();
        Planner::new(&self.containers).milestones(condition, &converters)
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// Hash of tick count, registered stocks and converter phases.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.tick_count);
        for (_, container) in self.registered_containers() {
            h.write_str(container.name());
            h.write_u64(container.stock());
            h.write_u64(container.cumulative_delivered());
        }
        for converter in self.converters() {
            h.write_str(converter.name());
            h.write_i64(converter.phase().counter());
            h.write_u64(u64::from(converter.cycle_length()));
            h.write_u64(converter.delivered_since_reset());
        }
        h.finish()
    }
}

impl Clone for Simulation {
    fn clone(&self) -> Self {
        self.deep_copy()
    }
}

impl fmt::Display for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let described: Vec<String> = self
            .converters()
            .map(|c| c.describe(&self.containers))
            .collect();
        write!(f, "<Simulation consisting of [{}]>", described.join(", "))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
