use crate::container::Containers;
use crate::id::ContainerId;
use log::{Level, debug, log, trace, warn};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised when configuring a converter.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConverterError {
    #[error("converter '{0}': cycle length must be at least 1")]
    ZeroCycleLength(String),
    #[error("converter '{0}': target units must be at least 1")]
    ZeroTargetUnits(String),
    #[error("converter '{0}': a temporary cycle length is already pending")]
    OverridePending(String),
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// A container reference plus the units moved per conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub container: ContainerId,
    pub units: u64,
}

impl From<(ContainerId, u64)> for Link {
    fn from((container, units): (ContainerId, u64)) -> Self {
        Self { container, units }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Three-state conversion cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Ready to draw resources.
    #[default]
    Idle,
    /// Resources drawn; `remaining` processing ticks left (always > 0).
    Processing { remaining: u32 },
    /// Conversion finished; delivers on the next deliver phase.
    Ready,
}

impl Phase {
    /// Counter encoding: -1 idle, n > 0 processing, 0 ready.
    pub fn counter(self) -> i64 {
        match self {
            Phase::Idle => -1,
            Phase::Processing { remaining } => i64::from(remaining),
            Phase::Ready => 0,
        }
    }
}

/// What happened when a converter was asked to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Not idle; the draw phase does not apply.
    NotIdle,
    /// Throttle limit reached; sources were not inspected.
    Throttled,
    /// At least one source was short. Nothing was drawn.
    Shortfall {
        container: ContainerId,
        needed: u64,
        available: u64,
    },
    /// All sources drawn; the conversion is in flight.
    Drawn,
}

impl DrawOutcome {
    /// Whether the draw phase acted on this converter.
    pub fn acted(self) -> bool {
        !matches!(self, DrawOutcome::NotIdle | DrawOutcome::Throttled)
    }
}

/// Structural identity used only to merge converters in graph exports:
/// the sorted set of source names plus the target name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupingKey {
    pub sources: BTreeSet<String>,
    pub target: String,
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Draws fixed amounts from one or more source containers and, after
/// `cycle_length` processing ticks, delivers a fixed amount to a target.
#[derive(Debug, Clone)]
pub struct Converter {
    name: String,
    /// Processing ticks per conversion, read at each draw.
    cycle_length: u32,
    /// Length of the conversion in flight: the cycle length at the draw, or
    /// the temporary length once a rescale has applied. Bounds the countdown.
    cycle_in_flight: u32,
    sources: Vec<Link>,
    target: Link,
    phase: Phase,
    last_action_succeeded: bool,
    /// Last container touched. Informational only.
    active_container: Option<ContainerId>,
    /// Units actually drawn for the conversion in flight.
    in_flight: Vec<Link>,
    /// Maximum units delivered before draws are refused. `None` = unlimited.
    throttle: Option<u64>,
    delivered_since_reset: u64,
    delivered_total: u64,
    /// Cycle length to restore once the temporary override expires.
    override_original: Option<u32>,
    override_remaining: u32,
    /// Set on lookahead copies; their events log at trace level only.
    lookahead: bool,
}

impl Converter {
    /// Create a converter with a single source. Add more with [`Converter::draw_from`].
    pub fn new(
        name: impl Into<String>,
        cycle_length: u32,
        source: impl Into<Link>,
        target: impl Into<Link>,
    ) -> Result<Self, ConverterError> {
        let name = name.into();
        let target = target.into();
        if cycle_length == 0 {
            return Err(ConverterError::ZeroCycleLength(name));
        }
        if target.units == 0 {
            return Err(ConverterError::ZeroTargetUnits(name));
        }
        Ok(Self {
            name,
            cycle_length,
            cycle_in_flight: cycle_length,
            sources: vec![source.into()],
            target,
            phase: Phase::Idle,
            last_action_succeeded: true,
            active_container: None,
            in_flight: Vec::new(),
            throttle: None,
            delivered_since_reset: 0,
            delivered_total: 0,
            override_original: None,
            override_remaining: 0,
            lookahead: false,
        })
    }

    /// Add another source container.
    pub fn draw_from(&mut self, container: ContainerId, units: u64) -> &mut Self {
        debug!("{}: adding source {container:?}, drawing {units} per cycle", self.name);
        self.sources.push(Link { container, units });
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cycle_length(&self) -> u32 {
        self.cycle_length
    }

    /// Upper bound of the processing countdown for the conversion in flight.
    /// Differs from [`Converter::cycle_length`] once a temporary length has
    /// been restored mid-conversion.
    pub fn cycle_in_flight(&self) -> u32 {
        self.cycle_in_flight
    }

    pub fn sources(&self) -> &[Link] {
        &self.sources
    }

    pub fn target(&self) -> Link {
        self.target
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_action_succeeded(&self) -> bool {
        self.last_action_succeeded
    }

    pub fn active_container(&self) -> Option<ContainerId> {
        self.active_container
    }

    pub fn throttle(&self) -> Option<u64> {
        self.throttle
    }

    pub fn delivered_since_reset(&self) -> u64 {
        self.delivered_since_reset
    }

    pub fn delivered_total(&self) -> u64 {
        self.delivered_total
    }

    /// Processing ticks left on a temporary cycle length, if one is pending.
    pub fn override_remaining(&self) -> Option<u32> {
        self.override_original.map(|_| self.override_remaining)
    }

    /// Every container this converter touches, sources first.
    pub fn containers(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.sources
            .iter()
            .map(|l| l.container)
            .chain(std::iter::once(self.target.container))
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self.throttle, Some(max) if self.delivered_since_reset >= max)
    }

    pub fn is_lookahead(&self) -> bool {
        self.lookahead
    }

    /// Demote this converter's events to trace level.
    pub(crate) fn mark_lookahead(&mut self) {
        self.lookahead = true;
    }

    fn level(&self, level: Level) -> Level {
        if self.lookahead { Level::Trace } else { level }
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    /// Count down a conversion in flight. Returns false unless processing.
    pub fn process_phase(&mut self) -> bool {
        let Phase::Processing { remaining } = self.phase else {
            return false;
        };
        trace!("{}: conversion in progress, {remaining} steps left", self.name);
        self.phase = if remaining > 1 {
            Phase::Processing {
                remaining: remaining - 1,
            }
        } else {
            Phase::Ready
        };
        self.active_container = None;

        if self.override_original.is_some() && self.override_remaining > 0 {
            self.override_remaining -= 1;
            if self.override_remaining == 0 {
                self.restore_cycle_length();
            }
        }
        true
    }

    /// Draw every source's per-cycle amount, or nothing at all.
    pub fn draw_phase(&mut self, containers: &mut Containers) -> DrawOutcome {
        if self.phase != Phase::Idle {
            return DrawOutcome::NotIdle;
        }
        if self.is_throttled() {
            log!(
                self.level(Level::Debug),
                "{}: throttled after {} units, not drawing",
                self.name, self.delivered_since_reset
            );
            self.last_action_succeeded = false;
            return DrawOutcome::Throttled;
        }

        self.last_action_succeeded = true;

        // First pass: a container listed twice must cover both amounts.
        let mut needed: Vec<(ContainerId, u64)> = Vec::with_capacity(self.sources.len());
        for link in &self.sources {
            match needed.iter_mut().find(|(id, _)| *id == link.container) {
                Some((_, total)) => *total = total.saturating_add(link.units),
                None => needed.push((link.container, link.units)),
            }
        }
        let mut shortfall = None;
        for &(id, units) in &needed {
            let available = containers.get(id).map(|c| c.stock()).unwrap_or(0);
            if available < units {
                log!(
                    self.level(Level::Debug),
                    "{}: cannot draw {units} from {}, only {available} left",
                    self.name,
                    containers.name_of(id)
                );
                shortfall.get_or_insert(DrawOutcome::Shortfall {
                    container: id,
                    needed: units,
                    available,
                });
            }
        }
        if let Some(outcome) = shortfall {
            self.last_action_succeeded = false;
            self.active_container = None;
            return outcome;
        }

        // Second pass: draw.
        self.in_flight.clear();
        for link in &self.sources {
            let Some(container) = containers.get_mut(link.container) else {
                continue;
            };
            let drawn = container.draw(link.units);
            log!(
                self.level(Level::Info),
                "{}: drawing {drawn} {} from {}. {} has {} {} left now",
                self.name,
                container.kind(),
                container.name(),
                container.name(),
                container.stock(),
                container.kind()
            );
            self.in_flight.push(Link {
                container: link.container,
                units: drawn,
            });
            self.active_container = Some(link.container);
        }

        self.cycle_in_flight = self.cycle_length;
        self.phase = Phase::Processing {
            remaining: self.cycle_length,
        };
        DrawOutcome::Drawn
    }

    /// Deliver to the target. Returns the delivered units, or `None` unless ready.
    pub fn deliver_phase(&mut self, containers: &mut Containers) -> Option<u64> {
        if self.phase != Phase::Ready {
            return None;
        }
        let units = self.target.units;
        match containers.get_mut(self.target.container) {
            Some(target) => {
                target.deliver(units);
                log!(
                    self.level(Level::Info),
                    "{}: delivering {units} {} to {}. {} stock is {} {} now",
                    self.name,
                    target.kind(),
                    target.name(),
                    target.name(),
                    target.stock(),
                    target.kind()
                );
            }
            None => warn!("{}: target container is missing, delivery lost", self.name),
        }

        self.active_container = Some(self.target.container);
        self.phase = Phase::Idle;
        self.in_flight.clear();
        self.delivered_since_reset = self.delivered_since_reset.saturating_add(units);
        self.delivered_total = self.delivered_total.saturating_add(units);

        if self.override_original.is_some() && self.override_remaining == 0 {
            self.restore_cycle_length();
        }
        Some(units)
    }

    /// Return the units drawn for the conversion in flight to their sources.
    /// No-op when idle. Returns whether anything was reverted.
    pub fn revert(&mut self, containers: &mut Containers) -> bool {
        if self.phase == Phase::Idle {
            return false;
        }
        for link in self.in_flight.drain(..) {
            if let Some(source) = containers.get_mut(link.container) {
                source.deliver(link.units);
                debug!(
                    "{}: reverting {} {} to {}",
                    self.name,
                    link.units,
                    source.kind(),
                    source.name()
                );
            }
        }
        self.phase = Phase::Idle;
        true
    }

    // -----------------------------------------------------------------------
    // Controls
    // -----------------------------------------------------------------------

    /// Limit delivered units. Resets the counter and optimistically marks the
    /// last action as successful.
    pub fn set_throttle(&mut self, max: Option<u64>) {
        self.throttle = max;
        self.delivered_since_reset = 0;
        self.last_action_succeeded = true;
    }

    /// Replace the cycle length for `duration` processing ticks.
    ///
    /// A conversion already in flight is rescaled proportionally. With a
    /// duration of 0 the override lasts until the next delivery.
    pub fn set_temporary_cycle_length(
        &mut self,
        value: u32,
        duration: u32,
    ) -> Result<(), ConverterError> {
        if self.override_original.is_some() {
            return Err(ConverterError::OverridePending(self.name.clone()));
        }
        if value == 0 {
            return Err(ConverterError::ZeroCycleLength(self.name.clone()));
        }

        let previous = self.cycle_length;
        self.override_original = Some(previous);
        self.cycle_length = value;
        self.override_remaining = duration;

        if let Phase::Processing { remaining } = self.phase {
            // remaining <= cycle_in_flight, so the result is at most `value`.
            let scaled =
                u64::from(remaining) * u64::from(value) / u64::from(self.cycle_in_flight.max(1));
            self.phase = match u32::try_from(scaled) {
                Ok(0) => Phase::Ready,
                Ok(remaining) => Phase::Processing { remaining },
                Err(_) => Phase::Processing { remaining: value },
            };
            self.cycle_in_flight = value;
        }
        debug!(
            "{}: cycle length {previous} -> {value} for {duration} steps",
            self.name
        );
        Ok(())
    }

    fn restore_cycle_length(&mut self) {
        if let Some(original) = self.override_original.take() {
            debug!(
                "{}: restoring cycle length {} -> {original}",
                self.name, self.cycle_length
            );
            self.cycle_length = original;
            self.override_remaining = 0;
        }
    }

    // -----------------------------------------------------------------------
    // Display helpers
    // -----------------------------------------------------------------------

    pub fn grouping_key(&self, containers: &Containers) -> GroupingKey {
        GroupingKey {
            sources: self
                .sources
                .iter()
                .map(|l| containers.name_of(l.container).to_string())
                .collect(),
            target: containers.name_of(self.target.container).to_string(),
        }
    }

    /// Same source-name set and same target name. Display grouping only.
    pub fn is_equivalent(&self, other: &Converter, containers: &Containers) -> bool {
        self.grouping_key(containers) == other.grouping_key(containers)
    }

    /// `<name: converting from [sources] to target>`
    pub fn describe(&self, containers: &Containers) -> String {
        let sources: Vec<&str> = self
            .sources
            .iter()
            .map(|l| containers.name_of(l.container))
            .collect();
        format!(
            "<{}: converting from {:?} to {}>",
            self.name,
            sources,
            containers.name_of(self.target.container)
        )
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;

    // Helpers ---------------------------------------------------------------

    fn arena() -> (Containers, ContainerId, ContainerId) {
        let mut containers = Containers::new();
        let cashbox = containers
            .insert(Container::new("cashbox", "EUR", 10))
            .unwrap();
        let storage = containers
            .insert(Container::new("storage", "parts", 0))
            .unwrap();
        (containers, cashbox, storage)
    }

    /// Run one tick for a lone converter with the three-phase barrier.
    fn step(conv: &mut Converter, containers: &mut Containers) {
        if !conv.process_phase() && !conv.draw_phase(containers).acted() {
            conv.deliver_phase(containers);
        }
    }

    fn stock(containers: &Containers, id: ContainerId) -> u64 {
        containers.get(id).unwrap().stock()
    }

    #[test]
    fn new_rejects_zero_cycle_length() {
        let (_, cashbox, storage) = arena();
        let err = Converter::new("c", 0, (cashbox, 1), (storage, 1)).unwrap_err();
        assert_eq!(err, ConverterError::ZeroCycleLength("c".into()));
    }

    #[test]
    fn new_rejects_zero_target_units() {
        let (_, cashbox, storage) = arena();
        let err = Converter::new("c", 1, (cashbox, 1), (storage, 0)).unwrap_err();
        assert_eq!(err, ConverterError::ZeroTargetUnits("c".into()));
    }

    #[test]
    fn phase_counter_encoding() {
        assert_eq!(Phase::Idle.counter(), -1);
        assert_eq!(Phase::Ready.counter(), 0);
        assert_eq!(Phase::Processing { remaining: 4 }.counter(), 4);
    }

    #[test]
    fn full_cycle_takes_cycle_length_plus_two_ticks() {
        for cycle in 1..6u32 {
            let (mut containers, cashbox, storage) = arena();
            let mut conv = Converter::new("c", cycle, (cashbox, 1), (storage, 1)).unwrap();

            step(&mut conv, &mut containers);
            assert_eq!(conv.phase(), Phase::Processing { remaining: cycle });

            for _ in 0..cycle {
                step(&mut conv, &mut containers);
                assert_eq!(stock(&containers, storage), 0);
            }
            assert_eq!(conv.phase(), Phase::Ready);

            step(&mut conv, &mut containers);
            assert_eq!(stock(&containers, storage), 1, "cycle {cycle}");
            assert_eq!(conv.phase(), Phase::Idle);
        }
    }

    #[test]
    fn draw_is_all_or_nothing_across_sources() {
        let (mut containers, cashbox, storage) = arena();
        let flour = containers.insert(Container::new("flour", "g", 1)).unwrap();
        let mut conv = Converter::new("c", 1, (cashbox, 3), (storage, 1)).unwrap();
        conv.draw_from(flour, 2);

        let outcome = conv.draw_phase(&mut containers);
        assert_eq!(
            outcome,
            DrawOutcome::Shortfall {
                container: flour,
                needed: 2,
                available: 1
            }
        );
        assert!(!conv.last_action_succeeded());
        assert_eq!(conv.active_container(), None);
        assert_eq!(stock(&containers, cashbox), 10);
        assert_eq!(stock(&containers, flour), 1);
        assert_eq!(conv.phase(), Phase::Idle);
    }

    #[test]
    fn repeated_source_must_cover_combined_amount() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 1, (cashbox, 6), (storage, 1)).unwrap();
        conv.draw_from(cashbox, 6);

        assert!(matches!(
            conv.draw_phase(&mut containers),
            DrawOutcome::Shortfall { needed: 12, available: 10, .. }
        ));
        assert_eq!(stock(&containers, cashbox), 10);
    }

    #[test]
    fn active_container_tracks_last_source_then_target() {
        let (mut containers, cashbox, storage) = arena();
        let flour = containers.insert(Container::new("flour", "g", 5)).unwrap();
        let mut conv = Converter::new("c", 1, (cashbox, 1), (storage, 1)).unwrap();
        conv.draw_from(flour, 1);

        assert_eq!(conv.draw_phase(&mut containers), DrawOutcome::Drawn);
        assert_eq!(conv.active_container(), Some(flour));

        assert!(conv.process_phase());
        assert_eq!(conv.active_container(), None);

        assert_eq!(conv.deliver_phase(&mut containers), Some(1));
        assert_eq!(conv.active_container(), Some(storage));
    }

    #[test]
    fn phases_are_mutually_exclusive() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 2, (cashbox, 1), (storage, 1)).unwrap();

        assert!(!conv.process_phase());
        assert_eq!(conv.deliver_phase(&mut containers), None);
        assert_eq!(conv.draw_phase(&mut containers), DrawOutcome::Drawn);
        assert_eq!(conv.draw_phase(&mut containers), DrawOutcome::NotIdle);
        assert_eq!(conv.deliver_phase(&mut containers), None);
    }

    #[test]
    fn throttle_refuses_draws_until_reset() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 1, (cashbox, 1), (storage, 1)).unwrap();
        conv.set_throttle(Some(1));

        for _ in 0..3 {
            step(&mut conv, &mut containers);
        }
        assert_eq!(stock(&containers, storage), 1);
        assert!(conv.is_throttled());

        for _ in 0..5 {
            assert_eq!(conv.draw_phase(&mut containers), DrawOutcome::Throttled);
            assert!(!conv.last_action_succeeded());
        }
        assert_eq!(stock(&containers, cashbox), 9);

        conv.set_throttle(Some(2));
        assert!(conv.last_action_succeeded());
        assert_eq!(conv.delivered_since_reset(), 0);
        assert_eq!(conv.draw_phase(&mut containers), DrawOutcome::Drawn);
        assert_eq!(conv.delivered_total(), 1);
    }

    #[test]
    fn revert_returns_in_flight_units_once() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 3, (cashbox, 3), (storage, 1)).unwrap();

        conv.draw_phase(&mut containers);
        conv.process_phase();
        assert_eq!(stock(&containers, cashbox), 7);

        assert!(conv.revert(&mut containers));
        assert_eq!(stock(&containers, cashbox), 10);
        assert_eq!(conv.phase(), Phase::Idle);

        assert!(!conv.revert(&mut containers));
        assert_eq!(stock(&containers, cashbox), 10);
        assert_eq!(stock(&containers, storage), 0);
    }

    #[test]
    fn revert_when_ready_still_returns_sources() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 1, (cashbox, 4), (storage, 1)).unwrap();
        conv.draw_phase(&mut containers);
        conv.process_phase();
        assert_eq!(conv.phase(), Phase::Ready);

        conv.revert(&mut containers);
        assert_eq!(stock(&containers, cashbox), 10);
        assert_eq!(stock(&containers, storage), 0);
    }

    #[test]
    fn temporary_cycle_length_rejects_second_override() {
        let (_, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 2, (cashbox, 1), (storage, 1)).unwrap();
        conv.set_temporary_cycle_length(5, 3).unwrap();
        assert_eq!(
            conv.set_temporary_cycle_length(1, 1),
            Err(ConverterError::OverridePending("c".into()))
        );
        assert_eq!(conv.cycle_length(), 5);
        assert_eq!(conv.override_remaining(), Some(3));
    }

    #[test]
    fn temporary_cycle_length_rescales_in_flight_countdown() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 4, (cashbox, 1), (storage, 1)).unwrap();
        conv.draw_phase(&mut containers);
        conv.process_phase();
        assert_eq!(conv.phase(), Phase::Processing { remaining: 3 });

        // 3 of 4 left -> 6 of 8 left.
        conv.set_temporary_cycle_length(8, 20).unwrap();
        assert_eq!(conv.phase(), Phase::Processing { remaining: 6 });
    }

    #[test]
    fn temporary_cycle_length_rescale_can_finish_conversion() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 4, (cashbox, 1), (storage, 1)).unwrap();
        conv.draw_phase(&mut containers);
        conv.process_phase();
        conv.process_phase();
        conv.process_phase();
        assert_eq!(conv.phase(), Phase::Processing { remaining: 1 });

        conv.set_temporary_cycle_length(1, 5).unwrap();
        assert_eq!(conv.phase(), Phase::Ready);
    }

    #[test]
    fn temporary_cycle_length_restores_after_duration() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 2, (cashbox, 1), (storage, 1)).unwrap();
        conv.set_temporary_cycle_length(4, 4).unwrap();

        // Draw with the override: 4 processing ticks.
        assert_eq!(conv.draw_phase(&mut containers), DrawOutcome::Drawn);
        assert_eq!(conv.phase(), Phase::Processing { remaining: 4 });
        for _ in 0..3 {
            conv.process_phase();
            assert_eq!(conv.cycle_length(), 4);
        }
        conv.process_phase();
        assert_eq!(conv.cycle_length(), 2);
        assert_eq!(conv.override_remaining(), None);

        // Restored length applies from the next draw.
        conv.deliver_phase(&mut containers);
        conv.draw_phase(&mut containers);
        assert_eq!(conv.phase(), Phase::Processing { remaining: 2 });
    }

    #[test]
    fn restore_mid_conversion_keeps_countdown_within_in_flight_length() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 2, (cashbox, 1), (storage, 1)).unwrap();
        conv.draw_phase(&mut containers);
        assert_eq!(conv.cycle_in_flight(), 2);

        // 2 of 2 left -> 8 of 8 left, then restored after one tick.
        conv.set_temporary_cycle_length(8, 1).unwrap();
        conv.process_phase();
        assert_eq!(conv.phase(), Phase::Processing { remaining: 7 });
        assert_eq!(conv.cycle_length(), 2);
        assert_eq!(conv.cycle_in_flight(), 8);
        assert!(conv.phase().counter() <= i64::from(conv.cycle_in_flight()));

        // A second override scales against the in-flight length: 7 of 8 -> 3 of 4.
        conv.set_temporary_cycle_length(4, 0).unwrap();
        assert_eq!(conv.phase(), Phase::Processing { remaining: 3 });
        assert_eq!(conv.cycle_in_flight(), 4);

        for _ in 0..3 {
            conv.process_phase();
        }
        conv.deliver_phase(&mut containers);
        conv.draw_phase(&mut containers);
        assert_eq!(conv.cycle_in_flight(), 2);
        assert_eq!(conv.phase(), Phase::Processing { remaining: 2 });
    }

    #[test]
    fn lookahead_marker_survives_clone() {
        let (_, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 1, (cashbox, 1), (storage, 1)).unwrap();
        assert!(!conv.is_lookahead());
        conv.mark_lookahead();
        assert!(conv.clone().is_lookahead());
        assert_eq!(conv.level(Level::Info), Level::Trace);
    }

    #[test]
    fn zero_duration_override_lasts_one_conversion() {
        let (mut containers, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 2, (cashbox, 1), (storage, 1)).unwrap();
        conv.set_temporary_cycle_length(3, 0).unwrap();

        conv.draw_phase(&mut containers);
        assert_eq!(conv.phase(), Phase::Processing { remaining: 3 });
        for _ in 0..3 {
            conv.process_phase();
        }
        assert_eq!(conv.cycle_length(), 3);

        conv.deliver_phase(&mut containers);
        assert_eq!(conv.cycle_length(), 2);
        assert_eq!(conv.override_remaining(), None);
    }

    #[test]
    fn override_rejects_zero_length() {
        let (_, cashbox, storage) = arena();
        let mut conv = Converter::new("c", 2, (cashbox, 1), (storage, 1)).unwrap();
        assert!(conv.set_temporary_cycle_length(0, 1).is_err());
        assert_eq!(conv.override_remaining(), None);
    }

    #[test]
    fn equivalence_ignores_source_order_and_name() {
        let (mut containers, cashbox, storage) = arena();
        let flour = containers.insert(Container::new("flour", "g", 0)).unwrap();

        let mut slow = Converter::new("slow", 5, (cashbox, 1), (storage, 1)).unwrap();
        slow.draw_from(flour, 2);
        let mut fast = Converter::new("fast", 2, (flour, 9), (storage, 3)).unwrap();
        fast.draw_from(cashbox, 1);
        let other = Converter::new("other", 2, (flour, 9), (cashbox, 3)).unwrap();

        assert!(slow.is_equivalent(&fast, &containers));
        assert!(!slow.is_equivalent(&other, &containers));
    }

    #[test]
    fn describe_lists_sources_and_target() {
        let (containers, cashbox, storage) = arena();
        let conv = Converter::new("buyer", 1, (cashbox, 1), (storage, 1)).unwrap();
        assert_eq!(
            conv.describe(&containers),
            "<buyer: converting from [\"cashbox\"] to storage>"
        );
    }
}
