//! Backward chaining of resource milestones.
//!
//! Given a target condition and a set of candidate converters, the planner
//! walks the production graph backwards from the target container and
//! reports, milestone by milestone, how much of each upstream resource must
//! eventually have been delivered. Nothing is executed and no container is
//! mutated.

use crate::condition::{ComparisonOp, Condition, ConditionError};
use crate::container::Containers;
use crate::converter::Converter;
use crate::fixed::{Fixed64, checked_div_64, units_to_fixed64};
use crate::id::ContainerId;
use log::debug;
use std::collections::{BTreeSet, HashSet, VecDeque};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Condition(#[from] ConditionError),
    #[error("planner targets support only '==' and '>=', got '{0}'")]
    UnsupportedOperator(ComparisonOp),
    #[error("milestone chain deeper than {0}; the production graph is probably cyclic")]
    DepthExceeded(usize),
}

// ---------------------------------------------------------------------------
// Milestone
// ---------------------------------------------------------------------------

/// Cumulative quantities required of a set of containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Milestone {
    /// First-discovered order. Repeated contributions accumulate.
    entries: Vec<(ContainerId, Fixed64)>,
    contributors: BTreeSet<String>,
}

impl Milestone {
    fn add(&mut self, id: ContainerId, quantity: Fixed64) {
        match self.entries.iter_mut().find(|(c, _)| *c == id) {
            Some((_, required)) => *required = required.saturating_add(quantity),
            None => self.entries.push((id, quantity)),
        }
    }

    pub fn entries(&self) -> &[(ContainerId, Fixed64)] {
        &self.entries
    }

    pub fn required(&self, id: ContainerId) -> Option<Fixed64> {
        self.entries
            .iter()
            .find(|(c, _)| *c == id)
            .map(|&(_, required)| required)
    }

    pub fn containers(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.entries.iter().map(|&(id, _)| id)
    }

    /// Names of the converters that produce into this milestone.
    pub fn contributors(&self) -> &BTreeSet<String> {
        &self.contributors
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `cumulative_delivered / required * 100` for one entry. A zero
    /// requirement is already met. `None` if the container is not part of
    /// this milestone or not in `containers`.
    pub fn percent_for(&self, id: ContainerId, containers: &Containers) -> Option<Fixed64> {
        let required = self.required(id)?;
        let delivered = units_to_fixed64(containers.get(id)?.cumulative_delivered());
        let hundred = Fixed64::from_num(100);
        if required == Fixed64::ZERO {
            return Some(hundred);
        }
        Some(
            checked_div_64(delivered, required)
                .and_then(|ratio| ratio.checked_mul(hundred))
                .unwrap_or(Fixed64::MAX),
        )
    }

    /// Mean of the per-entry percentages, each capped at 100 first.
    pub fn total_percent(&self, containers: &Containers) -> Fixed64 {
        let hundred = Fixed64::from_num(100);
        if self.entries.is_empty() {
            return hundred;
        }
        let sum = self
            .containers()
            .map(|id| {
                self.percent_for(id, containers)
                    .unwrap_or(Fixed64::ZERO)
                    .min(hundred)
            })
            .fold(Fixed64::ZERO, |acc, p| acc.saturating_add(p));
        // At most 100 per entry, so the count always fits.
        let count = units_to_fixed64(self.entries.len() as u64);
        checked_div_64(sum, count).unwrap_or(hundred)
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Longest milestone chain before the graph is treated as cyclic.
    pub max_depth: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// Read-only milestone planner over a container arena.
pub struct Planner<'a> {
    containers: &'a Containers,
    config: PlannerConfig,
}

impl<'a> Planner<'a> {
    pub fn new(containers: &'a Containers) -> Self {
        Self::with_config(containers, PlannerConfig::default())
    }

    pub fn with_config(containers: &'a Containers, config: PlannerConfig) -> Self {
        Self { containers, config }
    }

    /// Compute the milestone chain for `condition`, earliest prerequisite
    /// first and the target milestone last.
    ///
    /// The result depends only on the condition and the converter set, not
    /// on the order of `candidates`. A condition naming a container that no
    /// candidate touches yields an empty list.
    pub fn milestones(
        &self,
        condition: &str,
        candidates: &[&Converter],
    ) -> Result<Vec<Milestone>, PlannerError> {
        let condition = Condition::parse(condition)?;
        if !matches!(condition.op, ComparisonOp::Eq | ComparisonOp::Gte) {
            return Err(PlannerError::UnsupportedOperator(condition.op));
        }

        let mut sorted: Vec<&Converter> = candidates.to_vec();
        sorted.sort_by(|a, b| a.name().cmp(b.name()));

        let Some(target) = self.find_registered(&sorted, &condition.container) else {
            debug!(
                "planner: '{}' is not touched by any candidate converter",
                condition.container
            );
            return Ok(Vec::new());
        };

        let mut current = Milestone::default();
        current.add(target, units_to_fixed64(condition.value));
        let mut chain = VecDeque::new();

        while !current.is_empty() {
            if chain.len() >= self.config.max_depth {
                return Err(PlannerError::DepthExceeded(self.config.max_depth));
            }
            let mut next = Milestone::default();
            for i in 0..current.entries.len() {
                let (id, required) = current.entries[i];
                let contributors: Vec<&Converter> = sorted
                    .iter()
                    .copied()
                    .filter(|c| c.target().container == id)
                    .collect();
                if contributors.is_empty() {
                    continue;
                }
                let used = produce(&contributors, required, &mut next);
                current.contributors.extend(used);
            }
            chain.push_front(current);
            current = next;
        }

        debug!("planner: {} milestones for '{condition}'", chain.len());
        Ok(chain.into())
    }

    /// Resolve a container name against the containers the candidates touch.
    fn find_registered(&self, sorted: &[&Converter], name: &str) -> Option<ContainerId> {
        let mut seen = HashSet::new();
        sorted
            .iter()
            .flat_map(|c| c.containers())
            .filter(|&id| seen.insert(id))
            .find(|&id| self.containers.get(id).is_some_and(|c| c.name() == name))
    }
}

/// Round-robin over `contributors`, each adding its delivered amount toward
/// `required` and its full source needs into `next`, until `required` is met.
/// Returns the names of the converters that ran at least once.
fn produce(contributors: &[&Converter], required: Fixed64, next: &mut Milestone) -> Vec<String> {
    let required = required.saturating_ceil().saturating_to_num::<u64>();
    if required == 0 {
        return Vec::new();
    }
    let per_round = contributors
        .iter()
        .fold(0u64, |acc, c| acc.saturating_add(c.target().units));

    // Whole rounds that still leave the total short, then one partial round.
    let Some(full_rounds) = (required - 1).checked_div(per_round) else {
        return Vec::new();
    };
    let mut produced = full_rounds.saturating_mul(per_round);
    if full_rounds > 0 {
        for converter in contributors {
            for source in converter.sources() {
                next.add(
                    source.container,
                    units_to_fixed64(source.units.saturating_mul(full_rounds)),
                );
            }
        }
    }

    let mut used: Vec<String> = if full_rounds > 0 {
        contributors.iter().map(|c| c.name().to_string()).collect()
    } else {
        Vec::new()
    };
    for converter in contributors {
        if produced >= required {
            break;
        }
        produced = produced.saturating_add(converter.target().units);
        for source in converter.sources() {
            next.add(source.container, units_to_fixed64(source.units));
        }
        if full_rounds == 0 {
            used.push(converter.name().to_string());
        }
    }
    used
}
