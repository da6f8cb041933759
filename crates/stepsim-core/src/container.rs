//! Containers and the arena that owns them.
//!
//! A [`Container`] stores a discrete number of units of a single resource.
//! Converters never own containers; they hold [`ContainerId`] keys into a
//! [`Containers`] arena, so several converters can draw from or deliver to
//! the same stock.

use crate::id::ContainerId;
use slotmap::SlotMap;
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when populating a container arena.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("a container named '{0}' already exists")]
    DuplicateName(String),
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// A named, typed integer stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    name: String,
    /// Unit label, e.g. "EUR" or "gram".
    kind: String,
    stock: u64,
    /// Total units ever delivered. Never decreases.
    cumulative_delivered: u64,
}

impl Container {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, stock: u64) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            stock,
            cumulative_delivered: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn stock(&self) -> u64 {
        self.stock
    }

    pub fn cumulative_delivered(&self) -> u64 {
        self.cumulative_delivered
    }

    /// Draw up to `units` from the stock. Returns the amount actually drawn,
    /// which is `min(units, stock)`. A short draw is not an error.
    #[must_use = "returns the quantity actually drawn, which may be less than requested"]
    pub fn draw(&mut self, units: u64) -> u64 {
        let drawn = units.min(self.stock);
        self.stock -= drawn;
        drawn
    }

    /// Deliver units to this container.
    pub fn deliver(&mut self, units: u64) {
        self.stock = self.stock.saturating_add(units);
        self.cumulative_delivered = self.cumulative_delivered.saturating_add(units);
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {} {} in stock>", self.name, self.stock, self.kind)
    }
}

// ---------------------------------------------------------------------------
// Containers arena
// ---------------------------------------------------------------------------

/// Arena of containers with unique names.
///
/// Keys are stable for the lifetime of the arena and survive `clone()`, so a
/// cloned arena can be paired with cloned converters without rewiring.
#[derive(Debug, Clone, Default)]
pub struct Containers {
    slots: SlotMap<ContainerId, Container>,
    /// Insertion order, used by `iter()`.
    order: Vec<ContainerId>,
    name_to_id: HashMap<String, ContainerId>,
}

impl Containers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container. Fails if another container already uses its name.
    pub fn insert(&mut self, container: Container) -> Result<ContainerId, ContainerError> {
        if self.name_to_id.contains_key(container.name()) {
            return Err(ContainerError::DuplicateName(container.name().to_string()));
        }
        let name = container.name().to_string();
        let id = self.slots.insert(container);
        self.order.push(id);
        self.name_to_id.insert(name, id);
        Ok(id)
    }

    pub fn get(&self, id: ContainerId) -> Option<&Container> {
        self.slots.get(id)
    }

    pub fn get_mut(&mut self, id: ContainerId) -> Option<&mut Container> {
        self.slots.get_mut(id)
    }

    pub fn contains(&self, id: ContainerId) -> bool {
        self.slots.contains_key(id)
    }

    /// Look up a container id by name.
    pub fn by_name(&self, name: &str) -> Option<ContainerId> {
        self.name_to_id.get(name).copied()
    }

    /// Name of a container, or `"?"` for a dangling key.
    pub fn name_of(&self, id: ContainerId) -> &str {
        self.slots.get(id).map(Container::name).unwrap_or("?")
    }

    /// Iterate over containers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ContainerId, &Container)> {
        self.order
            .iter()
            .filter_map(move |&id| self.slots.get(id).map(|c| (id, c)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
