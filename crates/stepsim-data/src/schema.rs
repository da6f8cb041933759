//! Serde data file structs for scenario definitions.
//!
//! These structs define the on-disk format for containers, converters and
//! run settings. They are deserialized from RON, JSON, or TOML data files and
//! then resolved into core types by the loader.

use serde::Deserialize;
use std::time::Duration;

/// A complete scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioData {
    pub containers: Vec<ContainerData>,
    pub converters: Vec<ConverterData>,
    #[serde(default)]
    pub run: RunConfig,
}

/// A container definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerData {
    pub name: String,
    /// Unit label, e.g. "EUR".
    pub kind: String,
    #[serde(default)]
    pub stock: u64,
}

/// A converter definition. Containers are referenced by name.
#[derive(Debug, Clone, Deserialize)]
pub struct ConverterData {
    pub name: String,
    pub cycle_length: u32,
    pub sources: Vec<LinkData>,
    pub target: LinkData,
    #[serde(default)]
    pub throttle: Option<u64>,
}

/// A container reference with a unit count, supporting both short tuple form
/// and full form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LinkData {
    /// Short form: `("Cashbox", 135)`.
    Short(String, u64),
    /// Full form with explicit fields.
    Full { container: String, units: u64 },
}

impl LinkData {
    pub fn container(&self) -> &str {
        match self {
            LinkData::Short(name, _) => name,
            LinkData::Full { container, .. } => container,
        }
    }

    pub fn units(&self) -> u64 {
        match self {
            LinkData::Short(_, units) | LinkData::Full { units, .. } => *units,
        }
    }
}

/// How the scenario should be run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Pause between ticks, in milliseconds. 0 runs flat out.
    #[serde(default)]
    pub delay_ms: u64,
    /// Stop once the tick count reaches this value.
    #[serde(default)]
    pub max_ticks: Option<u64>,
    /// Stop once this `NAME OP VALUE` condition holds.
    #[serde(default)]
    pub until: Option<String>,
}

impl RunConfig {
    pub fn delay(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms))
    }

    /// A run must stop on a condition, a tick cap, or both.
    pub fn is_bounded(&self) -> bool {
        self.until.is_some() || self.max_ticks.is_some()
    }
}
