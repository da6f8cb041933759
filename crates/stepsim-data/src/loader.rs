//! Resolution pipeline: reads a scenario file, resolves container names and
//! builds a ready-to-run simulation.
//!
//! Provides format detection (RON/JSON/TOML) and deserialization helpers used
//! by [`load_scenario`].

use crate::schema::{LinkData, RunConfig, ScenarioData};
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use stepsim_core::container::{Container, ContainerError, Containers};
use stepsim_core::converter::Converter;
use stepsim_core::fixed::Ticks;
use stepsim_core::id::ContainerId;
use stepsim_core::simulation::{SimError, Simulation};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during scenario loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The scenario file does not exist.
    #[error("scenario file {file} not found")]
    MissingFile { file: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization or shape error.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The core rejected a definition.
    #[error("invalid scenario in {file}: {source}")]
    Build { file: PathBuf, source: SimError },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

/// Deserialize in-memory content. `origin` only labels errors.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    origin: &Path,
) -> Result<T, DataLoadError> {
    let parse_err = |detail: String| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

// ===========================================================================
// Scenario loading
// ===========================================================================

/// A built simulation plus the run settings from its file.
#[derive(Debug)]
pub struct Scenario {
    pub simulation: Simulation,
    pub run: RunConfig,
}

/// Load, validate and build a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario, DataLoadError> {
    if !path.exists() {
        return Err(DataLoadError::MissingFile {
            file: path.to_path_buf(),
        });
    }
    let data: ScenarioData = deserialize_file(path)?;
    if !data.run.is_bounded() {
        return Err(DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: "run needs `until`, `max_ticks`, or both".to_string(),
        });
    }

    let simulation = build_simulation(&data, path)?;
    if let Some(until) = &data.run.until {
        simulation
            .parse_condition(until)
            .map_err(|source| DataLoadError::Build {
                file: path.to_path_buf(),
                source,
            })?;
    }

    info!(
        "loaded scenario {}: {} containers, {} converters",
        path.display(),
        data.containers.len(),
        data.converters.len()
    );
    Ok(Scenario {
        simulation,
        run: data.run,
    })
}

/// Resolve container names and register converters in file order.
/// `origin` only labels errors.
pub fn build_simulation(data: &ScenarioData, origin: &Path) -> Result<Simulation, DataLoadError> {
    let build_err = |source: SimError| DataLoadError::Build {
        file: origin.to_path_buf(),
        source,
    };
    let duplicate = |name: &str| DataLoadError::DuplicateName {
        file: origin.to_path_buf(),
        name: name.to_string(),
    };

    let mut containers = Containers::new();
    let mut container_ids: HashMap<String, ContainerId> = HashMap::new();
    for c in &data.containers {
        let id = containers
            .insert(Container::new(&c.name, &c.kind, c.stock))
            .map_err(|ContainerError::DuplicateName(name)| duplicate(&name))?;
        container_ids.insert(c.name.clone(), id);
    }

    let resolve = |link: &LinkData| -> Result<(ContainerId, u64), DataLoadError> {
        let id = resolve_name(&container_ids, link.container(), origin, "container")?;
        Ok((*id, link.units()))
    };

    let mut sim = Simulation::with_converters(containers, std::iter::empty()).map_err(build_err)?;
    let mut seen: HashSet<&str> = HashSet::new();
    for conv in &data.converters {
        if !seen.insert(&conv.name) {
            return Err(duplicate(&conv.name));
        }
        let Some((first, rest)) = conv.sources.split_first() else {
            return Err(DataLoadError::Parse {
                file: origin.to_path_buf(),
                detail: format!("converter '{}' has no sources", conv.name),
            });
        };

        let mut converter =
            Converter::new(&conv.name, conv.cycle_length, resolve(first)?, resolve(&conv.target)?)
                .map_err(|e| build_err(e.into()))?;
        for link in rest {
            let (id, units) = resolve(link)?;
            converter.draw_from(id, units);
        }
        if conv.throttle.is_some() {
            converter.set_throttle(conv.throttle);
        }

        sim.add_converter(converter).map_err(build_err)?;
    }
    Ok(sim)
}

/// Run a simulation with the stop rules from `run`. Returns the ticks run.
/// An unbounded configuration runs nothing.
pub fn run_scenario(sim: &mut Simulation, run: &RunConfig) -> Result<Ticks, SimError> {
    if !run.is_bounded() {
        warn!("run configuration has neither `until` nor `max_ticks`, not running");
        return Ok(0);
    }
    let until = run
        .until
        .as_deref()
        .map(|c| sim.parse_condition(c))
        .transpose()?;
    let max_ticks = run.max_ticks;

    Ok(sim.run(
        |s| {
            let met = until
                .as_ref()
                .is_some_and(|c| s.evaluate(c).unwrap_or(true));
            met || max_ticks.is_some_and(|max| s.tick_count() >= max)
        },
        run.delay(),
    ))
}

// ===========================================================================
// Tests
// ===========================================================================
