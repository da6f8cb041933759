//! Graphviz DOT export of the converter graph.
//!
//! One box node per container and one edge per source -> converter and
//! converter -> target relation, in converter insertion order. Export is
//! presentation only and never touches simulation state.

use crate::converter::{Converter, GroupingKey};
use crate::simulation::{SimError, Simulation};
use log::{debug, info};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

/// DOT graph attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct DotOptions {
    pub size: u32,
    pub font_size: u32,
    pub font_name: String,
    /// Collapse converters with the same source names and target into one
    /// node labelled with all their names.
    pub merge_equivalent: bool,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self {
            size: 5,
            font_size: 10,
            font_name: "Bitstream Vera Sans".to_string(),
            merge_equivalent: false,
        }
    }
}

/// Render the simulation graph as DOT text.
pub fn to_dot(sim: &Simulation, options: &DotOptions) -> String {
    let containers = sim.containers();
    let mut out = format!(
        "digraph {{\n    graph [size={}] ;\n    node [fontsize={}, fontname=\"{}\"] ;\n",
        options.size,
        options.font_size,
        escape(&options.font_name)
    );
    let mut boxed: HashSet<&str> = HashSet::new();

    for group in groups(sim, options.merge_equivalent) {
        let Some(first) = group.first() else {
            continue;
        };
        let node: Vec<&str> = group.iter().map(|c| c.name()).collect();
        let node = escape(&node.join(", "));

        for link in first.sources() {
            let source = containers.name_of(link.container);
            if boxed.insert(source) {
                let _ = writeln!(out, "    \"{}\" [shape=box];", escape(source));
            }
            let _ = writeln!(out, "    \"{}\" -> \"{node}\" ;", escape(source));
        }

        let target = containers.name_of(first.target().container);
        if boxed.insert(target) {
            let _ = writeln!(out, "    \"{}\" [shape=box];", escape(target));
        }
        let _ = writeln!(out, "    \"{node}\" -> \"{}\" ;", escape(target));
    }

    out.push_str("}\n");
    out
}

/// Write the DOT rendering of `sim` to `path`.
pub fn save_dot(
    sim: &Simulation,
    path: impl AsRef<Path>,
    options: &DotOptions,
) -> Result<(), SimError> {
    let path = path.as_ref();
    let dot = to_dot(sim, options);
    info!("writing DOT file {}", path.display());
    debug!("{dot}");
    std::fs::write(path, dot)?;
    Ok(())
}

/// Converters in insertion order, grouped by structural equivalence when
/// `merge` is set. Each group sits at the position of its first member.
fn groups(sim: &Simulation, merge: bool) -> Vec<Vec<&Converter>> {
    if !merge {
        return sim.converters().map(|c| vec![c]).collect();
    }
    let mut keys: Vec<GroupingKey> = Vec::new();
    let mut groups: Vec<Vec<&Converter>> = Vec::new();
    for converter in sim.converters() {
        let key = converter.grouping_key(sim.containers());
        match keys.iter().position(|k| *k == key) {
            Some(i) => groups[i].push(converter),
            None => {
                keys.push(key);
                groups.push(vec![converter]);
            }
        }
    }
    groups
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn cashbox_graph_text() {
        let sim = cashbox_scenario();
        let dot = to_dot(&sim, &DotOptions::default());
        assert_eq!(
            dot,
            "digraph {\n    graph [size=5] ;\n    node [fontsize=10, fontname=\"Bitstream Vera Sans\"] ;\n    \"cashbox\" [shape=box];\n    \"cashbox\" -> \"buyer\" ;\n    \"storage\" [shape=box];\n    \"buyer\" -> \"storage\" ;\n}\n"
        );
    }

    #[test]
    fn shared_containers_are_boxed_once() {
        let sim = cake_factory();
        let dot = to_dot(&sim, &DotOptions::default());
        assert_eq!(dot.matches("\"Cashbox\" [shape=box];").count(), 1);
        assert_eq!(dot.matches("\"Dough\" [shape=box];").count(), 1);
        assert!(dot.contains("    \"Dough Maker Slow\" -> \"Dough\" ;\n"));
        assert!(dot.contains("    \"Dough Maker Fast\" -> \"Dough\" ;\n"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn merging_joins_equivalent_converter_names() {
        let sim = cake_factory();
        let options = DotOptions {
            merge_equivalent: true,
            ..DotOptions::default()
        };
        let dot = to_dot(&sim, &options);
        assert!(dot.contains("    \"Dough Maker Slow, Dough Maker Fast\" -> \"Dough\" ;\n"));
        assert!(!dot.contains("\"Dough Maker Fast\" -> \"Dough\""));
        assert_eq!(dot.matches("-> \"Dough\" ;").count(), 1);
    }

    #[test]
    fn export_does_not_change_state() {
        let mut sim = cashbox_scenario();
        sim.tick();
        let before = sim.state_hash();
        let _ = to_dot(&sim, &DotOptions::default());
        assert_eq!(sim.state_hash(), before);
    }

    #[test]
    fn save_dot_writes_file() {
        let sim = cashbox_scenario();
        let path = std::env::temp_dir().join(format!("stepsim-dot-{}.dot", std::process::id()));
        save_dot(&sim, &path, &DotOptions::default()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(written, to_dot(&sim, &DotOptions::default()));
    }

    #[test]
    fn save_dot_surfaces_io_errors() {
        let sim = cashbox_scenario();
        let path = std::env::temp_dir()
            .join("stepsim-missing-dir")
            .join("x")
            .join("g.dot");
        assert!(matches!(
            save_dot(&sim, &path, &DotOptions::default()),
            Err(SimError::Io(_))
        ));
    }
}
