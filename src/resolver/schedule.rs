//! Install ordering for a batch of package files.
//!
//! When several packages are installed in one invocation and one of them
//! depends on another, the dependency must be installed (and registered as a
//! resolvable handle) first. Dependencies outside the batch are expected to
//! be in the index already and impose no ordering.

use std::collections::HashMap;

use anyhow::{bail, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::core::PackageSpec;

/// Order `specs` so that every package comes after the batch members it
/// depends on. Returns indices into `specs`.
pub fn install_order(specs: &[PackageSpec]) -> Result<Vec<usize>> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut by_name: HashMap<&str, NodeIndex> = HashMap::new();

    for (i, spec) in specs.iter().enumerate() {
        if by_name.insert(spec.name(), graph.add_node(i)).is_some() {
            bail!("package `{}` is listed more than once", spec.name());
        }
    }

    // Edges run dependency -> dependent.
    for spec in specs {
        let dependent = by_name[spec.name()];
        for dep in spec.all_dependency_names() {
            if let Some(&dependency) = by_name.get(dep) {
                graph.update_edge(dependency, dependent, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(nodes) => {
            let order: Vec<usize> = nodes.into_iter().map(|n| graph[n]).collect();
            tracing::debug!(
                "install order: {}",
                order
                    .iter()
                    .map(|&i| specs[i].name())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            );
            Ok(order)
        }
        Err(cycle) => {
            let name = specs[graph[cycle.node_id()]].name();
            bail!("dependency cycle involving `{}` in the requested packages", name)
        }
    }
}
