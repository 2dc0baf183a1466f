//! Graphviz export of the nodes reachable from a set of roots.

use crate::analysis::topology;
use crate::store::{NodeId, NodeKind, Registry, StoreError};
use petgraph::dot::{Config, Dot};
use petgraph::prelude::StableDiGraph;
use std::collections::HashMap;

/// Copies the subgraph under `roots` into a petgraph graph. Node weights are
/// labels; edges point from a server to its client.
pub fn subgraph(registry: &Registry, roots: &[NodeId]) -> Result<StableDiGraph<String, ()>, StoreError> {
    let order = topology::dependency_order(registry, roots)?;
    let mut graph = StableDiGraph::with_capacity(order.len(), order.len());
    let mut index = HashMap::with_capacity(order.len());

    for &id in &order {
        let label = match registry.kind(id) {
            NodeKind::Function { class } => format!("{} ({})", registry.name(id), class),
            _ => registry.name(id).to_string(),
        };
        let gid = graph.add_node(label);
        index.insert(id, gid);
        for parent in registry.get_parents(id) {
            // Servers precede clients in dependency order.
            if let Some(&pid) = index.get(parent) {
                graph.add_edge(pid, gid, ());
            }
        }
    }
    Ok(graph)
}

pub fn to_dot(registry: &Registry, roots: &[NodeId]) -> Result<String, StoreError> {
    let graph = subgraph(registry, roots)?;
    Ok(format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_contains_nodes_and_edges() {
        let mut reg = Registry::new();
        let x = reg.add_variable("x", 0.0, -1.0, 1.0);
        let m = reg.add_variable("m", 5.0, 0.0, 10.0);
        let g = reg.add_function("g", "Gaussian", &[x, m]).unwrap();
        let graph = subgraph(&reg, &[g]).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);

        let dot = to_dot(&reg, &[g]).unwrap();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("g (Gaussian)"));
    }
}
