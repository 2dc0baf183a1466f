use super::error::StoreError;
use super::types::*;
use serde::{Serialize, Deserialize};

/// Append-only, columnar store for every node a build touches: the caller's
/// prototypes as well as the clones and split leaves derived from them.
///
/// Nodes may only depend on nodes registered before them, so a registry
/// built through `add_node` is acyclic by construction. Names are not
/// required to be unique; the builder keeps its own name tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    // Columnar Arrays
    pub kinds: Vec<NodeKind>,
    pub meta: Vec<NodeMetadata>,

    // Topology (CSR-ish + Adjacency)
    pub parents_flat: Vec<NodeId>,
    pub parents_ranges: Vec<(u32, u32)>, // (start, count)

    // Downstream traversal helpers
    pub first_child: Vec<u32>,
    pub child_targets: Vec<NodeId>,
    pub next_child: Vec<u32>,
}

/// Snapshot of the registry lengths, used to roll back everything registered
/// after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryMark {
    nodes: usize,
    parents: usize,
    edges: usize,
}

impl RegistryMark {
    pub fn node_count(&self) -> usize { self.nodes }
}

impl Registry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.kinds.len() }

    pub fn contains(&self, id: NodeId) -> bool { id.index() < self.count() }

    fn push_node(&mut self, kind: NodeKind, parents: &[NodeId], meta: NodeMetadata) -> NodeId {
        let id = NodeId(self.kinds.len() as u32);

        // 1. Register Parents
        let start = self.parents_flat.len() as u32;
        let count = parents.len() as u32;
        self.parents_flat.extend_from_slice(parents);
        self.parents_ranges.push((start, count));

        // 2. Register Children (Adjacency list for downstream lookups)
        for &parent in parents {
            let p_idx = parent.index();
            let head = self.first_child[p_idx];
            let new_edge = self.child_targets.len() as u32;
            self.child_targets.push(id);
            self.next_child.push(head);
            self.first_child[p_idx] = new_edge;
        }

        // 3. Metadata
        self.kinds.push(kind);
        self.meta.push(meta);
        self.first_child.push(u32::MAX);

        id
    }

    pub fn add_node(&mut self, kind: NodeKind, parents: &[NodeId], meta: NodeMetadata) -> Result<NodeId, StoreError> {
        if let Some(&parent) = parents.iter().find(|p| !self.contains(**p)) {
            return Err(StoreError::DanglingParent { name: meta.name, parent });
        }
        Ok(self.push_node(kind, parents, meta))
    }

    pub fn add_variable(&mut self, name: &str, value: f64, min: f64, max: f64) -> NodeId {
        self.push_node(NodeKind::Variable { value, min, max }, &[], NodeMetadata::named(name))
    }

    pub fn add_constant(&mut self, name: &str, value: f64) -> NodeId {
        self.push_node(NodeKind::Constant(value), &[], NodeMetadata::named(name))
    }

    pub fn add_function(&mut self, name: &str, class: &str, parents: &[NodeId]) -> Result<NodeId, StoreError> {
        self.add_node(NodeKind::Function { class: class.to_string() }, parents, NodeMetadata::named(name))
    }

    /// Registers a copy of `source` under `name`, wired to `parents` instead of
    /// the source's own parents. Leaves are copied with their value and range.
    pub fn clone_node(&mut self, source: NodeId, name: String, parents: &[NodeId]) -> Result<NodeId, StoreError> {
        if !self.contains(source) {
            return Err(StoreError::UnknownNode(source));
        }
        let kind = self.kinds[source.index()].clone();
        if kind.is_leaf() && !parents.is_empty() {
            return Err(StoreError::LeafHasNoParents { source_node: source });
        }
        let meta = NodeMetadata { name, title: self.meta[source.index()].title.clone() };
        self.add_node(kind, parents, meta)
    }

    #[inline(always)]
    pub fn get_parents(&self, id: NodeId) -> &[NodeId] {
        let (start, count) = self.parents_ranges[id.index()];
        &self.parents_flat[start as usize..(start + count) as usize]
    }

    /// Iterates the direct consumers of `id`, most recently registered first.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children { registry: self, edge: self.first_child[id.index()] }
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind { &self.kinds[id.index()] }
    pub fn name(&self, id: NodeId) -> &str { &self.meta[id.index()].name }

    /// First node registered under `name`.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.meta.iter().position(|m| m.name == name).map(NodeId::new)
    }

    pub fn mark(&self) -> RegistryMark {
        RegistryMark {
            nodes: self.kinds.len(),
            parents: self.parents_flat.len(),
            edges: self.child_targets.len(),
        }
    }

    /// Drops every node registered after `mark`, restoring the child lists of
    /// the surviving nodes.
    pub fn truncate(&mut self, mark: RegistryMark) {
        if mark.nodes >= self.kinds.len() {
            return;
        }
        // Edges are prepended, so the first surviving edge of each chain is the
        // head the node had when the mark was taken.
        for p_idx in 0..mark.nodes {
            let mut head = self.first_child[p_idx];
            while head != u32::MAX && head as usize >= mark.edges {
                head = self.next_child[head as usize];
            }
            self.first_child[p_idx] = head;
        }

        self.kinds.truncate(mark.nodes);
        self.meta.truncate(mark.nodes);
        self.parents_ranges.truncate(mark.nodes);
        self.first_child.truncate(mark.nodes);
        self.parents_flat.truncate(mark.parents);
        self.child_targets.truncate(mark.edges);
        self.next_child.truncate(mark.edges);
    }
}

pub struct Children<'a> {
    registry: &'a Registry,
    edge: u32,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.edge == u32::MAX {
            return None;
        }
        let idx = self.edge as usize;
        self.edge = self.registry.next_child[idx];
        Some(self.registry.child_targets[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_follow_registration() {
        let mut reg = Registry::new();
        let x = reg.add_variable("x", 0.0, -10.0, 10.0);
        let m = reg.add_variable("m", 0.0, -10.0, 10.0);
        let g = reg.add_function("g", "Gaussian", &[x, m]).unwrap();
        let h = reg.add_function("h", "Exponential", &[x]).unwrap();

        assert_eq!(reg.children(x).collect::<Vec<_>>(), vec![h, g]);
        assert_eq!(reg.children(m).collect::<Vec<_>>(), vec![g]);
        assert_eq!(reg.get_parents(g), &[x, m]);
    }

    #[test]
    fn test_dangling_parent_rejected() {
        let mut reg = Registry::new();
        let err = reg.add_function("g", "Gaussian", &[NodeId(3)]).unwrap_err();
        assert_eq!(err, StoreError::DanglingParent { name: "g".into(), parent: NodeId(3) });
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn test_clone_node_redirects_parents() {
        let mut reg = Registry::new();
        let x = reg.add_variable("x", 0.0, -10.0, 10.0);
        let s = reg.add_variable("s", 1.0, 0.0, 5.0);
        let g = reg.add_function("g", "Gaussian", &[x, s]).unwrap();

        let s_a = reg.clone_node(s, "s_A".into(), &[]).unwrap();
        let g_a = reg.clone_node(g, "g_A".into(), &[x, s_a]).unwrap();

        assert_eq!(reg.name(g_a), "g_A");
        assert_eq!(reg.get_parents(g_a), &[x, s_a]);
        assert_eq!(reg.kind(s_a), &NodeKind::Variable { value: 1.0, min: 0.0, max: 5.0 });
        assert!(reg.clone_node(s, "s_B".into(), &[x]).is_err());
    }

    #[test]
    fn test_truncate_restores_child_lists() {
        let mut reg = Registry::new();
        let x = reg.add_variable("x", 0.0, -10.0, 10.0);
        let g = reg.add_function("g", "Gaussian", &[x]).unwrap();
        let mark = reg.mark();

        let s = reg.add_variable("s", 1.0, 0.0, 5.0);
        reg.add_function("g2", "Gaussian", &[x, s]).unwrap();
        assert_eq!(reg.children(x).count(), 2);

        reg.truncate(mark);
        assert_eq!(reg.count(), 2);
        assert_eq!(reg.children(x).collect::<Vec<_>>(), vec![g]);
        assert_eq!(reg.find("g2"), None);

        // The registry stays usable after a rollback.
        let g3 = reg.add_function("g3", "Gaussian", &[x]).unwrap();
        assert_eq!(reg.children(x).collect::<Vec<_>>(), vec![g3, g]);
    }
}
