//! Error types for the node registry.
use super::types::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("node {0:?} does not exist in the registry")]
    UnknownNode(NodeId),

    #[error("node '{name}' lists parent {parent:?} which is not registered before it")]
    DanglingParent { name: String, parent: NodeId },

    #[error("node {source_node:?} is a leaf and cannot be re-parented")]
    LeafHasNoParents { source_node: NodeId },

    #[error("cycle detected involving node '{0}'")]
    Cycle(String),
}
