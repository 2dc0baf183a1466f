//! The model-node graph: a columnar registry of named leaves and function nodes.
pub mod error;
pub mod registry;
pub mod types;

pub use error::StoreError;
pub use registry::{Registry, RegistryMark};
pub use types::{NodeId, NodeKind, NodeMetadata};
