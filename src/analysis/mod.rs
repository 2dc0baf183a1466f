//! Structural queries over the node registry.
pub mod topology;
