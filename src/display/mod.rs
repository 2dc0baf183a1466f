//! Human-readable renderings of model graphs.
pub mod dot;
pub mod trace;

pub use dot::to_dot;
pub use trace::{format_model, format_tree};
