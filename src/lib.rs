//! Builds simultaneous models: one prototype model per physics channel is
//! cloned once per state of a set of splitting categories, with selected
//! parameters replaced by state-specific copies.
//!
//! The entry point is [`SimModelBuilder`]. Configuration is plain text
//! ([`BuildConfig`]); the model graph lives in a columnar [`Registry`].

pub mod analysis;
pub mod builder;
pub mod category;
pub mod config;
pub mod customizer;
pub mod dataset;
pub mod display;
pub mod error;
pub mod model;
pub mod store;

#[cfg(feature = "python")]
pub mod bindings {
    pub mod python;
}

pub use builder::{BuildOutput, SimModelBuilder};
pub use category::{Category, FundamentalCategory, MappedCategory, ProductCategory};
pub use config::BuildConfig;
pub use dataset::Dataset;
pub use error::{BuildError, BuildWarning};
pub use model::SimultaneousModel;
pub use store::{NodeId, Registry};
