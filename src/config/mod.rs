//! Build configuration: the user's text entries and the parsers that turn
//! them into typed descriptions.
pub mod build_config;
pub mod error;
pub mod parser;

pub use build_config::BuildConfig;
pub use error::{ConfigError, ParseError};
pub use parser::{CatRef, ModelRef, PhysModelsLine, SplitRule};
