//! Errors that abort a build, and warnings that let it continue.
use crate::category::CategoryError;
use crate::config::ParseError;
use crate::store::StoreError;
use std::fmt;

/// What kind of name failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Model,
    IndexCategory,
    SplitCategory,
    Category,
    State,
    Parameter,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NameKind::Model => "physics model",
            NameKind::IndexCategory => "index category",
            NameKind::SplitCategory => "split category",
            NameKind::Category => "splitting category",
            NameKind::State => "state",
            NameKind::Parameter => "parameter",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{kind} '{name}' {reason}")]
    NameResolution { kind: NameKind, name: String, reason: String },

    #[error("category membership error: {0}")]
    CategoryMembership(CategoryError),

    #[error("model graph error: {0}")]
    Store(#[from] StoreError),

    #[error("nothing to split: neither splitCats nor an index category is given")]
    NothingToSplit,
}

impl BuildError {
    pub fn unresolved(kind: NameKind, name: &str, reason: impl Into<String>) -> Self {
        BuildError::NameResolution { kind, name: name.to_string(), reason: reason.into() }
    }
}

impl From<CategoryError> for BuildError {
    fn from(e: CategoryError) -> Self {
        match e {
            CategoryError::NotFound(name) => {
                BuildError::unresolved(NameKind::Category, &name, "not found in the primary or auxiliary split category list")
            }
            CategoryError::UnknownState { category, label } => {
                BuildError::unresolved(NameKind::State, &label, format!("is not a state of category '{category}'"))
            }
            other => BuildError::CategoryMembership(other),
        }
    }
}

/// A recoverable condition. The build continues with the documented fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// A second model was mapped to an index state; the first mapping is kept.
    DuplicateStateMapping { state: String, kept: String, dropped: String },
    /// Without an index category only the first listed model is built.
    ExtraModelsIgnored { used: String, ignored: Vec<String> },
    /// A `<state>=<model>` entry was given without an index category.
    MappingWithoutIndex { entry: String },
    /// A mapped state is not a state of the index category and is never built.
    UnknownIndexState { state: String, index_category: String },
    /// An auxiliary category depends on categories outside the split set.
    AuxiliaryCategoryIgnored { category: String, foreign: Vec<String> },
    NoSplittingRules { model: String },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::DuplicateStateMapping { state, kept, dropped } => write!(
                f,
                "multiple models specified for state {state}, only first ({kept}) will be used, {dropped} ignored"
            ),
            BuildWarning::ExtraModelsIgnored { used, ignored } => write!(
                f,
                "without an index category only the first model ({used}) will be used, ignoring {ignored:?}"
            ),
            BuildWarning::MappingWithoutIndex { entry } => {
                write!(f, "without an index category the <state>=<model> association '{entry}' is meaningless")
            }
            BuildWarning::UnknownIndexState { state, index_category } => {
                write!(f, "{state} is not a state of index category {index_category}, mapping is never used")
            }
            BuildWarning::AuxiliaryCategoryIgnored { category, foreign } => write!(
                f,
                "ignoring auxiliary category {category} because it has servers that are not listed in splitCats: {foreign:?}"
            ),
            BuildWarning::NoSplittingRules { model } => write!(f, "no splitting rules for {model}"),
        }
    }
}
