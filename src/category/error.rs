//! Error types for category lookup and label evaluation.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CategoryError {
    #[error("category '{0}' not found in the primary or auxiliary split category list")]
    NotFound(String),

    #[error("category '{category}' doesn't have a state named '{label}'")]
    UnknownState { category: String, label: String },

    #[error("category '{category}' has no state in the current combination")]
    Unassigned { category: String },

    #[error("mapped category '{category}' has no output state for input '{input}'")]
    NoMapping { category: String, input: String },

    #[error("'{label}' is not a state of composite category '{category}'")]
    UnknownCombination { category: String, label: String },
}
