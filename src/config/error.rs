//! Error types for configuration loading and the configuration mini-languages.

/// A malformed configuration line. `field` names the configuration entry the
/// line was read from (`physModels`, `splitCats` or a model name).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{field}: no entries given")]
    Empty { field: String },

    #[error("{field}: misplaced ':' in token '{token}'")]
    MisplacedColon { field: String, token: String },

    #[error("{field}: expected ':' after '{after}', found '{found}'")]
    ExpectedColon { field: String, after: String, found: String },

    #[error("{field}: expected {expected} after '{after}' at end of line")]
    UnexpectedEnd { field: String, expected: &'static str, after: String },

    #[error("{field}: malformed token '{token}': {reason}")]
    MalformedToken { field: String, token: String, reason: &'static str },

    #[error("{model}: parameter '{param}' already has a splitting prescription")]
    DuplicatePrescription { model: String, param: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
}
