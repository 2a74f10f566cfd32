use thiserror::Error;

/// Per-request failures of the operation engine. `Display` is the report message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Name absent from the catalog.
    #[error("Unknown op: {0}")]
    UnknownOperation(String),
    /// Parameter keys outside the contract (typos, invented names).
    #[error("Invalid parameters for {operation}: {}. Valid: {}", .unknown.join(", "), .valid.join(", "))]
    InvalidParameterSet {
        operation: String,
        unknown: Vec<String>,
        valid: Vec<String>,
    },
    /// Required parameters still absent; recoverable through the resolver.
    #[error("Missing required parameters for {operation}: {}", .missing.join(", "))]
    MissingRequiredParameter {
        operation: String,
        missing: Vec<String>,
    },
    /// In the catalog, but no action is bound to the name.
    #[error("Operation not implemented")]
    Unavailable(String),
    /// The bound action failed or panicked.
    #[error("Execution error - {0}")]
    ActionExecutionFault(String),
}

/// Why a catalog source could not produce a usable list of definitions.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog store error: {0}")]
    Store(#[from] sled::Error),
    #[error("catalog source '{source_name}' unavailable: {reason}")]
    Source { source_name: String, reason: String },
    #[error("malformed catalog entry '{name}': {reason}")]
    Malformed { name: String, reason: String },
    #[error("duplicate catalog entry '{0}'")]
    Duplicate(String),
}

/// The extraction collaborator could not turn an answer into parameter values.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extractor backend failed: {0}")]
    Backend(String),
    #[error("extractor returned unparseable output: {0}")]
    Unparseable(String),
}
