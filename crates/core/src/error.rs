use thiserror::Error;

/// Errors surfaced to the user at the point of a user action.
#[derive(Debug, Error)]
pub enum InsightError {
    /// The pasted analysis could not be parsed; nothing was written.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// The store or model endpoint could not be reached.
    #[error("connection failed: {0}")]
    Connectivity(String),
    /// The store's header row or columns do not match the record layout.
    #[error("schema mismatch: expected columns [{expected}], found [{found}]")]
    Schema { expected: String, found: String },
    /// The generative model answered with an error or an unusable body.
    #[error("external service error: {0}")]
    ExternalService(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl InsightError {
    pub fn schema(expected: &[&str], found: &[String]) -> Self {
        InsightError::Schema {
            expected: expected.join(", "),
            found: found.join(", "),
        }
    }

    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        InsightError::Storage(err.to_string())
    }
}
