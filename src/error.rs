use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Parse error on line {line}: {message}")]
    ParseLine { line: u64, message: String },

    #[error("Cancelled after {processed} documents")]
    Cancelled { processed: u64 },

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Whether the error came from the document store rather than local input or files.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Error::Mongo(_) | Error::Gateway(_) | Error::Timeout(_))
    }

    /// Whether the operation stopped because its cancellation token fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

/// Convenience Result type using our Error
pub type Result<T> = std::result::Result<T, Error>;
