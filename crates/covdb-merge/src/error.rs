use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Merge failures callers may need to tell apart.
///
/// Returned inside `anyhow::Error`; recover with `downcast_ref::<MergeError>()`.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Raised before the target is touched.
    #[error("invalid merge input: {0}")]
    InvalidInput(String),
    /// The target was rolled back.
    #[error("storage failure during {operation}")]
    Storage {
        operation: String,
        #[source]
        source: BoxError,
    },
    /// The set-based path was demanded but cannot run for this source.
    #[error("relational merge unavailable for {source_name}: {reason}")]
    RelationalUnavailable { source_name: String, reason: String },
}

impl MergeError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn storage(operation: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Storage {
            operation: operation.into(),
            source: source.into(),
        }
    }
}
