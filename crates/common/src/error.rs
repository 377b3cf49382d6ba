use thiserror::Error;

/// Top-level error type for Titan cluster operations.
///
/// The Store layer cannot itself fail (pure in-memory mutation, §7 of
/// SPEC_FULL.md); everything here originates at the RPC, config, or
/// process-execution boundary.
#[derive(Debug, Error)]
pub enum TitanError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate task: {0}")]
    DuplicateTask(String),

    #[error("non-monotone status transition for job {job_id}: {from} -> {to}")]
    NonMonotoneTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("process launch failed: {0}")]
    Launch(String),

    #[error("{0}")]
    Internal(String),
}

impl TitanError {
    /// Whether retrying the operation that produced this error is sensible.
    ///
    /// Transport failures are retried organically by the next scheduler tick
    /// or heartbeat (§7); they are not retried inline. Everything else is a
    /// terminal rejection the caller should surface, not paper over.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type alias for Titan cluster operations.
pub type Result<T> = std::result::Result<T, TitanError>;
