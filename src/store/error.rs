//! Store-adapter error taxonomy.

use thiserror::Error;

/// Errors raised by the `StoreBackend` trait, covering both the in-memory and
/// Redis implementations. Engines translate these into `EngineError`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Connectivity(String),

    #[error("unexpected store response: {0}")]
    Protocol(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
}

impl StoreError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Connectivity(_) | StoreError::Pool(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = StoreError::NotFound("log L".to_string());
        assert_eq!(err.to_string(), "not found: log L");
    }

    #[test]
    fn connectivity_classification() {
        assert!(StoreError::Connectivity("down".into()).is_connectivity());
        assert!(!StoreError::Validation("bad".into()).is_connectivity());
    }
}
