//! Engine-layer error taxonomy (§7).

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EngineError {
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

    #[error("store call timed out")]
    Timeout,
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connectivity(m) => EngineError::Connectivity(m),
            StoreError::Protocol(m) => EngineError::Protocol(m),
            StoreError::NotFound(m) => EngineError::NotFound(m),
            StoreError::Validation(m) => EngineError::Validation(m),
            StoreError::Script(m) => EngineError::Script(m),
            StoreError::Timeout(_) => EngineError::Timeout,
            StoreError::Redis(e) => EngineError::Connectivity(e.to_string()),
            StoreError::Pool(e) => EngineError::Connectivity(e.to_string()),
        }
    }
}

impl EngineError {
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Connectivity(_) => 503,
            EngineError::Protocol(_) => 500,
            EngineError::NotFound(_) => 404,
            EngineError::Validation(_) => 400,
            EngineError::Script(_) => 500,
            EngineError::Timeout => 504,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(EngineError::Validation("bad".into()).status_code(), 400);
    }

    #[test]
    fn connectivity_maps_to_503() {
        let err: EngineError = StoreError::Connectivity("down".into()).into();
        assert_eq!(err.status_code(), 503);
    }
}
