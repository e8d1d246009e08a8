//! Error kinds produced by the parameter/token engine.
//!
//! Nothing in the engine retries. Every variant is either fatal at startup
//! (`KeyGeneration`) or handed straight back to the caller, which decides how
//! the request ends.
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("custom method key {0:?} is not defined")]
    UnknownCustomKey(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("failed to parse {value:?} as {expected}: {reason}")]
    TypeCoercion {
        value: String,
        expected: &'static str,
        reason: String,
    },

    #[error("no session found for code")]
    SessionNotFound,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("no {0} signing key")]
    KeyNotFound(String),

    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("random source failed: {0}")]
    Random(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::UnknownCustomKey(_) => "UNKNOWN_CUSTOM_KEY",
            EngineError::Template(_) => "TEMPLATE_ERROR",
            EngineError::TypeCoercion { .. } => "TYPE_COERCION_ERROR",
            EngineError::SessionNotFound => "SESSION_NOT_FOUND",
            EngineError::KeyGeneration(_) => "KEY_GENERATION_ERROR",
            EngineError::KeyNotFound(_) => "KEY_NOT_FOUND",
            EngineError::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            EngineError::Signing(_) => "SIGNING_ERROR",
            EngineError::Random(_) => "RANDOM_ERROR",
            EngineError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}
