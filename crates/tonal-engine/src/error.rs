//! Error types for the grading engine.

use thiserror::Error;
use tonal_models::ParamKey;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside the grading engine.
///
/// Only [`EngineError::ShaderBuildFailed`] is reported to rendering
/// collaborators; every other condition is recovered inside the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Frame read blocked: {reason}")]
    ReadBlocked { reason: String },

    #[error("Shader build failed on {backend}: {log}")]
    ShaderBuildFailed { backend: String, log: String },

    #[error("Invalid value {value} for parameter {key}")]
    InvalidParameter { key: ParamKey, value: f64 },

    #[error("No eligible source")]
    NoEligibleSource,

    #[error("Invalid pixel buffer: {0}")]
    InvalidBuffer(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create a blocked-read error.
    pub fn read_blocked(reason: impl Into<String>) -> Self {
        Self::ReadBlocked {
            reason: reason.into(),
        }
    }

    /// Create a shader build failure.
    pub fn shader_build_failed(backend: impl Into<String>, log: impl Into<String>) -> Self {
        Self::ShaderBuildFailed {
            backend: backend.into(),
            log: log.into(),
        }
    }

    /// Create an invalid-buffer error.
    pub fn invalid_buffer(message: impl Into<String>) -> Self {
        Self::InvalidBuffer(message.into())
    }

    /// Whether rendering collaborators need to see this condition.
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::ShaderBuildFailed { .. })
    }
}
