//! Error types for the preview engine

use thiserror::Error;

/// Preview engine errors
///
/// Most of these never leave the engine: texture and dimension failures are
/// absorbed where they happen and only degrade visuals. `RenderUnavailable`
/// is the one that reaches the host (as an event).
#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid container dimension: {width}x{height}")]
    InvalidDimension { width: f32, height: f32 },

    #[error("Texture load failed for '{key}': {reason}")]
    TextureLoad { key: String, reason: String },

    #[error("Sprite pool exhausted (max {max} instances, all in use)")]
    PoolExhausted { max: usize },

    #[error("Backend initialization failed: {0}")]
    BackendInit(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Render context lost")]
    ContextLost,

    #[error("Rendering unavailable: {0}")]
    RenderUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias
pub type PreviewResult<T> = Result<T, PreviewError>;
