//! Central error handling for the umbra renderer.
//!
//! Provides a unified RenderError enum with consistent categorization
//! for initialization, configuration, and per-frame failures.

/// Centralized error type for all renderer operations
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// GPU rejected a texture or buffer allocation (out of memory,
    /// unsupported format). Recoverable: the previous resource set
    /// stays live and the caller may retry with a smaller map size.
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// A shading program or pipeline failed to compile. Fatal to
    /// initialization; names the failing stage.
    #[error("Pipeline compilation failed at stage '{stage}': {message}")]
    PipelineCompilation { stage: String, message: String },

    /// Rejected parameter or configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The device/context was invalidated mid-session. The current
    /// frame is abandoned and the caller must reinitialize.
    #[error("Device lost: {0}")]
    DeviceLost(String),

    #[error("Upload error: {0}")]
    Upload(String),
}

impl RenderError {
    pub fn allocation<T: ToString>(msg: T) -> Self {
        RenderError::Allocation(msg.to_string())
    }

    pub fn compilation<S: ToString, M: ToString>(stage: S, message: M) -> Self {
        RenderError::PipelineCompilation {
            stage: stage.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_config<T: ToString>(msg: T) -> Self {
        RenderError::InvalidConfig(msg.to_string())
    }

    pub fn device_lost<T: ToString>(msg: T) -> Self {
        RenderError::DeviceLost(msg.to_string())
    }

    pub fn upload<T: ToString>(msg: T) -> Self {
        RenderError::Upload(msg.to_string())
    }
}

/// Result type alias for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
