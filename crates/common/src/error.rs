//! Error types shared across CaptureScreen crates.

/// Top-level error type for capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("No capture source was selected")]
    NoSourceSelected,

    #[error("Device error: {message}")]
    Device { message: String },

    #[error("Encoder unavailable: {message}")]
    EncoderUnavailable { message: String },

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    #[error("Frame unavailable: {message}")]
    FrameUnavailable { message: String },

    #[error("Another capture is already in progress")]
    CaptureInProgress,

    #[error("Artifact has been revoked")]
    ArtifactRevoked,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CaptureError.
pub type CaptureResult<T> = Result<T, CaptureError>;

impl CaptureError {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device {
            message: msg.into(),
        }
    }

    pub fn encoder_unavailable(msg: impl Into<String>) -> Self {
        Self::EncoderUnavailable {
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            message: msg.into(),
        }
    }

    pub fn frame_unavailable(msg: impl Into<String>) -> Self {
        Self::FrameUnavailable {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the user backed out of (or refused) a capture prompt.
    ///
    /// These are surfaced as notices rather than failures of the tool itself.
    pub fn is_user_declined(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. } | Self::NoSourceSelected)
    }
}
