//! Error types shared across screenrec crates.

use std::path::PathBuf;

/// Top-level error type for screenrec operations.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Mux error: {message}")]
    Mux { message: String },

    #[error("Platform error: {message}")]
    Platform { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Recording is already in progress")]
    AlreadyRecording,

    #[error("Recording has not started yet")]
    NotRecording,

    #[error("Recording missing: {} does not exist", .path.display())]
    RecordingMissing { path: PathBuf },

    #[error("Cannot save over the temporary file {}; choose another name", .path.display())]
    SaveTargetIsTemporary { path: PathBuf },

    #[error("Encoder not available: {binary}")]
    EncoderUnavailable { binary: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using RecorderError.
pub type RecorderResult<T> = Result<T, RecorderError>;

impl RecorderError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio {
            message: msg.into(),
        }
    }

    pub fn mux(msg: impl Into<String>) -> Self {
        Self::Mux {
            message: msg.into(),
        }
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
