use crate::types::RecorderState;
use thiserror::Error;

/// Failures reported by a capture backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Input combination rejected: {0}")]
    Rejected(String),
    #[error("Recording start failed: {0}")]
    Start(String),
    #[error("Recording finalize failed: {0}")]
    Finalize(String),
    #[error("Capture runtime error: {0}")]
    Runtime(String),
}

/// Errors surfaced by a recording session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Construction-time failure: unsupported or missing device.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Operation not valid for the current state. Never reaches the observer.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: RecorderState,
    },

    /// Preview requested while the backend pipeline is not built.
    #[error("Capture pipeline is not configured")]
    NotConfigured,

    /// Backend-reported recording failure, delivered through `did_end_recording`.
    #[error("Recording failure: {0}")]
    RecordingFailure(#[from] BackendError),
}

impl SessionError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SessionError::ConfigurationError(message.into())
    }

    pub fn invalid_state(operation: &'static str, state: RecorderState) -> Self {
        SessionError::InvalidState { operation, state }
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, SessionError::InvalidState { .. })
    }
}

/// Errors from loading, saving or validating a `RecorderConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
