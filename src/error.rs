//! Error handling for DuckIt
//!
//! Nothing in the sensor is fatal. Every variant maps onto one of the
//! degradation paths: unsupported environment, capture conflict, messaging
//! failure or invalid payload. Callers at the component boundary decide how
//! far to narrow the attenuation capability; the adapters just report.

use thiserror::Error;

use crate::host::{AudioNodeId, ContextId, ElementId};

/// Result type alias for sensor operations
pub type Result<T> = std::result::Result<T, SensorError>;

/// Main error type for sensor operations
#[derive(Error, Debug)]
pub enum SensorError {
    // Environment Errors
    #[error("Audio API unavailable in this environment")]
    UnsupportedEnvironment,

    #[error("Media source for element {element} is already held by another consumer")]
    CaptureConflict { element: ElementId },

    // Messaging Errors
    #[error("No listener for outbound event")]
    NoListener,

    #[error("Invalid command payload for '{field}': {reason}")]
    InvalidPayload { field: String, reason: String },

    // Lookup Errors
    #[error("Unknown element: {element}")]
    UnknownElement { element: ElementId },

    #[error("Unknown audio node: {node}")]
    UnknownNode { node: AudioNodeId },

    #[error("Unknown audio context: {context}")]
    UnknownContext { context: ContextId },

    // Backend Errors
    #[error("Audio backend error: {reason}")]
    Backend { reason: String },

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SensorError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SensorError::UnsupportedEnvironment => "UNSUPPORTED_ENVIRONMENT",
            SensorError::CaptureConflict { .. } => "CAPTURE_CONFLICT",
            SensorError::NoListener => "NO_LISTENER",
            SensorError::InvalidPayload { .. } => "INVALID_PAYLOAD",
            SensorError::UnknownElement { .. } => "UNKNOWN_ELEMENT",
            SensorError::UnknownNode { .. } => "UNKNOWN_NODE",
            SensorError::UnknownContext { .. } => "UNKNOWN_CONTEXT",
            SensorError::Backend { .. } => "BACKEND_ERROR",
            SensorError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the sensor keeps full capability after this error
    ///
    /// Unsupported environments and capture conflicts permanently narrow
    /// what can be done for the affected context or element; everything
    /// else is transient.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SensorError::UnsupportedEnvironment | SensorError::CaptureConflict { .. }
        )
    }

    /// Shorthand for backend failures
    pub fn backend(reason: impl Into<String>) -> Self {
        SensorError::Backend {
            reason: reason.into(),
        }
    }
}
