//! Bridge error types.
//!
//! Errors never cross the bridge boundary as panics. Permission flows carry
//! them inside their outcome; the scripting side sees a [`WireError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the notification bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// A category, action or channel descriptor is missing required fields or
    /// repeats an identifier. Rejected before anything reaches the native layer.
    #[error("malformed descriptor: {reason}")]
    MalformedDescriptor {
        /// What was wrong with the descriptor.
        reason: String,
    },

    /// The user declined the permission prompt.
    #[error("notification permissions were denied by the user")]
    PlatformDenied,

    /// The native API reported a genuine error.
    #[error("platform error {code}: {message}")]
    Platform {
        /// Native error code.
        code: i64,
        /// Native error description.
        message: String,
    },

    /// The installed payload formatter failed.
    #[error("payload formatter failed: {0}")]
    Formatter(String),

    /// Internal bookkeeping failure (e.g. a completion channel closed).
    #[error("{0}")]
    Internal(String),
}

impl BridgeError {
    /// Shorthand for [`BridgeError::MalformedDescriptor`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            reason: reason.into(),
        }
    }

    /// Classification for the wire.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedDescriptor { .. } => ErrorKind::MalformedDescriptor,
            Self::PlatformDenied => ErrorKind::PlatformDenied,
            Self::Platform { .. } => ErrorKind::PlatformError,
            Self::Formatter(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Serializable form handed to the scripting side.
    #[must_use]
    pub fn to_wire(&self) -> WireError {
        WireError {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Error classification exposed to the scripting side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// See [`BridgeError::MalformedDescriptor`].
    MalformedDescriptor,
    /// See [`BridgeError::PlatformDenied`].
    PlatformDenied,
    /// See [`BridgeError::Platform`].
    PlatformError,
    /// Anything else.
    Internal,
}

/// Error as delivered to the scripting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
