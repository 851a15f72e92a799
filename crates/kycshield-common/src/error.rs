//! Error types for KYCShield clients
//!
//! Provides a unified error type and the validation error variants raised
//! before any remote call is attempted.
//!
//! Malformed (but well-formed JSON) responses are absent here:
//! they are normalized to falsy/zero by the verdict normalizer.

use serde::Serialize;
use thiserror::Error;

use crate::types::capability::Capability;

/// Result type alias using KycError
pub type Result<T> = std::result::Result<T, KycError>;

/// Unified error type for KYCShield client operations
#[derive(Debug, Error)]
pub enum KycError {
    // Input problems detected before a call is made
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // Network failure or non-JSON body
    #[error("Transport error: {0}")]
    Transport(String),

    // The service answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{capability} check timed out after {limit_ms}ms")]
    Timeout { capability: Capability, limit_ms: u64 },

    // Superseded by a newer run or explicitly cancelled
    #[error("Verification run cancelled")]
    Cancelled,

    #[error("Invalid state transition: {event} while {from}")]
    InvalidTransition { from: String, event: String },

    #[error("Capability mismatch: expected {expected} outcome, got {actual}")]
    CapabilityMismatch {
        expected: Capability,
        actual: Capability,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Validation errors raised before a remote call is made
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required file(s): {}", .0.join(", "))]
    MissingFiles(Vec<String>),

    #[error("Slot '{slot}' is not accepted by this check")]
    SlotNotAccepted { slot: String },

    #[error("{slot} has unsupported media type '{content_type}' (expected {expected})")]
    UnsupportedMediaType {
        slot: String,
        content_type: String,
        expected: String,
    },

    #[error("{slot} is too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { slot: String, size: u64, max: u64 },

    #[error("{slot} is empty")]
    EmptyFile { slot: String },

    #[error("Session has no refresh token, log in first")]
    MissingRefreshToken,
}

/// Coarse error classes, matching how failures are presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Reported inline, no call was made
    Validation,
    /// Network, HTTP status, or body decoding failure
    Transport,
    /// A call exceeded its time limit
    Timeout,
    /// The run was superseded or cancelled
    Cancelled,
    /// Programming or configuration errors
    Internal,
}

impl KycError {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            KycError::Validation(_) => ErrorCategory::Validation,
            KycError::Transport(_) | KycError::Api { .. } => ErrorCategory::Transport,
            KycError::Timeout { .. } => ErrorCategory::Timeout,
            KycError::Cancelled => ErrorCategory::Cancelled,
            KycError::InvalidTransition { .. }
            | KycError::CapabilityMismatch { .. }
            | KycError::Config(_)
            | KycError::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Whether a fresh user-initiated attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Timeout | ErrorCategory::Cancelled
        )
    }
}

// Implement From for common external error types
impl From<serde_json::Error> for KycError {
    fn from(err: serde_json::Error) -> Self {
        KycError::Transport(format!("invalid JSON: {}", err))
    }
}

impl From<std::io::Error> for KycError {
    fn from(err: std::io::Error) -> Self {
        KycError::Io(err.to_string())
    }
}
