//! Error types for TV control operations

use thiserror::Error;

/// Error type for TV control operations
///
/// Adapters convert most of these into boolean / `Unknown` / pairing outcomes
/// before they reach the caller. Only construction-time errors such as
/// [`ControlError::InvalidMacFormat`] are returned directly.
#[derive(Debug, Error)]
pub enum ControlError {
    /// MAC address did not normalize to 12 hex digits
    #[error("invalid MAC address format: {0}")]
    InvalidMacFormat(String),

    /// Host could not be reached (connect, DNS, socket failure)
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Request exceeded the client timeout
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Device refused a pairing request or grant
    #[error("pairing rejected: {status} - {body}")]
    PairingRejected {
        /// HTTP status line, e.g. `401 Unauthorized`
        status: String,
        /// Response body with markup and line breaks stripped
        body: String,
    },

    /// Non-success HTTP status outside of pairing
    #[error("request failed: {status} - {body}")]
    Http {
        /// HTTP status line
        status: String,
        /// Trimmed response body
        body: String,
    },

    /// Device answered with an unexpected JSON shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Key or action is not mapped for this vendor
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// PSK or paired secret is absent
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// Invalid configuration (unknown manufacturer, client construction)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ControlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ControlError::Timeout(err.to_string())
        } else if err.is_decode() {
            ControlError::MalformedResponse(err.to_string())
        } else {
            ControlError::NetworkUnreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::MalformedResponse(err.to_string())
    }
}

/// Result type for TV control operations
pub type Result<T> = std::result::Result<T, ControlError>;

/// The caller's cancellation token fired before the operation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Result type for public plugin operations
///
/// Protocol failures are folded into the `Ok` value; only cancellation
/// is surfaced as an error.
pub type Outcome<T> = std::result::Result<T, Cancelled>;
