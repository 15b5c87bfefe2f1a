//! Error types for the Snorkle bridge
//!
//! `SnorkleError` unifies every failure the bridge can surface. Failures that
//! cross the executor boundary travel as an `ErrorClass` plus a message and are
//! rebuilt on the caller side as `SnorkleError::Rejected`.

use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Error Classes
// ----------------------------------------------------------------------------

/// Diagnostic class attached to every `ERROR` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The handler (SDK or RPC) failed
    Operation,
    /// No handler is registered for the requested operation
    UnknownOperation,
    /// The request payload was rejected before any collaborator was called
    Validation,
    /// The request frame could not be decoded
    Protocol,
    /// The executor refused the request because it is saturated
    Overloaded,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Operation => write!(f, "operation"),
            ErrorClass::UnknownOperation => write!(f, "unknown_operation"),
            ErrorClass::Validation => write!(f, "validation"),
            ErrorClass::Protocol => write!(f, "protocol"),
            ErrorClass::Overloaded => write!(f, "overloaded"),
        }
    }
}

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures talking to the remote chain REST API
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Request to {url} failed with HTTP status {status}")]
    Http { url: String, status: u16 },
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("Malformed JSON from {url}: {reason}")]
    MalformedJson { url: String, reason: String },
    #[error("Invalid endpoint: {reason}")]
    InvalidEndpoint { reason: String },
}

impl RpcError {
    /// Whether the server answered 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, RpcError::Http { status: 404, .. })
    }
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error type for the Snorkle bridge
#[derive(Debug, thiserror::Error)]
pub enum SnorkleError {
    /// The background execution context failed to start, crashed, or went away
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// The requested operation has no registered handler
    #[error("Unknown operation: {operation}")]
    UnknownOperation { operation: String },

    /// A handler failed; the message is shown to the user verbatim
    #[error("{message}")]
    Operation { message: String },

    /// Malformed user input
    #[error("Validation error: {reason}")]
    Validation { reason: String },

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Failure reported by the external SDK
    #[error("SDK error: {message}")]
    Sdk { message: String },

    /// A frame could not be decoded
    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An `ERROR` frame returned by the executor
    #[error("{message}")]
    Rejected { class: ErrorClass, message: String },

    /// The call was aborted before its handler finished
    #[error("Operation aborted: {reason}")]
    Aborted { reason: String },

    #[error("Call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Executor overloaded: {reason}")]
    Overloaded { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Storage error: {reason}")]
    Storage { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl SnorkleError {
    /// Create a transport error
    pub fn transport<T: Into<String>>(reason: T) -> Self {
        SnorkleError::Transport {
            reason: reason.into(),
        }
    }

    /// Create an operation error with a user-facing message
    pub fn operation<T: Into<String>>(message: T) -> Self {
        SnorkleError::Operation {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<T: Into<String>>(reason: T) -> Self {
        SnorkleError::Validation {
            reason: reason.into(),
        }
    }

    /// Create an SDK error
    pub fn sdk<T: Into<String>>(message: T) -> Self {
        SnorkleError::Sdk {
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol<T: Into<String>>(reason: T) -> Self {
        SnorkleError::Protocol {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        SnorkleError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage<T: Into<String>>(reason: T) -> Self {
        SnorkleError::Storage {
            reason: reason.into(),
        }
    }

    /// Class used when this error is reported across the executor boundary
    pub fn class(&self) -> ErrorClass {
        match self {
            SnorkleError::UnknownOperation { .. } => ErrorClass::UnknownOperation,
            SnorkleError::Validation { .. } => ErrorClass::Validation,
            SnorkleError::Protocol { .. } | SnorkleError::Serialization(_) => {
                ErrorClass::Protocol
            }
            SnorkleError::Overloaded { .. } => ErrorClass::Overloaded,
            SnorkleError::Rejected { class, .. } => *class,
            _ => ErrorClass::Operation,
        }
    }

    /// Whether the bridge itself (not the operation) failed
    pub fn is_transport(&self) -> bool {
        matches!(self, SnorkleError::Transport { .. })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type SnorkleResult<T> = core::result::Result<T, SnorkleError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_class_mapping() {
        assert_eq!(
            SnorkleError::UnknownOperation {
                operation: "ALEO_MINT".into()
            }
            .class(),
            ErrorClass::UnknownOperation
        );
        assert_eq!(
            SnorkleError::validation("amount").class(),
            ErrorClass::Validation
        );
        assert_eq!(SnorkleError::sdk("bad key").class(), ErrorClass::Operation);
        assert_eq!(
            SnorkleError::Rpc(RpcError::Http {
                url: "http://localhost".into(),
                status: 500
            })
            .class(),
            ErrorClass::Operation
        );
    }

    #[test]
    fn test_operation_message_is_verbatim() {
        let err = SnorkleError::operation("Program foo.aleo already exists on the network");
        assert_eq!(err.to_string(), "Program foo.aleo already exists on the network");
    }

    #[test]
    fn test_rpc_not_found() {
        let err = RpcError::Http {
            url: "http://localhost:3030/testnet/program/x.aleo".into(),
            status: 404,
        };
        assert!(err.is_not_found());
    }
}
