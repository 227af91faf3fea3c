//! Error types for the cellar store
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every failing operation surfaces a human-readable message that combines
//! the underlying engine's diagnostic with this layer's context (which
//! operation, which key where relevant). Errors are carried in the result
//! value of each call; there is no per-connection "last error" side slot.

use crate::types::SessionId;
use std::io;
use thiserror::Error;

/// Result type alias for cellar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cellar store
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Engine file cannot be opened or created
    #[error("cannot open database at '{path}': {reason}")]
    Open {
        /// Path the caller asked for
        path: String,
        /// Engine diagnostic
        reason: String,
    },

    /// Referenced session id is not currently open
    #[error("session {0} is not open")]
    SessionNotFound(SessionId),

    /// No session is open and none was specified
    #[error("no database session is open")]
    NoDefaultSession,

    /// Key not present (strict operations such as delete)
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Underlying engine operation failed for reasons opaque to this layer
    #[error("engine error during {op}: {message}")]
    Engine {
        /// Operation that failed (get, put, delete, ...)
        op: &'static str,
        /// Engine diagnostic
        message: String,
    },

    /// Engine-level data corruption (log records, file headers)
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Stored blob does not parse as a valid typed array
    #[error("corrupt stored value: {0}")]
    CorruptValue(String),

    /// Typed array shape does not match its payload
    #[error("invalid array shape: {0}")]
    InvalidShape(String),
}

impl Error {
    /// Render an arbitrary byte key for error messages.
    ///
    /// Keys are raw bytes; most are printable text in practice, so show
    /// them lossily rather than as a byte dump.
    pub fn display_key(key: &[u8]) -> String {
        String::from_utf8_lossy(key).into_owned()
    }
}
