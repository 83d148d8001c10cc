//! Error types for the coordination runtime.
//!
//! Provides structured error handling instead of panics. Nothing inside
//! the runtime propagates an error across a thread boundary; every
//! failure is logged where it happens and surfaced as a boolean or
//! `Result` to the local caller.

use std::error::Error;
use std::fmt;

/// Result type for coordination operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur inside the coordination runtime.
#[derive(Debug, Clone)]
pub enum CoreError {
    /// Cell-related errors.
    Cell(CellError),
    /// A registered handler failed while processing a message.
    Handler { kind: String, reason: String },
    /// I/O errors (wrapped).
    Io(String),
    /// Serialization errors.
    Serialization(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Cell(e) => write!(f, "Cell error: {}", e),
            CoreError::Handler { kind, reason } => {
                write!(f, "Handler for '{}' failed: {}", kind, reason)
            }
            CoreError::Io(msg) => write!(f, "I/O error: {}", msg),
            CoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl Error for CoreError {}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

/// Cell-related errors.
#[derive(Debug, Clone)]
pub enum CellError {
    /// A cell with this name is already registered.
    DuplicateName(String),
    /// The cell has not been registered with a coordinator.
    NotRegistered(String),
    /// The named cell is unknown to the registry.
    UnknownCell(String),
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellError::DuplicateName(name) => write!(f, "Duplicate cell name: {}", name),
            CellError::NotRegistered(name) => {
                write!(f, "Cell not registered with a coordinator: {}", name)
            }
            CellError::UnknownCell(name) => write!(f, "Unknown cell: {}", name),
        }
    }
}

// Convenience constructors
impl CoreError {
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        CoreError::Cell(CellError::DuplicateName(name.into()))
    }

    pub fn not_registered(name: impl Into<String>) -> Self {
        CoreError::Cell(CellError::NotRegistered(name.into()))
    }

    pub fn unknown_cell(name: impl Into<String>) -> Self {
        CoreError::Cell(CellError::UnknownCell(name.into()))
    }

    pub fn handler(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::Handler {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = CoreError::duplicate_name("m1");
        assert_eq!(err.to_string(), "Cell error: Duplicate cell name: m1");

        let err = CoreError::handler("scan_result", "bad payload");
        assert_eq!(
            err.to_string(),
            "Handler for 'scan_result' failed: bad payload"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
