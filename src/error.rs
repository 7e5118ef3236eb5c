//! Crate error types and the pluggable error reporter.

use log::error;
use thiserror::Error;

/// Failure categories for serialization, deserialization and prefab
/// instantiation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorCode {
    /// The payload could not be parsed at all.
    InvalidPayload,
    /// A required field is absent.
    MissingField,
    /// A field or document has the wrong shape.
    TypeMismatch,
    /// A component name has no registered codec.
    ComponentNotRegistered,
    /// No prefab with the requested name was loaded.
    UnknownPrefab,
    /// A codec or the store itself failed unexpectedly.
    InternalError,
}

/// A `{code, message}` error produced by the serialization and prefab
/// collaborators.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{code:?}: {message}")]
pub struct CodecError {
    /// The failure category.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

impl CodecError {
    /// Creates an error from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CodecError {
            code,
            message: message.into(),
        }
    }
}

/// The system graph could not be layered.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum ScheduleError {
    /// The named dependency graph contains a cycle, or a system depends on a
    /// name that was never registered.
    #[error("system graph contains a dependency cycle or a missing dependency")]
    CycleOrMissing,
}

/// A task was submitted to a thread pool that has begun shutting down.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("task submitted to a stopped thread pool")]
pub struct SubmitError;

/// Receives every error the serialization and prefab collaborators report.
///
/// Install a custom reporter with
/// [`SerializationContext::set_error_reporter`](crate::SerializationContext::set_error_reporter)
/// to collect or redirect failures; reporting never replaces the returned
/// `Result`, it only mirrors it.
pub trait ErrorReporter: Send {
    /// Called once per reported failure.
    fn report(&mut self, error: &CodecError);
}

/// The default reporter: forwards failures to the `log` facade at error
/// level.
#[derive(Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&mut self, err: &CodecError) {
        error!("{err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_displays_code_and_message() {
        let err = CodecError::new(ErrorCode::MissingField, "entity missing 'id'");
        assert_eq!(format!("{err}"), "MissingField: entity missing 'id'");
    }
}
