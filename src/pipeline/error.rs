//! Error types and reporting for pipeline stages.

use std::fmt;

use crate::output::eprintln_clear;

/// Errors that can occur during stage processing.
#[derive(Debug, Clone)]
pub enum StageError {
    /// Recoverable error; the stage reports it and keeps processing.
    Recoverable(String),
    /// Fatal error; the stage shuts down and the session ends.
    Fatal(String),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Recoverable(msg) => write!(f, "{}", msg),
            StageError::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

impl std::error::Error for StageError {}

/// Trait for reporting stage errors to the operator.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a stage.
    fn report(&self, stage: &str, error: &StageError);
}

/// Default reporter that logs to stderr, clearing any active meter line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, stage: &str, error: &StageError) {
        eprintln_clear(&format!("vocmd [{}]: {}", stage, error));
    }
}
