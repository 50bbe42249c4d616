//! Error types for vocmd.
//!
//! The taxonomy mirrors how the pipeline recovers: everything except
//! `DeviceLost` and `PipelineOverrun` is reported and the loop keeps
//! listening for the next utterance.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VocmdError {
    // Frame source errors
    #[error("Audio device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Audio device lost: {message}")]
    DeviceLost { message: String },

    #[error("Audio capture failed: {message}")]
    Capture { message: String },

    // Collaborator errors
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    #[error("Intent classification failed: {message}")]
    IntentClassification { message: String },

    #[error("{stage} collaborator timed out after {timeout_ms}ms")]
    CollaboratorTimeout { stage: &'static str, timeout_ms: u64 },

    // Dispatch errors
    #[error("No action handler registered for intent: {label}")]
    UnsupportedIntent { label: String },

    #[error("Action failed: {message}")]
    ActionFailure { message: String },

    // Pipeline errors
    #[error("Pipeline overrun: frame queue exceeded {capacity} frames")]
    PipelineOverrun { capacity: usize },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VocmdError>;
