//! vocmd - voice-driven developer assistant
//!
//! Speak a command, have it transcribed, classified, and executed against
//! your workspace. Built as a streaming pipeline of single-responsibility
//! stages over bounded channels.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod intent;
pub mod output;
pub mod pipeline;
pub mod stt;

// Core traits (source → stages → actions)
pub use audio::source::FrameSource;
pub use dispatch::executor::{CommandExecutor, SystemCommandExecutor};
pub use dispatch::registry::{ActionHandler, ActionRegistry};
pub use gate::classifier::SpeechClassifier;
pub use intent::classifier::IntentClassifier;
pub use stt::transcriber::Transcriber;

// Pipeline
pub use pipeline::orchestrator::{
    FatalReason, Pipeline, PipelineConfig, PipelineDeps, PipelineHandle,
};

// Error handling
pub use error::{Result, VocmdError};

// Config
pub use config::Config;

// Stage framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StageError};
pub use pipeline::stage::Stage;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
