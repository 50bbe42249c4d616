//! Real-time voice command pipeline.
//!
//! Frames flow source → gate → assembler → transcribe → intent → dispatch,
//! one thread per stage over bounded channels. [`orchestrator::Pipeline`]
//! wires it together and owns the session lifecycle.

pub mod assembler;
pub mod dispatch_stage;
pub mod error;
pub mod gate_stage;
pub mod intent_stage;
pub mod orchestrator;
pub mod stage;
pub mod transcribe_stage;
pub mod types;

pub use error::{ErrorReporter, LogReporter, StageError};
pub use orchestrator::{FatalReason, Pipeline, PipelineConfig, PipelineDeps, PipelineHandle};
pub use stage::{Stage, StageRunner};
