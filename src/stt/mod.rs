//! Speech-to-text: the transcription collaborator seam and its HTTP adapter.

pub mod http;
pub mod transcriber;

pub use http::HttpTranscriber;
pub use transcriber::{MockTranscriber, Transcriber, Transcription};
