use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, VocmdError};

/// A transcription with the collaborator's own confidence estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    /// 0.0 to 1.0; adapters without a confidence signal report 1.0.
    pub confidence: f32,
}

impl Transcription {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Trait for speech-to-text transcription.
///
/// The pipeline only ever sees this seam, so the HTTP adapter can be swapped
/// for a mock in tests or a different backend later.
pub trait Transcriber: Send + Sync {
    /// Transcribes 16-bit PCM mono audio to text.
    fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<Transcription>;

    /// Adapter name for logging.
    fn name(&self) -> &str;
}

/// Allow sharing one transcriber across stages.
impl<T: Transcriber> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<Transcription> {
        (**self).transcribe(audio, sample_rate)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock transcriber for tests.
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    name: String,
    response: String,
    confidence: f32,
    should_fail: bool,
    delay: Option<Duration>,
}

impl MockTranscriber {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: "mock transcription".to_string(),
            confidence: 1.0,
            should_fail: false,
            delay: None,
        }
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Sleeps before answering, for exercising the stage timeout.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _audio: &[i16], _sample_rate: u32) -> Result<Transcription> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.should_fail {
            Err(VocmdError::Transcription {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(Transcription::new(self.response.clone(), self.confidence))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
