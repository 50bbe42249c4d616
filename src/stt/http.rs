//! HTTP adapter for a remote transcription service.
//!
//! Posts the utterance as a WAV file in a multipart form and expects a JSON
//! body with the transcript text and an optional confidence field. Works with
//! OpenAI-compatible `/audio/transcriptions` endpoints and local servers
//! exposing the same shape.

use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;

use crate::audio::wav::encode_wav;
use crate::error::{Result, VocmdError};
use crate::stt::transcriber::{Transcriber, Transcription};

/// Settings for the HTTP transcription adapter.
#[derive(Debug, Clone)]
pub struct HttpTranscriberConfig {
    /// Full endpoint URL, e.g. `http://127.0.0.1:8080/v1/audio/transcriptions`.
    pub endpoint: String,
    /// Model name sent with the request, e.g. `whisper-1`.
    pub model: String,
    /// Bearer token, sent only when set.
    pub api_key: Option<String>,
    /// Language hint passed through to the service.
    pub language: String,
    /// Per-request timeout. The stage enforces its own deadline as well; this
    /// one keeps the worker thread from hanging on a dead connection forever.
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Remote transcription over HTTP.
///
/// The blocking client is created lazily on the stage's worker thread. It
/// must not be built inside an async runtime, and stage threads never are.
pub struct HttpTranscriber {
    config: HttpTranscriberConfig,
    client: OnceLock<reqwest::blocking::Client>,
}

impl HttpTranscriber {
    pub fn new(config: HttpTranscriberConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = reqwest::blocking::Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| VocmdError::Transcription {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(self.client.get_or_init(|| built))
    }
}

impl Transcriber for HttpTranscriber {
    fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<Transcription> {
        let wav_bytes = encode_wav(audio, sample_rate)?;

        let part = reqwest::blocking::multipart::Part::bytes(wav_bytes)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| VocmdError::Transcription {
                message: format!("Failed to build multipart body: {}", e),
            })?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone());

        let mut request = self.client()?.post(&self.config.endpoint).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| VocmdError::Transcription {
            message: format!("Transcription request failed: {}", e),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VocmdError::Transcription {
                message: format!("Transcription service returned {}: {}", status, body),
            });
        }

        let parsed: TranscriptionResponse =
            response.json().map_err(|e| VocmdError::Transcription {
                message: format!("Invalid transcription response: {}", e),
            })?;

        Ok(Transcription::new(
            parsed.text,
            parsed.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
        ))
    }

    fn name(&self) -> &str {
        "http"
    }
}
