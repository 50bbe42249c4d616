//! Data types flowing through the voice command pipeline.

use crate::error::VocmdError;
use crate::gate::GateEvent;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// A fixed-duration block of raw audio samples.
#[derive(Debug, Clone)]
pub struct Frame {
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
    /// Timestamp when this frame was captured.
    pub timestamp: Instant,
    /// Monotonically increasing sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl Frame {
    /// Creates a new frame.
    pub fn new(samples: Vec<i16>, timestamp: Instant, sequence: u64) -> Self {
        Self {
            samples,
            timestamp,
            sequence,
        }
    }

    /// Duration of this frame in milliseconds at the given sample rate.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        (self.samples.len() as u64 * 1000 / sample_rate as u64) as u32
    }
}

/// Per-frame speech/silence classification result.
#[derive(Debug, Clone, Copy)]
pub struct ActivityVerdict {
    /// Whether speech was detected in this frame.
    pub is_speech: bool,
    /// Classifier confidence (0.0 = certain silence, 1.0 = certain speech).
    pub confidence: f32,
    /// Time the classifier took for this frame.
    pub latency: Duration,
    /// True while the gate runs on the energy fallback instead of the
    /// primary classifier collaborator.
    pub degraded: bool,
}

/// A frame annotated with its activity verdict and the gate's transition.
#[derive(Debug, Clone)]
pub struct GatedFrame {
    pub frame: Frame,
    pub verdict: ActivityVerdict,
    pub event: GateEvent,
}

/// Contiguous audio spanning one detected speech region.
///
/// Owned by the assembler until handed to the transcription stage; the
/// assembler resets afterwards, so exactly one utterance is open at a time.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Concatenated PCM samples from speech start to speech end.
    pub samples: Vec<i16>,
    /// Capture timestamp of the first frame in the utterance.
    pub started_at: Instant,
    /// Capture timestamp of the frame that closed the utterance.
    pub ended_at: Instant,
    /// Close-order sequence number. Dispatch order must equal this order.
    pub sequence: u64,
}

impl Utterance {
    /// Duration of the buffered audio in milliseconds at the given sample rate.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        (self.samples.len() as u64 * 1000 / sample_rate as u64) as u32
    }
}

/// Text result from the transcription collaborator.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// The transcribed text.
    pub text: String,
    /// Collaborator confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Wall-clock time the collaborator call took.
    pub latency: Duration,
    /// Sequence of the utterance this transcript came from.
    pub utterance_seq: u64,
}

/// How the intent stage resolved a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Confidence met the threshold; the command may be dispatched.
    Resolved,
    /// Confidence below threshold; must not reach an action handler.
    Unresolved,
    /// Empty transcript short-circuited without invoking the collaborator.
    NoOp,
}

/// A structured command ready for dispatch.
#[derive(Debug, Clone)]
pub struct Command {
    /// Intent label from the closed vocabulary (or whatever the collaborator
    /// returned — unknown labels fail closed at dispatch).
    pub label: String,
    /// Extracted parameters, unique keys.
    pub params: BTreeMap<String, String>,
    /// Classification confidence.
    pub confidence: f32,
    /// Threshold gating outcome, decided by the intent stage.
    pub resolution: Resolution,
    /// The transcript this command was classified from, for operator output.
    pub transcript: String,
}

impl Command {
    /// A no-op command for empty transcripts. Never dispatched.
    pub fn noop() -> Self {
        Self {
            label: String::new(),
            params: BTreeMap::new(),
            confidence: 0.0,
            resolution: Resolution::NoOp,
            transcript: String::new(),
        }
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Outcome status of a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Success,
    Failure,
    UnsupportedIntent,
}

/// Outcome of dispatching one command to an action handler.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub status: ActionStatus,
    /// Human-readable outcome, shown to the operator.
    pub message: String,
    /// Optional structured payload (e.g. a created file path).
    pub payload: Option<serde_json::Value>,
}

impl ActionResult {
    /// Creates a success result.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Success,
            message: message.into(),
            payload: None,
        }
    }

    /// Creates a success result carrying a structured payload.
    pub fn success_with_payload(message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            status: ActionStatus::Success,
            message: message.into(),
            payload: Some(payload),
        }
    }

    /// Creates a failure result.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failure,
            message: message.into(),
            payload: None,
        }
    }

    /// Creates an unsupported-intent result. Unknown intents fail closed.
    pub fn unsupported(label: &str) -> Self {
        Self {
            status: ActionStatus::UnsupportedIntent,
            message: VocmdError::UnsupportedIntent {
                label: label.to_string(),
            }
            .to_string(),
            payload: None,
        }
    }

    /// Returns true if the action succeeded.
    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

/// A dispatched command together with its result, surfaced to the orchestrator.
#[derive(Debug, Clone)]
pub struct ActionReport {
    /// Label of the dispatched command.
    pub label: String,
    /// Transcript the command came from.
    pub transcript: String,
    /// What the handler returned.
    pub result: ActionResult,
    /// Time spent inside the handler.
    pub latency: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration_at_16khz() {
        let frame = Frame::new(vec![0i16; 512], Instant::now(), 0);
        assert_eq!(frame.duration_ms(16000), 32);
    }

    #[test]
    fn frame_carries_sequence() {
        let frame = Frame::new(vec![1, 2, 3], Instant::now(), 42);
        assert_eq!(frame.sequence, 42);
        assert_eq!(frame.samples, vec![1, 2, 3]);
    }

    #[test]
    fn utterance_duration_at_16khz() {
        let now = Instant::now();
        let utterance = Utterance {
            samples: vec![0i16; 16000],
            started_at: now,
            ended_at: now,
            sequence: 0,
        };
        assert_eq!(utterance.duration_ms(16000), 1000);
    }

    #[test]
    fn noop_command_is_not_resolved() {
        let cmd = Command::noop();
        assert_eq!(cmd.resolution, Resolution::NoOp);
        assert!(cmd.label.is_empty());
    }

    #[test]
    fn command_param_lookup() {
        let mut params = BTreeMap::new();
        params.insert("file".to_string(), "main.rs".to_string());
        let cmd = Command {
            label: "open_file".to_string(),
            params,
            confidence: 0.9,
            resolution: Resolution::Resolved,
            transcript: "open main.rs".to_string(),
        };
        assert_eq!(cmd.param("file"), Some("main.rs"));
        assert_eq!(cmd.param("branch"), None);
    }

    #[test]
    fn action_result_constructors() {
        let ok = ActionResult::success("done");
        assert_eq!(ok.status, ActionStatus::Success);
        assert!(ok.is_success());
        assert!(ok.payload.is_none());

        let err = ActionResult::failure("missing file");
        assert_eq!(err.status, ActionStatus::Failure);
        assert!(!err.is_success());

        let unsupported = ActionResult::unsupported("fold_laundry");
        assert_eq!(unsupported.status, ActionStatus::UnsupportedIntent);
        assert!(unsupported.message.contains("fold_laundry"));
    }

    #[test]
    fn action_result_payload_round_trip() {
        let result = ActionResult::success_with_payload(
            "created",
            serde_json::json!({"path": "/tmp/notes.md"}),
        );
        let payload = result.payload.unwrap();
        assert_eq!(payload["path"], "/tmp/notes.md");
    }
}
