//! Utterance → Transcript: timeout-bounded transcription collaborator call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;

use crate::error::VocmdError;
use crate::output::Output;
use crate::pipeline::error::StageError;
use crate::pipeline::stage::Stage;
use crate::pipeline::types::{Transcript, Utterance};
use crate::stt::transcriber::Transcriber;

pub struct TranscribeStage {
    transcriber: Arc<dyn Transcriber>,
    timeout: Duration,
    sample_rate: u32,
    output: Output,
}

impl TranscribeStage {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        timeout: Duration,
        sample_rate: u32,
        output: Output,
    ) -> Self {
        Self {
            transcriber,
            timeout,
            sample_rate,
            output,
        }
    }
}

impl Stage for TranscribeStage {
    type Input = Utterance;
    type Output = Transcript;

    fn process(&mut self, utterance: Utterance) -> Result<Option<Transcript>, StageError> {
        if utterance.samples.is_empty() {
            return Err(StageError::Recoverable(
                "empty utterance, nothing to transcribe".to_string(),
            ));
        }

        self.output.line(&format!(
            "captured speech ({}ms), transcribing...",
            utterance.duration_ms(self.sample_rate)
        ));

        // The collaborator runs on a helper thread so the stage can enforce
        // the timeout. On timeout the helper is abandoned; its late result
        // lands in a dropped channel, and the next utterance gets a fresh
        // helper (resubmission after timeout must not corrupt state).
        let (tx, rx) = bounded(1);
        let transcriber = Arc::clone(&self.transcriber);
        let samples = utterance.samples;
        let sample_rate = self.sample_rate;
        let started = Instant::now();
        std::thread::spawn(move || {
            let _ = tx.send(transcriber.transcribe(&samples, sample_rate));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(transcription)) => {
                let latency = started.elapsed();
                self.output
                    .line(&format!("heard: \"{}\"", transcription.text.trim()));
                Ok(Some(Transcript {
                    text: transcription.text,
                    confidence: transcription.confidence,
                    latency,
                    utterance_seq: utterance.sequence,
                }))
            }
            Ok(Err(e)) => Err(StageError::Recoverable(format!(
                "transcription failed: {}",
                e
            ))),
            Err(_) => Err(StageError::Recoverable(format!(
                "{}, utterance dropped",
                VocmdError::CollaboratorTimeout {
                    stage: "transcription",
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "transcribe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::transcriber::MockTranscriber;

    fn utterance(samples: Vec<i16>, sequence: u64) -> Utterance {
        let now = Instant::now();
        Utterance {
            samples,
            started_at: now,
            ended_at: now,
            sequence,
        }
    }

    #[test]
    fn forwards_transcript_with_sequence() {
        let transcriber = Arc::new(MockTranscriber::new("mock").with_response("git status"));
        let mut stage = TranscribeStage::new(
            transcriber,
            Duration::from_secs(1),
            16000,
            Output::silent(),
        );

        let transcript = stage
            .process(utterance(vec![100i16; 8000], 7))
            .unwrap()
            .unwrap();
        assert_eq!(transcript.text, "git status");
        assert_eq!(transcript.utterance_seq, 7);
    }

    #[test]
    fn empty_utterance_rejected_before_collaborator() {
        let transcriber = Arc::new(MockTranscriber::new("mock").with_failure());
        let mut stage = TranscribeStage::new(
            transcriber,
            Duration::from_secs(1),
            16000,
            Output::silent(),
        );

        // The failing mock is never reached; the empty check fires first.
        match stage.process(utterance(vec![], 0)) {
            Err(StageError::Recoverable(msg)) => assert!(msg.contains("empty utterance")),
            other => panic!("expected recoverable, got {:?}", other),
        }
    }

    #[test]
    fn collaborator_failure_is_recoverable() {
        let transcriber = Arc::new(MockTranscriber::new("mock").with_failure());
        let mut stage = TranscribeStage::new(
            transcriber,
            Duration::from_secs(1),
            16000,
            Output::silent(),
        );

        match stage.process(utterance(vec![1i16; 100], 0)) {
            Err(StageError::Recoverable(msg)) => {
                assert!(msg.contains("transcription failed"));
            }
            other => panic!("expected recoverable, got {:?}", other),
        }
    }

    #[test]
    fn slow_collaborator_times_out_and_stage_survives() {
        let transcriber = Arc::new(
            MockTranscriber::new("slow")
                .with_response("late answer")
                .with_delay(Duration::from_millis(500)),
        );
        let mut stage = TranscribeStage::new(
            Arc::clone(&transcriber) as Arc<dyn Transcriber>,
            Duration::from_millis(1),
            16000,
            Output::silent(),
        );

        match stage.process(utterance(vec![1i16; 100], 0)) {
            Err(StageError::Recoverable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }

        // the stage accepts the next utterance with a working deadline
        let mut stage = TranscribeStage::new(
            Arc::new(MockTranscriber::new("fast").with_response("ok")),
            Duration::from_secs(1),
            16000,
            Output::silent(),
        );
        assert!(stage.process(utterance(vec![1i16; 100], 1)).is_ok());
    }
}
