//! Transcript → Command: classification, entity extraction, confidence gate.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::bounded;

use crate::error::VocmdError;
use crate::intent::classifier::IntentClassifier;
use crate::intent::entities;
use crate::output::Output;
use crate::pipeline::error::StageError;
use crate::pipeline::stage::Stage;
use crate::pipeline::types::{Command, Resolution, Transcript};

pub struct IntentStage {
    classifier: Arc<dyn IntentClassifier>,
    timeout: Duration,
    confidence_threshold: f32,
    output: Output,
}

impl IntentStage {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        timeout: Duration,
        confidence_threshold: f32,
        output: Output,
    ) -> Self {
        Self {
            classifier,
            timeout,
            confidence_threshold,
            output,
        }
    }
}

impl Stage for IntentStage {
    type Input = Transcript;
    type Output = Command;

    fn process(&mut self, transcript: Transcript) -> Result<Option<Command>, StageError> {
        let text = transcript.text.trim().to_string();

        // Silence misfires produce empty transcripts; don't waste a
        // collaborator call on them.
        if text.is_empty() {
            self.output.verbose("empty transcript, nothing to do");
            return Ok(Some(Command::noop()));
        }

        let (tx, rx) = bounded(1);
        let classifier = Arc::clone(&self.classifier);
        let text_for_call = text.clone();
        std::thread::spawn(move || {
            let _ = tx.send(classifier.classify(&text_for_call));
        });

        let guess = match rx.recv_timeout(self.timeout) {
            Ok(Ok(guess)) => guess,
            Ok(Err(e)) => {
                return Err(StageError::Recoverable(format!(
                    "intent classification failed: {}",
                    e
                )));
            }
            Err(_) => {
                return Err(StageError::Recoverable(
                    VocmdError::CollaboratorTimeout {
                        stage: "intent",
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                    .to_string(),
                ));
            }
        };

        let command = match guess {
            Some(guess) => {
                let resolution = if guess.confidence >= self.confidence_threshold {
                    Resolution::Resolved
                } else {
                    Resolution::Unresolved
                };
                self.output.verbose(&format!(
                    "intent {} ({:.2}) via \"{}\"",
                    guess.intent,
                    guess.confidence,
                    guess.matched_phrase
                ));
                Command {
                    label: guess.intent.label().to_string(),
                    params: entities::extract(guess.intent, &text),
                    confidence: guess.confidence,
                    resolution,
                    transcript: text,
                }
            }
            None => Command {
                label: "unknown".to_string(),
                params: Default::default(),
                confidence: 0.0,
                resolution: Resolution::Unresolved,
                transcript: text,
            },
        };

        Ok(Some(command))
    }

    fn name(&self) -> &'static str {
        "intent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::classifier::{KeywordClassifier, MockIntentClassifier};
    use crate::intent::vocabulary::Intent;
    use std::time::Instant;

    fn transcript(text: &str) -> Transcript {
        Transcript {
            text: text.to_string(),
            confidence: 1.0,
            latency: Duration::ZERO,
            utterance_seq: 0,
        }
    }

    fn stage_with(classifier: Arc<dyn IntentClassifier>, threshold: f32) -> IntentStage {
        IntentStage::new(classifier, Duration::from_secs(1), threshold, Output::silent())
    }

    #[test]
    fn empty_transcript_short_circuits_without_collaborator() {
        // a failing classifier proves the short-circuit: it is never called
        let classifier = Arc::new(MockIntentClassifier::new().with_failure());
        let mut stage = stage_with(classifier, 0.55);

        let command = stage.process(transcript("   ")).unwrap().unwrap();
        assert_eq!(command.resolution, Resolution::NoOp);
    }

    #[test]
    fn confident_guess_is_resolved_with_params() {
        let mut stage = stage_with(Arc::new(KeywordClassifier::new()), 0.55);
        let command = stage
            .process(transcript("open file main dot rs"))
            .unwrap()
            .unwrap();
        assert_eq!(command.label, "open_file");
        assert_eq!(command.resolution, Resolution::Resolved);
        assert_eq!(command.param("filename"), Some("main.rs"));
    }

    #[test]
    fn low_confidence_is_tagged_unresolved() {
        let classifier = Arc::new(MockIntentClassifier::new().with_guess(Intent::GitPush, 0.3));
        let mut stage = stage_with(classifier, 0.55);

        let command = stage.process(transcript("push it maybe")).unwrap().unwrap();
        assert_eq!(command.resolution, Resolution::Unresolved);
        assert_eq!(command.label, "git_push");
    }

    #[test]
    fn threshold_is_inclusive() {
        let classifier = Arc::new(MockIntentClassifier::new().with_guess(Intent::GitPush, 0.55));
        let mut stage = stage_with(classifier, 0.55);
        let command = stage.process(transcript("git push")).unwrap().unwrap();
        assert_eq!(command.resolution, Resolution::Resolved);
    }

    #[test]
    fn no_match_is_unresolved_unknown() {
        let mut stage = stage_with(Arc::new(KeywordClassifier::new()), 0.55);
        let command = stage
            .process(transcript("xylophone quartz"))
            .unwrap()
            .unwrap();
        assert_eq!(command.label, "unknown");
        assert_eq!(command.resolution, Resolution::Unresolved);
        assert_eq!(command.confidence, 0.0);
    }

    #[test]
    fn classifier_failure_is_recoverable() {
        let classifier = Arc::new(MockIntentClassifier::new().with_failure());
        let mut stage = stage_with(classifier, 0.55);

        match stage.process(transcript("git status")) {
            Err(StageError::Recoverable(msg)) => {
                assert!(msg.contains("classification failed"));
            }
            other => panic!("expected recoverable, got {:?}", other),
        }
    }

    #[test]
    fn slow_classifier_times_out() {
        let classifier = Arc::new(
            MockIntentClassifier::new()
                .with_guess(Intent::GitStatus, 0.9)
                .with_delay(Duration::from_millis(300)),
        );
        let mut stage = IntentStage::new(
            classifier,
            Duration::from_millis(1),
            0.55,
            Output::silent(),
        );

        let started = Instant::now();
        match stage.process(transcript("git status")) {
            Err(StageError::Recoverable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_millis(250));
    }
}
