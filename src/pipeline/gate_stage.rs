//! Frame → GatedFrame: runs the activity gate inside the pipeline.

use std::sync::Arc;

use crate::gate::gate::{ActivityGate, GateStep};
use crate::pipeline::error::{ErrorReporter, StageError};
use crate::pipeline::stage::Stage;
use crate::pipeline::types::{Frame, GatedFrame};

pub struct GateStage {
    gate: ActivityGate,
    sample_rate: u32,
    reporter: Arc<dyn ErrorReporter>,
    was_degraded: bool,
}

impl GateStage {
    pub fn new(gate: ActivityGate, sample_rate: u32, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            gate,
            sample_rate,
            reporter,
            was_degraded: false,
        }
    }
}

impl Stage for GateStage {
    type Input = Frame;
    type Output = GatedFrame;

    fn process(&mut self, frame: Frame) -> Result<Option<GatedFrame>, StageError> {
        let GateStep {
            verdict,
            event,
            degraded_onset,
        } = self.gate.process(&frame.samples, self.sample_rate);

        // Degradation episodes are reported on their edges, not per frame.
        if degraded_onset {
            self.reporter.report(
                self.name(),
                &StageError::Recoverable(
                    "primary classifier unavailable; falling back to energy heuristic".to_string(),
                ),
            );
        } else if self.was_degraded && !verdict.degraded {
            self.reporter.report(
                self.name(),
                &StageError::Recoverable("primary classifier recovered".to_string()),
            );
        }
        self.was_degraded = verdict.degraded;

        Ok(Some(GatedFrame {
            frame,
            verdict,
            event,
        }))
    }

    fn name(&self) -> &'static str {
        "gate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::classifier::SpeechClassifier;
    use crate::gate::gate::{GateConfig, GateEvent};
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct CollectingReporter {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl ErrorReporter for CollectingReporter {
        fn report(&self, _stage: &str, error: &StageError) {
            self.messages.lock().unwrap().push(error.to_string());
        }
    }

    fn frame(samples: Vec<i16>, sequence: u64) -> Frame {
        Frame::new(samples, Instant::now(), sequence)
    }

    #[test]
    fn annotates_every_frame() {
        let gate = ActivityGate::new(GateConfig {
            start_frames: 1,
            end_frames: 2,
            energy_threshold: 0.02,
        });
        let mut stage = GateStage::new(gate, 16000, Arc::new(CollectingReporter::default()));

        let out = stage.process(frame(vec![3000i16; 512], 0)).unwrap().unwrap();
        assert!(out.verdict.is_speech);
        assert_eq!(out.event, GateEvent::SpeechStarted);
        assert_eq!(out.frame.sequence, 0);

        let out = stage.process(frame(vec![0i16; 512], 1)).unwrap().unwrap();
        assert!(!out.verdict.is_speech);
        assert_eq!(out.event, GateEvent::TrailingSilence);
    }

    #[test]
    fn degradation_reported_once_per_episode() {
        struct FlakyClassifier {
            calls: u32,
        }
        impl SpeechClassifier for FlakyClassifier {
            fn classify(&mut self, _: &[i16], _: u32) -> crate::error::Result<f32> {
                self.calls += 1;
                // two failing frames, then recovery
                if self.calls <= 2 {
                    Err(crate::error::VocmdError::Other("down".to_string()))
                } else {
                    Ok(0.9)
                }
            }
            fn name(&self) -> &'static str {
                "flaky"
            }
        }

        let gate = ActivityGate::with_primary(
            GateConfig::default(),
            Box::new(FlakyClassifier { calls: 0 }),
        );
        let reporter = Arc::new(CollectingReporter::default());
        let messages = Arc::clone(&reporter.messages);
        let mut stage = GateStage::new(gate, 16000, reporter);

        for i in 0..4 {
            stage.process(frame(vec![3000i16; 512], i)).unwrap();
        }

        let reported = messages.lock().unwrap();
        assert_eq!(reported.len(), 2, "onset + recovery, got {:?}", reported);
        assert!(reported[0].contains("falling back"));
        assert!(reported[1].contains("recovered"));
    }
}
