//! GatedFrame → Utterance: buffers speech regions into bounded utterances.

use std::collections::VecDeque;
use std::time::Instant;

use crate::gate::gate::GateEvent;
use crate::pipeline::error::StageError;
use crate::pipeline::stage::Stage;
use crate::pipeline::types::{GatedFrame, Utterance};

#[derive(Debug, Clone, Copy)]
pub struct AssemblerConfig {
    pub sample_rate: u32,
    pub min_utterance_ms: u32,
    pub max_utterance_ms: u32,
    /// Gate debounce length; the assembler buffers this many onset frames so
    /// the opened utterance includes the frames consumed during debounce.
    pub start_frames: u32,
}

impl AssemblerConfig {
    fn min_samples(&self) -> usize {
        (self.sample_rate as u64 * self.min_utterance_ms as u64 / 1000) as usize
    }

    fn max_samples(&self) -> usize {
        (self.sample_rate as u64 * self.max_utterance_ms as u64 / 1000) as usize
    }
}

struct OpenUtterance {
    samples: Vec<i16>,
    started_at: Instant,
}

/// Assembles gated frames into utterances.
///
/// At most one utterance is open at a time; the gate's state machine
/// guarantees a single speech region at any instant. Closing applies the
/// duration bounds: shorter than the minimum is discarded as noise, reaching
/// the maximum force-closes at the exact sample bound with the remainder
/// seeding the next utterance.
pub struct AssemblerStage {
    config: AssemblerConfig,
    /// Frames of the current debounce run, included when an utterance opens.
    onset: VecDeque<GatedFrame>,
    open: Option<OpenUtterance>,
    next_sequence: u64,
    min_samples: usize,
    max_samples: usize,
}

impl AssemblerStage {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            min_samples: config.min_samples(),
            max_samples: config.max_samples(),
            config,
            onset: VecDeque::new(),
            open: None,
            next_sequence: 0,
        }
    }

    fn open_utterance(&mut self, closing_frame: &GatedFrame) {
        let started_at = self
            .onset
            .front()
            .map(|f| f.frame.timestamp)
            .unwrap_or(closing_frame.frame.timestamp);

        let mut samples = Vec::new();
        for buffered in self.onset.drain(..) {
            samples.extend_from_slice(&buffered.frame.samples);
        }
        samples.extend_from_slice(&closing_frame.frame.samples);

        self.open = Some(OpenUtterance {
            samples,
            started_at,
        });
    }

    /// Closes the open utterance at `ended_at`, applying the minimum bound.
    fn close_utterance(&mut self, ended_at: Instant) -> Result<Option<Utterance>, StageError> {
        let Some(open) = self.open.take() else {
            return Ok(None);
        };

        if open.samples.len() < self.min_samples {
            let ms = open.samples.len() as u64 * 1000 / self.config.sample_rate as u64;
            return Err(StageError::Recoverable(format!(
                "utterance discarded as noise ({}ms < {}ms minimum)",
                ms, self.config.min_utterance_ms
            )));
        }

        let utterance = Utterance {
            samples: open.samples,
            started_at: open.started_at,
            ended_at,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        Ok(Some(utterance))
    }

    /// Force-closes at exactly `max_samples`, reopening with the remainder so
    /// concatenating the two buffers reconstructs the original audio.
    fn force_close(&mut self, now: Instant) -> Option<Utterance> {
        let open = self.open.take()?;
        let mut samples = open.samples;
        let remainder = samples.split_off(self.max_samples);

        let utterance = Utterance {
            samples,
            started_at: open.started_at,
            ended_at: now,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        self.open = Some(OpenUtterance {
            samples: remainder,
            started_at: now,
        });

        Some(utterance)
    }
}

impl Stage for AssemblerStage {
    type Input = GatedFrame;
    type Output = Utterance;

    fn process(&mut self, gated: GatedFrame) -> Result<Option<Utterance>, StageError> {
        match gated.event {
            GateEvent::Idle => {
                // Debounce run broken; onset frames were noise.
                self.onset.clear();
                Ok(None)
            }
            GateEvent::Rising => {
                self.onset.push_back(gated);
                // The gate opens after start_frames, so the run never grows
                // beyond the debounce length; guard anyway.
                while self.onset.len() >= self.config.start_frames as usize {
                    self.onset.pop_front();
                }
                Ok(None)
            }
            GateEvent::SpeechStarted => {
                self.open_utterance(&gated);
                // A tiny max bound can be crossed by the onset alone.
                if self
                    .open
                    .as_ref()
                    .is_some_and(|open| open.samples.len() >= self.max_samples)
                {
                    return Ok(self.force_close(gated.frame.timestamp));
                }
                Ok(None)
            }
            GateEvent::Speech | GateEvent::TrailingSilence => {
                let Some(open) = self.open.as_mut() else {
                    // Speech frame without an open utterance: the pipeline
                    // restarted mid-speech. Treat as onset.
                    self.open_utterance(&gated);
                    return Ok(None);
                };
                open.samples.extend_from_slice(&gated.frame.samples);
                if open.samples.len() >= self.max_samples {
                    return Ok(self.force_close(gated.frame.timestamp));
                }
                Ok(None)
            }
            GateEvent::SpeechEnded => {
                if let Some(open) = self.open.as_mut() {
                    open.samples.extend_from_slice(&gated.frame.samples);
                }
                self.close_utterance(gated.frame.timestamp)
            }
        }
    }

    fn name(&self) -> &'static str {
        "assembler"
    }

    fn shutdown(&mut self) {
        // In-flight utterance is discarded on stop, never forwarded.
        self.open = None;
        self.onset.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{ActivityVerdict, Frame};
    use std::time::Duration;

    const FRAME: usize = 512;

    fn config() -> AssemblerConfig {
        AssemblerConfig {
            sample_rate: 16000,
            min_utterance_ms: 300,
            max_utterance_ms: 15_000,
            start_frames: 3,
        }
    }

    fn gated(event: GateEvent, sequence: u64, fill: i16) -> GatedFrame {
        GatedFrame {
            frame: Frame::new(vec![fill; FRAME], Instant::now(), sequence),
            verdict: ActivityVerdict {
                is_speech: !matches!(
                    event,
                    GateEvent::Idle | GateEvent::TrailingSilence | GateEvent::SpeechEnded
                ),
                confidence: 0.9,
                latency: Duration::ZERO,
                degraded: false,
            },
            event,
        }
    }

    /// Drives a speech region of `speech_frames` frames through the stage
    /// with a 3-frame debounce onset and a closing silence frame.
    fn run_region(stage: &mut AssemblerStage, speech_frames: usize) -> Vec<Utterance> {
        let mut out = Vec::new();
        let mut seq = 0u64;
        let mut push = |stage: &mut AssemblerStage, event, fill, out: &mut Vec<Utterance>| {
            let result = stage.process(gated(event, seq, fill));
            seq += 1;
            if let Ok(Some(utterance)) = result {
                out.push(utterance);
            }
        };

        push(stage, GateEvent::Rising, 1, &mut out);
        push(stage, GateEvent::Rising, 2, &mut out);
        push(stage, GateEvent::SpeechStarted, 3, &mut out);
        for _ in 0..speech_frames {
            push(stage, GateEvent::Speech, 4, &mut out);
        }
        push(stage, GateEvent::SpeechEnded, 0, &mut out);
        out
    }

    #[test]
    fn silence_never_opens_an_utterance() {
        let mut stage = AssemblerStage::new(config());
        for i in 0..100 {
            let result = stage.process(gated(GateEvent::Idle, i, 0)).unwrap();
            assert!(result.is_none());
        }
    }

    #[test]
    fn speech_region_yields_one_utterance_with_onset_frames() {
        let mut stage = AssemblerStage::new(config());
        // 20 speech frames + 3 onset + 1 closing = 24 frames, ~768ms
        let utterances = run_region(&mut stage, 20);
        assert_eq!(utterances.len(), 1);
        // onset 2 Rising + 1 SpeechStarted + 20 Speech + 1 SpeechEnded
        assert_eq!(utterances[0].samples.len(), 24 * FRAME);
        // the debounced onset frames are included
        assert_eq!(utterances[0].samples[0], 1);
        assert_eq!(utterances[0].samples[FRAME], 2);
    }

    #[test]
    fn short_utterance_discarded_as_noise() {
        let mut stage = AssemblerStage::new(config());
        // 300ms minimum = 4800 samples = 9.4 frames; 4 frames is well under
        let result = stage.process(gated(GateEvent::SpeechStarted, 0, 1));
        assert!(result.unwrap().is_none());
        for i in 1..4 {
            stage.process(gated(GateEvent::Speech, i, 1)).unwrap();
        }
        match stage.process(gated(GateEvent::SpeechEnded, 4, 0)) {
            Err(StageError::Recoverable(msg)) => {
                assert!(msg.contains("discarded as noise"), "got: {}", msg);
            }
            other => panic!("expected noise discard, got {:?}", other),
        }
        // nothing left open
        assert!(stage.open.is_none());
    }

    #[test]
    fn force_close_splits_with_zero_sample_loss() {
        let mut stage = AssemblerStage::new(AssemblerConfig {
            max_utterance_ms: 64, // 1024 samples = 2 frames
            min_utterance_ms: 0,
            ..config()
        });

        let mut forwarded = Vec::new();
        let result = stage.process(gated(GateEvent::SpeechStarted, 0, 1)).unwrap();
        assert!(result.is_none());

        // second frame crosses the 1024-sample bound exactly
        if let Some(u) = stage.process(gated(GateEvent::Speech, 1, 2)).unwrap() {
            forwarded.push(u);
        }
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].samples.len(), 1024);

        // a third frame crosses again: 0 remaining + 512 < 1024, stays open
        assert!(stage.process(gated(GateEvent::Speech, 2, 3)).unwrap().is_none());
        if let Some(u) = stage.process(gated(GateEvent::Speech, 3, 4)).unwrap() {
            forwarded.push(u);
        }
        assert_eq!(forwarded.len(), 2);

        if let Ok(Some(u)) = stage.process(gated(GateEvent::SpeechEnded, 4, 5)) {
            forwarded.push(u);
        }

        // concatenation reconstructs the original stream with no loss
        let rebuilt: Vec<i16> = forwarded.iter().flat_map(|u| u.samples.clone()).collect();
        let mut expected = Vec::new();
        for fill in [1i16, 2, 3, 4, 5] {
            expected.extend_from_slice(&vec![fill; FRAME]);
        }
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn mid_frame_split_preserves_every_sample() {
        // max = 48ms = 768 samples, so the bound lands mid-frame
        let mut stage = AssemblerStage::new(AssemblerConfig {
            max_utterance_ms: 48,
            min_utterance_ms: 0,
            ..config()
        });

        stage.process(gated(GateEvent::SpeechStarted, 0, 1)).unwrap();
        let first = stage
            .process(gated(GateEvent::Speech, 1, 2))
            .unwrap()
            .expect("crossing frame forces a close");
        assert_eq!(first.samples.len(), 768);

        let second = stage
            .process(gated(GateEvent::SpeechEnded, 2, 3))
            .unwrap()
            .expect("remainder closes normally");

        let rebuilt: Vec<i16> = first
            .samples
            .iter()
            .chain(second.samples.iter())
            .copied()
            .collect();
        let mut expected = Vec::new();
        for fill in [1i16, 2, 3] {
            expected.extend_from_slice(&vec![fill; FRAME]);
        }
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn sequences_increase_in_close_order() {
        let mut stage = AssemblerStage::new(config());
        let first = run_region(&mut stage, 20);
        let second = run_region(&mut stage, 20);
        assert_eq!(first[0].sequence, 0);
        assert_eq!(second[0].sequence, 1);
    }

    #[test]
    fn idle_clears_buffered_onset() {
        let mut stage = AssemblerStage::new(config());
        stage.process(gated(GateEvent::Rising, 0, 9)).unwrap();
        stage.process(gated(GateEvent::Idle, 1, 0)).unwrap();
        // new region must not contain the stale onset frame
        let utterances = run_region(&mut stage, 20);
        assert_eq!(utterances[0].samples[0], 1);
    }

    #[test]
    fn shutdown_discards_open_utterance() {
        let mut stage = AssemblerStage::new(config());
        stage.process(gated(GateEvent::SpeechStarted, 0, 1)).unwrap();
        assert!(stage.open.is_some());
        stage.shutdown();
        assert!(stage.open.is_none());
    }
}
