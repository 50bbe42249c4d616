//! Debounce hysteresis over per-frame classifier verdicts.
//!
//! A single loud frame must not open the gate and a single quiet frame must
//! not close it. The gate requires `start_frames` consecutive speech frames
//! before declaring speech and `end_frames` consecutive silence frames before
//! declaring the utterance over.

use std::time::Instant;

use crate::defaults;
use crate::error::Result;
use crate::gate::classifier::{EnergyClassifier, SpeechClassifier};
use crate::pipeline::types::ActivityVerdict;

/// Probability at or above which a frame counts as speech.
const PROBABILITY_CUTOFF: f32 = 0.5;

/// Gate tuning parameters.
#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    /// Consecutive speech frames required to open the gate.
    pub start_frames: u32,
    /// Consecutive silence frames required to close the gate.
    pub end_frames: u32,
    /// RMS floor for the energy fallback classifier.
    pub energy_threshold: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            start_frames: defaults::GATE_START_FRAMES,
            end_frames: defaults::GATE_END_FRAMES,
            energy_threshold: defaults::SPEECH_THRESHOLD,
        }
    }
}

/// Whether the gate currently considers the stream to be inside speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Silence,
    Speech,
}

/// Per-frame transition emitted alongside the verdict.
///
/// `Rising` and `TrailingSilence` are the debounce phases: candidate frames
/// that have not yet met the run-length requirement. Downstream assembly
/// buffers `Rising` frames so the utterance keeps its onset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// Silence, no speech candidate run in progress.
    Idle,
    /// Speech frame inside silence, run shorter than `start_frames`.
    Rising,
    /// The frame that completed the `start_frames` run. Gate is now open.
    SpeechStarted,
    /// Speech frame while the gate is open.
    Speech,
    /// Silence frame inside speech, run shorter than `end_frames`.
    TrailingSilence,
    /// The frame that completed the `end_frames` run. Gate is now closed.
    SpeechEnded,
}

/// Output of one gate step: the verdict plus the state transition.
#[derive(Debug, Clone, Copy)]
pub struct GateStep {
    pub verdict: ActivityVerdict,
    pub event: GateEvent,
    /// True on the first frame of a degraded episode. The stage reports the
    /// fallback once per episode instead of once per frame.
    pub degraded_onset: bool,
}

/// Voice activity gate with N/M run-length debounce.
///
/// Classification uses the primary collaborator when one is configured and
/// falls back to the energy heuristic when the primary fails. Fallback
/// verdicts are marked degraded; the caller reports the transition once per
/// episode, not per frame.
pub struct ActivityGate {
    config: GateConfig,
    primary: Option<Box<dyn SpeechClassifier>>,
    fallback: EnergyClassifier,
    state: GateState,
    speech_run: u32,
    silence_run: u32,
    degraded: bool,
}

impl ActivityGate {
    /// Creates a gate backed only by the energy heuristic.
    pub fn new(config: GateConfig) -> Self {
        Self {
            fallback: EnergyClassifier::new(config.energy_threshold),
            config,
            primary: None,
            state: GateState::Silence,
            speech_run: 0,
            silence_run: 0,
            degraded: false,
        }
    }

    /// Creates a gate with a primary classifier and the energy fallback.
    pub fn with_primary(config: GateConfig, primary: Box<dyn SpeechClassifier>) -> Self {
        let mut gate = Self::new(config);
        gate.primary = Some(primary);
        gate
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// True while verdicts come from the energy fallback.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Classifies one frame and advances the state machine.
    ///
    /// Infallible by construction: the energy fallback cannot fail, so a
    /// primary classifier outage degrades the verdict instead of erroring.
    pub fn process(&mut self, samples: &[i16], sample_rate: u32) -> GateStep {
        let started = Instant::now();
        let (confidence, degraded) = self.classify(samples, sample_rate);

        let was_degraded = self.degraded;
        self.degraded = degraded;
        let degraded_onset = degraded && !was_degraded;

        let is_speech = confidence >= PROBABILITY_CUTOFF;
        let event = self.advance(is_speech);

        GateStep {
            verdict: ActivityVerdict {
                is_speech,
                confidence,
                latency: started.elapsed(),
                degraded,
            },
            event,
            degraded_onset,
        }
    }

    fn classify(&mut self, samples: &[i16], sample_rate: u32) -> (f32, bool) {
        if let Some(primary) = self.primary.as_mut() {
            match primary.classify(samples, sample_rate) {
                Ok(confidence) => return (confidence.clamp(0.0, 1.0), false),
                Err(_) => {}
            }
        } else {
            // No primary configured: the heuristic is the designated
            // classifier, not a degraded substitute.
            return (self.energy_confidence(samples, sample_rate), false);
        }
        (self.energy_confidence(samples, sample_rate), true)
    }

    fn energy_confidence(&mut self, samples: &[i16], sample_rate: u32) -> f32 {
        // EnergyClassifier::classify is infallible
        self.fallback
            .classify(samples, sample_rate)
            .unwrap_or(0.0)
    }

    fn advance(&mut self, is_speech: bool) -> GateEvent {
        match self.state {
            GateState::Silence => {
                if is_speech {
                    self.speech_run += 1;
                    if self.speech_run >= self.config.start_frames {
                        self.state = GateState::Speech;
                        self.silence_run = 0;
                        GateEvent::SpeechStarted
                    } else {
                        GateEvent::Rising
                    }
                } else {
                    self.speech_run = 0;
                    GateEvent::Idle
                }
            }
            GateState::Speech => {
                if is_speech {
                    self.silence_run = 0;
                    GateEvent::Speech
                } else {
                    self.silence_run += 1;
                    if self.silence_run >= self.config.end_frames {
                        self.state = GateState::Silence;
                        self.speech_run = 0;
                        GateEvent::SpeechEnded
                    } else {
                        GateEvent::TrailingSilence
                    }
                }
            }
        }
    }

    /// Resets run counters and state to silence. Degraded status persists
    /// because it reflects collaborator health, not stream position.
    pub fn reset(&mut self) {
        self.state = GateState::Silence;
        self.speech_run = 0;
        self.silence_run = 0;
    }
}
