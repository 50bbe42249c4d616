//! Per-frame speech classification.
//!
//! The primary classifier is an external collaborator behind the
//! [`SpeechClassifier`] trait; [`EnergyClassifier`] is the RMS-threshold
//! heuristic the gate falls back to when the primary is unavailable.

use crate::defaults;
use crate::error::Result;

/// Classifies a single audio frame as speech or silence.
///
/// Implementations return a speech probability in [0.0, 1.0]. Errors signal
/// that the collaborator is unavailable; the gate then switches to the
/// energy fallback and marks verdicts as degraded until the primary recovers.
pub trait SpeechClassifier: Send {
    /// Returns the speech probability for the given frame.
    fn classify(&mut self, samples: &[i16], sample_rate: u32) -> Result<f32>;

    /// Name for logging and error reporting.
    fn name(&self) -> &'static str;
}

/// RMS amplitude heuristic classifier.
///
/// Maps frame energy to a pseudo-probability so it can stand in for a model
/// classifier: a frame exactly at the configured floor scores 0.5, twice the
/// floor saturates toward 1.0.
#[derive(Debug, Clone, Copy)]
pub struct EnergyClassifier {
    threshold: f32,
}

impl EnergyClassifier {
    /// Creates a classifier with the given RMS floor (0.0 to 1.0).
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Updates the RMS floor without resetting anything else.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self::new(defaults::SPEECH_THRESHOLD)
    }
}

impl SpeechClassifier for EnergyClassifier {
    fn classify(&mut self, samples: &[i16], _sample_rate: u32) -> Result<f32> {
        let rms = calculate_rms(samples);
        // rms == threshold maps to 0.5, clamped into [0, 1]
        Ok((rms / (2.0 * self.threshold)).clamp(0.0, 1.0))
    }

    fn name(&self) -> &'static str {
        "energy"
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// Returns a normalized value (0.0 to 1.0), where 0.0 is silence and
/// ~0.707 is a full-scale sine wave.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
