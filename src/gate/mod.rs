//! Activity gate: per-frame speech/silence classification with hysteresis.

pub mod classifier;
pub mod gate;

pub use classifier::{EnergyClassifier, SpeechClassifier, calculate_rms};
pub use gate::{ActivityGate, GateConfig, GateEvent, GateState};
