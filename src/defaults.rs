//! Default tuning constants for vocmd.
//!
//! Shared across the config types and the pipeline so the CLI, the TOML
//! config, and the tests agree on one set of numbers.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default frame size in samples.
///
/// 512 samples at 16kHz is 32ms — the cadence the activity gate classifies at.
pub const FRAME_SAMPLES: usize = 512;

/// Default RMS threshold for the energy-based speech classifier (0.0 to 1.0).
///
/// Tuned for typical microphone input levels: sensitive enough for quiet
/// speakers while rejecting ambient room noise.
pub const SPEECH_THRESHOLD: f32 = 0.02;

/// Consecutive speech-classified frames required to confirm speech start.
///
/// Three frames (~96ms) debounces isolated noise spikes without adding
/// noticeable onset latency.
pub const GATE_START_FRAMES: u32 = 3;

/// Consecutive silence-classified frames required to confirm speech end.
///
/// Fifteen frames (~480ms) tolerates mid-sentence breathing and short pauses
/// without splitting one utterance into several.
pub const GATE_END_FRAMES: u32 = 15;

/// Minimum utterance duration in milliseconds.
///
/// Anything shorter is treated as transient noise (a cough, a keyboard clack)
/// and discarded instead of being sent to transcription.
pub const MIN_UTTERANCE_MS: u32 = 300;

/// Maximum utterance duration in milliseconds.
///
/// An utterance reaching this bound is force-closed and forwarded; the
/// remaining audio opens a new utterance with zero sample loss.
pub const MAX_UTTERANCE_MS: u32 = 15_000;

/// Default transcription collaborator timeout in milliseconds.
pub const STT_TIMEOUT_MS: u64 = 10_000;

/// Default intent collaborator timeout in milliseconds.
pub const INTENT_TIMEOUT_MS: u64 = 2_000;

/// Default intent confidence threshold.
///
/// Commands classified below this are tagged unresolved and never dispatched,
/// so casual speech misfires ("thank you" → open_browser) are not acted upon.
pub const CONFIDENCE_THRESHOLD: f32 = 0.55;

/// Bounded frame queue depth between capture and the activity gate.
///
/// At 32ms per frame this is roughly 16 seconds of headroom. Exceeding it
/// means downstream stages cannot keep up with the live stream — a fatal
/// pipeline overrun, never a silent frame drop.
pub const FRAME_QUEUE: usize = 512;

/// Bounded queue depth for utterances, transcripts, commands, and reports.
pub const STAGE_QUEUE: usize = 8;

/// Default command used to run the project's test suite.
pub const TEST_COMMAND: &str = "cargo test";

/// Default package manager invoked by the install_package intent.
pub const PACKAGE_MANAGER: &str = "cargo add";

/// Default system opener for browser navigation.
pub const BROWSER_COMMAND: &str = "xdg-open";

/// Per-action command timeout in seconds for shell-backed handlers.
pub const ACTION_TIMEOUT_SECS: u64 = 300;
