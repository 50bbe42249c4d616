//! Pipeline wiring and lifecycle.
//!
//! One frame-polling thread pulls from the [`FrameSource`] and pushes fixed
//! frames into a bounded queue; one thread per stage drains it through
//! gate → assembler → transcribe → intent → dispatch. The chain is fully
//! serialized, so dispatch order equals utterance close order. Backpressure
//! is bounded: a full frame queue is a fatal overrun, never a silent drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::audio::source::{FrameSource, Framer};
use crate::defaults;
use crate::dispatch::registry::ActionRegistry;
use crate::gate::classifier::{SpeechClassifier, calculate_rms};
use crate::gate::gate::{ActivityGate, GateConfig};
use crate::intent::classifier::IntentClassifier;
use crate::output::Output;
use crate::pipeline::assembler::{AssemblerConfig, AssemblerStage};
use crate::pipeline::dispatch_stage::DispatchStage;
use crate::pipeline::error::{ErrorReporter, StageError};
use crate::pipeline::gate_stage::GateStage;
use crate::pipeline::intent_stage::IntentStage;
use crate::pipeline::stage::StageRunner;
use crate::pipeline::transcribe_stage::TranscribeStage;
use crate::pipeline::types::ActionReport;
use crate::stt::transcriber::Transcriber;

/// Tuning for the whole pipeline. Field defaults match `defaults`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    pub frame_samples: usize,
    /// Frame queue bound; exceeding it is a fatal overrun.
    pub frame_queue: usize,
    /// Bound of the inter-stage queues.
    pub stage_queue: usize,
    pub gate: GateConfig,
    pub min_utterance_ms: u32,
    pub max_utterance_ms: u32,
    pub stt_timeout: Duration,
    pub intent_timeout: Duration,
    pub confidence_threshold: f32,
    /// Sleep between source reads.
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            frame_samples: defaults::FRAME_SAMPLES,
            frame_queue: defaults::FRAME_QUEUE,
            stage_queue: defaults::STAGE_QUEUE,
            gate: GateConfig::default(),
            min_utterance_ms: defaults::MIN_UTTERANCE_MS,
            max_utterance_ms: defaults::MAX_UTTERANCE_MS,
            stt_timeout: Duration::from_millis(defaults::STT_TIMEOUT_MS),
            intent_timeout: Duration::from_millis(defaults::INTENT_TIMEOUT_MS),
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Session-ending conditions. Everything else is recovered in place.
#[derive(Debug, Clone)]
pub enum FatalReason {
    /// The audio device failed and the one permitted re-open did not help.
    DeviceLost(String),
    /// The frame queue filled up; downstream fell fatally behind.
    Overrun { capacity: usize },
}

impl FatalReason {
    /// The taxonomy form of the condition, for operator-facing messages.
    pub fn to_error(&self) -> crate::error::VocmdError {
        match self {
            FatalReason::DeviceLost(message) => crate::error::VocmdError::DeviceLost {
                message: message.clone(),
            },
            FatalReason::Overrun { capacity } => crate::error::VocmdError::PipelineOverrun {
                capacity: *capacity,
            },
        }
    }
}

impl std::fmt::Display for FatalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_error())
    }
}

/// External collaborators and the action registry the pipeline drives.
pub struct PipelineDeps {
    /// Optional primary speech classifier; the gate carries the energy
    /// fallback either way.
    pub speech_classifier: Option<Box<dyn SpeechClassifier>>,
    pub transcriber: Arc<dyn Transcriber>,
    pub intent_classifier: Arc<dyn IntentClassifier>,
    pub registry: ActionRegistry,
}

pub struct Pipeline;

impl Pipeline {
    /// Starts the source and spawns the whole stage chain.
    ///
    /// Returns once audio is flowing; reports and fatal conditions surface
    /// on the handle's channels.
    pub fn start(
        mut source: Box<dyn FrameSource>,
        deps: PipelineDeps,
        config: PipelineConfig,
        reporter: Arc<dyn ErrorReporter>,
        output: Output,
    ) -> crate::error::Result<PipelineHandle> {
        source.start()?;

        let (frame_tx, frame_rx) = bounded(config.frame_queue);
        let (gated_tx, gated_rx) = bounded(config.stage_queue);
        let (utterance_tx, utterance_rx) = bounded(config.stage_queue);
        let (transcript_tx, transcript_rx) = bounded(config.stage_queue);
        let (command_tx, command_rx) = bounded(config.stage_queue);
        let (report_tx, report_rx) = bounded(config.stage_queue);
        let (fatal_tx, fatal_rx) = bounded(4);

        let gate = match deps.speech_classifier {
            Some(primary) => ActivityGate::with_primary(config.gate, primary),
            None => ActivityGate::new(config.gate),
        };

        let mut stage_threads = Vec::new();
        let mut push = |name: &'static str, handle: Option<JoinHandle<()>>| {
            if let Some(handle) = handle {
                stage_threads.push((name, handle));
            }
        };

        push(
            "gate",
            StageRunner::spawn(
                GateStage::new(gate, config.sample_rate, Arc::clone(&reporter)),
                frame_rx,
                gated_tx,
                Arc::clone(&reporter),
            )
            .into_handle(),
        );
        push(
            "assembler",
            StageRunner::spawn(
                AssemblerStage::new(AssemblerConfig {
                    sample_rate: config.sample_rate,
                    min_utterance_ms: config.min_utterance_ms,
                    max_utterance_ms: config.max_utterance_ms,
                    start_frames: config.gate.start_frames,
                }),
                gated_rx,
                utterance_tx,
                Arc::clone(&reporter),
            )
            .into_handle(),
        );
        push(
            "transcribe",
            StageRunner::spawn(
                TranscribeStage::new(
                    deps.transcriber,
                    config.stt_timeout,
                    config.sample_rate,
                    output,
                ),
                utterance_rx,
                transcript_tx,
                Arc::clone(&reporter),
            )
            .into_handle(),
        );
        push(
            "intent",
            StageRunner::spawn(
                IntentStage::new(
                    deps.intent_classifier,
                    config.intent_timeout,
                    config.confidence_threshold,
                    output,
                ),
                transcript_rx,
                command_tx,
                Arc::clone(&reporter),
            )
            .into_handle(),
        );
        push(
            "dispatch",
            StageRunner::spawn(
                DispatchStage::new(deps.registry, output),
                command_rx,
                report_tx,
                Arc::clone(&reporter),
            )
            .into_handle(),
        );

        let stop = Arc::new(AtomicBool::new(false));
        let source_thread = {
            let stop = Arc::clone(&stop);
            let reporter = Arc::clone(&reporter);
            let config = config.clone();
            std::thread::spawn(move || {
                run_source_loop(
                    source.as_mut(),
                    &config,
                    &stop,
                    frame_tx,
                    fatal_tx,
                    reporter.as_ref(),
                    output,
                );
                let _ = source.stop();
            })
        };

        output.line("listening...");

        Ok(PipelineHandle {
            stop,
            source_thread: Some(source_thread),
            stage_threads,
            reports: report_rx,
            fatals: fatal_rx,
        })
    }
}

/// Frame polling loop. Exits on stop request, source exhaustion, or a fatal
/// device/overrun condition.
fn run_source_loop(
    source: &mut dyn FrameSource,
    config: &PipelineConfig,
    stop: &AtomicBool,
    frame_tx: Sender<crate::pipeline::types::Frame>,
    fatal_tx: Sender<FatalReason>,
    reporter: &dyn ErrorReporter,
    output: Output,
) {
    let mut framer = Framer::new(config.frame_samples);
    let mut reopened = false;

    while !stop.load(Ordering::Relaxed) {
        match source.read_samples() {
            Ok(Some(samples)) => {
                if !samples.is_empty() {
                    output.meter(calculate_rms(&samples) * 8.0);
                }
                for frame in framer.push(&samples, Instant::now()) {
                    match frame_tx.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            // Never drop frames mid-utterance; ending the
                            // session is the only honest option.
                            let _ = fatal_tx.send(FatalReason::Overrun {
                                capacity: config.frame_queue,
                            });
                            return;
                        }
                        Err(TrySendError::Disconnected(_)) => return,
                    }
                }
                std::thread::sleep(config.poll_interval);
            }
            Ok(None) => {
                // Finite source finished; flush the zero-padded tail so no
                // captured sample is lost.
                if let Some(frame) = framer.flush(Instant::now()) {
                    let _ = frame_tx.send(frame);
                }
                return;
            }
            Err(e) => {
                if reopened {
                    let _ = fatal_tx.send(FatalReason::DeviceLost(e.to_string()));
                    return;
                }
                reporter.report(
                    "source",
                    &StageError::Recoverable(format!(
                        "device error ({}), attempting one re-open",
                        e
                    )),
                );
                reopened = true;
                if source.stop().is_err() || source.start().is_err() {
                    let _ = fatal_tx.send(FatalReason::DeviceLost(e.to_string()));
                    return;
                }
            }
        }
    }
}

/// Running pipeline session.
pub struct PipelineHandle {
    stop: Arc<AtomicBool>,
    source_thread: Option<JoinHandle<()>>,
    stage_threads: Vec<(&'static str, JoinHandle<()>)>,
    reports: Receiver<ActionReport>,
    fatals: Receiver<FatalReason>,
}

impl PipelineHandle {
    /// Dispatched action outcomes, in utterance close order.
    pub fn reports(&self) -> &Receiver<ActionReport> {
        &self.reports
    }

    /// Non-blocking check for a session-ending condition.
    pub fn try_fatal(&self) -> Option<FatalReason> {
        self.fatals.try_recv().ok()
    }

    /// True once the source loop has exited (stop, exhaustion, or fatal).
    pub fn is_finished(&self) -> bool {
        self.source_thread
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }

    /// Cooperative, bounded shutdown.
    ///
    /// Signals the source loop, joins it, then gives every stage a bounded
    /// window to drain before detaching stragglers (a stage stuck inside a
    /// collaborator call must not wedge shutdown). Returns any fatal reason
    /// recorded during the session.
    pub fn stop(mut self) -> Option<FatalReason> {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(handle) = self.source_thread.take() {
            let _ = handle.join();
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        for (_name, handle) in self.stage_threads.drain(..) {
            loop {
                if handle.is_finished() {
                    let _ = handle.join();
                    break;
                }
                if Instant::now() >= deadline {
                    // Detach; the thread owns no resources that outlive us.
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }

        self.fatals.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::registry::ActionHandler;
    use crate::error::VocmdError;
    use crate::intent::classifier::MockIntentClassifier;
    use crate::intent::vocabulary::Intent;
    use crate::pipeline::error::LogReporter;
    use crate::pipeline::types::{ActionResult, ActionStatus};
    use crate::audio::source::MockFrameSource;
    use crate::stt::transcriber::MockTranscriber;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn source_from(script: Vec<crate::error::Result<Option<Vec<i16>>>>) -> MockFrameSource {
        script
            .into_iter()
            .fold(MockFrameSource::new(), |source, read| source.then_read(read))
    }

    struct RecordingHandler {
        intent: Intent,
        labels: Arc<Mutex<Vec<String>>>,
    }

    impl ActionHandler for RecordingHandler {
        fn intent(&self) -> Intent {
            self.intent
        }
        fn run(&self, _params: &BTreeMap<String, String>) -> ActionResult {
            self.labels
                .lock()
                .unwrap()
                .push(self.intent.label().to_string());
            ActionResult::success("ok")
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            gate: GateConfig {
                start_frames: 2,
                end_frames: 3,
                energy_threshold: 0.02,
            },
            min_utterance_ms: 50,
            poll_interval: Duration::from_millis(1),
            ..PipelineConfig::default()
        }
    }

    fn deps_with_recorder(labels: Arc<Mutex<Vec<String>>>) -> PipelineDeps {
        let mut registry = ActionRegistry::new();
        registry.register(Box::new(RecordingHandler {
            intent: Intent::GitStatus,
            labels,
        }));
        PipelineDeps {
            speech_classifier: None,
            transcriber: Arc::new(MockTranscriber::new("mock").with_response("git status")),
            intent_classifier: Arc::new(
                MockIntentClassifier::new().with_guess(Intent::GitStatus, 0.9),
            ),
            registry,
        }
    }

    fn speech_then_silence() -> Vec<crate::error::Result<Option<Vec<i16>>>> {
        let mut script = Vec::new();
        // ~1s of loud audio then enough silence to close the gate
        for _ in 0..10 {
            script.push(Ok(Some(vec![5000i16; 1600])));
        }
        for _ in 0..4 {
            script.push(Ok(Some(vec![0i16; 1600])));
        }
        script
    }

    #[test]
    fn end_to_end_speech_region_dispatches_once() {
        let labels = Arc::new(Mutex::new(Vec::new()));
        let handle = Pipeline::start(
            Box::new(source_from(speech_then_silence())),
            deps_with_recorder(Arc::clone(&labels)),
            test_config(),
            Arc::new(LogReporter),
            Output::silent(),
        )
        .unwrap();

        let report = handle
            .reports()
            .recv_timeout(Duration::from_secs(5))
            .expect("one report");
        assert_eq!(report.result.status, ActionStatus::Success);
        assert_eq!(report.label, "git_status");

        assert!(handle.stop().is_none());
        assert_eq!(labels.lock().unwrap().as_slice(), ["git_status"]);
    }

    #[test]
    fn device_error_triggers_one_reopen_then_continues() {
        let mut script: Vec<crate::error::Result<Option<Vec<i16>>>> = vec![Err(
            VocmdError::Capture {
                message: "stream stalled".to_string(),
            },
        )];
        script.extend(speech_then_silence());
        let source = source_from(script);
        let starts = source.start_count();

        let labels = Arc::new(Mutex::new(Vec::new()));
        let handle = Pipeline::start(
            Box::new(source),
            deps_with_recorder(Arc::clone(&labels)),
            test_config(),
            Arc::new(LogReporter),
            Output::silent(),
        )
        .unwrap();

        let report = handle.reports().recv_timeout(Duration::from_secs(5));
        assert!(report.is_ok(), "pipeline should survive one device error");
        // initial start + the bounded re-open
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert!(handle.stop().is_none());
    }

    #[test]
    fn second_device_error_is_fatal() {
        let script: Vec<crate::error::Result<Option<Vec<i16>>>> = vec![
            Err(VocmdError::Capture {
                message: "first".to_string(),
            }),
            Err(VocmdError::Capture {
                message: "second".to_string(),
            }),
        ];

        let labels = Arc::new(Mutex::new(Vec::new()));
        let handle = Pipeline::start(
            Box::new(source_from(script)),
            deps_with_recorder(labels),
            test_config(),
            Arc::new(LogReporter),
            Output::silent(),
        )
        .unwrap();

        // wait for the source loop to give up
        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        match handle.stop() {
            Some(FatalReason::DeviceLost(message)) => assert!(message.contains("second")),
            other => panic!("expected DeviceLost, got {:?}", other),
        }
    }

    #[test]
    fn stop_mid_utterance_discards_in_flight_audio() {
        // endless speech, never a closing silence
        let script: Vec<crate::error::Result<Option<Vec<i16>>>> =
            (0..500).map(|_| Ok(Some(vec![5000i16; 1600]))).collect();

        let labels = Arc::new(Mutex::new(Vec::new()));
        let handle = Pipeline::start(
            Box::new(source_from(script)),
            deps_with_recorder(Arc::clone(&labels)),
            PipelineConfig {
                // max high enough that no force-close fires mid-test
                max_utterance_ms: 600_000,
                ..test_config()
            },
            Arc::new(LogReporter),
            Output::silent(),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert!(handle.stop().is_none());
        assert!(labels.lock().unwrap().is_empty(), "nothing was dispatched");
    }

    #[test]
    fn stalled_collaborator_overflows_the_frame_queue() {
        // Several closed utterances pile up behind a stalled transcriber,
        // clogging every bounded queue back to the frame channel; the
        // continuing speech then has nowhere to go.
        let mut script: Vec<crate::error::Result<Option<Vec<i16>>>> = Vec::new();
        for _ in 0..4 {
            for _ in 0..10 {
                script.push(Ok(Some(vec![5000i16; 1600])));
            }
            for _ in 0..4 {
                script.push(Ok(Some(vec![0i16; 1600])));
            }
        }
        for _ in 0..400 {
            script.push(Ok(Some(vec![5000i16; 1600])));
        }

        let labels = Arc::new(Mutex::new(Vec::new()));
        let mut deps = deps_with_recorder(Arc::clone(&labels));
        deps.transcriber = Arc::new(
            MockTranscriber::new("stalled")
                .with_response("git status")
                .with_delay(Duration::from_secs(60)),
        );

        let handle = Pipeline::start(
            Box::new(source_from(script)),
            deps,
            PipelineConfig {
                frame_queue: 8,
                stage_queue: 1,
                ..test_config()
            },
            Arc::new(LogReporter),
            Output::silent(),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut fatal = None;
        while fatal.is_none() && Instant::now() < deadline {
            fatal = handle.try_fatal();
            std::thread::sleep(Duration::from_millis(5));
        }

        match fatal {
            Some(FatalReason::Overrun { capacity }) => assert_eq!(capacity, 8),
            other => panic!("expected overrun, got {:?}", other),
        }
        assert!(
            labels.lock().unwrap().is_empty(),
            "nothing should dispatch while the transcriber is stalled"
        );
        let _ = handle.stop();
    }

    #[test]
    fn fatal_reasons_render_through_the_error_taxonomy() {
        let lost = FatalReason::DeviceLost("stream stalled".to_string());
        assert_eq!(lost.to_string(), "Audio device lost: stream stalled");

        let overrun = FatalReason::Overrun { capacity: 512 };
        assert_eq!(
            overrun.to_string(),
            "Pipeline overrun: frame queue exceeded 512 frames"
        );
    }
}
