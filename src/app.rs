//! Application entry point.
//!
//! Composition root for the listen loop: builds the frame source, the
//! collaborators, and the action registry, then drives the pipeline until
//! interrupted or the source runs dry.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use owo_colors::OwoColorize;

use crate::audio::capture::{CpalFrameSource, suppress_audio_warnings};
use crate::audio::source::FrameSource;
use crate::audio::wav::WavFrameSource;
use crate::config::Config;
use crate::dispatch::executor::{CommandExecutor, SystemCommandExecutor};
use crate::dispatch::file_actions::{
    CreateFileHandler, ListDirectoryHandler, OpenFileHandler, ReadFileHandler, WriteFileHandler,
};
use crate::dispatch::registry::ActionRegistry;
use crate::dispatch::shell_actions::{
    GitCommitHandler, GitPushHandler, GitStatusHandler, InstallPackageHandler, OpenBrowserHandler,
    RunShellHandler, RunTestsHandler,
};
use crate::error::{Result, VocmdError};
use crate::gate::gate::GateConfig;
use crate::intent::classifier::KeywordClassifier;
use crate::output::Output;
use crate::pipeline::error::LogReporter;
use crate::pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineDeps};
use crate::pipeline::types::{ActionReport, ActionStatus};
use crate::stt::http::{HttpTranscriber, HttpTranscriberConfig};
use crate::stt::transcriber::Transcriber;

/// CLI flag overrides applied on top of file + env configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub device: Option<String>,
    pub workspace: Option<PathBuf>,
    pub stt_timeout: Option<Duration>,
    pub intent_timeout: Option<Duration>,
    pub confidence: Option<f32>,
}

impl Overrides {
    /// Folds the flags into the configuration. Flags always win.
    pub fn apply(self, config: &mut Config) {
        if let Some(device) = self.device {
            config.audio.device = Some(device);
        }
        if let Some(workspace) = self.workspace {
            config.actions.workspace = Some(workspace);
        }
        if let Some(timeout) = self.stt_timeout {
            config.stt.timeout_ms = timeout.as_millis() as u64;
        }
        if let Some(timeout) = self.intent_timeout {
            config.intent.timeout_ms = timeout.as_millis() as u64;
        }
        if let Some(threshold) = self.confidence {
            config.intent.confidence_threshold = threshold;
        }
    }
}

/// Run the listen loop: capture audio → gate → transcribe → classify → act.
///
/// Returns the process exit code: 0 on normal shutdown, 1 when the session
/// ended on an unrecoverable condition (device loss, pipeline overrun).
pub async fn run_listen_command(
    config: Config,
    quiet: bool,
    verbosity: u8,
    once: bool,
) -> Result<i32> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();

    let output = Output::new(quiet, verbosity);
    let workspace = resolve_workspace(&config)?;

    let source: Box<dyn FrameSource> = if std::io::stdin().is_terminal() {
        // Mic mode
        Box::new(CpalFrameSource::new(config.audio.device.as_deref())?)
    } else {
        // Pipe mode: stdin has WAV data
        Box::new(WavFrameSource::from_stdin()?)
    };

    let deps = PipelineDeps {
        speech_classifier: None,
        transcriber: build_transcriber(&config)?,
        intent_classifier: Arc::new(KeywordClassifier::new()),
        registry: build_registry(&config, &workspace, Arc::new(SystemCommandExecutor::new())),
    };

    output.verbose(&format!("workspace: {}", workspace.display()));

    let handle = Pipeline::start(
        source,
        deps,
        pipeline_config(&config),
        Arc::new(LogReporter),
        output,
    )?;

    let mut fatal = None;
    let mut dispatched = false;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| VocmdError::Other(format!("failed to wait for ctrl-c: {}", e)))?;
                if !quiet {
                    eprintln!();
                }
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                while let Ok(report) = handle.reports().try_recv() {
                    print_report(&report, quiet);
                    dispatched = true;
                }
                if let Some(reason) = handle.try_fatal() {
                    fatal = Some(reason);
                    break;
                }
                if once && dispatched {
                    break;
                }
                if handle.is_finished() {
                    // Finite source ran dry; let the stages drain.
                    drain_remaining(handle.reports(), quiet);
                    break;
                }
            }
        }
    }

    output.line("shutting down...");
    let late_fatal = handle.stop();
    let fatal = fatal.or(late_fatal);

    if let Some(reason) = fatal {
        eprintln!("{} {}", "error:".red().bold(), reason);
        return Ok(1);
    }
    Ok(0)
}

/// Blocks until the dispatch stage closes its report channel.
fn drain_remaining(reports: &crossbeam_channel::Receiver<ActionReport>, quiet: bool) {
    while let Ok(report) = reports.recv_timeout(Duration::from_secs(30)) {
        print_report(&report, quiet);
    }
}

fn print_report(report: &ActionReport, quiet: bool) {
    if quiet {
        return;
    }
    let line = match report.result.status {
        ActionStatus::Success => format!("{} {}", "✓".green().bold(), report.result.message),
        ActionStatus::Failure => format!("{} {}", "✗".red().bold(), report.result.message),
        ActionStatus::UnsupportedIntent => {
            format!("{} {}", "?".yellow().bold(), report.result.message)
        }
    };
    crate::output::eprintln_clear(&line);
}

/// Workspace root for file actions: configured path or the current directory.
fn resolve_workspace(config: &Config) -> Result<PathBuf> {
    match &config.actions.workspace {
        Some(path) => {
            if !path.is_dir() {
                return Err(VocmdError::Other(format!(
                    "workspace directory does not exist: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        None => std::env::current_dir()
            .map_err(|e| VocmdError::Other(format!("cannot determine working directory: {}", e))),
    }
}

fn pipeline_config(config: &Config) -> PipelineConfig {
    PipelineConfig {
        sample_rate: config.audio.sample_rate,
        frame_samples: config.audio.frame_samples,
        gate: GateConfig {
            start_frames: config.gate.start_frames,
            end_frames: config.gate.end_frames,
            energy_threshold: config.gate.threshold,
        },
        min_utterance_ms: config.utterance.min_ms,
        max_utterance_ms: config.utterance.max_ms,
        stt_timeout: Duration::from_millis(config.stt.timeout_ms),
        intent_timeout: Duration::from_millis(config.intent.timeout_ms),
        confidence_threshold: config.intent.confidence_threshold,
        ..PipelineConfig::default()
    }
}

/// Builds the transcription collaborator from configuration.
fn build_transcriber(config: &Config) -> Result<Arc<dyn Transcriber>> {
    if config.stt.endpoint.is_empty() {
        return Err(VocmdError::Transcription {
            message: "no transcription endpoint configured.\n\
                      Set stt.endpoint in the config file or VOCMD_STT_ENDPOINT \
                      to an OpenAI-compatible /audio/transcriptions URL."
                .to_string(),
        });
    }
    Ok(Arc::new(HttpTranscriber::new(HttpTranscriberConfig {
        endpoint: config.stt.endpoint.clone(),
        model: config.stt.model.clone(),
        api_key: config.stt.api_key.clone(),
        language: config.stt.language.clone(),
        request_timeout: Duration::from_millis(config.stt.timeout_ms),
    })))
}

/// Registers one handler per vocabulary intent.
pub fn build_registry(
    config: &Config,
    workspace: &Path,
    executor: Arc<dyn CommandExecutor>,
) -> ActionRegistry {
    let workspace = workspace.to_path_buf();
    let mut registry = ActionRegistry::new();

    registry.register(Box::new(OpenFileHandler {
        workspace: workspace.clone(),
        editor: config.actions.editor.clone(),
        executor: Arc::clone(&executor),
    }));
    registry.register(Box::new(CreateFileHandler {
        workspace: workspace.clone(),
    }));
    registry.register(Box::new(ReadFileHandler {
        workspace: workspace.clone(),
    }));
    registry.register(Box::new(WriteFileHandler {
        workspace: workspace.clone(),
    }));
    registry.register(Box::new(ListDirectoryHandler {
        workspace: workspace.clone(),
    }));
    registry.register(Box::new(GitStatusHandler {
        workspace: workspace.clone(),
        executor: Arc::clone(&executor),
    }));
    registry.register(Box::new(GitCommitHandler {
        workspace: workspace.clone(),
        executor: Arc::clone(&executor),
    }));
    registry.register(Box::new(GitPushHandler {
        workspace: workspace.clone(),
        executor: Arc::clone(&executor),
    }));
    registry.register(Box::new(RunTestsHandler {
        workspace: workspace.clone(),
        test_command: config.actions.test_command.clone(),
        executor: Arc::clone(&executor),
    }));
    registry.register(Box::new(InstallPackageHandler {
        workspace: workspace.clone(),
        package_manager: config.actions.package_manager.clone(),
        executor: Arc::clone(&executor),
    }));
    registry.register(Box::new(RunShellHandler {
        workspace: workspace.clone(),
        executor: Arc::clone(&executor),
    }));
    registry.register(Box::new(OpenBrowserHandler {
        workspace,
        browser_command: config.actions.browser_command.clone(),
        executor,
    }));

    registry
}
