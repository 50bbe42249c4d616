//! Command-line interface for vocmd
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Voice-driven developer assistant
#[derive(Parser, Debug)]
#[command(name = "vocmd", version, about = "Voice-driven developer assistant")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: meter + transcripts, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (substring match, e.g. pipewire)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Exit after the first dispatched command
    #[arg(long)]
    pub once: bool,

    /// Workspace root for file actions (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Transcription timeout (e.g. 10s, 500ms)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub stt_timeout: Option<Duration>,

    /// Intent classification timeout (e.g. 2s, 500ms)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub intent_timeout: Option<Duration>,

    /// Minimum intent confidence required to dispatch (0.0 to 1.0)
    #[arg(long, value_name = "THRESHOLD", value_parser = parse_confidence)]
    pub confidence: Option<f32>,
}

/// Parse a duration string.
///
/// Supports any format accepted by `humantime`: single-unit (`10s`, `500ms`)
/// and compound (`1m30s`). Bare numbers are milliseconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → milliseconds
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

fn parse_confidence(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{}", e))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("confidence must be in [0.0, 1.0], got {}", value))
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// List the intent vocabulary and registered actions
    Intents,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration inspection actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}
