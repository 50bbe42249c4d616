//! Operator-facing status output.
//!
//! Everything goes to stderr so piped stdout stays clean. Status lines clear
//! any active meter line first (the `\r` convention), and verbosity gating
//! lives here so stages never check flags themselves.

use std::sync::atomic::{AtomicBool, Ordering};

/// ANSI color codes used for status lines.
pub mod color {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const CYAN: &str = "\x1b[36m";
}

static METER_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Print a message to stderr, clearing any active meter line first.
pub fn eprintln_clear(msg: &str) {
    if METER_ACTIVE.swap(false, Ordering::Relaxed) {
        eprint!("\r{:60}\r", "");
    }
    eprintln!("{}", msg);
}

/// Redraw the listening meter in place. The next `eprintln_clear` wipes it.
pub fn meter(level: f32) {
    let filled = (level.clamp(0.0, 1.0) * 20.0) as usize;
    eprint!(
        "\r{}listening{} [{}{}]",
        color::DIM,
        color::RESET,
        "#".repeat(filled),
        "-".repeat(20 - filled),
    );
    METER_ACTIVE.store(true, Ordering::Relaxed);
}

/// Verbosity-gated status writer shared across stages.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    quiet: bool,
    verbosity: u8,
}

impl Output {
    pub fn new(quiet: bool, verbosity: u8) -> Self {
        Self { quiet, verbosity }
    }

    /// Fully silent writer for tests.
    pub fn silent() -> Self {
        Self {
            quiet: true,
            verbosity: 0,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Normal status line, suppressed by `--quiet`.
    pub fn line(&self, msg: &str) {
        if !self.quiet {
            eprintln_clear(msg);
        }
    }

    /// Shown at `-v` and above.
    pub fn verbose(&self, msg: &str) {
        if !self.quiet && self.verbosity >= 1 {
            eprintln_clear(msg);
        }
    }

    /// Shown at `-vv`.
    pub fn debug(&self, msg: &str) {
        if !self.quiet && self.verbosity >= 2 {
            eprintln_clear(msg);
        }
    }

    /// Redraws the input level meter; `-v` only, it repaints constantly.
    pub fn meter(&self, level: f32) {
        if !self.quiet && self.verbosity >= 1 {
            meter(level);
        }
    }
}
