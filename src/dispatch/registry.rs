//! The closed intent → handler registry.

use std::collections::BTreeMap;

use crate::intent::vocabulary::Intent;
use crate::pipeline::types::{ActionResult, Command, Resolution};

/// One side-effecting action behind a vocabulary intent.
///
/// Handlers validate their declared parameters, perform the side effect, and
/// convert every internal failure into `ActionResult::failure`. A handler
/// must never panic and never retries on its own: action side effects are
/// not generally idempotent, so retry belongs to the operator re-issuing the
/// command.
pub trait ActionHandler: Send + Sync {
    /// The intent this handler serves.
    fn intent(&self) -> Intent;

    /// Performs the action. Infallible at the type level: failures are data.
    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult;
}

/// Closed map from intent to exactly one handler, populated at startup.
///
/// Lookups fail closed: unknown labels, unresolved commands, and intents
/// without a registration all come back as `UnsupportedIntent` instead of
/// silently doing nothing.
pub struct ActionRegistry {
    handlers: BTreeMap<Intent, Box<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Registers a handler under its own intent. Last registration wins,
    /// which tests use to substitute probes.
    pub fn register(&mut self, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(handler.intent(), handler);
    }

    pub fn is_registered(&self, intent: Intent) -> bool {
        self.handlers.contains_key(&intent)
    }

    /// Registered intents in stable order, for the `intents` listing.
    pub fn registered_intents(&self) -> Vec<Intent> {
        self.handlers.keys().copied().collect()
    }

    /// Routes a command to its handler.
    ///
    /// Unresolved commands never reach a handler; they were gated upstream
    /// and arrive here only if a caller bypasses the intent stage.
    pub fn dispatch(&self, command: &Command) -> ActionResult {
        if command.resolution != Resolution::Resolved {
            return ActionResult::unsupported(&command.label);
        }

        let Some(intent) = Intent::from_label(&command.label) else {
            return ActionResult::unsupported(&command.label);
        };

        match self.handlers.get(&intent) {
            Some(handler) => handler.run(&command.params),
            None => ActionResult::unsupported(&command.label),
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
