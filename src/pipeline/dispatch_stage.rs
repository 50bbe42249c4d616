//! Command → ActionReport: routes resolved commands into the registry.

use std::time::Instant;

use crate::dispatch::registry::ActionRegistry;
use crate::output::Output;
use crate::pipeline::error::StageError;
use crate::pipeline::stage::Stage;
use crate::pipeline::types::{ActionReport, Command, Resolution};

pub struct DispatchStage {
    registry: ActionRegistry,
    output: Output,
}

impl DispatchStage {
    pub fn new(registry: ActionRegistry, output: Output) -> Self {
        Self { registry, output }
    }
}

impl Stage for DispatchStage {
    type Input = Command;
    type Output = ActionReport;

    fn process(&mut self, command: Command) -> Result<Option<ActionReport>, StageError> {
        match command.resolution {
            Resolution::NoOp => Ok(None),
            Resolution::Unresolved => Err(StageError::Recoverable(format!(
                "not confident enough to act on \"{}\" ({} at {:.2})",
                command.transcript, command.label, command.confidence
            ))),
            Resolution::Resolved => {
                self.output.line(&format!("executing {}", command.label));
                let started = Instant::now();
                let result = self.registry.dispatch(&command);
                Ok(Some(ActionReport {
                    label: command.label,
                    transcript: command.transcript,
                    result,
                    latency: started.elapsed(),
                }))
            }
        }
    }

    fn name(&self) -> &'static str {
        "dispatch"
    }
}
