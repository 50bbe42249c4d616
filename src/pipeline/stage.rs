//! Core stage abstraction and runner for the pipeline.
//!
//! Each stage receives one input, processes it, and produces at most one
//! output. Stages run in their own threads, connected by bounded channels,
//! so the whole pipeline is serialized: a command is dispatched in the same
//! order its utterance closed.

use crate::pipeline::error::{ErrorReporter, StageError};
use crossbeam_channel::{Receiver, Sender};
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A processing stage in the pipeline.
pub trait Stage: Send + 'static {
    /// The input type this stage receives.
    type Input: Send + 'static;
    /// The output type this stage produces.
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but nothing to forward
    /// - `Err(StageError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StageError>;

    /// Name of this stage for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called once when the stage shuts down.
    ///
    /// Any in-flight state (e.g. an open utterance) is discarded here, never
    /// forwarded.
    fn shutdown(&mut self) {}
}

/// Runs a stage in a dedicated thread.
pub struct StageRunner<S: Stage> {
    handle: Option<JoinHandle<()>>,
    stage_name: &'static str,
    _phantom: PhantomData<S>,
}

impl<S: Stage> StageRunner<S> {
    /// Spawns a stage in a dedicated thread.
    pub fn spawn(
        mut stage: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let stage_name = stage.name();

        let handle = thread::spawn(move || {
            Self::run_stage(&mut stage, input_rx, output_tx, error_reporter);
        });

        Self {
            handle: Some(handle),
            stage_name,
            _phantom: PhantomData,
        }
    }

    fn run_stage(
        stage: &mut S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) {
        let stage_name = stage.name();

        while let Ok(input) = input_rx.recv() {
            match stage.process(input) {
                Ok(Some(output)) => {
                    if output_tx.send(output).is_err() {
                        // Next stage gone, shut down
                        break;
                    }
                }
                Ok(None) => {}
                Err(StageError::Recoverable(msg)) => {
                    error_reporter.report(stage_name, &StageError::Recoverable(msg));
                }
                Err(StageError::Fatal(msg)) => {
                    error_reporter.report(stage_name, &StageError::Fatal(msg));
                    break;
                }
            }
        }

        stage.shutdown();
    }

    /// Waits for the stage thread to complete.
    pub fn join(mut self) -> Result<(), String> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| format!("stage '{}' thread panicked", self.stage_name))
        } else {
            Ok(())
        }
    }

    /// Returns the underlying thread handle, detaching it from the runner.
    pub fn into_handle(mut self) -> Option<JoinHandle<()>> {
        self.handle.take()
    }

    /// Returns the name of the stage.
    pub fn name(&self) -> &'static str {
        self.stage_name
    }
}
