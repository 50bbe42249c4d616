//! Action dispatch: the closed registry and its side-effecting handlers.

pub mod executor;
pub mod file_actions;
pub mod registry;
pub mod shell_actions;

pub use executor::{CommandExecutor, CommandOutput, SystemCommandExecutor};
pub use registry::{ActionHandler, ActionRegistry};
