//! File and directory action handlers, rooted in the workspace.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde_json::json;

use crate::dispatch::executor::CommandExecutor;
use crate::dispatch::registry::ActionHandler;
use crate::intent::vocabulary::Intent;
use crate::pipeline::types::ActionResult;

/// Longest file preview included in a read result message.
const READ_PREVIEW_CHARS: usize = 400;

/// Resolves a spoken path against the workspace root.
///
/// Rejects absolute paths and any `..` component so a misheard transcript
/// can never reach outside the workspace.
fn resolve_in_workspace(root: &Path, spoken: &str) -> Result<PathBuf, String> {
    let candidate = Path::new(spoken);
    if candidate.is_absolute() {
        return Err(format!("absolute paths are not allowed: {}", spoken));
    }
    for component in candidate.components() {
        if matches!(component, Component::ParentDir) {
            return Err(format!("path escapes the workspace: {}", spoken));
        }
    }
    Ok(root.join(candidate))
}

fn require_param<'a>(
    params: &'a BTreeMap<String, String>,
    name: &str,
) -> Result<&'a str, ActionResult> {
    match params.get(name).map(String::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ActionResult::failure(format!(
            "I didn't catch the {} — try again",
            name
        ))),
    }
}

/// Opens a file in the configured editor.
pub struct OpenFileHandler {
    pub workspace: PathBuf,
    pub editor: String,
    pub executor: Arc<dyn CommandExecutor>,
}

impl ActionHandler for OpenFileHandler {
    fn intent(&self) -> Intent {
        Intent::OpenFile
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let filename = match require_param(params, "filename") {
            Ok(value) => value,
            Err(result) => return result,
        };
        let path = match resolve_in_workspace(&self.workspace, filename) {
            Ok(path) => path,
            Err(message) => return ActionResult::failure(message),
        };
        if !path.exists() {
            return ActionResult::failure(format!("No such file: {}", filename));
        }

        let path_str = path.to_string_lossy();
        match self
            .executor
            .execute(&self.editor, &[path_str.as_ref()], &self.workspace)
        {
            Ok(output) if output.success => ActionResult::success_with_payload(
                format!("Opened {}", filename),
                json!({ "path": path_str }),
            ),
            Ok(output) => ActionResult::failure(format!(
                "{} failed to open {}: {}",
                self.editor,
                filename,
                output.stderr.trim()
            )),
            Err(e) => ActionResult::failure(e.to_string()),
        }
    }
}

/// Creates a new empty file, parent directories included.
pub struct CreateFileHandler {
    pub workspace: PathBuf,
}

impl ActionHandler for CreateFileHandler {
    fn intent(&self) -> Intent {
        Intent::CreateFile
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let filename = match require_param(params, "filename") {
            Ok(value) => value,
            Err(result) => return result,
        };
        let path = match resolve_in_workspace(&self.workspace, filename) {
            Ok(path) => path,
            Err(message) => return ActionResult::failure(message),
        };
        if path.exists() {
            return ActionResult::failure(format!("{} already exists", filename));
        }
        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            return ActionResult::failure(format!("Could not create {}: {}", filename, e));
        }
        match std::fs::write(&path, "") {
            Ok(()) => ActionResult::success_with_payload(
                format!("Created {}", filename),
                json!({ "path": path.to_string_lossy() }),
            ),
            Err(e) => ActionResult::failure(format!("Could not create {}: {}", filename, e)),
        }
    }
}

/// Reads a file and reports a bounded preview.
pub struct ReadFileHandler {
    pub workspace: PathBuf,
}

impl ActionHandler for ReadFileHandler {
    fn intent(&self) -> Intent {
        Intent::ReadFile
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let filename = match require_param(params, "filename") {
            Ok(value) => value,
            Err(result) => return result,
        };
        let path = match resolve_in_workspace(&self.workspace, filename) {
            Ok(path) => path,
            Err(message) => return ActionResult::failure(message),
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let preview: String = contents.chars().take(READ_PREVIEW_CHARS).collect();
                let truncated = contents.chars().count() > READ_PREVIEW_CHARS;
                ActionResult::success_with_payload(
                    format!(
                        "{} ({} bytes){}\n{}",
                        filename,
                        contents.len(),
                        if truncated { ", truncated" } else { "" },
                        preview
                    ),
                    json!({ "path": path.to_string_lossy(), "bytes": contents.len() }),
                )
            }
            Err(e) => ActionResult::failure(format!("Could not read {}: {}", filename, e)),
        }
    }
}

/// Appends dictated content to a file, creating it if needed.
pub struct WriteFileHandler {
    pub workspace: PathBuf,
}

impl ActionHandler for WriteFileHandler {
    fn intent(&self) -> Intent {
        Intent::WriteFile
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let filename = match require_param(params, "filename") {
            Ok(value) => value,
            Err(result) => return result,
        };
        let content = match require_param(params, "content") {
            Ok(value) => value,
            Err(result) => return result,
        };
        let path = match resolve_in_workspace(&self.workspace, filename) {
            Ok(path) => path,
            Err(message) => return ActionResult::failure(message),
        };
        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            return ActionResult::failure(format!("Could not write {}: {}", filename, e));
        }

        use std::io::Write;
        let appended = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{}", content));
        match appended {
            Ok(()) => ActionResult::success_with_payload(
                format!("Wrote {} bytes to {}", content.len() + 1, filename),
                json!({ "path": path.to_string_lossy(), "bytes": content.len() + 1 }),
            ),
            Err(e) => ActionResult::failure(format!("Could not write {}: {}", filename, e)),
        }
    }
}

/// Lists a workspace directory, entries sorted by name.
pub struct ListDirectoryHandler {
    pub workspace: PathBuf,
}

impl ActionHandler for ListDirectoryHandler {
    fn intent(&self) -> Intent {
        Intent::ListDirectory
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let spoken = params.get("path").map(String::as_str).unwrap_or(".");
        let path = match resolve_in_workspace(&self.workspace, spoken) {
            Ok(path) => path,
            Err(message) => return ActionResult::failure(message),
        };

        let entries = match std::fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) => return ActionResult::failure(format!("Could not list {}: {}", spoken, e)),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() {
                    name.push('/');
                }
                name
            })
            .collect();
        names.sort_unstable();

        ActionResult::success_with_payload(
            format!("{} entries in {}:\n{}", names.len(), spoken, names.join("\n")),
            json!({ "path": path.to_string_lossy(), "entries": names }),
        )
    }
}
