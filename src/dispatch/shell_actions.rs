//! Version-control, test, package, shell, and browser handlers.
//!
//! All process execution goes through the injected [`CommandExecutor`];
//! handlers only decide what to run and how to phrase the outcome.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::dispatch::executor::CommandExecutor;
use crate::dispatch::registry::ActionHandler;
use crate::intent::vocabulary::Intent;
use crate::pipeline::types::ActionResult;

fn run_tool(
    executor: &dyn CommandExecutor,
    cwd: &PathBuf,
    command: &str,
    args: &[&str],
    success_message: String,
) -> ActionResult {
    match executor.execute(command, args, cwd) {
        Ok(output) if output.success => {
            let stdout = output.stdout.trim();
            let message = if stdout.is_empty() {
                success_message
            } else {
                format!("{}\n{}", success_message, stdout)
            };
            ActionResult::success_with_payload(message, json!({ "stdout": output.stdout }))
        }
        Ok(output) => {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            ActionResult::failure(format!("{} failed: {}", command, detail))
        }
        Err(e) => ActionResult::failure(e.to_string()),
    }
}

/// Splits a configured command line like "cargo test" into program + args.
fn split_command_line(line: &str) -> Option<(String, Vec<String>)> {
    let mut parts = line.split_whitespace().map(String::from);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

pub struct GitStatusHandler {
    pub workspace: PathBuf,
    pub executor: Arc<dyn CommandExecutor>,
}

impl ActionHandler for GitStatusHandler {
    fn intent(&self) -> Intent {
        Intent::GitStatus
    }

    fn run(&self, _params: &BTreeMap<String, String>) -> ActionResult {
        match self
            .executor
            .execute("git", &["status", "--short"], &self.workspace)
        {
            Ok(output) if output.success => {
                if output.stdout.trim().is_empty() {
                    ActionResult::success("Working tree clean")
                } else {
                    ActionResult::success_with_payload(
                        format!("Changes:\n{}", output.stdout.trim_end()),
                        json!({ "stdout": output.stdout }),
                    )
                }
            }
            Ok(output) => ActionResult::failure(format!("git failed: {}", output.stderr.trim())),
            Err(e) => ActionResult::failure(e.to_string()),
        }
    }
}

/// Stages everything and commits with the dictated message.
pub struct GitCommitHandler {
    pub workspace: PathBuf,
    pub executor: Arc<dyn CommandExecutor>,
}

impl ActionHandler for GitCommitHandler {
    fn intent(&self) -> Intent {
        Intent::GitCommit
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let Some(message) = params.get("message").filter(|m| !m.is_empty()) else {
            return ActionResult::failure(
                "I didn't catch the commit message — say 'commit saying <message>'",
            );
        };

        match self.executor.execute("git", &["add", "-A"], &self.workspace) {
            Ok(output) if output.success => {}
            Ok(output) => {
                return ActionResult::failure(format!(
                    "git add failed: {}",
                    output.stderr.trim()
                ));
            }
            Err(e) => return ActionResult::failure(e.to_string()),
        }

        run_tool(
            self.executor.as_ref(),
            &self.workspace,
            "git",
            &["commit", "-m", message],
            format!("Committed: {}", message),
        )
    }
}

pub struct GitPushHandler {
    pub workspace: PathBuf,
    pub executor: Arc<dyn CommandExecutor>,
}

impl ActionHandler for GitPushHandler {
    fn intent(&self) -> Intent {
        Intent::GitPush
    }

    fn run(&self, _params: &BTreeMap<String, String>) -> ActionResult {
        run_tool(
            self.executor.as_ref(),
            &self.workspace,
            "git",
            &["push"],
            "Pushed".to_string(),
        )
    }
}

/// Runs the configured test command, with an optional name filter appended.
pub struct RunTestsHandler {
    pub workspace: PathBuf,
    pub test_command: String,
    pub executor: Arc<dyn CommandExecutor>,
}

impl ActionHandler for RunTestsHandler {
    fn intent(&self) -> Intent {
        Intent::RunTests
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let Some((program, mut args)) = split_command_line(&self.test_command) else {
            return ActionResult::failure("No test command configured");
        };
        if let Some(filter) = params.get("filter").filter(|f| !f.is_empty()) {
            args.push(filter.clone());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tool(
            self.executor.as_ref(),
            &self.workspace,
            &program,
            &arg_refs,
            "Tests passed".to_string(),
        )
    }
}

/// Adds a dependency via the configured package manager command.
pub struct InstallPackageHandler {
    pub workspace: PathBuf,
    pub package_manager: String,
    pub executor: Arc<dyn CommandExecutor>,
}

impl ActionHandler for InstallPackageHandler {
    fn intent(&self) -> Intent {
        Intent::InstallPackage
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let Some(package) = params.get("package").filter(|p| !p.is_empty()) else {
            return ActionResult::failure("I didn't catch the package name — try again");
        };
        let Some((program, mut args)) = split_command_line(&self.package_manager) else {
            return ActionResult::failure("No package manager configured");
        };
        args.push(package.clone());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tool(
            self.executor.as_ref(),
            &self.workspace,
            &program,
            &arg_refs,
            format!("Installed {}", package),
        )
    }
}

/// Runs an arbitrary dictated command through `sh -c`.
pub struct RunShellHandler {
    pub workspace: PathBuf,
    pub executor: Arc<dyn CommandExecutor>,
}

impl ActionHandler for RunShellHandler {
    fn intent(&self) -> Intent {
        Intent::RunShell
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let Some(command) = params.get("command").filter(|c| !c.is_empty()) else {
            return ActionResult::failure("I didn't catch the command — try again");
        };
        run_tool(
            self.executor.as_ref(),
            &self.workspace,
            "sh",
            &["-c", command],
            format!("Ran: {}", command),
        )
    }
}

/// Opens a URL with the system opener, normalizing spoken targets.
pub struct OpenBrowserHandler {
    pub workspace: PathBuf,
    pub browser_command: String,
    pub executor: Arc<dyn CommandExecutor>,
}

/// "github dot com" arrives as "github.com"; bare site names like "github"
/// become `https://github.com`.
fn normalize_url(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else if target.contains('.') {
        format!("https://{}", target)
    } else {
        format!("https://{}.com", target)
    }
}

impl ActionHandler for OpenBrowserHandler {
    fn intent(&self) -> Intent {
        Intent::OpenBrowser
    }

    fn run(&self, params: &BTreeMap<String, String>) -> ActionResult {
        let Some(target) = params.get("url").filter(|u| !u.is_empty()) else {
            return ActionResult::failure("I didn't catch the site — try again");
        };
        let url = normalize_url(target);
        let Some((program, mut args)) = split_command_line(&self.browser_command) else {
            return ActionResult::failure("No browser command configured");
        };
        args.push(url.clone());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tool(
            self.executor.as_ref(),
            &self.workspace,
            &program,
            &arg_refs,
            format!("Opened {}", url),
        )
    }
}
