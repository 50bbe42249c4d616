//! Parameter extraction from transcript text.
//!
//! Transcripts arrive as spoken English, so extraction first normalizes
//! dictated punctuation ("main dot rs" → "main.rs") and then applies
//! per-intent patterns. Keywords match case-insensitively but the captured
//! parameters keep the transcript's case: "README.md" must survive into the
//! filename. Extraction is best-effort: a missing parameter is the handler's
//! validation problem, not an extraction error.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::intent::vocabulary::Intent;

static SPOKEN_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i) (dot|period|slash|dash|hyphen|underscore) ")
        .expect("static pattern is valid")
});

/// Replaces dictated punctuation words with their symbols. The surrounding
/// text keeps its case.
pub fn normalize_spoken(text: &str) -> String {
    let mut out = format!(" {} ", text);
    loop {
        let replacement = SPOKEN_PUNCTUATION.captures(&out).map(|caps| {
            let symbol = match caps[1].to_ascii_lowercase().as_str() {
                "dot" | "period" => ".",
                "slash" => "/",
                "dash" | "hyphen" => "-",
                _ => "_",
            };
            (caps.get(0).map_or(0..0, |m| m.range()), symbol)
        });
        match replacement {
            Some((range, symbol)) => out.replace_range(range, symbol),
            None => break,
        }
    }
    out.trim().to_string()
}

static FILE_AFTER_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)file\s+(?:called\s+|named\s+)?([\w./\-]+)").expect("static pattern is valid")
});
static FILE_AFTER_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:open|read|edit|create|show|print|cat)\s+(?:the\s+)?([\w./\-]+)")
        .expect("static pattern is valid")
});
static WRITE_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:write|append)\s+(.+?)\s+(?:to|into)\s+(?:file\s+)?([\w./\-]+)")
        .expect("static pattern is valid")
});
static DIRECTORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:directory|folder|files\s+in)\s+([\w./\-]+)").expect("static pattern is valid")
});
static COMMIT_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:saying|message|that\s+says)\s+(.+)$").expect("static pattern is valid")
});
static PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:install|add)\s+(?:package\s+|dependency\s+)?([\w@./\-]+)")
        .expect("static pattern is valid")
});
static SHELL_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:run\s+command|execute\s+command|execute|run\s+shell|run)\s+(.+)$")
        .expect("static pattern is valid")
});
static TEST_FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)tests?\s+(?:for|matching)\s+([\w:.\-]+)").expect("static pattern is valid")
});
static BROWSER_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:browse\s+to|go\s+to|browser\s+to|search\s+the\s+web\s+for|open\s+browser|open)\s+(?:the\s+)?(\S+)")
        .expect("static pattern is valid")
});

/// Extracts the parameters an intent's handler accepts from the transcript.
pub fn extract(intent: Intent, transcript: &str) -> BTreeMap<String, String> {
    let text = normalize_spoken(transcript);
    let mut params = BTreeMap::new();

    match intent {
        Intent::OpenFile | Intent::CreateFile | Intent::ReadFile => {
            if let Some(name) = filename(&text) {
                params.insert("filename".to_string(), name);
            }
        }
        Intent::WriteFile => {
            if let Some(caps) = WRITE_CONTENT.captures(&text) {
                if let Some(content) = caps.get(1) {
                    params.insert("content".to_string(), content.as_str().to_string());
                }
                if let Some(name) = caps.get(2) {
                    params.insert("filename".to_string(), name.as_str().to_string());
                }
            } else if let Some(name) = filename(&text) {
                params.insert("filename".to_string(), name);
            }
        }
        Intent::ListDirectory => {
            if let Some(caps) = DIRECTORY.captures(&text)
                && let Some(path) = caps.get(1)
            {
                params.insert("path".to_string(), path.as_str().to_string());
            }
        }
        Intent::GitCommit => {
            if let Some(caps) = COMMIT_MESSAGE.captures(&text)
                && let Some(message) = caps.get(1)
            {
                params.insert("message".to_string(), message.as_str().trim().to_string());
            }
        }
        Intent::InstallPackage => {
            if let Some(caps) = PACKAGE.captures(&text)
                && let Some(package) = caps.get(1)
            {
                let package = package.as_str();
                if !package.eq_ignore_ascii_case("package")
                    && !package.eq_ignore_ascii_case("dependency")
                {
                    params.insert("package".to_string(), package.to_string());
                }
            }
        }
        Intent::RunShell => {
            if let Some(caps) = SHELL_COMMAND.captures(&text)
                && let Some(command) = caps.get(1)
            {
                params.insert("command".to_string(), command.as_str().trim().to_string());
            }
        }
        Intent::RunTests => {
            if let Some(caps) = TEST_FILTER.captures(&text)
                && let Some(filter) = caps.get(1)
            {
                params.insert("filter".to_string(), filter.as_str().to_string());
            }
        }
        Intent::OpenBrowser => {
            if let Some(caps) = BROWSER_TARGET.captures(&text)
                && let Some(target) = caps.get(1)
            {
                let target = target.as_str();
                // site names are spoken, not typed; hosts are case-insensitive
                if !target.eq_ignore_ascii_case("browser") {
                    params.insert("url".to_string(), target.to_lowercase());
                }
            }
        }
        Intent::GitStatus | Intent::GitPush => {}
    }

    params
}

/// Filename lookup: "file NAME" first (more specific), then verb-adjacent.
fn filename(text: &str) -> Option<String> {
    if let Some(caps) = FILE_AFTER_KEYWORD.captures(text)
        && let Some(name) = caps.get(1)
    {
        return Some(name.as_str().to_string());
    }
    if let Some(caps) = FILE_AFTER_VERB.captures(text)
        && let Some(name) = caps.get(1)
    {
        let name = name.as_str();
        // the verb regex can land on the word "file" itself in
        // "open file ..." when the specific pattern failed
        if !name.eq_ignore_ascii_case("file") {
            return Some(name.to_string());
        }
    }
    None
}
