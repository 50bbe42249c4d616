//! TOML configuration with environment overrides.
//!
//! Precedence, lowest to highest: built-in defaults, config file, `VOCMD_*`
//! environment variables, CLI flags (applied in `app.rs`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub gate: GateSection,
    pub utterance: UtteranceConfig,
    pub stt: SttConfig,
    pub intent: IntentConfig,
    pub actions: ActionsConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub frame_samples: usize,
}

/// Activity gate tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateSection {
    /// RMS floor for the energy classifier.
    pub threshold: f32,
    /// Consecutive speech frames required to open the gate.
    pub start_frames: u32,
    /// Consecutive silence frames required to close the gate.
    pub end_frames: u32,
}

/// Utterance duration bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UtteranceConfig {
    pub min_ms: u32,
    pub max_ms: u32,
}

/// Transcription collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// OpenAI-compatible `/audio/transcriptions` endpoint. Empty disables
    /// remote transcription.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub language: String,
    pub timeout_ms: u64,
}

/// Intent collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntentConfig {
    pub timeout_ms: u64,
    pub confidence_threshold: f32,
}

/// Action handler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActionsConfig {
    /// Root all relative file paths resolve against. Defaults to the
    /// current directory at startup.
    pub workspace: Option<PathBuf>,
    pub editor: String,
    pub test_command: String,
    pub package_manager: String,
    pub browser_command: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            frame_samples: defaults::FRAME_SAMPLES,
        }
    }
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            threshold: defaults::SPEECH_THRESHOLD,
            start_frames: defaults::GATE_START_FRAMES,
            end_frames: defaults::GATE_END_FRAMES,
        }
    }
}

impl Default for UtteranceConfig {
    fn default() -> Self {
        Self {
            min_ms: defaults::MIN_UTTERANCE_MS,
            max_ms: defaults::MAX_UTTERANCE_MS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: "whisper-1".to_string(),
            api_key: None,
            language: "en".to_string(),
            timeout_ms: defaults::STT_TIMEOUT_MS,
        }
    }
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::INTENT_TIMEOUT_MS,
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            editor: "code".to_string(),
            test_command: defaults::TEST_COMMAND.to_string(),
            package_manager: defaults::PACKAGE_MANAGER.to_string(),
            browser_command: defaults::BROWSER_COMMAND.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file is missing.
    ///
    /// Invalid TOML is an error, never silently replaced with defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e.context(format!("failed to load config from {}", path.display())))
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOCMD_AUDIO_DEVICE → audio.device
    /// - VOCMD_STT_ENDPOINT → stt.endpoint
    /// - VOCMD_STT_API_KEY → stt.api_key
    /// - VOCMD_STT_MODEL → stt.model
    /// - VOCMD_WORKSPACE → actions.workspace
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("VOCMD_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(endpoint) = std::env::var("VOCMD_STT_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.stt.endpoint = endpoint;
        }

        if let Ok(api_key) = std::env::var("VOCMD_STT_API_KEY")
            && !api_key.is_empty()
        {
            self.stt.api_key = Some(api_key);
        }

        if let Ok(model) = std::env::var("VOCMD_STT_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(workspace) = std::env::var("VOCMD_WORKSPACE")
            && !workspace.is_empty()
        {
            self.actions.workspace = Some(PathBuf::from(workspace));
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/vocmd/config.toml on Linux
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
        Ok(dir.join("vocmd").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_vocmd_env() {
        remove_env("VOCMD_AUDIO_DEVICE");
        remove_env("VOCMD_STT_ENDPOINT");
        remove_env("VOCMD_STT_API_KEY");
        remove_env("VOCMD_STT_MODEL");
        remove_env("VOCMD_WORKSPACE");
    }

    #[test]
    fn default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.audio.device, None);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.frame_samples, 512);

        assert_eq!(config.gate.threshold, 0.02);
        assert_eq!(config.gate.start_frames, 3);
        assert_eq!(config.gate.end_frames, 15);

        assert_eq!(config.utterance.min_ms, 300);
        assert_eq!(config.utterance.max_ms, 15_000);

        assert!(config.stt.endpoint.is_empty());
        assert_eq!(config.stt.timeout_ms, 10_000);
        assert_eq!(config.intent.timeout_ms, 2_000);
        assert_eq!(config.intent.confidence_threshold, 0.55);

        assert_eq!(config.actions.test_command, "cargo test");
        assert_eq!(config.actions.browser_command, "xdg-open");
    }

    #[test]
    fn load_from_toml_file() {
        let toml_content = r#"
            [audio]
            device = "pipewire"
            sample_rate = 48000

            [gate]
            threshold = 0.05
            end_frames = 20

            [utterance]
            min_ms = 500
            max_ms = 30000

            [stt]
            endpoint = "http://localhost:8080/v1/audio/transcriptions"
            model = "large-v3"
            timeout_ms = 5000

            [intent]
            confidence_threshold = 0.7

            [actions]
            workspace = "/home/dev/project"
            test_command = "cargo nextest run"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.audio.device, Some("pipewire".to_string()));
        assert_eq!(config.audio.sample_rate, 48000);
        // untouched fields keep defaults
        assert_eq!(config.audio.frame_samples, 512);
        assert_eq!(config.gate.threshold, 0.05);
        assert_eq!(config.gate.start_frames, 3);
        assert_eq!(config.gate.end_frames, 20);
        assert_eq!(config.utterance.min_ms, 500);
        assert_eq!(config.utterance.max_ms, 30_000);
        assert_eq!(
            config.stt.endpoint,
            "http://localhost:8080/v1/audio/transcriptions"
        );
        assert_eq!(config.stt.model, "large-v3");
        assert_eq!(config.stt.timeout_ms, 5000);
        assert_eq!(config.intent.confidence_threshold, 0.7);
        assert_eq!(
            config.actions.workspace,
            Some(PathBuf::from("/home/dev/project"))
        );
        assert_eq!(config.actions.test_command, "cargo nextest run");
    }

    #[test]
    fn load_partial_config_uses_defaults() {
        let toml_content = r#"
            [stt]
            model = "small.en"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.stt.model, "small.en");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.intent.confidence_threshold, 0.55);
    }

    #[test]
    fn env_override_device_and_endpoint() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_vocmd_env();

        set_env("VOCMD_AUDIO_DEVICE", "hw:1,0");
        set_env("VOCMD_STT_ENDPOINT", "http://127.0.0.1:9000/stt");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.audio.device, Some("hw:1,0".to_string()));
        assert_eq!(config.stt.endpoint, "http://127.0.0.1:9000/stt");

        clear_vocmd_env();
    }

    #[test]
    fn env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_vocmd_env();

        set_env("VOCMD_STT_MODEL", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.stt.model, "whisper-1");

        clear_vocmd_env();
    }

    #[test]
    fn env_override_workspace() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_vocmd_env();

        set_env("VOCMD_WORKSPACE", "/srv/code");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.actions.workspace, Some(PathBuf::from("/srv/code")));

        clear_vocmd_env();
    }

    #[test]
    fn invalid_toml_returns_error() {
        let invalid_toml = r#"
            [audio
            device = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_vocmd_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_or_default_errors_on_invalid_toml() {
        let invalid_toml = r#"
            [audio
            device = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn default_path_is_xdg_compliant() {
        let path = Config::default_path().unwrap();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("vocmd"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}
