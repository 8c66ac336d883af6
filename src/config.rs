//! Configuration system for Tutor Factory
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (TUTOR_* prefix, plus ANTHROPIC_API_KEY / GOOGLE_TTS_API_KEY)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Upper bound for `anthropic.max_retries`
pub const MAX_RETRIES: u32 = 10;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Session behaviour
    pub app: AppSettings,

    /// Anthropic Messages API settings
    pub anthropic: AnthropicSettings,

    /// Google Cloud text-to-speech settings
    pub tts: TtsSettings,

    /// Upload, prompt and parser limits
    pub limits: LimitSettings,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Data storage paths
    pub storage: StorageSettings,
}

/// Session behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Number of most recent conversation turns sent with each request
    pub max_history: usize,

    /// Number of saved tutors kept on disk (oldest are dropped)
    pub max_saved_tutors: usize,
}

/// Anthropic Messages API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicSettings {
    /// API base URL
    pub base_url: String,

    /// API key (falls back to ANTHROPIC_API_KEY)
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Maximum tokens generated per reply
    pub max_tokens: u32,

    /// Sampling temperature (0.0 - 1.0)
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient failures (at most [`MAX_RETRIES`])
    pub max_retries: u32,

    /// Stream replies onto the blackboard as they arrive
    pub stream: bool,
}

/// Google Cloud text-to-speech settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    /// Synthesize replies when the persona has autoplay enabled
    pub enabled: bool,

    /// API base URL
    pub base_url: String,

    /// API key (falls back to GOOGLE_TTS_API_KEY)
    pub api_key: String,

    /// BCP-47 language code
    pub language_code: String,

    /// Voice name
    pub voice_name: String,

    /// Audio encoding (MP3, LINEAR16, OGG_OPUS)
    pub audio_encoding: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Upload, prompt and parser limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Maximum size of one reference file in MB
    pub max_file_size_mb: u64,

    /// Maximum number of reference files per tutor
    pub max_files_per_tutor: usize,

    /// Characters of reference material included in the system prompt
    pub reference_char_budget: usize,

    /// Hard ceiling on history characters sent in one turn
    pub history_char_ceiling: usize,

    /// Maximum directive nesting depth accepted by the response parser
    pub max_nesting_depth: usize,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

/// Storage path settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Base data directory
    pub data_dir: String,

    /// User preset file (relative paths resolve against data_dir)
    pub presets_file: String,

    /// Saved tutor file (relative paths resolve against data_dir)
    pub tutors_file: String,

    /// Directory for synthesized audio
    pub audio_dir: String,
}

// Default implementations

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_history: 10,
            max_saved_tutors: 20,
        }
    }
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-3-sonnet-20240229".to_string(),
            max_tokens: 2000,
            temperature: 0.7,
            timeout_secs: 120,
            max_retries: 2,
            stream: true,
        }
    }
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://texttospeech.googleapis.com/v1".to_string(),
            api_key: String::new(),
            language_code: "ko-KR".to_string(),
            voice_name: "ko-KR-Standard-A".to_string(),
            audio_encoding: "MP3".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            max_files_per_tutor: 5,
            reference_char_budget: 12_000,
            history_char_ceiling: 24_000,
            max_nesting_depth: 16,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.tutor-factory".to_string(),
            presets_file: "presets.json".to_string(),
            tutors_file: "tutors.json".to_string(),
            audio_dir: "~/.tutor-factory/audio".to_string(),
        }
    }
}

impl LimitSettings {
    /// Per-file upload limit in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl TutorConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e.message()),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            PathBuf::from("tutor-factory.toml"),
            dirs::config_dir()
                .map(|p| p.join("tutor-factory").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".tutor-factory").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &search_paths {
            if path.is_file() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // App settings
        if let Some(n) = env_parse("TUTOR_MAX_HISTORY") {
            self.app.max_history = n;
        }
        if let Some(n) = env_parse("TUTOR_MAX_SAVED_TUTORS") {
            self.app.max_saved_tutors = n;
        }

        // Anthropic settings
        if let Ok(val) = std::env::var("TUTOR_ANTHROPIC_BASE_URL") {
            self.anthropic.base_url = val;
        }
        if let Ok(val) = std::env::var("TUTOR_ANTHROPIC_API_KEY") {
            self.anthropic.api_key = val;
        } else if self.anthropic.api_key.is_empty() {
            if let Ok(val) = std::env::var("ANTHROPIC_API_KEY") {
                self.anthropic.api_key = val;
            }
        }
        if let Ok(val) = std::env::var("TUTOR_MODEL") {
            self.anthropic.model = val;
        }
        if let Some(n) = env_parse("TUTOR_MAX_TOKENS") {
            self.anthropic.max_tokens = n;
        }
        if let Some(t) = env_parse("TUTOR_TEMPERATURE") {
            self.anthropic.temperature = t;
        }
        if let Some(n) = env_parse("TUTOR_TIMEOUT_SECS") {
            self.anthropic.timeout_secs = n;
        }
        if let Some(b) = env_bool("TUTOR_STREAM") {
            self.anthropic.stream = b;
        }

        // TTS settings
        if let Some(b) = env_bool("TUTOR_TTS_ENABLED") {
            self.tts.enabled = b;
        }
        if let Ok(val) = std::env::var("TUTOR_TTS_API_KEY") {
            self.tts.api_key = val;
        } else if self.tts.api_key.is_empty() {
            if let Ok(val) = std::env::var("GOOGLE_TTS_API_KEY") {
                self.tts.api_key = val;
            }
        }
        if let Ok(val) = std::env::var("TUTOR_TTS_LANGUAGE") {
            self.tts.language_code = val;
        }
        if let Ok(val) = std::env::var("TUTOR_TTS_VOICE") {
            self.tts.voice_name = val;
        }

        // Limit settings
        if let Some(n) = env_parse("TUTOR_MAX_FILE_SIZE_MB") {
            self.limits.max_file_size_mb = n;
        }
        if let Some(n) = env_parse("TUTOR_REFERENCE_CHAR_BUDGET") {
            self.limits.reference_char_budget = n;
        }

        // Logging settings
        if let Ok(val) = std::env::var("TUTOR_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("TUTOR_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Some(b) = env_bool("TUTOR_LOG_JSON") {
            self.logging.json_format = b;
        }

        // Storage settings
        if let Ok(val) = std::env::var("TUTOR_DATA_DIR") {
            self.storage.data_dir = val;
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.storage.data_dir = expand_path(&self.storage.data_dir);
        self.storage.audio_dir = expand_path(&self.storage.audio_dir);
        self.storage.presets_file = expand_path(&self.storage.presets_file);
        self.storage.tutors_file = expand_path(&self.storage.tutors_file);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_http_url("anthropic.base_url", &self.anthropic.base_url)?;
        if self.tts.enabled {
            validate_http_url("tts.base_url", &self.tts.base_url)?;
        }

        if !(0.0..=1.0).contains(&self.anthropic.temperature) {
            return Err(Error::config_field_invalid(
                "anthropic.temperature",
                format!(
                    "temperature must be between 0.0 and 1.0, got {}",
                    self.anthropic.temperature
                ),
            ));
        }
        if self.anthropic.max_tokens == 0 {
            return Err(Error::config_field_invalid(
                "anthropic.max_tokens",
                "max_tokens must be greater than 0",
            ));
        }

        if self.anthropic.max_retries > MAX_RETRIES {
            return Err(Error::config_field_invalid(
                "anthropic.max_retries",
                format!(
                    "max_retries must be at most {}, got {}",
                    MAX_RETRIES, self.anthropic.max_retries
                ),
            ));
        }

        if self.limits.max_nesting_depth == 0 {
            return Err(Error::config_field_invalid(
                "limits.max_nesting_depth",
                "max_nesting_depth must be greater than 0",
            ));
        }
        if self.limits.max_file_size_mb == 0 || self.limits.max_files_per_tutor == 0 {
            return Err(Error::config_field_invalid(
                "limits",
                "file size and file count limits must be greater than 0",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Get the data directory as a PathBuf
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    /// Path of the user preset file
    pub fn presets_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.presets_file)
    }

    /// Path of the saved tutor file
    pub fn tutors_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.tutors_file)
    }

    /// Get the audio output directory as a PathBuf
    pub fn audio_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.audio_dir)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value).map_err(|e| {
        Error::config_field_invalid(field, format!("invalid URL '{}': {}", value, e))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::config_field_invalid(
            field,
            format!("URL must use http or https, got '{}'", other),
        )),
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location for `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tutor-factory")
        .join("config.toml")
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# Tutor Factory Configuration

[app]
# Number of most recent conversation turns sent with each request
max_history = 10

# Number of saved tutors kept on disk
max_saved_tutors = 20

[anthropic]
base_url = "https://api.anthropic.com"

# API key (leave empty to use ANTHROPIC_API_KEY)
api_key = ""

model = "claude-3-sonnet-20240229"
max_tokens = 2000

# Sampling temperature (0.0 - 1.0)
temperature = 0.7

# Request timeout in seconds
timeout_secs = 120

# Maximum retries on rate limits, server errors and connection failures
max_retries = 2

# Stream replies onto the blackboard as they arrive
stream = true

[tts]
# Speak replies for personas with autoplay enabled
enabled = false
base_url = "https://texttospeech.googleapis.com/v1"

# API key (leave empty to use GOOGLE_TTS_API_KEY)
api_key = ""

language_code = "ko-KR"
voice_name = "ko-KR-Standard-A"
audio_encoding = "MP3"
timeout_secs = 30

[limits]
# Reference uploads
max_file_size_mb = 10
max_files_per_tutor = 5

# Characters of reference material included in the system prompt
reference_char_budget = 12000

# Hard ceiling on conversation history characters per request
history_char_ceiling = 24000

# Maximum nesting of blackboard directives in a reply
max_nesting_depth = 16

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log file path (comment out to disable file logging)
# file = "~/.tutor-factory/logs/tutor.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false

[storage]
data_dir = "~/.tutor-factory"
presets_file = "presets.json"
tutors_file = "tutors.json"
audio_dir = "~/.tutor-factory/audio"
"#
    .to_string()
}
