//! Error types for Tutor Factory
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Retry and recovery classification for the chat loop
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for tutor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Persona and upload validation errors (3xx)
    PersonaInvalid = 300,
    MaterialRejected = 301,

    // Prompt compilation errors (4xx)
    CompilationFailed = 400,

    // Response parsing errors (5xx)
    ParseFailed = 500,
    TurnAbandoned = 501,

    // Upstream service errors (6xx)
    UpstreamNetwork = 600,
    UpstreamAuth = 601,
    UpstreamRateLimited = 602,
    UpstreamServer = 603,
    UpstreamInvalidResponse = 604,

    // Storage errors (7xx)
    PresetNotFound = 700,
    PresetReadOnly = 701,
    TutorNotFound = 702,
    StorageCorrupted = 703,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            600..=699 => 60,
            700..=799 => 70,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure class reported by an upstream service (language model or speech)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    /// Connection refused, DNS failure, timeout
    Network,
    /// Missing or rejected API key
    Auth,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    Server,
    /// The service answered, but not with anything we can use
    InvalidResponse,
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpstreamKind::Network => "network",
            UpstreamKind::Auth => "auth",
            UpstreamKind::RateLimited => "rate-limited",
            UpstreamKind::Server => "server",
            UpstreamKind::InvalidResponse => "invalid-response",
        };
        write!(f, "{}", s)
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON (de)serialization error outside of a specific store
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Validation Errors
    // ─────────────────────────────────────────────────────────────

    /// A persona value is missing or out of range
    #[error("Invalid persona field '{field}': {message}")]
    Validation { field: String, message: String },

    /// An uploaded reference file was refused
    #[error("Reference material '{filename}' rejected: {reason}")]
    MaterialRejected { filename: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Prompt / Response Errors
    // ─────────────────────────────────────────────────────────────

    /// The prompt could not be assembled
    #[error("Prompt compilation failed: {message}")]
    Compilation { message: String },

    /// Model output exceeded the parser's recovery limits
    #[error("Response parsing failed at offset {offset}: {message}")]
    Parse { message: String, offset: usize },

    /// The consumer of a streaming turn stopped it before completion
    #[error("Turn abandoned before the response completed")]
    TurnAbandoned,

    // ─────────────────────────────────────────────────────────────
    // Upstream Errors
    // ─────────────────────────────────────────────────────────────

    /// Language-model or speech service failure
    #[error("{service} request failed ({kind}): {message}")]
    Upstream {
        service: &'static str,
        kind: UpstreamKind,
        status: Option<u16>,
        message: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────

    /// Preset name unknown to both the bundled registry and the user store
    #[error("Preset not found: {name}")]
    PresetNotFound { name: String },

    /// Bundled presets cannot be changed or deleted
    #[error("Preset '{name}' is a bundled default and cannot be modified")]
    PresetReadOnly { name: String },

    /// No saved tutor with this id
    #[error("Tutor not found: {id}")]
    TutorNotFound { id: String },

    /// A store file exists but could not be decoded
    #[error("Storage file {path} is corrupted: {message}")]
    StorageCorrupted { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::StorageCorrupted,

            Error::Validation { .. } => ErrorCode::PersonaInvalid,
            Error::MaterialRejected { .. } => ErrorCode::MaterialRejected,

            Error::Compilation { .. } => ErrorCode::CompilationFailed,
            Error::Parse { .. } => ErrorCode::ParseFailed,
            Error::TurnAbandoned => ErrorCode::TurnAbandoned,

            Error::Upstream { kind, .. } => match kind {
                UpstreamKind::Network => ErrorCode::UpstreamNetwork,
                UpstreamKind::Auth => ErrorCode::UpstreamAuth,
                UpstreamKind::RateLimited => ErrorCode::UpstreamRateLimited,
                UpstreamKind::Server => ErrorCode::UpstreamServer,
                UpstreamKind::InvalidResponse => ErrorCode::UpstreamInvalidResponse,
            },

            Error::PresetNotFound { .. } => ErrorCode::PresetNotFound,
            Error::PresetReadOnly { .. } => ErrorCode::PresetReadOnly,
            Error::TutorNotFound { .. } => ErrorCode::TutorNotFound,
            Error::StorageCorrupted { .. } => ErrorCode::StorageCorrupted,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the user may retry the same turn.
    ///
    /// Nothing in the session retries on its own; this only drives the
    /// message shown to the user.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Upstream { kind, .. } => !matches!(kind, UpstreamKind::Auth),
            Error::TurnAbandoned => true,
            _ => false,
        }
    }

    /// Whether the session survives this error (history and persona intact)
    pub fn is_session_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Compilation { .. }
                | Error::Parse { .. }
                | Error::Upstream { .. }
                | Error::TurnAbandoned
                | Error::MaterialRejected { .. }
        )
    }

    /// Check if the error is fatal (the CLI should exit)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::StorageCorrupted { .. }
                | Error::Internal(_)
        ) || matches!(
            self,
            Error::Upstream {
                kind: UpstreamKind::Auth,
                ..
            }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'tutor-factory config init' to create a default configuration file.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'tutor-factory config validate' to see details.",
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values.",
            ),

            Error::Validation { .. } => Some(
                "Trait values must be whole numbers from 0 to 100; voice rate and pitch must be between 0.5 and 2.0.",
            ),
            Error::MaterialRejected { .. } => Some(
                "Upload plain text or markdown files of at most 10MB, and no more than 5 per tutor.",
            ),

            Error::Compilation { .. } => Some(
                "The conversation is too long to send. Start a new topic or clear older turns.",
            ),
            Error::Parse { .. } => Some(
                "The tutor's reply could not be drawn on the blackboard; the raw text is shown instead.",
            ),

            Error::Upstream {
                kind: UpstreamKind::Auth,
                ..
            } => Some(
                "Set ANTHROPIC_API_KEY (or [anthropic] api_key in the config file) to a valid key.",
            ),
            Error::Upstream {
                kind: UpstreamKind::RateLimited,
                ..
            } => Some("The service is rate limiting requests. Wait a moment and send the message again."),
            Error::Upstream { .. } => Some(
                "The service could not be reached. Check your network connection and send the message again.",
            ),

            Error::PresetNotFound { .. } => Some(
                "Run 'tutor-factory preset list' to see the available presets.",
            ),
            Error::PresetReadOnly { .. } => Some(
                "Save your changes under a new preset name instead.",
            ),
            Error::TutorNotFound { .. } => Some(
                "Run 'tutor-factory tutor list' to see saved tutors.",
            ),
            Error::StorageCorrupted { .. } => Some(
                "Fix or remove the damaged file; it will be recreated on the next save.",
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();

        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", code.as_str(), self);

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a persona validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a material rejection
    pub fn material_rejected(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MaterialRejected {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// Create a prompt compilation error
    pub fn compilation(message: impl Into<String>) -> Self {
        Error::Compilation {
            message: message.into(),
        }
    }

    /// Create a response parse error
    pub fn parse(message: impl Into<String>, offset: usize) -> Self {
        Error::Parse {
            message: message.into(),
            offset,
        }
    }

    /// Create an upstream error
    pub fn upstream(
        service: &'static str,
        kind: UpstreamKind,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Error::Upstream {
            service,
            kind,
            status,
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
