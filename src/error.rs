//! Error types for Stride

use thiserror::Error;

/// Result type alias for Stride operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Stride
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A required capability was not granted
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Voice capture error
    #[error("voice error: {0}")]
    Voice(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Location source error
    #[error("location error: {0}")]
    Location(String),

    /// Outbound request exceeded its time budget
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The navigator is no longer running
    #[error("navigator stopped")]
    NavigatorStopped,

    /// Geocoding returned no candidates
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Short label for the failure class, used in structured logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::PermissionDenied(_) => "permission",
            Self::Voice(_) => "voice",
            Self::Audio(_) => "audio",
            Self::Stt(_) => "stt",
            Self::Tts(_) => "tts",
            Self::Location(_) => "location",
            Self::Timeout(_) => "timeout",
            Self::NavigatorStopped => "stopped",
            Self::NotFound(_) => "not_found",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Serialization(_) => "parse",
            Self::Toml(_) => "toml",
        }
    }
}
