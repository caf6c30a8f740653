//! TOML configuration file loading
//!
//! Supports `~/.config/stride/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StrideConfigFile {
    /// Directory for persisted UI state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Routes and geocoding API settings
    #[serde(default)]
    pub maps: MapsFileConfig,

    /// Voice capture and speech output
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for speech services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Location source settings
    #[serde(default)]
    pub location: LocationFileConfig,

    /// Announcement thresholds
    #[serde(default)]
    pub announce: AnnounceFileConfig,

    /// Capability grants
    #[serde(default)]
    pub permissions: PermissionsFileConfig,

    /// Status server
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Maps API configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MapsFileConfig {
    pub api_key: Option<String>,
    pub routes_url: Option<String>,
    pub geocode_url: Option<String>,
    /// BCP-47 language for instructions (e.g. "tr-TR")
    pub language_code: Option<String>,
    /// "WALK", "BICYCLE", "DRIVE", ...
    pub travel_mode: Option<String>,
    /// "METRIC" or "IMPERIAL"
    pub units: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub max_requests_per_minute: Option<u32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct VoiceFileConfig {
    /// Enable microphone input and spoken output
    pub enabled: Option<bool>,

    /// "whisper" or "deepgram"
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// "openai" or "elevenlabs"
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Give up on a listening session after this many seconds
    pub listen_timeout_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Location source configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LocationFileConfig {
    /// "gpsd" or "replay"
    pub source: Option<String>,
    pub gpsd_addr: Option<String>,
    pub replay_path: Option<String>,
    /// "high_accuracy", "balanced" or "low_power"
    pub priority: Option<String>,
    pub interval_ms: Option<u64>,
    pub min_update_interval_ms: Option<u64>,
    pub max_update_delay_ms: Option<u64>,
    pub wait_for_accurate: Option<bool>,
}

/// Announcement thresholds
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AnnounceFileConfig {
    pub distance_threshold_m: Option<f64>,
    pub repeat_after_ms: Option<u64>,
}

/// Capability grants
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PermissionsFileConfig {
    pub location: Option<bool>,
    pub microphone: Option<bool>,
}

/// Status server configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerFileConfig {
    pub status_port: Option<u16>,
}

/// Load the TOML config file from the standard path
///
/// Returns `StrideConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> StrideConfigFile {
    config_file_path().map_or_else(StrideConfigFile::default, |path| load_config_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_config_from(path: &Path) -> StrideConfigFile {
    if !path.exists() {
        return StrideConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                StrideConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            StrideConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/stride/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("stride").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let config: StrideConfigFile = toml::from_str(
            r#"
            [maps]
            language_code = "en-GB"

            [announce]
            distance_threshold_m = 50.0
            "#,
        )
        .unwrap();

        assert_eq!(config.maps.language_code.as_deref(), Some("en-GB"));
        assert_eq!(config.announce.distance_threshold_m, Some(50.0));
        assert!(config.voice.enabled.is_none());
    }

    #[test]
    fn test_unparseable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [not toml").unwrap();

        let config = load_config_from(&path);
        assert!(config.maps.api_key.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = load_config_from(Path::new("/nonexistent/stride/config.toml"));
        assert!(config.data_dir.is_none());
    }
}
