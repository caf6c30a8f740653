//! Configuration management for Stride

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::location::{LocationRequest, Priority};
use crate::{Error, Result};

use file::StrideConfigFile;

/// Default routes endpoint
pub const DEFAULT_ROUTES_URL: &str = "https://routes.googleapis.com/directions/v2:computeRoutes";

/// Default geocoding endpoint
pub const DEFAULT_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Default gpsd address
pub const DEFAULT_GPSD_ADDR: &str = "127.0.0.1:2947";

/// Stride configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for persisted UI state
    pub data_dir: PathBuf,

    /// Routes and geocoding
    pub maps: MapsConfig,

    /// Voice capture and speech output
    pub voice: VoiceConfig,

    /// API keys for speech services
    pub api_keys: ApiKeys,

    /// Location source
    pub location: LocationConfig,

    /// Announcement thresholds
    pub announce: AnnounceConfig,

    /// Capability grants
    pub permissions: PermissionsConfig,

    /// Status server
    pub server: ServerConfig,
}

/// Maps API configuration
#[derive(Debug, Clone)]
pub struct MapsConfig {
    /// Key sent as `X-Goog-Api-Key` / `key=` (from `GOOGLE_MAPS_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Routes `computeRoutes` endpoint
    pub routes_url: String,

    /// Geocoding endpoint
    pub geocode_url: String,

    /// Travel mode sent with each route request
    pub travel_mode: String,

    /// Language for instructions and recognition
    pub language_code: String,

    /// Unit system for localized distances
    pub units: String,

    /// TCP connect budget per request
    pub connect_timeout: Duration,

    /// Whole-request budget, including reading the body
    pub request_timeout: Duration,

    /// Cap on directions requests per minute
    pub max_requests_per_minute: u32,
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            routes_url: DEFAULT_ROUTES_URL.to_string(),
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            travel_mode: "WALK".to_string(),
            language_code: "tr-TR".to_string(),
            units: "METRIC".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            max_requests_per_minute: 30,
        }
    }
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProviderKind {
    #[default]
    Whisper,
    Deepgram,
}

/// Text-to-speech backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProviderKind {
    #[default]
    OpenAi,
    ElevenLabs,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone input and spoken output
    pub enabled: bool,

    /// Speech-to-text backend
    pub stt_provider: SttProviderKind,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// Text-to-speech backend
    pub tts_provider: TtsProviderKind,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Upper bound on a single listening session
    pub listen_timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_provider: SttProviderKind::Whisper,
            stt_model: "whisper-1".to_string(),
            tts_provider: TtsProviderKind::OpenAi,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            listen_timeout: Duration::from_secs(15),
        }
    }
}

/// API keys for external speech services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<SecretString>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<SecretString>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<SecretString>,
}

/// Where location fixes come from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LocationSourceKind {
    /// gpsd JSON protocol over TCP
    #[default]
    Gpsd,
    /// Recorded `lat,lng` lines replayed at the update interval
    Replay,
}

/// Location source configuration
#[derive(Debug, Clone)]
pub struct LocationConfig {
    pub source: LocationSourceKind,
    pub gpsd_addr: String,
    pub replay_path: Option<PathBuf>,
    pub request: LocationRequest,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            source: LocationSourceKind::Gpsd,
            gpsd_addr: DEFAULT_GPSD_ADDR.to_string(),
            replay_path: None,
            request: LocationRequest::default(),
        }
    }
}

/// Announcement thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnounceConfig {
    /// Re-announce when the remaining distance moves by at least this much
    pub distance_threshold_m: f64,

    /// Re-announce when this long has passed since the last announcement
    pub repeat_after: Duration,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            distance_threshold_m: 100.0,
            repeat_after: Duration::from_millis(30_000),
        }
    }
}

/// Capability grants; the desktop stand-in for runtime permission dialogs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionsConfig {
    pub location: bool,
    pub microphone: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            location: true,
            microphone: true,
        }
    }
}

/// Status server configuration
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Port for the JSON status endpoint; disabled when `None`
    pub status_port: Option<u16>,
}

/// Default data directory: `~/.local/share/stride/`
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/stride"),
        |d| d.data_dir().join("stride"),
    )
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    #[allow(clippy::too_many_lines)]
    pub fn resolve(fc: StrideConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = |value: Option<String>| {
            value
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
        };

        let data_dir = env("STRIDE_DATA_DIR")
            .or(fc.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        // Maps config (env > toml > default)
        let maps_defaults = MapsConfig::default();
        let maps = MapsConfig {
            api_key: secret(env("GOOGLE_MAPS_API_KEY").or(fc.maps.api_key)),
            routes_url: env("STRIDE_ROUTES_URL")
                .or(fc.maps.routes_url)
                .unwrap_or(maps_defaults.routes_url),
            geocode_url: env("STRIDE_GEOCODE_URL")
                .or(fc.maps.geocode_url)
                .unwrap_or(maps_defaults.geocode_url),
            travel_mode: fc
                .maps
                .travel_mode
                .unwrap_or(maps_defaults.travel_mode),
            language_code: env("STRIDE_LANGUAGE")
                .or(fc.maps.language_code)
                .unwrap_or(maps_defaults.language_code),
            units: fc.maps.units.unwrap_or(maps_defaults.units),
            connect_timeout: fc
                .maps
                .connect_timeout_secs
                .map_or(maps_defaults.connect_timeout, Duration::from_secs),
            request_timeout: fc
                .maps
                .request_timeout_secs
                .map_or(maps_defaults.request_timeout, Duration::from_secs),
            max_requests_per_minute: fc
                .maps
                .max_requests_per_minute
                .unwrap_or(maps_defaults.max_requests_per_minute),
        };

        if maps.request_timeout.is_zero() || maps.connect_timeout.is_zero() {
            return Err(Error::Config(
                "maps timeouts must be greater than zero".to_string(),
            ));
        }

        // Voice config (env > toml > default)
        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            enabled: fc.voice.enabled.unwrap_or(voice_defaults.enabled),
            stt_provider: match fc.voice.stt_provider.as_deref() {
                None | Some("whisper") => SttProviderKind::Whisper,
                Some("deepgram") => SttProviderKind::Deepgram,
                Some(other) => {
                    return Err(Error::Config(format!("unknown stt_provider: {other}")));
                }
            },
            stt_model: env("STRIDE_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(voice_defaults.stt_model),
            tts_provider: match fc.voice.tts_provider.as_deref() {
                None | Some("openai") => TtsProviderKind::OpenAi,
                Some("elevenlabs") => TtsProviderKind::ElevenLabs,
                Some(other) => {
                    return Err(Error::Config(format!("unknown tts_provider: {other}")));
                }
            },
            tts_model: env("STRIDE_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(voice_defaults.tts_model),
            tts_voice: env("STRIDE_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(voice_defaults.tts_voice),
            tts_speed: fc
                .voice
                .tts_speed
                .unwrap_or(voice_defaults.tts_speed)
                .clamp(0.25, 4.0),
            listen_timeout: fc
                .voice
                .listen_timeout_secs
                .map_or(voice_defaults.listen_timeout, Duration::from_secs),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: secret(env("OPENAI_API_KEY").or(fc.api_keys.openai)),
            deepgram: secret(env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram)),
            elevenlabs: secret(env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs)),
        };

        // Location config
        let request_defaults = LocationRequest::default();
        let priority = match fc.location.priority.as_deref() {
            None => request_defaults.priority,
            Some(name) => name.parse::<Priority>()?,
        };
        let location = LocationConfig {
            source: match fc.location.source.as_deref() {
                None | Some("gpsd") => LocationSourceKind::Gpsd,
                Some("replay") => LocationSourceKind::Replay,
                Some(other) => {
                    return Err(Error::Config(format!("unknown location source: {other}")));
                }
            },
            gpsd_addr: env("STRIDE_GPSD_ADDR")
                .or(fc.location.gpsd_addr)
                .unwrap_or_else(|| DEFAULT_GPSD_ADDR.to_string()),
            replay_path: fc.location.replay_path.map(PathBuf::from),
            request: LocationRequest {
                priority,
                interval: fc
                    .location
                    .interval_ms
                    .map_or(request_defaults.interval, Duration::from_millis),
                min_update_interval: fc
                    .location
                    .min_update_interval_ms
                    .map_or(request_defaults.min_update_interval, Duration::from_millis),
                max_update_delay: fc
                    .location
                    .max_update_delay_ms
                    .map_or(request_defaults.max_update_delay, Duration::from_millis),
                wait_for_accurate: fc
                    .location
                    .wait_for_accurate
                    .unwrap_or(request_defaults.wait_for_accurate),
            },
        };

        let announce_defaults = AnnounceConfig::default();
        let announce = AnnounceConfig {
            distance_threshold_m: fc
                .announce
                .distance_threshold_m
                .unwrap_or(announce_defaults.distance_threshold_m),
            repeat_after: fc
                .announce
                .repeat_after_ms
                .map_or(announce_defaults.repeat_after, Duration::from_millis),
        };

        let permissions = PermissionsConfig {
            location: fc.permissions.location.unwrap_or(true),
            microphone: fc.permissions.microphone.unwrap_or(true),
        };

        let server = ServerConfig {
            status_port: env("STRIDE_STATUS_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.status_port),
        };

        Ok(Self {
            data_dir,
            maps,
            voice,
            api_keys,
            location,
            announce,
            permissions,
            server,
        })
    }

    /// Path of the persisted current-instruction state
    #[must_use]
    pub fn ui_state_path(&self) -> PathBuf {
        self.data_dir.join("ui-state.json")
    }

    /// Short language tag for speech recognition ("tr-TR" -> "tr")
    #[must_use]
    pub fn recognition_language(&self) -> &str {
        self.maps
            .language_code
            .split(['-', '_'])
            .next()
            .unwrap_or(&self.maps.language_code)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(StrideConfigFile::default(), env_from(&[])).unwrap();

        assert!(config.maps.api_key.is_none());
        assert_eq!(config.maps.routes_url, DEFAULT_ROUTES_URL);
        assert_eq!(config.maps.travel_mode, "WALK");
        assert_eq!(config.maps.units, "METRIC");
        assert!((config.announce.distance_threshold_m - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.announce.repeat_after, Duration::from_secs(30));
        assert_eq!(config.location.source, LocationSourceKind::Gpsd);
        assert_eq!(
            config.location.request.min_update_interval,
            Duration::from_millis(3000)
        );
        assert!(config.permissions.location);
        assert!(config.server.status_port.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: StrideConfigFile = toml::from_str(
            r#"
            [maps]
            api_key = "from-file"
            language_code = "de-DE"
            "#,
        )
        .unwrap();

        let config = Config::resolve(
            fc,
            env_from(&[("GOOGLE_MAPS_API_KEY", "from-env"), ("STRIDE_STATUS_PORT", "8080")]),
        )
        .unwrap();

        assert_eq!(
            config.maps.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("from-env".to_string())
        );
        assert_eq!(config.maps.language_code, "de-DE");
        assert_eq!(config.server.status_port, Some(8080));
    }

    #[test]
    fn test_blank_key_is_none() {
        let config =
            Config::resolve(StrideConfigFile::default(), env_from(&[("OPENAI_API_KEY", "  ")]))
                .unwrap();
        assert!(config.api_keys.openai.is_none());
    }

    #[test]
    fn test_unknown_source_rejected() {
        let fc: StrideConfigFile = toml::from_str("[location]\nsource = \"carrier-pigeon\"").unwrap();
        assert!(matches!(
            Config::resolve(fc, env_from(&[])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_recognition_language() {
        let config = Config::resolve(
            StrideConfigFile::default(),
            env_from(&[("STRIDE_LANGUAGE", "en-GB")]),
        )
        .unwrap();
        assert_eq!(config.recognition_language(), "en");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let fc: StrideConfigFile = toml::from_str("[maps]\nrequest_timeout_secs = 0").unwrap();
        assert!(Config::resolve(fc, env_from(&[])).is_err());
    }
}
