//! Text-to-speech (TTS) processing

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::config::{ApiKeys, TtsProviderKind, VoiceConfig};
use crate::{Error, Result};

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const ELEVENLABS_MODEL: &str = "eleven_multilingual_v2";

/// Upper bound on a single synthesis round trip
const SYNTHESIZE_TIMEOUT: Duration = Duration::from_secs(20);

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProviderKind,
    endpoint: String,
}

impl TextToSpeech {
    /// Build the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let (api_key, endpoint, model) = match voice.tts_provider {
            TtsProviderKind::OpenAi => (
                keys.openai
                    .clone()
                    .ok_or_else(|| Error::Config("OpenAI API key required for TTS".to_string()))?,
                OPENAI_SPEECH_URL.to_string(),
                voice.tts_model.clone(),
            ),
            TtsProviderKind::ElevenLabs => (
                keys.elevenlabs.clone().ok_or_else(|| {
                    Error::Config("ElevenLabs API key required for TTS".to_string())
                })?,
                format!("{ELEVENLABS_URL}/{}", voice.tts_voice),
                // OpenAI model names mean nothing to ElevenLabs
                if voice.tts_model.starts_with("tts-") {
                    ELEVENLABS_MODEL.to_string()
                } else {
                    voice.tts_model.clone()
                },
            ),
        };

        let client = reqwest::Client::builder()
            .timeout(SYNTHESIZE_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            voice: voice.tts_voice.clone(),
            speed: voice.tts_speed,
            model,
            provider: voice.tts_provider,
            endpoint,
        })
    }

    /// Send requests to `endpoint` instead of the provider's public URL
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Synthesize text to MP3 audio
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.len(), provider = ?self.provider, "synthesizing");

        let response = match self.provider {
            TtsProviderKind::OpenAi => self.request_openai(text).await?,
            TtsProviderKind::ElevenLabs => self.request_elevenlabs(text).await?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("{:?} TTS error {status}: {body}", self.provider)));
        }

        let audio = response.bytes().await.map_err(classify)?;
        Ok(audio.to_vec())
    }

    async fn request_openai(&self, text: &str) -> Result<reqwest::Response> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        self.client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&TtsRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                speed: self.speed,
                response_format: "mp3",
            })
            .send()
            .await
            .map_err(classify)
    }

    async fn request_elevenlabs(&self, text: &str) -> Result<reqwest::Response> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        self.client
            .post(&self.endpoint)
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&ElevenLabsRequest {
                text,
                model_id: &self.model,
            })
            .send()
            .await
            .map_err(classify)
    }
}

fn classify(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(format!("speech synthesis: {err}"))
    } else {
        Error::Http(err)
    }
}
