//! Speech recognition backends

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;

use super::capture::{self, AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::stt::SpeechToText;
use super::utterance::{UtteranceDetector, UtteranceState};
use crate::Error;
use crate::cancel::CancelToken;

/// How often the capture thread drains the microphone buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why a recognition session ended without text
///
/// Numbered the way mobile speech recognizers report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionError {
    /// No recognizer on this system
    Unavailable,
    NetworkTimeout,
    Network,
    Audio,
    Server,
    /// Session ended by the caller
    Client,
    /// Nothing was said before the listen timeout
    SpeechTimeout,
    /// Speech was heard but produced no text
    NoMatch,
    Busy,
    InsufficientPermissions,
}

impl RecognitionError {
    /// Numeric code, absent for [`RecognitionError::Unavailable`]
    #[must_use]
    pub const fn code(self) -> Option<u8> {
        match self {
            Self::Unavailable => None,
            Self::NetworkTimeout => Some(1),
            Self::Network => Some(2),
            Self::Audio => Some(3),
            Self::Server => Some(4),
            Self::Client => Some(5),
            Self::SpeechTimeout => Some(6),
            Self::NoMatch => Some(7),
            Self::Busy => Some(8),
            Self::InsufficientPermissions => Some(9),
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::Unavailable => "recognition unavailable",
            Self::NetworkTimeout => "network timeout",
            Self::Network => "network error",
            Self::Audio => "audio error",
            Self::Server => "server error",
            Self::Client => "cancelled",
            Self::SpeechTimeout => "no speech",
            Self::NoMatch => "no match",
            Self::Busy => "recognizer busy",
            Self::InsufficientPermissions => "microphone permission denied",
        }
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "error {code} ({})", self.describe()),
            None => f.write_str(self.describe()),
        }
    }
}

impl From<&Error> for RecognitionError {
    fn from(err: &Error) -> Self {
        match err {
            Error::Timeout(_) => Self::NetworkTimeout,
            Error::Http(_) => Self::Network,
            Error::Audio(_) => Self::Audio,
            Error::PermissionDenied(_) => Self::InsufficientPermissions,
            Error::Voice(_) => Self::Busy,
            _ => Self::Server,
        }
    }
}

/// Turns one spoken utterance into text
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Whether recognition can run at all on this system
    fn is_available(&self) -> bool;

    /// Listen for one utterance
    ///
    /// Cancelling `cancel` finishes early: whatever speech was already heard
    /// is still transcribed, otherwise the session ends with
    /// [`RecognitionError::Client`].
    async fn recognize(&self, cancel: &CancelToken) -> Result<String, RecognitionError>;
}

/// Microphone capture followed by a cloud transcription
pub struct MicrophoneRecognizer {
    stt: SpeechToText,
    listen_timeout: Duration,
}

impl MicrophoneRecognizer {
    #[must_use]
    pub const fn new(stt: SpeechToText, listen_timeout: Duration) -> Self {
        Self {
            stt,
            listen_timeout,
        }
    }
}

#[async_trait]
impl Recognizer for MicrophoneRecognizer {
    fn is_available(&self) -> bool {
        capture::input_available()
    }

    async fn recognize(&self, cancel: &CancelToken) -> Result<String, RecognitionError> {
        let token = cancel.clone();
        let timeout = self.listen_timeout;

        let samples = tokio::task::spawn_blocking(move || record_utterance(&token, timeout))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "capture thread failed");
                RecognitionError::Audio
            })??;

        let wav = samples_to_wav(&samples, SAMPLE_RATE).map_err(|e| RecognitionError::from(&e))?;

        let text = self.stt.transcribe(&wav).await.map_err(|e| {
            tracing::warn!(error = %e, kind = e.kind(), "transcription failed");
            RecognitionError::from(&e)
        })?;

        if text.is_empty() {
            return Err(RecognitionError::NoMatch);
        }
        Ok(text)
    }
}

/// Record from the microphone until the utterance ends, the session is
/// cancelled, or `timeout` elapses
fn record_utterance(cancel: &CancelToken, timeout: Duration) -> Result<Vec<f32>, RecognitionError> {
    let mut capture = AudioCapture::new().map_err(|e| {
        tracing::warn!(error = %e, "cannot open microphone");
        RecognitionError::Audio
    })?;
    capture.start().map_err(|e| {
        tracing::warn!(error = %e, "cannot start microphone");
        RecognitionError::Audio
    })?;

    let mut detector = UtteranceDetector::new();
    let started = Instant::now();

    loop {
        std::thread::sleep(POLL_INTERVAL);

        if detector.process(&capture.take_buffer()) == UtteranceState::Complete {
            return Ok(detector.take_speech());
        }

        let out_of_time = started.elapsed() >= timeout;
        if cancel.is_cancelled() || out_of_time {
            capture.stop();
            if detector.has_speech() {
                return Ok(detector.take_speech());
            }
            return Err(if out_of_time {
                RecognitionError::SpeechTimeout
            } else {
                RecognitionError::Client
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(RecognitionError::NetworkTimeout.code(), Some(1));
        assert_eq!(RecognitionError::Client.code(), Some(5));
        assert_eq!(RecognitionError::InsufficientPermissions.code(), Some(9));
        assert_eq!(RecognitionError::Unavailable.code(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(RecognitionError::NoMatch.to_string(), "error 7 (no match)");
        assert_eq!(
            RecognitionError::Unavailable.to_string(),
            "recognition unavailable"
        );
    }

    #[test]
    fn test_from_error() {
        assert_eq!(
            RecognitionError::from(&Error::Timeout("stt".into())),
            RecognitionError::NetworkTimeout
        );
        assert_eq!(
            RecognitionError::from(&Error::Stt("500".into())),
            RecognitionError::Server
        );
        assert_eq!(
            RecognitionError::from(&Error::Audio("no device".into())),
            RecognitionError::Audio
        );
    }
}
