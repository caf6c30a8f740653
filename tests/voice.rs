//! Voice pipeline integration tests
//!
//! Runs without audio hardware: sessions use a scripted recognizer and the
//! speech APIs are served locally.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use stride_guide::config::{ApiKeys, VoiceConfig};
use stride_guide::voice::{
    RecognitionError, SAMPLE_RATE, SpeechToText, TextToSpeech, UtteranceDetector,
    UtteranceState, VoiceCapture, VoiceState, samples_to_wav,
};
use stride_guide::{Error, Permission};

mod common;
use common::{Deny, ScriptedRecognizer, spawn_server};

/// Generate sine wave audio samples
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    vec![0.0; (SAMPLE_RATE as f32 * duration_secs) as usize]
}

fn keys() -> ApiKeys {
    ApiKeys {
        openai: Some(SecretString::from("test-openai".to_string())),
        ..ApiKeys::default()
    }
}

fn granted() -> Arc<Deny> {
    Arc::new(Deny(vec![]))
}

async fn finished(capture: &VoiceCapture) -> VoiceState {
    let mut rx = capture.subscribe();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| !s.is_listening))
        .await
        .expect("session did not finish")
        .expect("capture dropped")
        .clone()
}

#[test]
fn test_utterance_detector_ignores_quiet_input() {
    let mut detector = UtteranceDetector::new();
    let hum = generate_sine_samples(50.0, 1.0, 0.01);
    assert_eq!(detector.process(&hum), UtteranceState::Waiting);
}

#[test]
fn test_utterance_detector_ends_on_silence() {
    let mut detector = UtteranceDetector::new();

    for _ in 0..5 {
        detector.process(&generate_sine_samples(220.0, 0.1, 0.4));
    }
    assert_eq!(detector.state(), UtteranceState::Speaking);
    assert!(detector.has_speech());

    for _ in 0..8 {
        detector.process(&generate_silence(0.1));
    }
    assert_eq!(detector.process(&generate_silence(0.1)), UtteranceState::Complete);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(reader.samples::<i16>().count(), samples.len());
}

#[tokio::test]
async fn test_session_delivers_transcript() {
    let recognizer = ScriptedRecognizer::new(Ok("Galata Kulesi".to_string()));
    let capture = VoiceCapture::new(recognizer.clone(), granted());

    capture.start_listening().unwrap();
    assert!(capture.state().is_listening);
    assert!(capture.is_active());

    recognizer.release();
    let state = finished(&capture).await;
    assert_eq!(
        state,
        VoiceState {
            spoken_text: "Galata Kulesi".to_string(),
            is_listening: false,
            error: None,
        }
    );
}

#[tokio::test]
async fn test_recognition_error_is_reported() {
    let recognizer = ScriptedRecognizer::new(Err(RecognitionError::NoMatch));
    let capture = VoiceCapture::new(recognizer.clone(), granted());

    capture.start_listening().unwrap();
    recognizer.release();

    let state = finished(&capture).await;
    assert_eq!(state.error, Some(RecognitionError::NoMatch));
    assert!(state.spoken_text.is_empty());
}

#[tokio::test]
async fn test_stop_listening_is_not_an_error() {
    let recognizer = ScriptedRecognizer::new(Ok("unused".to_string()));
    let capture = VoiceCapture::new(recognizer, granted());

    capture.start_listening().unwrap();
    capture.stop_listening();

    let state = finished(&capture).await;
    assert_eq!(state, VoiceState::default());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!capture.is_active());
    assert_eq!(capture.state().error, None);
}

#[tokio::test]
async fn test_second_session_is_rejected() {
    let recognizer = ScriptedRecognizer::new(Ok("Taksim".to_string()));
    let capture = VoiceCapture::new(recognizer.clone(), granted());

    capture.start_listening().unwrap();
    assert!(matches!(capture.start_listening(), Err(Error::Voice(_))));

    recognizer.release();
    assert_eq!(finished(&capture).await.spoken_text, "Taksim");
}

#[tokio::test]
async fn test_new_session_clears_previous_transcript() {
    let recognizer = ScriptedRecognizer::new(Ok("Taksim".to_string()));
    let capture = VoiceCapture::new(recognizer.clone(), granted());

    capture.start_listening().unwrap();
    recognizer.release();
    finished(&capture).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    capture.toggle().unwrap();
    let state = capture.state();
    assert!(state.is_listening);
    assert!(state.spoken_text.is_empty());

    capture.toggle().unwrap();
    assert!(!capture.state().is_listening);
}

#[tokio::test]
async fn test_toggle_while_transcribing_reports_busy() {
    let recognizer = ScriptedRecognizer::transcribing(Ok("Karaköy".to_string()));
    let capture = VoiceCapture::new(recognizer.clone(), granted());

    capture.toggle().unwrap();
    capture.toggle().unwrap();
    assert!(!capture.state().is_listening);
    assert!(capture.is_stopping());

    assert!(matches!(capture.toggle(), Err(Error::Voice(_))));
    capture.stop_listening();
    assert!(capture.is_stopping());

    recognizer.release();
    let mut rx = capture.subscribe();
    let state = tokio::time::timeout(
        Duration::from_secs(2),
        rx.wait_for(|s| !s.spoken_text.is_empty()),
    )
    .await
    .expect("transcript did not arrive")
    .unwrap()
    .clone();
    assert_eq!(state.spoken_text, "Karaköy");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!capture.is_stopping());
    assert!(!capture.is_active());
}

#[tokio::test]
async fn test_unavailable_recognizer() {
    let capture = VoiceCapture::new(ScriptedRecognizer::unavailable(), granted());

    capture.start_listening().unwrap();

    let state = capture.state();
    assert!(!state.is_listening);
    assert_eq!(state.error, Some(RecognitionError::Unavailable));
    assert!(!capture.is_active());
}

#[tokio::test]
async fn test_microphone_permission_required() {
    let recognizer = ScriptedRecognizer::new(Ok("unused".to_string()));
    let capture = VoiceCapture::new(recognizer, Arc::new(Deny(vec![Permission::Microphone])));

    assert!(matches!(
        capture.start_listening(),
        Err(Error::PermissionDenied(_))
    ));
    assert_eq!(
        capture.state().error,
        Some(RecognitionError::InsufficientPermissions)
    );
}

#[tokio::test]
async fn test_whisper_transcription() {
    let router = Router::new().route(
        "/transcribe",
        post(|headers: HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if auth == "Bearer test-openai" {
                (StatusCode::OK, Json(json!({ "text": "  Galata Kulesi  " })))
            } else {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })))
            }
        }),
    );
    let base = spawn_server(router).await;

    let stt = SpeechToText::from_config(&VoiceConfig::default(), &keys(), "tr")
        .unwrap()
        .with_endpoint(format!("{base}/transcribe"));

    let wav = samples_to_wav(&generate_sine_samples(440.0, 0.2, 0.3), SAMPLE_RATE).unwrap();
    assert_eq!(stt.transcribe(&wav).await.unwrap(), "Galata Kulesi");
}

#[tokio::test]
async fn test_transcription_server_error() {
    let router = Router::new().route(
        "/transcribe",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = spawn_server(router).await;

    let stt = SpeechToText::from_config(&VoiceConfig::default(), &keys(), "tr")
        .unwrap()
        .with_endpoint(format!("{base}/transcribe"));

    let err = stt.transcribe(b"RIFF").await.unwrap_err();
    assert!(matches!(err, Error::Stt(_)), "got {err:?}");
    assert_eq!(RecognitionError::from(&err), RecognitionError::Server);
}

#[tokio::test]
async fn test_missing_keys_rejected() {
    assert!(matches!(
        SpeechToText::from_config(&VoiceConfig::default(), &ApiKeys::default(), "tr"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        TextToSpeech::from_config(&VoiceConfig::default(), &ApiKeys::default()),
        Err(Error::Config(_))
    ));
}

#[tokio::test]
async fn test_openai_synthesis() {
    let router = Router::new().route(
        "/speech",
        post(|Json(body): Json<Value>| async move {
            if body["input"] == "Sola dönün" && body["voice"] == "alloy" && body["model"] == "tts-1"
            {
                (StatusCode::OK, Bytes::from_static(b"ID3fake-mp3"))
            } else {
                (StatusCode::BAD_REQUEST, Bytes::new())
            }
        }),
    );
    let base = spawn_server(router).await;

    let tts = TextToSpeech::from_config(&VoiceConfig::default(), &keys())
        .unwrap()
        .with_endpoint(format!("{base}/speech"));

    assert_eq!(tts.synthesize("Sola dönün").await.unwrap(), b"ID3fake-mp3");
}
