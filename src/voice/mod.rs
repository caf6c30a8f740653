//! Voice input and output
//!
//! Input: microphone capture, end-of-utterance detection and cloud
//! transcription, driven one session at a time by [`VoiceCapture`].
//! Output: cloud TTS played through the speakers, or the console when
//! running without audio.

mod capture;
mod playback;
mod recognizer;
mod session;
mod speaker;
mod stt;
mod tts;
mod utterance;

pub use capture::{AudioCapture, SAMPLE_RATE, input_available, rms, samples_to_wav};
pub use playback::{AudioPlayback, Clip, decode_mp3};
pub use recognizer::{MicrophoneRecognizer, RecognitionError, Recognizer};
pub use session::{VoiceCapture, VoiceState};
pub use speaker::{CloudSpeaker, ConsoleSpeaker, SpeechOutput};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use utterance::{UtteranceDetector, UtteranceState};
