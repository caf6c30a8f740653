//! Spoken output
//!
//! Every [`SpeechOutput`] flushes: a new utterance interrupts whatever is
//! still playing.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::playback::AudioPlayback;
use super::tts::TextToSpeech;
use crate::{Error, Result};

/// Speaks text aloud, replacing anything queued
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Start speaking `text`, interrupting the previous utterance
    async fn speak(&self, text: &str) -> Result<()>;

    /// Silence any ongoing speech
    async fn stop(&self) {}
}

struct Utterance {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Utterance {
    fn interrupt(self) {
        self.stop.store(true, Ordering::Relaxed);
        self.task.abort();
    }
}

/// Cloud TTS played through the default output device
pub struct CloudSpeaker {
    tts: Arc<TextToSpeech>,
    current: Mutex<Option<Utterance>>,
}

impl CloudSpeaker {
    #[must_use]
    pub fn new(tts: TextToSpeech) -> Self {
        Self {
            tts: Arc::new(tts),
            current: Mutex::new(None),
        }
    }

    fn replace(&self, next: Option<Utterance>) -> Result<()> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| Error::Tts("speaker lock poisoned".to_string()))?;
        if let Some(previous) = std::mem::replace(&mut *current, next) {
            previous.interrupt();
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechOutput for CloudSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        self.replace(None)?;

        let stop = Arc::new(AtomicBool::new(false));
        let tts = Arc::clone(&self.tts);
        let text = text.to_string();
        let flag = Arc::clone(&stop);

        let task = tokio::spawn(async move {
            let audio = match tts.synthesize(&text).await {
                Ok(audio) => audio,
                Err(e) => {
                    tracing::warn!(error = %e, kind = e.kind(), "speech synthesis failed");
                    return;
                }
            };

            if flag.load(Ordering::Relaxed) {
                return;
            }

            let played = tokio::task::spawn_blocking(move || {
                AudioPlayback::new()?.play_mp3(&audio, &flag)
            })
            .await;

            match played {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "playback failed"),
                Err(e) => tracing::error!(error = %e, "playback thread failed"),
            }
        });

        self.replace(Some(Utterance { stop, task }))
    }

    async fn stop(&self) {
        if let Err(e) = self.replace(None) {
            tracing::warn!(error = %e, "failed to stop speech");
        }
    }
}

/// Prints utterances to stdout instead of speaking them
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSpeaker;

#[async_trait]
impl SpeechOutput for ConsoleSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "🔊 {text}")?;
        stdout.flush()?;
        Ok(())
    }
}
