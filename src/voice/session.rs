//! Listening sessions
//!
//! [`VoiceCapture`] owns at most one recognition session at a time and
//! publishes its progress as a [`VoiceState`] on a watch channel.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;

use super::recognizer::{RecognitionError, Recognizer};
use crate::cancel::CancelToken;
use crate::permissions::{Permission, PermissionGate};
use crate::{Error, Result};

/// Observable state of voice capture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoiceState {
    /// Final transcript of the last session, empty until one arrives
    pub spoken_text: String,
    /// Whether a session is running
    pub is_listening: bool,
    /// Why the last session failed
    pub error: Option<RecognitionError>,
}

struct ActiveSession {
    id: u64,
    cancel: CancelToken,
    /// Stop was requested; the recognizer is finishing what it heard
    stopping: bool,
}

#[derive(Default)]
struct Sessions {
    next_id: u64,
    active: Option<ActiveSession>,
}

/// Runs listening sessions against a [`Recognizer`]
#[derive(Clone)]
pub struct VoiceCapture {
    recognizer: Arc<dyn Recognizer>,
    permissions: Arc<dyn PermissionGate>,
    state: Arc<watch::Sender<VoiceState>>,
    sessions: Arc<Mutex<Sessions>>,
}

impl VoiceCapture {
    #[must_use]
    pub fn new(recognizer: Arc<dyn Recognizer>, permissions: Arc<dyn PermissionGate>) -> Self {
        let (state, _) = watch::channel(VoiceState::default());
        Self {
            recognizer,
            permissions,
            state: Arc::new(state),
            sessions: Arc::new(Mutex::new(Sessions::default())),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> VoiceState {
        self.state.borrow().clone()
    }

    /// Watch state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VoiceState> {
        self.state.subscribe()
    }

    /// Begin a session
    ///
    /// The previous transcript and error are cleared. When no recognizer is
    /// available the state carries [`RecognitionError::Unavailable`] and no
    /// session starts. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] without microphone permission and
    /// [`Error::Voice`] if a session is already running
    pub fn start_listening(&self) -> Result<()> {
        if !self.permissions.is_granted(Permission::Microphone) {
            self.state.send_replace(VoiceState {
                error: Some(RecognitionError::InsufficientPermissions),
                ..VoiceState::default()
            });
            return Err(Error::PermissionDenied(Permission::Microphone.to_string()));
        }

        let (id, cancel) = {
            let mut sessions = self
                .sessions
                .lock()
                .map_err(|_| Error::Voice("session lock poisoned".to_string()))?;

            if sessions.active.is_some() {
                return Err(Error::Voice("already listening".to_string()));
            }

            if !self.recognizer.is_available() {
                tracing::warn!("speech recognition unavailable");
                self.state.send_replace(VoiceState {
                    error: Some(RecognitionError::Unavailable),
                    ..VoiceState::default()
                });
                return Ok(());
            }

            sessions.next_id += 1;
            let id = sessions.next_id;
            let cancel = CancelToken::new();
            sessions.active = Some(ActiveSession {
                id,
                cancel: cancel.clone(),
                stopping: false,
            });
            (id, cancel)
        };

        self.state.send_replace(VoiceState {
            is_listening: true,
            ..VoiceState::default()
        });
        tracing::info!(session = id, "listening");

        let recognizer = Arc::clone(&self.recognizer);
        let state = Arc::clone(&self.state);
        let sessions = Arc::clone(&self.sessions);

        tokio::spawn(async move {
            let outcome = recognizer.recognize(&cancel).await;

            state.send_modify(|s| {
                s.is_listening = false;
                match outcome {
                    Ok(text) => {
                        tracing::info!(session = id, transcript = %text, "heard");
                        s.spoken_text = text;
                    }
                    Err(RecognitionError::Client) => {
                        tracing::debug!(session = id, "session cancelled");
                    }
                    Err(err) => {
                        tracing::warn!(session = id, error = %err, "recognition failed");
                        s.error = Some(err);
                    }
                }
            });

            if let Ok(mut sessions) = sessions.lock()
                && sessions.active.as_ref().is_some_and(|s| s.id == id)
            {
                sessions.active = None;
            }
        });

        Ok(())
    }

    /// End the running session early
    ///
    /// Speech already heard is still transcribed. A no-op when idle or when
    /// the session is already stopping.
    pub fn stop_listening(&self) {
        let cancel = self.sessions.lock().ok().and_then(|mut sessions| {
            let active = sessions.active.as_mut()?;
            if active.stopping {
                return None;
            }
            active.stopping = true;
            Some(active.cancel.clone())
        });

        if let Some(cancel) = cancel {
            tracing::debug!("stop listening");
            cancel.cancel();
            self.state.send_modify(|s| s.is_listening = false);
        }
    }

    /// Start a session if idle, otherwise stop the running one
    ///
    /// # Errors
    ///
    /// Returns [`Error::Voice`] while a stopped session is still being
    /// transcribed, and propagates [`start_listening`](Self::start_listening)
    /// errors
    pub fn toggle(&self) -> Result<()> {
        if self.is_stopping() {
            return Err(Error::Voice("still transcribing the last session".to_string()));
        }

        if self.is_active() {
            self.stop_listening();
            Ok(())
        } else {
            self.start_listening()
        }
    }

    /// Whether a stopped session is still finishing
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.sessions
            .lock()
            .map(|sessions| sessions.active.as_ref().is_some_and(|s| s.stopping))
            .unwrap_or(false)
    }

    /// Whether a session is running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.sessions
            .lock()
            .map(|sessions| sessions.active.is_some())
            .unwrap_or(false)
    }
}
