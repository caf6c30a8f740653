//! Terminal presentation and UI state persistence

use std::io::Write;
use std::path::Path;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

use crate::cancel::CancelToken;
use crate::navigator::{Notice, Snapshot};
use crate::routes::Step;
use crate::{Error, Result};

/// The three lines shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub location: String,
    pub instruction: String,
    pub voice: String,
}

impl Screen {
    /// Render a snapshot
    #[must_use]
    pub fn render(snapshot: &Snapshot) -> Self {
        Self {
            location: location_line(snapshot),
            instruction: instruction_line(snapshot),
            voice: voice_line(snapshot),
        }
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.location)?;
        writeln!(f, "{}", self.instruction)?;
        write!(f, "{}", self.voice)
    }
}

fn location_line(snapshot: &Snapshot) -> String {
    snapshot
        .location
        .map_or_else(|| "Locating...".to_string(), |l| format!("Location: {l}"))
}

fn instruction_line(snapshot: &Snapshot) -> String {
    if let Some(text) = snapshot.step.as_ref().and_then(Step::spoken_text) {
        return text;
    }

    if snapshot.destination_text.is_some() {
        "Resolving destination...".to_string()
    } else {
        "Waiting for destination".to_string()
    }
}

fn voice_line(snapshot: &Snapshot) -> String {
    let voice = &snapshot.voice;
    if voice.is_listening {
        "Listening...".to_string()
    } else if let Some(error) = voice.error {
        format!("Voice: {error}")
    } else if voice.spoken_text.is_empty() {
        "Say a destination".to_string()
    } else {
        format!("\"{}\"", voice.spoken_text)
    }
}

/// Encode the current step for persistence; no step is the empty string
///
/// # Errors
///
/// Returns error if serialization fails
pub fn encode_step(step: Option<&Step>) -> Result<String> {
    step.map_or_else(|| Ok(String::new()), |s| Ok(serde_json::to_string(s)?))
}

/// Inverse of [`encode_step`]
///
/// # Errors
///
/// Returns error if the text is neither empty nor a valid step
pub fn decode_step(text: &str) -> Result<Option<Step>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

/// Persist the current step to `path`
///
/// # Errors
///
/// Returns error if the file cannot be written
pub fn save_step(path: &Path, step: Option<&Step>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encode_step(step)?)?;
    tracing::debug!(path = %path.display(), saved = step.is_some(), "ui state saved");
    Ok(())
}

/// Restore the step saved at `path`; a missing file means no step
///
/// # Errors
///
/// Returns error if the file exists but cannot be read or parsed
pub fn restore_step(path: &Path) -> Result<Option<Step>> {
    match std::fs::read_to_string(path) {
        Ok(text) => decode_step(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Redraw whenever the screen changes and print notices as they arrive
///
/// Take both receivers from the handle before the navigator starts running,
/// otherwise its permission notices are missed. Runs until `cancel` fires or
/// the navigator goes away.
pub async fn present(
    mut snapshots: watch::Receiver<Snapshot>,
    mut notices: broadcast::Receiver<Notice>,
    cancel: CancelToken,
    mut out: impl Write + Send,
) {
    let mut last: Option<Screen> = None;

    loop {
        let screen = Screen::render(&snapshots.borrow_and_update());
        if last.as_ref() != Some(&screen) {
            if let Err(e) = writeln!(out, "\n{screen}").and_then(|()| out.flush()) {
                tracing::warn!(error = %e, "failed to draw");
            }
            last = Some(screen);
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => print_notice(&mut out, &notice),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "notices dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

fn print_notice(out: &mut impl Write, notice: &Notice) {
    if let Err(e) = writeln!(out, "! {notice}") {
        tracing::warn!(error = %e, "failed to print notice");
    }
}
