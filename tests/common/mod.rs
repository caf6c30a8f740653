//! Shared test utilities
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use stride_guide::config::MapsConfig;
use stride_guide::permissions::{Permission, PermissionGate};
use stride_guide::routes::{LocalizedText, LocalizedValues, NavigationInstruction};
use stride_guide::voice::{RecognitionError, Recognizer, SpeechOutput};
use stride_guide::{CancelToken, Directions, Error, Geocoder, Location, Result, Step};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });
    format!("http://{addr}")
}

/// Maps config pointing at a local test server
pub fn maps_config(base: &str) -> MapsConfig {
    MapsConfig {
        api_key: Some(SecretString::from("test-key".to_string())),
        routes_url: format!("{base}/routes"),
        geocode_url: format!("{base}/geocode"),
        request_timeout: Duration::from_millis(500),
        ..MapsConfig::default()
    }
}

/// A step as the routes API would return it
pub fn step(instructions: &str, distance: &str) -> Step {
    Step {
        navigation_instruction: Some(NavigationInstruction {
            maneuver: "TURN_LEFT".to_string(),
            instructions: instructions.to_string(),
        }),
        localized_values: LocalizedValues {
            distance: LocalizedText {
                text: distance.to_string(),
            },
            static_duration: LocalizedText {
                text: "3 dk".to_string(),
            },
        },
    }
}

/// Directions that answer from a script and record every request
#[derive(Default)]
pub struct ScriptedDirections {
    responses: Mutex<VecDeque<(Duration, Result<Option<Step>>)>>,
    pub calls: Mutex<Vec<(Location, Location)>>,
}

impl ScriptedDirections {
    pub fn push(&self, delay: Duration, response: Result<Option<Step>>) {
        self.responses.lock().unwrap().push_back((delay, response));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Directions for ScriptedDirections {
    async fn directions(&self, origin: Location, destination: Location) -> Result<Option<Step>> {
        self.calls.lock().unwrap().push((origin, destination));
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some((delay, response)) => {
                tokio::time::sleep(delay).await;
                response
            }
            None => Ok(None),
        }
    }
}

/// Geocoder backed by a fixed table; unknown addresses are not found
#[derive(Default)]
pub struct TableGeocoder {
    places: HashMap<String, Location>,
}

impl TableGeocoder {
    pub fn with(mut self, address: &str, location: Location) -> Self {
        self.places.insert(address.to_string(), location);
        self
    }
}

#[async_trait]
impl Geocoder for TableGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Location>> {
        self.places
            .get(address)
            .copied()
            .map(Some)
            .ok_or_else(|| Error::NotFound(address.to_string()))
    }
}

/// Speech output that only records what it was asked to say
#[derive(Default)]
pub struct RecordingSpeaker {
    pub spoken: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechOutput for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Grants everything except the listed permissions
pub struct Deny(pub Vec<Permission>);

#[async_trait]
impl PermissionGate for Deny {
    fn is_granted(&self, permission: Permission) -> bool {
        !self.0.contains(&permission)
    }
}

/// Recognizer that waits for a release signal, then returns a scripted result
///
/// Cancelling the session before release ends it with `Client`, unless the
/// recognizer was built with [`ScriptedRecognizer::transcribing`].
pub struct ScriptedRecognizer {
    pub available: bool,
    finish_on_stop: bool,
    outcome: Mutex<Option<std::result::Result<String, RecognitionError>>>,
    release: tokio::sync::Notify,
}

impl ScriptedRecognizer {
    pub fn new(outcome: std::result::Result<String, RecognitionError>) -> Arc<Self> {
        Arc::new(Self {
            available: true,
            finish_on_stop: false,
            outcome: Mutex::new(Some(outcome)),
            release: tokio::sync::Notify::new(),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            available: false,
            finish_on_stop: false,
            outcome: Mutex::new(None),
            release: tokio::sync::Notify::new(),
        })
    }

    /// Like [`ScriptedRecognizer::new`], but a stopped session keeps going
    /// until released, as if transcribing what it already heard
    pub fn transcribing(outcome: std::result::Result<String, RecognitionError>) -> Arc<Self> {
        Arc::new(Self {
            available: true,
            finish_on_stop: true,
            outcome: Mutex::new(Some(outcome)),
            release: tokio::sync::Notify::new(),
        })
    }

    fn take_outcome(&self) -> std::result::Result<String, RecognitionError> {
        self.outcome
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(RecognitionError::NoMatch))
    }

    /// Let the pending session finish
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(&self, cancel: &CancelToken) -> std::result::Result<String, RecognitionError> {
        tokio::select! {
            () = cancel.cancelled() => {
                if self.finish_on_stop {
                    self.release.notified().await;
                    self.take_outcome()
                } else {
                    Err(RecognitionError::Client)
                }
            }
            () = self.release.notified() => self.take_outcome(),
        }
    }
}

/// Writer whose output stays readable after it is moved into a task
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
