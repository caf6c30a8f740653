//! Navigation loop
//!
//! [`Navigator`] ties the pieces together. A destination arrives as text
//! (from a voice transcript or a submitted string), is geocoded, and every
//! location fix after that refreshes the next step. Steps go through the
//! [`AnnouncementPolicy`] and the ones worth repeating are spoken.
//!
//! Network calls run on worker tasks and report back over a channel; the
//! loop itself is the only writer of the current location, the destination
//! and the announcement memory. Each directions request carries a sequence
//! number. Issuing a new one aborts the previous task and any result that
//! still arrives for an older sequence is dropped.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::announce::AnnouncementPolicy;
use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::config::PermissionsConfig;
use crate::geo::{Location, LocationBatch};
use crate::location::{LocationRequest, LocationSource, Subscription};
use crate::permissions::{ConfigPermissions, LOCATION_PERMISSIONS, Permission, PermissionGate};
use crate::routes::{Directions, Geocoder, RequestThrottle, Step};
use crate::voice::{SpeechOutput, VoiceState};
use crate::{Error, Result};

const DESTINATION_QUEUE: usize = 8;
const RESULT_QUEUE: usize = 8;
const NOTICE_QUEUE: usize = 16;

/// Where the navigator is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavState {
    #[default]
    Idle,
    AwaitingDestination,
    HaveDestination,
    Tracking,
    Announcing,
}

/// One-off messages for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    PermissionGranted(Permission),
    PermissionDenied(Permission),
    DestinationNotFound(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionGranted(p) => write!(f, "Permission granted: {p}"),
            Self::PermissionDenied(p) => write!(f, "Permission denied: {p}"),
            Self::DestinationNotFound(text) => write!(f, "Destination not found: {text}"),
        }
    }
}

/// Everything presentation needs to draw the current screen
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: NavState,
    pub location: Option<Location>,
    pub destination_text: Option<String>,
    pub destination: Option<Location>,
    pub step: Option<Step>,
    pub voice: VoiceState,
    pub last_announcement: Option<String>,
}

/// Cloneable access to a running [`Navigator`]
#[derive(Clone)]
pub struct NavigatorHandle {
    destinations: mpsc::Sender<String>,
    snapshots: watch::Receiver<Snapshot>,
    notices: broadcast::Sender<Notice>,
}

impl NavigatorHandle {
    /// Submit a destination as free text
    ///
    /// # Errors
    ///
    /// Returns error if the navigator has stopped
    pub async fn submit_destination(&self, text: impl Into<String>) -> Result<()> {
        self.destinations
            .send(text.into())
            .await
            .map_err(|_| Error::NavigatorStopped)
    }

    /// Latest snapshot
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Watch snapshot changes
    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Receive notices published from now on
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}

enum WorkerResult {
    Geocoded {
        seq: u64,
        text: String,
        result: Result<Option<Location>>,
    },
    Directions {
        seq: u64,
        result: Result<Option<Step>>,
    },
}

/// A spawned request and the sequence number it answers to
#[derive(Default)]
struct InFlight {
    seq: u64,
    task: Option<JoinHandle<()>>,
}

impl InFlight {
    /// Abort the current task and issue the next sequence number
    fn replace(&mut self) -> u64 {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.seq += 1;
        self.seq
    }

    const fn is_current(&self, seq: u64) -> bool {
        self.seq == seq
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Builds a [`Navigator`] from its collaborators
pub struct NavigatorBuilder {
    directions: Arc<dyn Directions>,
    geocoder: Arc<dyn Geocoder>,
    speech: Arc<dyn SpeechOutput>,
    permissions: Arc<dyn PermissionGate>,
    clock: Arc<dyn Clock>,
    policy: AnnouncementPolicy,
    throttle: Option<RequestThrottle>,
    restored_step: Option<Step>,
}

impl NavigatorBuilder {
    /// Permission grants (default: everything granted)
    #[must_use]
    pub fn permissions(mut self, permissions: Arc<dyn PermissionGate>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Time source for the announcement policy
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: AnnouncementPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Drop directions requests beyond this quota
    #[must_use]
    pub fn throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Step to show before the first directions response
    #[must_use]
    pub fn restored_step(mut self, step: Option<Step>) -> Self {
        self.restored_step = step;
        self
    }

    #[must_use]
    pub fn build(self) -> Navigator {
        let (destinations_tx, destinations_rx) = mpsc::channel(DESTINATION_QUEUE);
        let (snapshot, _) = watch::channel(Snapshot {
            step: self.restored_step,
            ..Snapshot::default()
        });
        let (notices, _) = broadcast::channel(NOTICE_QUEUE);

        Navigator {
            directions: self.directions,
            geocoder: self.geocoder,
            speech: self.speech,
            permissions: self.permissions,
            clock: self.clock,
            policy: self.policy,
            throttle: self.throttle,
            snapshot,
            notices,
            destinations_tx,
            destinations_rx,
            geocode: InFlight::default(),
            routing: InFlight::default(),
            last_transcript: None,
        }
    }
}

/// Owns the navigation lifecycle
pub struct Navigator {
    directions: Arc<dyn Directions>,
    geocoder: Arc<dyn Geocoder>,
    speech: Arc<dyn SpeechOutput>,
    permissions: Arc<dyn PermissionGate>,
    clock: Arc<dyn Clock>,
    policy: AnnouncementPolicy,
    throttle: Option<RequestThrottle>,
    snapshot: watch::Sender<Snapshot>,
    notices: broadcast::Sender<Notice>,
    destinations_tx: mpsc::Sender<String>,
    destinations_rx: mpsc::Receiver<String>,
    geocode: InFlight,
    routing: InFlight,
    last_transcript: Option<String>,
}

impl Navigator {
    /// Start building a navigator around its network and speech services
    #[must_use]
    pub fn builder(
        directions: Arc<dyn Directions>,
        geocoder: Arc<dyn Geocoder>,
        speech: Arc<dyn SpeechOutput>,
    ) -> NavigatorBuilder {
        NavigatorBuilder {
            directions,
            geocoder,
            speech,
            permissions: Arc::new(ConfigPermissions::new(PermissionsConfig::default())),
            clock: Arc::new(SystemClock::new()),
            policy: AnnouncementPolicy::default(),
            throttle: None,
            restored_step: None,
        }
    }

    #[must_use]
    pub fn handle(&self) -> NavigatorHandle {
        NavigatorHandle {
            destinations: self.destinations_tx.clone(),
            snapshots: self.snapshot.subscribe(),
            notices: self.notices.clone(),
        }
    }

    /// Run until `cancel` fires
    ///
    /// Location updates start once location permission is granted; without
    /// it the navigator still accepts destinations but never routes. `voice`
    /// carries the state of a [`VoiceCapture`](crate::voice::VoiceCapture);
    /// each new transcript becomes the destination.
    ///
    /// # Errors
    ///
    /// Returns error if the location source cannot be started
    pub async fn run(
        mut self,
        source: &dyn LocationSource,
        request: LocationRequest,
        mut voice: Option<watch::Receiver<VoiceState>>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let mut fixes = if self.permissions.request(&LOCATION_PERMISSIONS).await {
            self.notify(Notice::PermissionGranted(Permission::FineLocation));
            tracing::info!(source = source.name(), "starting location updates");
            Some(source.subscribe(request, cancel).await?)
        } else {
            self.notify(Notice::PermissionDenied(Permission::FineLocation));
            None
        };

        if voice.is_some() && !self.permissions.request(&[Permission::Microphone]).await {
            self.notify(Notice::PermissionDenied(Permission::Microphone));
        }

        let (results_tx, mut results_rx) = mpsc::channel(RESULT_QUEUE);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                batch = next_batch(&mut fixes) => match batch {
                    Some(batch) => self.on_fixes(&batch, &results_tx),
                    None => {
                        tracing::warn!(source = source.name(), "location stream ended");
                        fixes = None;
                    }
                },
                state = next_voice_state(&mut voice) => match state {
                    Some(state) => self.on_voice(state, &results_tx),
                    None => voice = None,
                },
                Some(text) = self.destinations_rx.recv() => {
                    self.resolve_destination(text, &results_tx);
                }
                Some(result) = results_rx.recv() => self.on_result(result, &results_tx).await,
            }
        }

        tracing::info!("navigator stopping");
        self.geocode.abort();
        self.routing.abort();
        self.speech.stop().await;
        Ok(())
    }

    fn notify(&self, notice: Notice) {
        tracing::info!(notice = %notice, "notice");
        // no subscribers is fine
        let _ = self.notices.send(notice);
    }

    fn on_fixes(&mut self, batch: &LocationBatch, results: &mpsc::Sender<WorkerResult>) {
        let location = batch.latest().location;
        tracing::debug!(location = %location, batch = batch.fixes().len(), "fix");

        self.snapshot.send_modify(|s| s.location = Some(location));

        let destination = self.snapshot.borrow().destination;
        if let Some(destination) = destination {
            self.request_directions(location, destination, results);
        }
    }

    fn on_voice(&mut self, state: VoiceState, results: &mpsc::Sender<WorkerResult>) {
        let transcript = state.spoken_text.clone();
        let listening = state.is_listening;

        self.snapshot.send_modify(|s| {
            s.voice = state;
            if listening && s.state == NavState::Idle {
                s.state = NavState::AwaitingDestination;
            }
        });

        if transcript.is_empty() {
            self.last_transcript = None;
        } else if self.last_transcript.as_deref() != Some(transcript.as_str()) {
            self.last_transcript = Some(transcript.clone());
            self.resolve_destination(transcript, results);
        }
    }

    fn resolve_destination(&mut self, text: String, results: &mpsc::Sender<WorkerResult>) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }

        tracing::info!(destination = %text, "resolving destination");
        self.routing.replace();
        self.policy.reset();
        self.snapshot.send_modify(|s| {
            s.state = NavState::AwaitingDestination;
            s.destination_text = Some(text.clone());
            s.destination = None;
            s.step = None;
        });

        let seq = self.geocode.replace();
        let geocoder = Arc::clone(&self.geocoder);
        let results = results.clone();

        self.geocode.task = Some(tokio::spawn(async move {
            let result = geocoder.geocode(&text).await;
            let _ = results
                .send(WorkerResult::Geocoded { seq, text, result })
                .await;
        }));
    }

    fn request_directions(
        &mut self,
        origin: Location,
        destination: Location,
        results: &mpsc::Sender<WorkerResult>,
    ) {
        if let Some(throttle) = &self.throttle
            && !throttle.try_acquire()
        {
            tracing::debug!("directions request over quota, dropped");
            return;
        }

        let seq = self.routing.replace();
        let directions = Arc::clone(&self.directions);
        let results = results.clone();

        tracing::debug!(seq, origin = %origin, destination = %destination, "requesting directions");

        self.routing.task = Some(tokio::spawn(async move {
            let result = directions.directions(origin, destination).await;
            let _ = results.send(WorkerResult::Directions { seq, result }).await;
        }));

        self.snapshot.send_modify(|s| {
            if s.state == NavState::HaveDestination {
                s.state = NavState::Tracking;
            }
        });
    }

    async fn on_result(&mut self, result: WorkerResult, results: &mpsc::Sender<WorkerResult>) {
        match result {
            WorkerResult::Geocoded { seq, text, result } => {
                if !self.geocode.is_current(seq) {
                    tracing::debug!(seq, "stale geocode result dropped");
                    return;
                }
                self.geocode.task = None;
                self.on_geocoded(text, result, results);
            }
            WorkerResult::Directions { seq, result } => {
                if !self.routing.is_current(seq) {
                    tracing::debug!(seq, "stale directions result dropped");
                    return;
                }
                self.routing.task = None;
                self.on_directions(result).await;
            }
        }
    }

    fn on_geocoded(
        &mut self,
        text: String,
        result: Result<Option<Location>>,
        results: &mpsc::Sender<WorkerResult>,
    ) {
        match result {
            Ok(Some(destination)) => {
                tracing::info!(destination = %text, location = %destination, "destination resolved");
                self.snapshot.send_modify(|s| {
                    s.destination = Some(destination);
                    s.state = NavState::HaveDestination;
                });

                let origin = self.snapshot.borrow().location;
                if let Some(origin) = origin {
                    self.request_directions(origin, destination, results);
                }
            }
            Ok(None) => {
                tracing::warn!(destination = %text, "geocoding returned no data");
            }
            Err(Error::NotFound(_)) => {
                self.notify(Notice::DestinationNotFound(text));
                self.snapshot.send_modify(|s| s.destination_text = None);
            }
            Err(e) => {
                tracing::warn!(destination = %text, error = %e, kind = e.kind(), "geocoding failed");
            }
        }
    }

    async fn on_directions(&mut self, result: Result<Option<Step>>) {
        let step = match result {
            Ok(Some(step)) => step,
            Ok(None) => {
                tracing::debug!("no step in directions response");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "directions request failed");
                return;
            }
        };

        let announcement = self.policy.evaluate(&step, self.clock.now_ms());
        self.snapshot.send_modify(|s| {
            s.step = Some(step);
            s.state = if announcement.is_some() {
                NavState::Announcing
            } else {
                NavState::Tracking
            };
        });

        let Some(text) = announcement else {
            return;
        };

        tracing::info!(announcement = %text, "announcing");
        if let Err(e) = self.speech.speak(&text).await {
            tracing::warn!(error = %e, kind = e.kind(), "speech failed");
        }

        self.snapshot.send_modify(|s| {
            s.last_announcement = Some(text);
            s.state = NavState::Tracking;
        });
    }
}

async fn next_batch(fixes: &mut Option<Subscription<LocationBatch>>) -> Option<LocationBatch> {
    match fixes {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_voice_state(voice: &mut Option<watch::Receiver<VoiceState>>) -> Option<VoiceState> {
    match voice {
        Some(rx) => {
            rx.changed().await.ok()?;
            Some(rx.borrow_and_update().clone())
        }
        None => std::future::pending().await,
    }
}
