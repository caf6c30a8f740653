//! Stride - voice-guided walking directions
//!
//! Speak a destination, then walk: every location fix refreshes the next
//! step from the routes API and the steps worth repeating are spoken aloud.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  transcript  ┌──────────┐  destination  ┌──────────┐
//! │   Voice    ├─────────────►│          ├──────────────►│ Geocoder │
//! │  Capture   │              │          │               └──────────┘
//! └────────────┘              │          │  fix + dest   ┌──────────┐
//! ┌────────────┐    fixes     │Navigator ├──────────────►│Directions│
//! │  Location  ├─────────────►│          │               └──────────┘
//! │   Source   │              │          │     step      ┌──────────┐
//! └────────────┘              │          ├──────────────►│ Announce │
//!                             └────┬─────┘               │  Policy  │
//!                                  │ snapshot            └────┬─────┘
//!                     ┌────────────▼───────┐                  │ text
//!                     │ terminal / status  │           ┌──────▼─────┐
//!                     │      server        │           │   Speech   │
//!                     └────────────────────┘           └────────────┘
//! ```

pub mod announce;
pub mod api;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod location;
pub mod navigator;
pub mod permissions;
pub mod presentation;
pub mod routes;
pub mod setup;
pub mod voice;

pub use announce::{AnnouncementMemory, AnnouncementPolicy, parse_distance};
pub use cancel::CancelToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use geo::{Fix, Location, LocationBatch};
pub use location::{LocationRequest, LocationSource, Priority, Subscription};
pub use navigator::{NavState, Navigator, NavigatorHandle, Notice, Snapshot};
pub use permissions::{ConfigPermissions, Permission, PermissionGate};
pub use routes::{Directions, DirectionsClient, Geocoder, GeocoderClient, Step};
pub use voice::{SpeechOutput, VoiceCapture, VoiceState};
