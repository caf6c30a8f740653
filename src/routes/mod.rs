//! Routes and geocoding clients
//!
//! Both clients share one failure policy: a non-2xx answer is absence of
//! data (`Ok(None)`), while timeouts, transport failures and unparseable
//! bodies are classified errors. Nothing is retried; the caller drops the
//! failed request and the next location fix issues a fresh one.

mod directions;
mod geocode;
mod throttle;
pub mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub use directions::DirectionsClient;
pub use geocode::GeocoderClient;
pub use throttle::RequestThrottle;
pub use types::{LocalizedText, LocalizedValues, NavigationInstruction, Step};

use crate::config::MapsConfig;
use crate::geo::Location;
use crate::{Error, Result};

/// Looks up the next navigation step between two points
#[async_trait]
pub trait Directions: Send + Sync {
    /// First step of the route from `origin` to `destination`
    ///
    /// # Errors
    ///
    /// Returns error on timeout, transport failure or unparseable response
    async fn directions(&self, origin: Location, destination: Location) -> Result<Option<Step>>;
}

/// Resolves free text to a coordinate
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Coordinate of the first candidate for `address`
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the service has no candidates, and
    /// classified errors as for [`Directions`]
    async fn geocode(&self, address: &str) -> Result<Option<Location>>;
}

/// Build an HTTP client with bounded timeouts and no connection reuse
///
/// With the idle pool disabled every connection is closed once its
/// response has been read.
pub(crate) fn build_client(config: &MapsConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

/// Map a transport error onto the failure taxonomy
pub(crate) fn classify(err: reqwest::Error, what: &str) -> Error {
    if err.is_timeout() {
        Error::Timeout(format!("{what}: {err}"))
    } else {
        Error::Http(err)
    }
}

/// Read the whole body, then parse it
///
/// Reading first keeps transport failures and parse failures distinct.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T> {
    let body = response.text().await.map_err(|e| classify(e, what))?;
    serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(what, error = %e, "failed to parse response");
        Error::from(e)
    })
}
