//! Routes API client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::types::{RouteRequest, RoutesResponse, Step};
use super::{Directions, build_client, classify, read_json};
use crate::config::MapsConfig;
use crate::geo::Location;
use crate::{Error, Result};

/// Response fields requested from `computeRoutes`
const FIELD_MASK: &str = "routes.legs";

/// Client for the `computeRoutes` endpoint
#[derive(Debug)]
pub struct DirectionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    travel_mode: String,
    language_code: String,
    units: String,
}

impl DirectionsClient {
    /// Create a client from maps configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(config: &MapsConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            Error::Config("maps API key required for directions (GOOGLE_MAPS_API_KEY)".to_string())
        })?;

        Ok(Self {
            client: build_client(config)?,
            endpoint: config.routes_url.clone(),
            api_key,
            travel_mode: config.travel_mode.clone(),
            language_code: config.language_code.clone(),
            units: config.units.clone(),
        })
    }
}

#[async_trait]
impl Directions for DirectionsClient {
    async fn directions(&self, origin: Location, destination: Location) -> Result<Option<Step>> {
        tracing::debug!(%origin, %destination, "requesting directions");

        let request = RouteRequest {
            origin: origin.into(),
            destination: destination.into(),
            travel_mode: &self.travel_mode,
            language_code: &self.language_code,
            units: &self.units,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("X-Goog-Api-Key", self.api_key.expose_secret())
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify(e, "directions"))?;

        let status = response.status();
        tracing::debug!(status = %status, "received directions response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "routes API returned no data");
            return Ok(None);
        }

        let data: RoutesResponse = read_json(response, "directions").await?;
        let step = data.into_first_step();

        if step.is_none() {
            tracing::debug!("routes API returned no steps");
        }

        Ok(step)
    }
}
