//! Geocoding API client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::types::GeocodeResponse;
use super::{Geocoder, build_client, classify, read_json};
use crate::config::MapsConfig;
use crate::geo::Location;
use crate::{Error, Result};

/// Client for the geocoding endpoint
#[derive(Debug)]
pub struct GeocoderClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    language_code: String,
}

impl GeocoderClient {
    /// Create a client from maps configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(config: &MapsConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            Error::Config("maps API key required for geocoding (GOOGLE_MAPS_API_KEY)".to_string())
        })?;

        Ok(Self {
            client: build_client(config)?,
            endpoint: config.geocode_url.clone(),
            api_key,
            language_code: config.language_code.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for GeocoderClient {
    async fn geocode(&self, address: &str) -> Result<Option<Location>> {
        tracing::debug!(address, "geocoding destination");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("address", address),
                ("key", self.api_key.expose_secret()),
                ("language", self.language_code.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify(e, "geocode"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "geocoding API returned no data");
            return Ok(None);
        }

        let data: GeocodeResponse = read_json(response, "geocode").await?;

        // Denied keys and exhausted quotas arrive as 200 with an error status
        if let Some(status) = data.status.as_deref()
            && !matches!(status, "OK" | "ZERO_RESULTS")
        {
            tracing::warn!(
                address,
                status,
                message = data.error_message.as_deref().unwrap_or_default(),
                "geocoding API refused the request"
            );
            return Ok(None);
        }

        let Some(first) = data.results.into_iter().next() else {
            tracing::info!(address, "no geocoding candidates");
            return Err(Error::NotFound(address.to_string()));
        };

        let location = Location::from(first.geometry.location);
        tracing::info!(
            address,
            resolved = first.formatted_address.as_deref().unwrap_or_default(),
            %location,
            "destination resolved"
        );

        Ok(Some(location))
    }
}
