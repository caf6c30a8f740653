//! Wire types for the routes and geocoding APIs

use serde::{Deserialize, Serialize};

use crate::geo::Location;

/// Body of a `computeRoutes` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest<'a> {
    pub origin: Waypoint,
    pub destination: Waypoint,
    pub travel_mode: &'a str,
    pub language_code: &'a str,
    pub units: &'a str,
}

/// Route endpoint given as a coordinate
#[derive(Debug, Serialize)]
pub struct Waypoint {
    pub location: WaypointLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointLocation {
    pub lat_lng: LatLng,
}

#[derive(Debug, Serialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Location> for Waypoint {
    fn from(location: Location) -> Self {
        Self {
            location: WaypointLocation {
                lat_lng: LatLng {
                    latitude: location.latitude,
                    longitude: location.longitude,
                },
            },
        }
    }
}

/// `computeRoutes` response, limited to `routes.legs` by the field mask
#[derive(Debug, Default, Deserialize)]
pub struct RoutesResponse {
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub legs: Vec<Leg>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Leg {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl RoutesResponse {
    /// First step of the first leg of the first route
    #[must_use]
    pub fn into_first_step(self) -> Option<Step> {
        self.routes
            .into_iter()
            .next()?
            .legs
            .into_iter()
            .next()?
            .steps
            .into_iter()
            .next()
    }
}

/// A single navigation instruction
///
/// Also the value persisted as UI state, so it round-trips through JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_instruction: Option<NavigationInstruction>,
    #[serde(default)]
    pub localized_values: LocalizedValues,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationInstruction {
    #[serde(default)]
    pub maneuver: String,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedValues {
    #[serde(default)]
    pub distance: LocalizedText,
    #[serde(default)]
    pub static_duration: LocalizedText,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub text: String,
}

impl Step {
    /// Instruction text, if the step carries one
    #[must_use]
    pub fn instructions(&self) -> Option<&str> {
        self.navigation_instruction
            .as_ref()
            .map(|n| n.instructions.as_str())
    }

    /// Localized distance, e.g. "250 m"
    #[must_use]
    pub fn distance_text(&self) -> &str {
        &self.localized_values.distance.text
    }

    /// Localized duration, e.g. "3 dakika"
    #[must_use]
    pub fn duration_text(&self) -> &str {
        &self.localized_values.static_duration.text
    }

    /// Text to speak and display: instruction, distance and duration
    #[must_use]
    pub fn spoken_text(&self) -> Option<String> {
        self.instructions().map(|instructions| {
            format!(
                "{instructions}. {}. {}",
                self.distance_text(),
                self.duration_text()
            )
        })
    }
}

/// Geocoding API response
#[derive(Debug, Default, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    pub geometry: Geometry,
    #[serde(default)]
    pub formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    pub location: LatLngLiteral,
}

#[derive(Debug, Deserialize)]
pub struct LatLngLiteral {
    pub lat: f64,
    pub lng: f64,
}

impl From<LatLngLiteral> for Location {
    fn from(value: LatLngLiteral) -> Self {
        Self::new(value.lat, value.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTES_JSON: &str = r#"{
        "routes": [{
            "legs": [{
                "steps": [{
                    "distanceMeters": 250,
                    "navigationInstruction": {
                        "maneuver": "TURN_LEFT",
                        "instructions": "Turn left onto Atatürk Cd."
                    },
                    "localizedValues": {
                        "distance": { "text": "250 m" },
                        "staticDuration": { "text": "3 mins" }
                    }
                }, {
                    "navigationInstruction": { "maneuver": "STRAIGHT", "instructions": "Continue" }
                }]
            }]
        }]
    }"#;

    #[test]
    fn test_request_body_shape() {
        let request = RouteRequest {
            origin: Location::new(40.0, 29.0).into(),
            destination: Location::new(41.0, 30.0).into(),
            travel_mode: "WALK",
            language_code: "tr-TR",
            units: "METRIC",
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["origin"]["location"]["latLng"]["latitude"], 40.0);
        assert_eq!(value["destination"]["location"]["latLng"]["longitude"], 30.0);
        assert_eq!(value["travelMode"], "WALK");
        assert_eq!(value["languageCode"], "tr-TR");
        assert_eq!(value["units"], "METRIC");
    }

    #[test]
    fn test_first_step_extraction() {
        let response: RoutesResponse = serde_json::from_str(ROUTES_JSON).unwrap();
        let step = response.into_first_step().unwrap();

        assert_eq!(step.instructions(), Some("Turn left onto Atatürk Cd."));
        assert_eq!(step.distance_text(), "250 m");
        assert_eq!(step.duration_text(), "3 mins");
        assert_eq!(
            step.navigation_instruction.as_ref().map(|n| n.maneuver.as_str()),
            Some("TURN_LEFT")
        );
    }

    #[test]
    fn test_empty_response_has_no_step() {
        let response: RoutesResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_first_step().is_none());

        let response: RoutesResponse =
            serde_json::from_str(r#"{"routes":[{"legs":[]}]}"#).unwrap();
        assert!(response.into_first_step().is_none());
    }

    #[test]
    fn test_spoken_text() {
        let response: RoutesResponse = serde_json::from_str(ROUTES_JSON).unwrap();
        let step = response.into_first_step().unwrap();
        assert_eq!(
            step.spoken_text().unwrap(),
            "Turn left onto Atatürk Cd.. 250 m. 3 mins"
        );

        assert!(Step::default().spoken_text().is_none());
    }

    #[test]
    fn test_geocode_response() {
        let json = r#"{
            "results": [{
                "formatted_address": "Kocaeli, Türkiye",
                "geometry": { "location": { "lat": 40.8241, "lng": 29.9207 }, "location_type": "APPROXIMATE" }
            }],
            "status": "OK"
        }"#;

        let response: GeocodeResponse = serde_json::from_str(json).unwrap();
        let first = response.results.into_iter().next().unwrap();
        assert_eq!(Location::from(first.geometry.location), Location::new(40.8241, 29.9207));
    }
}
