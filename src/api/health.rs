//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub location: CheckResult,
    pub destination: CheckResult,
}

/// Result of a single check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn pending(message: impl Into<String>) -> Self {
        Self {
            status: "pending",
            message: Some(message.into()),
        }
    }
}

/// Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe: ready once there is a fix and a resolved destination
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let snapshot = state.navigator.snapshot();

    let location = if snapshot.location.is_some() {
        CheckResult::ok()
    } else {
        CheckResult::pending("no location fix yet")
    };
    let destination = if snapshot.destination.is_some() {
        CheckResult::ok()
    } else {
        CheckResult::pending("no destination")
    };

    let all_ok = location.status == "ok" && destination.status == "ok";
    let status_code = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ReadinessResponse {
            status: if all_ok { "ready" } else { "not_ready" },
            checks: ReadinessChecks {
                location,
                destination,
            },
        }),
    )
}

/// Liveness routes
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Readiness routes
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
