//! Navigation status and destination submission

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::navigator::Snapshot;

/// Body of `POST /destination`
#[derive(Debug, Deserialize)]
pub struct DestinationRequest {
    pub destination: String,
}

#[derive(Debug, Serialize)]
pub struct DestinationAccepted {
    pub destination: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<Snapshot> {
    Json(state.navigator.snapshot())
}

async fn submit_destination(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<DestinationRequest>,
) -> Result<(StatusCode, Json<DestinationAccepted>), (StatusCode, Json<ErrorResponse>)> {
    let destination = request.destination.trim().to_string();
    if destination.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "destination must not be empty".to_string(),
            }),
        ));
    }

    state
        .navigator
        .submit_destination(destination.clone())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "destination rejected");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?;

    tracing::info!(destination = %destination, "destination submitted over HTTP");
    Ok((StatusCode::ACCEPTED, Json(DestinationAccepted { destination })))
}

/// `GET /status` and `POST /destination`
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/destination", post(submit_destination))
        .with_state(state)
}
