//! Status endpoint handler.
//!
//! Returns the latest `DisplayFrame` as JSON, or 503 before the first tick.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /status endpoint.
#[instrument(skip(state))]
pub async fn status_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /status request");

    match state.latest_frame() {
        Some(frame) => (StatusCode::OK, Json(frame)).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "No sample collected yet",
        )
            .into_response(),
    }
}
