//! Metrics endpoint handler for Prometheus scraping.
//!
//! The per-frame gauges are already current (the sampling loop sets them);
//! this handler refreshes the loop counters and encodes the registry.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    state.metrics.set_loop_stats(&state.health_stats);

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    if let Err(e) = TextEncoder::new().encode(&families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return Err(MetricsError::EncodingFailed);
    }

    state.scrape_duration.set(start.elapsed().as_secs_f64());

    String::from_utf8(buffer).map_err(|e| {
        error!("Metrics output is not valid UTF-8: {}", e);
        MetricsError::EncodingFailed
    })
}
