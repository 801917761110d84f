//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! sampling loop statistics and the current alarm state.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/herakles-io/herakles-perf-monitor - More info: https://www.herakles.io - Support: proc-mem@herakles.io";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let latest = state.latest_frame();

    // Healthy once the loop has completed at least one tick
    let status = if latest.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let message = match &latest {
        None => "Waiting for first sample",
        Some(f) if f.cpu_alarm || f.ram_alarm => "OK - Threshold exceeded",
        Some(_) => "OK",
    };

    let table = state.health_stats.render_table();

    let mut alarms = String::new();
    writeln!(alarms, "ALARM STATE").ok();
    writeln!(alarms, "===========").ok();
    writeln!(alarms).ok();
    writeln!(
        alarms,
        "{:8} | {:>10} | {:>10} | {:>8}",
        "Metric", "Current %", "Threshold", "Alarm"
    )
    .ok();
    writeln!(alarms, "{}", "-".repeat(45)).ok();
    if let Some(f) = &latest {
        let rows = [
            ("CPU", f.cpu_percent, state.settings.cpu_threshold, f.cpu_alarm),
            ("RAM", f.ram_percent, state.settings.ram_threshold, f.ram_alarm),
        ];
        for (name, current, threshold, alarm) in rows {
            writeln!(
                alarms,
                "{:8} | {:>10.1} | {:>10.1} | {:>8}",
                name,
                current,
                threshold,
                if alarm { "yes" } else { "no" }
            )
            .ok();
        }
    }

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\n{table}\n{alarms}\n{FOOTER_TEXT}"),
    )
}
