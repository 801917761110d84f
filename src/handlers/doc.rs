//! Documentation endpoint handler.
//!
//! This module provides the `/doc` endpoint handler that displays
//! documentation for the monitor, including the active thresholds.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /doc endpoint.
#[instrument(skip(state))]
pub async fn doc_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /doc request");

    let version = env!("CARGO_PKG_VERSION");
    let s = &state.settings;
    let doc = format!(
        r#"HERAKLES PERFORMANCE MONITOR - DOCUMENTATION
============================================

VERSION: {version}
DESCRIPTION: Host CPU/RAM monitor that logs threshold entries and new peaks

ACTIVE SETTINGS
---------------
CPU threshold:   {cpu:.1}%
RAM threshold:   {ram:.1}%
Tick interval:   {interval:.3}s
Top-N processes: {top_n}
Device name:     {device}

RECORDING RULE
--------------
A performance log is written when a metric reaches its threshold
(entering an episode) and again each time it sets a new highest value
while still at or above the threshold. Falling below the threshold ends
the episode; the next crossing is logged again.

HTTP ENDPOINTS
--------------
GET /metrics     - Prometheus metrics endpoint
GET /health      - Loop statistics and alarm state (plain text)
GET /status      - Latest sample as JSON
GET /doc         - This documentation (plain text)

AVAILABLE METRICS
-----------------
herakles_perf_cpu_percent                - Host CPU utilization (top-N sum)
herakles_perf_ram_percent                - Host memory utilization
herakles_perf_alarm{{metric}}              - 1 while a metric is at/above threshold
herakles_perf_memory_gb{{kind}}            - Total/used/available memory in GiB
herakles_perf_cores{{kind}}                - Physical/logical core counts
herakles_perf_top_cpu_percent            - Top-N processes by normalized CPU
herakles_perf_ticks                      - Completed sampling ticks
herakles_perf_skipped_ticks              - Ticks skipped (source unavailable)
herakles_perf_events_emitted             - Performance logs persisted
herakles_perf_sink_failures              - Performance logs lost

CLI COMMANDS
------------
herakles-perf-monitor                       - Start the monitor
herakles-perf-monitor check --all           - Validate system requirements
herakles-perf-monitor config -o config.yaml - Generate config file
herakles-perf-monitor sample -n 5           - Sample without persisting
herakles-perf-monitor export                - Print hardware codes and logs
herakles-perf-monitor --help                - Show all CLI options

EXAMPLE USAGE
-------------
# Start with a lower threshold and console output
herakles-perf-monitor --threshold 60 --console

# Replay synthetic data
herakles-perf-monitor generate-testdata -o testdata.json
herakles-perf-monitor -t testdata.json --dry-run

# Get metrics
curl http://localhost:9216/metrics

{FOOTER_TEXT}
"#,
        cpu = s.cpu_threshold,
        ram = s.ram_threshold,
        interval = s.tick_interval.as_secs_f64(),
        top_n = s.top_n,
        device = s.device_name,
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        doc,
    )
}
