//! Application state management for the monitor.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers. The sampling loop writes into it through
//! `PrometheusDisplay` and the shared `HealthStats`.

use herakles_perf_monitor::{DisplayFrame, HealthStats, MonitorSettings};
use prometheus::{Gauge, Registry};
use std::sync::{Arc, RwLock};

use crate::metrics::MonitorMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and the sampling loop.
pub struct AppState {
    pub registry: Registry,
    pub metrics: MonitorMetrics,
    pub scrape_duration: Gauge,
    pub settings: MonitorSettings,
    pub health_stats: Arc<HealthStats>,
    /// Last frame rendered by the sampling loop.
    pub latest_frame: Arc<RwLock<Option<DisplayFrame>>>,
}

impl AppState {
    pub fn latest_frame(&self) -> Option<DisplayFrame> {
        self.latest_frame.read().ok().and_then(|f| f.clone())
    }
}
