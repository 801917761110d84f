//! HTTP endpoint handlers for the monitor.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint
//! - `/status`: Latest frame as JSON
//! - `/doc`: Documentation endpoint

pub mod doc;
pub mod health;
pub mod metrics;
pub mod status;

// Re-export handlers
pub use doc::doc_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use status::status_handler;
