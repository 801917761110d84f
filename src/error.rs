//! Error taxonomy for the monitor.
//!
//! Losing a single process mid-enumeration is not an error at all; sources
//! simply leave that process out of the snapshot.

use std::fmt;

#[derive(Debug)]
pub enum MonitorError {
    /// A process or memory source could not produce a reading for the tick.
    SourceUnavailable(String),
    /// The event sink rejected or timed out on a write.
    SinkWrite(String),
    /// The event sink could not be opened at startup.
    ConnectionInit(String),
    /// Configuration could not be loaded or failed validation.
    Config(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::SourceUnavailable(msg) => write!(f, "source unavailable: {}", msg),
            MonitorError::SinkWrite(msg) => write!(f, "sink write failed: {}", msg),
            MonitorError::ConnectionInit(msg) => {
                write!(f, "failed to initialize sink connection: {}", msg)
            }
            MonitorError::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for MonitorError {}

impl From<rusqlite::Error> for MonitorError {
    fn from(e: rusqlite::Error) -> Self {
        MonitorError::SinkWrite(e.to_string())
    }
}
