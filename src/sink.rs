//! Event sinks: where emitted log events are persisted.
//!
//! The monitor opens its sink once at startup and writes to it serially from
//! the sampling loop. `SqliteSink` is the durable store; `MemorySink` keeps
//! events in process for dry runs and tests.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::MonitorError;
use crate::model::{LogEvent, MetricKind};

/// Durable destination for log events.
///
/// Delivery is at-least-once from the caller's point of view; a sink that
/// needs duplicate suppression implements it itself.
pub trait EventSink: Send {
    fn persist(&mut self, event: LogEvent) -> Result<(), MonitorError>;

    /// Releases the underlying handle. Called once at shutdown.
    fn close(&mut self) -> Result<(), MonitorError> {
        Ok(())
    }
}

/// A row of the `hardware_code` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareCode {
    pub id: i64,
    pub name: String,
}

/// A row of the `performance_logs` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedLog {
    pub id: i64,
    pub hardware_id: i64,
    pub usage_percent: f64,
    pub physical_cores: u32,
    pub logical_cores: u32,
    pub total_memory_gb: u64,
    pub used_memory_gb: u64,
    pub available_memory_gb: u64,
    pub device_name: String,
    pub time: DateTime<Utc>,
}

impl PersistedLog {
    pub fn metric_kind(&self) -> Option<MetricKind> {
        MetricKind::from_hardware_id(self.hardware_id)
    }
}

/// SQLite-backed sink holding the hardware code and performance log tables.
pub struct SqliteSink {
    conn: Option<Connection>,
}

impl SqliteSink {
    /// Opens (creating if needed) the database and ensures the schema exists.
    ///
    /// `busy_timeout` bounds how long a write waits on a locked database.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, MonitorError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MonitorError::ConnectionInit(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            MonitorError::ConnectionInit(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let sink = Self::with_connection(conn, busy_timeout)?;
        info!("Opened event store at {}", path.display());
        Ok(sink)
    }

    /// In-memory database, mostly useful for tests.
    pub fn open_in_memory() -> Result<Self, MonitorError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MonitorError::ConnectionInit(e.to_string()))?;
        Self::with_connection(conn, Duration::from_secs(5))
    }

    fn with_connection(conn: Connection, busy_timeout: Duration) -> Result<Self, MonitorError> {
        conn.busy_timeout(busy_timeout)
            .map_err(|e| MonitorError::ConnectionInit(e.to_string()))?;
        conn.execute_batch(include_str!("../schema.sql"))
            .map_err(|e| MonitorError::ConnectionInit(format!("Failed to create schema: {}", e)))?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection, MonitorError> {
        self.conn
            .as_ref()
            .ok_or_else(|| MonitorError::SinkWrite("event store already closed".to_string()))
    }

    pub fn fetch_hardware_codes(&self) -> Result<Vec<HardwareCode>, MonitorError> {
        let mut stmt = self
            .conn()?
            .prepare("SELECT id, name FROM hardware_code ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(HardwareCode {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All persisted logs, oldest first. `limit` keeps only the newest N.
    pub fn fetch_logs(&self, limit: Option<u32>) -> Result<Vec<PersistedLog>, MonitorError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, hardware_id, usage_percent, physical_cores, logical_cores,
                    total_memory_gb, used_memory_gb, available_memory_gb, device_name, time
             FROM performance_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows = stmt.query_map(params![limit], Self::map_log)?;
        let mut logs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        logs.reverse();
        Ok(logs)
    }

    fn map_log(row: &rusqlite::Row) -> rusqlite::Result<PersistedLog> {
        let time: String = row.get(9)?;
        let time = DateTime::parse_from_rfc3339(&time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    9,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
        Ok(PersistedLog {
            id: row.get(0)?,
            hardware_id: row.get(1)?,
            usage_percent: row.get(2)?,
            physical_cores: row.get(3)?,
            logical_cores: row.get(4)?,
            total_memory_gb: row.get::<_, i64>(5)? as u64,
            used_memory_gb: row.get::<_, i64>(6)? as u64,
            available_memory_gb: row.get::<_, i64>(7)? as u64,
            device_name: row.get(8)?,
            time,
        })
    }
}

impl EventSink for SqliteSink {
    fn persist(&mut self, event: LogEvent) -> Result<(), MonitorError> {
        self.conn()?.execute(
            "INSERT INTO performance_logs (hardware_id, usage_percent, physical_cores, logical_cores,
                total_memory_gb, used_memory_gb, available_memory_gb, device_name, time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.metric_kind.hardware_id(),
                event.usage_percent,
                event.physical_cores,
                event.logical_cores,
                event.total_memory_gb as i64,
                event.used_memory_gb as i64,
                event.available_memory_gb as i64,
                event.device_name,
                event.timestamp.to_rfc3339(),
            ],
        )?;
        debug!(
            "Persisted {} event at {:.1}%",
            event.metric_kind, event.usage_percent
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), MonitorError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| {
                MonitorError::SinkWrite(format!("Failed to close event store: {}", e))
            })?;
            info!("Event store closed");
        }
        Ok(())
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything persisted so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn persist(&mut self, event: LogEvent) -> Result<(), MonitorError> {
        self.events
            .lock()
            .map_err(|e| MonitorError::SinkWrite(format!("memory sink poisoned: {}", e)))?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: MetricKind, percent: f64) -> LogEvent {
        LogEvent {
            metric_kind: kind,
            usage_percent: percent,
            physical_cores: 4,
            logical_cores: 8,
            total_memory_gb: 32,
            used_memory_gb: 20,
            available_memory_gb: 12,
            device_name: "test-host".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_hardware_codes_seeded() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let codes = sink.fetch_hardware_codes().unwrap();
        assert_eq!(
            codes,
            vec![
                HardwareCode {
                    id: 1,
                    name: "CPU".into()
                },
                HardwareCode {
                    id: 2,
                    name: "RAM".into()
                },
            ]
        );
    }

    #[test]
    fn test_persist_and_fetch() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        sink.persist(event(MetricKind::Cpu, 80.5)).unwrap();
        sink.persist(event(MetricKind::Ram, 91.0)).unwrap();

        let logs = sink.fetch_logs(None).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].metric_kind(), Some(MetricKind::Cpu));
        assert!((logs[0].usage_percent - 80.5).abs() < 1e-9);
        assert_eq!(logs[1].hardware_id, 2);
        assert_eq!(logs[1].device_name, "test-host");
        assert_eq!(logs[1].total_memory_gb, 32);
    }

    #[test]
    fn test_fetch_logs_limit_keeps_newest() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        for p in [76.0, 80.0, 90.0] {
            sink.persist(event(MetricKind::Cpu, p)).unwrap();
        }
        let logs = sink.fetch_logs(Some(2)).unwrap();
        let percents: Vec<f64> = logs.iter().map(|l| l.usage_percent).collect();
        assert_eq!(percents, vec![80.0, 90.0]);
    }

    #[test]
    fn test_persist_after_close_fails() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        sink.close().unwrap();
        assert!(matches!(
            sink.persist(event(MetricKind::Cpu, 80.0)),
            Err(MonitorError::SinkWrite(_))
        ));
        // closing twice is harmless
        sink.close().unwrap();
    }

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.persist(event(MetricKind::Ram, 77.0)).unwrap();
        assert_eq!(sink.events().len(), 1);
    }
}
