//! Event Recorder - persistence sinks for fired conditions
//!
//! Every firing produces an `EventRecord`, whether or not its notification
//! was suppressed. Sinks sit behind the `EventRecorder` trait so the
//! pipeline does not care where records land.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldwatch_model::{EventRecord, FieldValue, Severity};
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::RecorderError;

/// Persistence sink for event records
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, record: &EventRecord) -> Result<(), RecorderError>;

    /// Short name for logs and stats
    fn name(&self) -> &'static str;
}

/// In-process recorder for tests and development
#[derive(Debug, Default, Clone)]
pub struct MemoryEventRecorder {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemoryEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl EventRecorder for MemoryEventRecorder {
    async fn record(&self, record: &EventRecord) -> Result<(), RecorderError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// SQLite-backed recorder
#[derive(Debug, Clone)]
pub struct SqliteEventRecorder {
    pool: SqlitePool,
}

impl SqliteEventRecorder {
    /// Open (or create) the database at `url` and ensure the schema exists
    ///
    /// In-memory databases are pinned to a single connection so every
    /// query sees the same data.
    pub async fn connect(url: &str) -> Result<Self, RecorderError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let recorder = Self::with_pool(pool).await?;
        info!("Event recorder connected: {}", url);
        Ok(recorder)
    }

    /// Wrap an existing pool, creating the table if absent
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, RecorderError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_records (
                id TEXT PRIMARY KEY,
                device_id TEXT NOT NULL,
                site_id TEXT NOT NULL,
                sensor_kind TEXT NOT NULL,
                condition_id INTEGER NOT NULL,
                severity TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                notified INTEGER NOT NULL DEFAULT 0,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_event_records_device ON event_records (device_id, recorded_at)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn count(&self) -> Result<i64, RecorderError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Most recent records first
    pub async fn recent(&self, limit: u32) -> Result<Vec<EventRecord>, RecorderError> {
        let rows = sqlx::query(
            r#"
            SELECT id, device_id, site_id, sensor_kind, condition_id, severity,
                   field, value, notified, recorded_at
            FROM event_records
            ORDER BY recorded_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(hydrate_record).collect()
    }
}

#[async_trait]
impl EventRecorder for SqliteEventRecorder {
    async fn record(&self, record: &EventRecord) -> Result<(), RecorderError> {
        let value = serde_json::to_string(&record.value)
            .map_err(|e| RecorderError::Corrupt(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO event_records
                (id, device_id, site_id, sensor_kind, condition_id, severity,
                 field, value, notified, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.device_id)
        .bind(&record.site_id)
        .bind(&record.sensor_kind)
        .bind(record.condition_id)
        .bind(record.severity.as_str())
        .bind(&record.field)
        .bind(value)
        .bind(record.notified)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

fn hydrate_record(row: SqliteRow) -> Result<EventRecord, RecorderError> {
    let id: String = row.try_get("id")?;
    let severity: String = row.try_get("severity")?;
    let value: String = row.try_get("value")?;
    let recorded_at: DateTime<Utc> = row.try_get("recorded_at")?;

    Ok(EventRecord {
        id: Uuid::parse_str(&id).map_err(|e| RecorderError::Corrupt(e.to_string()))?,
        device_id: row.try_get("device_id")?,
        site_id: row.try_get("site_id")?,
        sensor_kind: row.try_get("sensor_kind")?,
        condition_id: row.try_get("condition_id")?,
        severity: Severity::from_str(&severity).map_err(RecorderError::Corrupt)?,
        field: row.try_get("field")?,
        value: serde_json::from_str::<FieldValue>(&value)
            .map_err(|e| RecorderError::Corrupt(e.to_string()))?,
        notified: row.try_get("notified")?,
        recorded_at,
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use fieldwatch_model::{Condition, Severity};

    fn sample(device: &str, value: f64) -> EventRecord {
        let condition = Condition::between(1, "TH", Severity::Warning, 25.0, 30.0);
        EventRecord::new(device, "site-a", &condition, "temperature", value.into(), Utc::now())
    }

    #[tokio::test]
    async fn test_memory_recorder() {
        let recorder = MemoryEventRecorder::new();
        recorder.record(&sample("dev-1", 28.0)).await.unwrap();
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.records()[0].device_id, "dev-1");
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let recorder = SqliteEventRecorder::connect("sqlite::memory:").await.unwrap();
        let mut first = sample("dev-1", 28.0);
        first.notified = true;
        recorder.record(&first).await.unwrap();
        recorder.record(&sample("dev-2", 26.5)).await.unwrap();

        assert_eq!(recorder.count().await.unwrap(), 2);

        let recent = recorder.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        let stored = recent.iter().find(|r| r.id == first.id).unwrap();
        assert_eq!(stored.severity, Severity::Warning);
        assert_eq!(stored.value, FieldValue::Numeric(28.0));
        assert!(stored.notified);

        assert_eq!(recorder.recent(1).await.unwrap().len(), 1);
    }
}
