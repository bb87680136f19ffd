//! Record persistence.
//!
//! The pipeline only inserts; listing and deletion serve the front end.

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::{
    fmt::Debug,
    fs, io,
    path::Path,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::model::EnvironmentalRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },
    #[error("Could not prepare database location: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
    #[error("A record with id {0} already exists")]
    DuplicateId(String),
    #[error("Store has been closed")]
    Closed,
    #[error("Store lock was poisoned")]
    Poisoned,
    #[error("Database task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync + Debug {
    async fn insert(&self, record: &EnvironmentalRecord) -> Result<(), StoreError>;

    /// All records, ascending by user temperature. Ties keep insertion order.
    async fn list_by_user_temperature(&self) -> Result<Vec<EnvironmentalRecord>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<EnvironmentalRecord>, StoreError>;

    /// Returns whether a record was actually removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Non-durable store, handy for previews and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Vec<EnvironmentalRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: &EnvironmentalRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::DuplicateId(record.id.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn list_by_user_temperature(&self) -> Result<Vec<EnvironmentalRecord>, StoreError> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| a.user_temperature.total_cmp(&b.user_temperature));
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<Option<EnvironmentalRecord>, StoreError> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS environmental_records (
    id               TEXT PRIMARY KEY NOT NULL,
    api_temperature  REAL NOT NULL,
    api_humidity     REAL NOT NULL,
    user_temperature REAL NOT NULL,
    user_humidity    REAL NOT NULL,
    latitude         REAL NOT NULL,
    longitude        REAL NOT NULL
);";

const COLUMNS: &str =
    "id, api_temperature, api_humidity, user_temperature, user_humidity, latitude, longitude";

/// SQLite-backed store. Opened once at startup, closed explicitly at shutdown.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories as needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        tracing::debug!(path = %path.display(), "opening record database");

        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            Self::from_connection(Connection::open(&path)?)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(Some(conn))) })
    }

    /// Close the underlying connection. Later calls on any clone fail with [`StoreError::Closed`].
    pub async fn close(&self) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            match guard.take() {
                Some(conn) => conn.close().map_err(|(_, e)| StoreError::from(e)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn record_from_row(row: &Row<'_>) -> Result<EnvironmentalRecord, rusqlite::Error> {
    Ok(EnvironmentalRecord {
        id: row.get(0)?,
        api_temperature: row.get(1)?,
        api_humidity: row.get(2)?,
        user_temperature: row.get(3)?,
        user_humidity: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, record: &EnvironmentalRecord) -> Result<(), StoreError> {
        let id = record.id.clone();
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO environmental_records ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    record.id,
                    record.api_temperature,
                    record.api_humidity,
                    record.user_temperature,
                    record.user_humidity,
                    record.latitude,
                    record.longitude,
                ],
            )
            .map(|_| ())
        })
        .await
        .map_err(|e| match e {
            StoreError::Sqlite { source } if is_primary_key_violation(&source) => {
                StoreError::DuplicateId(id)
            }
            other => other,
        })
    }

    async fn list_by_user_temperature(&self) -> Result<Vec<EnvironmentalRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM environmental_records \
                 ORDER BY user_temperature ASC, rowid ASC"
            ))?;
            let records = stmt
                .query_map([], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<EnvironmentalRecord>, StoreError> {
        let id = id.to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM environmental_records WHERE id = ?1"),
                params![id],
                record_from_row,
            )
            .optional()
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_owned();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM environmental_records WHERE id = ?1", params![id])
                .map(|n| n > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, UserSample};

    fn record(user_temperature: f64) -> EnvironmentalRecord {
        let sample = UserSample::new(user_temperature, 50.0, Coordinate::new(10.0, 20.0));
        EnvironmentalRecord::from_sample(&sample, None)
    }

    async fn exercise(store: &dyn RecordStore) {
        let warm = record(30.0);
        let cold = record(5.0);
        let mild = record(18.5);

        for r in [&warm, &cold, &mild] {
            store.insert(r).await.expect("insert succeeds");
        }

        let temps: Vec<f64> = store
            .list_by_user_temperature()
            .await
            .unwrap()
            .iter()
            .map(|r| r.user_temperature)
            .collect();
        assert_eq!(temps, [5.0, 18.5, 30.0]);

        assert_eq!(store.get(&mild.id).await.unwrap(), Some(mild.clone()));

        assert!(store.delete(&cold.id).await.unwrap());
        assert!(!store.delete(&cold.id).await.unwrap());
        assert_eq!(store.get(&cold.id).await.unwrap(), None);
        assert_eq!(store.list_by_user_temperature().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn memory_store_orders_and_deletes() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_store_orders_and_deletes() {
        let store = SqliteStore::open_in_memory().unwrap();
        exercise(&store).await;
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_ids() {
        let store = MemoryStore::new();
        let r = record(1.0);
        store.insert(&r).await.unwrap();

        let err = store.insert(&r).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == r.id));
    }

    #[tokio::test]
    async fn sqlite_store_rejects_duplicate_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = record(1.0);
        store.insert(&r).await.unwrap();

        let err = store.insert(&r).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == r.id));
        assert_eq!(store.list_by_user_temperature().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closed_sqlite_store_refuses_work() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clone = store.clone();
        store.close().await.unwrap();
        store.close().await.unwrap();

        let err = clone.insert(&record(2.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }
}
