use crate::stores::schema::{apply_schema, read_schema_version};
use crate::traits::RecordStore;
use crate::{NewRecord, RecordFilter, SortKey, StorageError, StoredRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

const SELECT_COLUMNS: &str = "SELECT id, external_id, name, owner, description, language, \
     popularity, secondary, last_activity, created_at, touched_at FROM repositories";

const INSERT_SQL: &str = "INSERT INTO repositories \
     (external_id, name, owner, description, language, popularity, secondary, \
      last_activity, created_at, touched_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
     ON CONFLICT(external_id) DO NOTHING";

#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened sqlite store");

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        apply_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn schema_version(&self) -> Result<Option<u32>, StorageError> {
        self.with_conn(|conn| Ok(read_schema_version(conn)?)).await
    }

    async fn with_conn<F, T>(&self, operation: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|error| StorageError::Lock(error.to_string()))?;
            operation(&mut guard)
        })
        .await
        .map_err(|error| StorageError::Task(error.to_string()))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn find_by_external_id(
        &self,
        external_id: Option<i64>,
    ) -> Result<Option<StoredRecord>, StorageError> {
        let Some(external_id) = external_id else {
            return Ok(None);
        };

        self.with_conn(move |conn| {
            let record = conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE external_id = ?1"),
                    params![external_id],
                    row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn insert_all(&self, records: &[NewRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let records = records.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare_cached(INSERT_SQL)?;
                for record in &records {
                    inserted += stmt.execute(params![
                        record.external_id,
                        record.name,
                        record.owner,
                        record.description,
                        record.language,
                        record.popularity,
                        record.secondary,
                        record.last_activity.map(|at| at.timestamp_millis()),
                        record.created_at.timestamp_millis(),
                        record.touched_at.timestamp_millis(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    async fn query_filtered(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<StoredRecord>, StorageError> {
        let language = filter.language.clone();
        let min_score = filter.min_score;
        let sql = format!(
            "{SELECT_COLUMNS} WHERE (?1 IS NULL OR language = ?1) \
             AND (?2 IS NULL OR popularity >= ?2) ORDER BY {}",
            order_clause(filter.sort)
        );

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![language, min_score], row_to_record)?;
            let records = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    async fn count(&self) -> Result<u64, StorageError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}

/// `id` is the insertion order and the final tie-break for every key.
fn order_clause(sort: SortKey) -> &'static str {
    match sort {
        SortKey::Popularity => "popularity DESC, id ASC",
        SortKey::Secondary => "secondary DESC, popularity DESC, id ASC",
        SortKey::Recency => "last_activity DESC NULLS LAST, popularity DESC, id ASC",
        SortKey::Name => "name ASC, external_id ASC, id ASC",
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let last_activity: Option<i64> = row.get(8)?;
    Ok(StoredRecord {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        owner: row.get(3)?,
        description: row.get(4)?,
        language: row.get(5)?,
        popularity: row.get(6)?,
        secondary: row.get(7)?,
        last_activity: last_activity
            .map(|millis| millis_to_datetime(8, millis))
            .transpose()?,
        created_at: millis_to_datetime(9, row.get(9)?)?,
        touched_at: millis_to_datetime(10, row.get(10)?)?,
    })
}

fn millis_to_datetime(index: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, millis))
}
