//! `SQLite` implementation of [`QueueRepository`].
//!
//! A queue is stored as one `queues` row plus its `queue_entries` rows.
//! `save` updates both inside one transaction, guarded by the row version.

use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use walkin_app::ports::QueueRepository;
use walkin_domain::entry::{EntryStatus, QueueEntry};
use walkin_domain::error::{ConflictError, NotFoundError, WalkinError};
use walkin_domain::id::{LocationId, QueueEntryId, QueueId};
use walkin_domain::queue::{Queue, QueueSettings};
use walkin_domain::time::{QueueDate, Timestamp};

use crate::error::{StorageError, decode};

fn parse_timestamp(value: &str) -> Result<Timestamp, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(decode)
}

fn timestamp(row: &SqliteRow, column: &str) -> Result<Timestamp, sqlx::Error> {
    let value: String = row.try_get(column)?;
    parse_timestamp(&value)
}

fn optional_timestamp(row: &SqliteRow, column: &str) -> Result<Option<Timestamp>, sqlx::Error> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(parse_timestamp).transpose()
}

/// Header columns of a `queues` row; entries are loaded separately.
struct QueueRow {
    id: QueueId,
    location_id: LocationId,
    queue_date: QueueDate,
    is_active: bool,
    settings: QueueSettings,
    version: u64,
}

impl<'r> FromRow<'r, SqliteRow> for QueueRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let location_id: String = row.try_get("location_id")?;
        let queue_date: String = row.try_get("queue_date")?;
        let version: i64 = row.try_get("version")?;

        Ok(Self {
            id: QueueId::from_str(&id).map_err(decode)?,
            location_id: LocationId::from_str(&location_id).map_err(decode)?,
            queue_date: NaiveDate::from_str(&queue_date).map_err(decode)?,
            is_active: row.try_get("is_active")?,
            settings: QueueSettings {
                max_size: row.try_get("max_size")?,
                late_client_cap_minutes: row.try_get("late_client_cap_minutes")?,
            },
            version: u64::try_from(version).map_err(decode)?,
        })
    }
}

/// Wrapper for converting database rows into domain [`QueueEntry`].
struct Wrapper(QueueEntry);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let queue_id: String = row.try_get("queue_id")?;
        let customer_id: String = row.try_get("customer_id")?;
        let status: String = row.try_get("status")?;
        let staff_member_id: Option<String> = row.try_get("staff_member_id")?;
        let service_type_id: Option<String> = row.try_get("service_type_id")?;

        Ok(Self(QueueEntry {
            id: QueueEntryId::from_str(&id).map_err(decode)?,
            queue_id: QueueId::from_str(&queue_id).map_err(decode)?,
            customer_id: customer_id.into(),
            customer_name: row.try_get("customer_name")?,
            position: row.try_get("position")?,
            status: EntryStatus::from_str(&status).map_err(decode)?,
            staff_member_id: staff_member_id.map(Into::into),
            service_type_id: service_type_id.map(Into::into),
            notes: row.try_get("notes")?,
            entered_at: timestamp(row, "entered_at")?,
            called_at: optional_timestamp(row, "called_at")?,
            checked_in_at: optional_timestamp(row, "checked_in_at")?,
            completed_at: optional_timestamp(row, "completed_at")?,
            cancelled_at: optional_timestamp(row, "cancelled_at")?,
            service_duration_minutes: row.try_get("service_duration_minutes")?,
        }))
    }
}

const INSERT_QUEUE: &str = "INSERT INTO queues (id, location_id, queue_date, is_active, max_size, late_client_cap_minutes, version) VALUES (?, ?, ?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM queues WHERE id = ?";
const SELECT_ACTIVE_BY_LOCATION: &str =
    "SELECT * FROM queues WHERE location_id = ? AND queue_date = ? AND is_active = 1";
const SELECT_BY_DATE: &str = "SELECT * FROM queues WHERE queue_date = ? ORDER BY location_id";
const SELECT_EXISTS: &str = "SELECT 1 FROM queues WHERE id = ?";
const UPDATE_QUEUE: &str = "UPDATE queues SET is_active = ?, max_size = ?, late_client_cap_minutes = ?, version = version + 1 WHERE id = ? AND version = ?";
const SELECT_ENTRIES: &str = "SELECT * FROM queue_entries WHERE queue_id = ? ORDER BY position";
const UPSERT_ENTRY: &str = "INSERT INTO queue_entries (id, queue_id, customer_id, customer_name, position, status, staff_member_id, service_type_id, notes, entered_at, called_at, checked_in_at, completed_at, cancelled_at, service_duration_minutes) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
    ON CONFLICT (id) DO UPDATE SET status = excluded.status, staff_member_id = excluded.staff_member_id, service_type_id = excluded.service_type_id, notes = excluded.notes, called_at = excluded.called_at, checked_in_at = excluded.checked_in_at, completed_at = excluded.completed_at, cancelled_at = excluded.cancelled_at, service_duration_minutes = excluded.service_duration_minutes";

fn conflict(queue: &Queue) -> WalkinError {
    ConflictError {
        queue_id: queue.id().to_string(),
        expected_version: queue.version(),
    }
    .into()
}

async fn upsert_entries(conn: &mut SqliteConnection, queue: &Queue) -> Result<(), sqlx::Error> {
    for entry in queue.entries() {
        sqlx::query(UPSERT_ENTRY)
            .bind(entry.id.to_string())
            .bind(entry.queue_id.to_string())
            .bind(entry.customer_id.as_str())
            .bind(&entry.customer_name)
            .bind(entry.position)
            .bind(entry.status.as_str())
            .bind(entry.staff_member_id.as_ref().map(|id| id.as_str()))
            .bind(entry.service_type_id.as_ref().map(|id| id.as_str()))
            .bind(&entry.notes)
            .bind(entry.entered_at.to_rfc3339())
            .bind(entry.called_at.map(|ts| ts.to_rfc3339()))
            .bind(entry.checked_in_at.map(|ts| ts.to_rfc3339()))
            .bind(entry.completed_at.map(|ts| ts.to_rfc3339()))
            .bind(entry.cancelled_at.map(|ts| ts.to_rfc3339()))
            .bind(entry.service_duration_minutes)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Load the entries of `row` and rebuild the aggregate.
async fn hydrate(pool: &SqlitePool, row: QueueRow) -> Result<Queue, StorageError> {
    let entries: Vec<Wrapper> = sqlx::query_as(SELECT_ENTRIES)
        .bind(row.id.to_string())
        .fetch_all(pool)
        .await?;

    Queue::builder()
        .id(row.id)
        .location_id(row.location_id)
        .queue_date(row.queue_date)
        .is_active(row.is_active)
        .settings(row.settings)
        .entries(entries.into_iter().map(|w| w.0).collect())
        .version(row.version)
        .build()
        .map_err(|source| StorageError::Inconsistent {
            queue_id: row.id.to_string(),
            source,
        })
}

/// `SQLite`-backed queue repository.
pub struct SqliteQueueRepository {
    pool: SqlitePool,
}

impl SqliteQueueRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl QueueRepository for SqliteQueueRepository {
    fn create(&self, queue: Queue) -> impl Future<Output = Result<Queue, WalkinError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let inserted = sqlx::query(INSERT_QUEUE)
                .bind(queue.id().to_string())
                .bind(queue.location_id().to_string())
                .bind(queue.queue_date().to_string())
                .bind(queue.is_active())
                .bind(queue.max_size())
                .bind(queue.late_client_cap_minutes())
                .bind(i64::try_from(queue.version()).unwrap_or(i64::MAX))
                .execute(&mut *tx)
                .await;
            match inserted {
                Ok(_) => {}
                Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                    return Err(conflict(&queue));
                }
                Err(err) => return Err(StorageError::from(err).into()),
            }
            upsert_entries(&mut tx, &queue)
                .await
                .map_err(StorageError::from)?;
            tx.commit().await.map_err(StorageError::from)?;

            Ok(queue)
        }
    }

    fn get_by_id(
        &self,
        id: QueueId,
    ) -> impl Future<Output = Result<Option<Queue>, WalkinError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<QueueRow> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            match row {
                Some(row) => Ok(Some(hydrate(&pool, row).await?)),
                None => Ok(None),
            }
        }
    }

    fn get_active_by_location(
        &self,
        location_id: LocationId,
        date: QueueDate,
    ) -> impl Future<Output = Result<Option<Queue>, WalkinError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<QueueRow> = sqlx::query_as(SELECT_ACTIVE_BY_LOCATION)
                .bind(location_id.to_string())
                .bind(date.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            match row {
                Some(row) => Ok(Some(hydrate(&pool, row).await?)),
                None => Ok(None),
            }
        }
    }

    fn list_for_date(
        &self,
        date: QueueDate,
    ) -> impl Future<Output = Result<Vec<Queue>, WalkinError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<QueueRow> = sqlx::query_as(SELECT_BY_DATE)
                .bind(date.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            let mut queues = Vec::with_capacity(rows.len());
            for row in rows {
                queues.push(hydrate(&pool, row).await?);
            }
            Ok(queues)
        }
    }

    fn save(&self, mut queue: Queue) -> impl Future<Output = Result<Queue, WalkinError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let updated = sqlx::query(UPDATE_QUEUE)
                .bind(queue.is_active())
                .bind(queue.max_size())
                .bind(queue.late_client_cap_minutes())
                .bind(queue.id().to_string())
                .bind(i64::try_from(queue.version()).unwrap_or(i64::MAX))
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;

            if updated.rows_affected() == 0 {
                let exists: Option<(i64,)> = sqlx::query_as(SELECT_EXISTS)
                    .bind(queue.id().to_string())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(StorageError::from)?;
                return Err(match exists {
                    Some(_) => conflict(&queue),
                    None => NotFoundError {
                        entity: "Queue",
                        id: queue.id().to_string(),
                    }
                    .into(),
                });
            }

            upsert_entries(&mut tx, &queue)
                .await
                .map_err(StorageError::from)?;
            tx.commit().await.map_err(StorageError::from)?;

            queue.set_version(queue.version() + 1);
            Ok(queue)
        }
    }
}
