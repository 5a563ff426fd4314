//! Storage-specific error type wrapping sqlx errors.

use walkin_domain::error::WalkinError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Stored rows decode fine but do not form a valid queue.
    #[error("stored queue {queue_id} is inconsistent")]
    Inconsistent {
        queue_id: String,
        #[source]
        source: WalkinError,
    },
}

impl From<StorageError> for WalkinError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// Wrap a column parsing failure the way sqlx reports decode errors.
pub(crate) fn decode<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}
