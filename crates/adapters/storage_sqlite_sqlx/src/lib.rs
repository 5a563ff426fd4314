//! # walkin-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `QueueRepository` port defined in `walkin-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `walkin-app` (for port traits) and `walkin-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod queue_repo;

pub use error::StorageError;
pub use pool::{Config, Database};
pub use queue_repo::SqliteQueueRepository;
