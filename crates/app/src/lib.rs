//! # walkin-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `QueueRepository` — load and version-checked save of the queue aggregate
//!   - `EventPublisher` — hand queue events to downstream collaborators
//!   - `Clock` — the only source of "now"
//! - Define **driving/inbound ports** as use-case structs:
//!   - `QueueService` — join, call next, check in, finish, cancel, no-show,
//!     settings, activation, late-customer sweeps
//! - Provide **in-process infrastructure** that doesn't need IO (event bus,
//!   in-memory repository)
//! - Orchestrate the aggregate without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `walkin-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod in_memory;
pub mod ports;
pub mod services;
