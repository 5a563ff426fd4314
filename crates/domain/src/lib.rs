//! # walkin-domain
//!
//! Pure domain model for walk-in service queues.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the **Queue** aggregate (one location's line for one day)
//! - Define **QueueEntry** tickets and their status state machine
//! - Estimate wait times from the current line (pure functions)
//! - Describe what happened as **QueueEvent** values returned by commands
//! - Contain all invariant enforcement: positions, capacity, transitions
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! Wall-clock time and acting user arrive through [`context::CommandContext`];
//! persistence and publication are ports in the `app` crate.

pub mod context;
pub mod error;
pub mod id;
pub mod time;

pub mod entry;
pub mod event;
pub mod queue;
pub mod wait_time;
