//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod command;
pub mod queue_service;

pub use command::{
    CallNext, CommandError, CommandResult, EntryCommand, EntryStatusQuery, FinishService,
    JoinQueue, SetQueueActive, UpdateQueueSettings,
};
pub use queue_service::{QueueService, ServiceOptions, SweepReport};
