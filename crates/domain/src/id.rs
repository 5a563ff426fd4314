//! Typed identifier newtypes.
//!
//! Identifiers minted by walkin itself (queues, entries, events) are backed by
//! UUIDs. Identifiers owned by external systems (customers, staff, service
//! types, acting users) are opaque strings; the aggregate checks them for
//! emptiness, nothing more.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

macro_rules! define_key {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an externally issued identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty or whitespace only.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`Queue`](crate::queue::Queue).
    QueueId
);

define_id!(
    /// Unique identifier for a [`QueueEntry`](crate::entry::QueueEntry).
    QueueEntryId
);

define_id!(
    /// Identifier of the physical location owning a queue.
    LocationId
);

define_id!(
    /// Unique identifier for a [`QueueEvent`](crate::event::QueueEvent).
    EventId
);

define_key!(
    /// Identifier of the customer holding a ticket.
    CustomerId
);

define_key!(
    /// Identifier of a staff member serving customers.
    StaffMemberId
);

define_key!(
    /// Identifier of the requested service (haircut, shave, …).
    ServiceTypeId
);

define_key!(
    /// Identifier of the user on whose behalf a command runs.
    ActorId
);
