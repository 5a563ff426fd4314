//! Command context — who is acting, and when.

use serde::{Deserialize, Serialize};

use crate::id::ActorId;
use crate::time::Timestamp;

/// Attribution and wall-clock input threaded through every queue command.
///
/// The aggregate never reads the clock itself: `at` is captured once at the
/// application edge and used for every timestamp the command stamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    pub actor: ActorId,
    pub at: Timestamp,
}

impl CommandContext {
    #[must_use]
    pub fn new(actor: impl Into<ActorId>, at: Timestamp) -> Self {
        Self {
            actor: actor.into(),
            at,
        }
    }
}
