//! Presentation collaborator: change notifications and user-facing notices.
//!
//! The engine never renders anything. After each applied event, local
//! action, or lifecycle tick it tells a [`Presenter`] which entities were
//! added, updated, or removed, and raises [`Notice`]s for things the user
//! should hear about.

use std::sync::{Arc, Mutex, PoisonError};

use relayworld_events::EventKind;
use relayworld_types::{ActorId, EntityKind, EventId, ResourceNodeId};
use relayworld_world::CancelReason;

/// How an entity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The entity appeared.
    Added,
    /// The entity's state changed.
    Updated,
    /// The entity disappeared.
    Removed,
}

/// One entity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Added, updated, or removed.
    pub kind: ChangeKind,
    /// Entity category.
    pub entity: EntityKind,
    /// Entity id in its display form.
    pub id: String,
}

impl Change {
    /// An added entity.
    pub fn added(entity: EntityKind, id: impl ToString) -> Self {
        Self {
            kind: ChangeKind::Added,
            entity,
            id: id.to_string(),
        }
    }

    /// An updated entity.
    pub fn updated(entity: EntityKind, id: impl ToString) -> Self {
        Self {
            kind: ChangeKind::Updated,
            entity,
            id: id.to_string(),
        }
    }

    /// A removed entity.
    pub fn removed(entity: EntityKind, id: impl ToString) -> Self {
        Self {
            kind: ChangeKind::Removed,
            entity,
            id: id.to_string(),
        }
    }
}

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A local action failed its preconditions. Nothing was published.
    Rejected {
        /// Action name.
        action: &'static str,
        /// Why.
        reason: String,
    },
    /// Broadcasting a local event failed. The optimistic state stands.
    PublishFailed {
        /// The event that was not delivered.
        event: EventId,
        /// Its kind.
        kind: EventKind,
        /// Transport error text.
        reason: String,
    },
    /// A local optimistic entity lost a conflict and was rolled back.
    ConflictLost {
        /// Entity category.
        entity: EntityKind,
        /// Entity id.
        id: String,
        /// Actor whose event won.
        winner: ActorId,
    },
    /// The local gather finished.
    GatherCompleted {
        /// Node gathered.
        node: ResourceNodeId,
        /// Units credited.
        amount: u32,
    },
    /// The local gather was interrupted.
    GatherCancelled {
        /// Node targeted.
        node: ResourceNodeId,
        /// Why.
        reason: CancelReason,
    },
    /// A signaling payload addressed to the local actor.
    Signal {
        /// Sender.
        from: ActorId,
        /// Uninterpreted payload.
        payload: serde_json::Value,
    },
    /// The relay finished replaying stored events.
    CaughtUp,
}

/// Receiver of change notifications and notices.
pub trait Presenter: Send {
    /// An entity changed.
    fn on_change(&mut self, change: &Change);

    /// A notice was raised.
    fn on_notice(&mut self, notice: &Notice);
}

/// A presenter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPresenter;

impl Presenter for NoOpPresenter {
    fn on_change(&mut self, _change: &Change) {}

    fn on_notice(&mut self, _notice: &Notice) {}
}

/// Everything a [`RecordingPresenter`] has seen.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// Changes in arrival order.
    pub changes: Vec<Change>,
    /// Notices in arrival order.
    pub notices: Vec<Notice>,
}

/// A presenter that records into shared storage. Clones see the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingPresenter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of what has been recorded so far.
    pub fn snapshot(&self) -> Recorded {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Notices recorded so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.snapshot().notices
    }

    /// Changes recorded so far.
    pub fn changes(&self) -> Vec<Change> {
        self.snapshot().changes
    }
}

impl Presenter for RecordingPresenter {
    fn on_change(&mut self, change: &Change) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .changes
            .push(change.clone());
    }

    fn on_notice(&mut self, notice: &Notice) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .notices
            .push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_clones_share_storage() {
        let recorder = RecordingPresenter::new();
        let mut boxed: Box<dyn Presenter> = Box::new(recorder.clone());
        boxed.on_change(&Change::added(EntityKind::Structure, "s-1"));
        boxed.on_notice(&Notice::CaughtUp);
        assert_eq!(
            recorder.changes(),
            vec![Change::added(EntityKind::Structure, "s-1")]
        );
        assert_eq!(recorder.notices(), vec![Notice::CaughtUp]);
    }
}
