//! Presenter that writes notifications to the log.

use relayworld_core::{Change, Notice, Presenter};
use tracing::{debug, info, warn};

/// Logs every change at `debug` and every notice at `info` or `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn on_change(&mut self, change: &Change) {
        debug!(kind = ?change.kind, entity = ?change.entity, id = %change.id, "World changed");
    }

    fn on_notice(&mut self, notice: &Notice) {
        match notice {
            Notice::Rejected { action, reason } => {
                warn!(action, %reason, "Action rejected");
            }
            Notice::PublishFailed { event, kind, reason } => {
                warn!(event = %event, kind = %kind, %reason, "Event not delivered");
            }
            Notice::ConflictLost { entity, id, winner } => {
                warn!(entity = ?entity, %id, winner = %winner, "Lost a conflict, local state rolled back");
            }
            Notice::GatherCompleted { node, amount } => {
                info!(node = %node, amount, "Gather completed");
            }
            Notice::GatherCancelled { node, reason } => {
                info!(node = %node, reason = ?reason, "Gather cancelled");
            }
            Notice::Signal { from, payload } => {
                info!(from = %from, %payload, "Signal received");
            }
            Notice::CaughtUp => info!("Caught up with relay history"),
        }
    }
}
