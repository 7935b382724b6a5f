//! The client loop.
//!
//! [`run_client`] subscribes to the relay and multiplexes three inputs
//! against one exclusively borrowed [`Engine`]:
//!
//! - **Inbound events** from the relay subscription
//! - **Local actions** from the user
//! - **Lifecycle ticks** on a fixed interval
//!
//! Outbound envelopes are published from spawned tasks. A failed publish
//! comes back through a channel and is reported; the optimistic state
//! stands and nothing is retried. Land claims without a proof are paid for
//! in a spawned task too, and re-enter the loop once the proof is in hand.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use relayworld_events::{Envelope, EventKind};
use relayworld_types::EventId;

use crate::actions::LocalAction;
use crate::clock::Clock;
use crate::engine::Engine;
use crate::error::{PreconditionFailure, RunnerError};
use crate::payment::{PaymentCollaborator, claim_land_paid};
use crate::transport::{Relay, SubscriptionFilter};

/// External services the loop talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Where events are published and read from.
    pub relay: Arc<dyn Relay>,
    /// Source of `now` for every engine call.
    pub clock: Arc<dyn Clock>,
    /// Pays for land claims submitted without a proof.
    pub payments: Option<Arc<dyn PaymentCollaborator>>,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The shutdown signal fired.
    Shutdown,
    /// The relay subscription ended.
    InboundClosed,
}

/// Counters for one run of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Why the loop stopped.
    pub end_reason: EndReason,
    /// Inbound items processed.
    pub inbound: u64,
    /// Local actions accepted.
    pub accepted: u64,
    /// Local actions rejected.
    pub rejected: u64,
    /// Envelopes handed to the relay.
    pub published: u64,
    /// Lifecycle ticks run.
    pub ticks: u64,
}

#[derive(Debug)]
struct PublishFailure {
    envelope: Envelope,
    reason: String,
}

/// Publish `batch` in order from a background task.
fn spawn_publish(
    relay: &Arc<dyn Relay>,
    batch: Vec<Envelope>,
    failures: &mpsc::UnboundedSender<PublishFailure>,
) {
    if batch.is_empty() {
        return;
    }
    let relay = Arc::clone(relay);
    let failures = failures.clone();
    tokio::spawn(async move {
        for envelope in batch {
            if let Err(e) = relay.publish(envelope.clone()).await {
                // The loop may already be gone; then nobody is listening.
                let _ = failures.send(PublishFailure {
                    envelope,
                    reason: e.to_string(),
                });
            }
        }
    });
}

/// A claim that went out for payment, back with a proof or a refusal.
#[derive(Debug)]
struct Paid {
    name: &'static str,
    action: Result<LocalAction, PreconditionFailure>,
}

const fn needs_payment(action: &LocalAction) -> bool {
    matches!(
        action,
        LocalAction::ClaimLand {
            payment_proof: None,
            ..
        }
    )
}

/// Pay for `action` off the loop and hand the result back through `paid`.
fn spawn_payment(
    payments: &Arc<dyn PaymentCollaborator>,
    action: LocalAction,
    paid: &mpsc::UnboundedSender<Paid>,
) {
    let payments = Arc::clone(payments);
    let paid = paid.clone();
    tokio::spawn(async move {
        let name = action.name();
        debug!(action = name, "Awaiting claim payment");
        let action = claim_land_paid(action, payments.as_ref()).await;
        // The loop may already be gone; then nobody is listening.
        let _ = paid.send(Paid { name, action });
    });
}

/// Submit a ready action and publish what it produced.
fn submit_ready(
    engine: &mut Engine,
    action: LocalAction,
    now: DateTime<Utc>,
    relay: &Arc<dyn Relay>,
    failures: &mpsc::UnboundedSender<PublishFailure>,
    summary: &mut RunSummary,
) {
    match engine.submit(action, now) {
        Ok(batch) => {
            summary.accepted = summary.accepted.saturating_add(1);
            summary.published = summary
                .published
                .saturating_add(u64::try_from(batch.len()).unwrap_or(u64::MAX));
            spawn_publish(relay, batch, failures);
        }
        Err(_) => summary.rejected = summary.rejected.saturating_add(1),
    }
}

fn report_failure(engine: &mut Engine, failure: PublishFailure) {
    let id = failure.envelope.id.parse::<EventId>();
    let kind = EventKind::from_code(failure.envelope.kind);
    match (id, kind) {
        (Ok(id), Some(kind)) => engine.report_publish_failure(id, kind, failure.reason),
        _ => warn!(
            id = %failure.envelope.id,
            kind = failure.envelope.kind,
            reason = %failure.reason,
            "Publish failed for an unrecognized envelope"
        ),
    }
}

/// Run the client until shutdown or until the relay subscription ends.
///
/// # Errors
///
/// Returns [`RunnerError::Transport`] if the initial subscription fails.
/// Nothing after that is fatal.
pub async fn run_client(
    engine: &mut Engine,
    collaborators: Collaborators,
    mut actions: mpsc::Receiver<LocalAction>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<RunSummary, RunnerError> {
    let Collaborators {
        relay,
        clock,
        payments,
    } = collaborators;

    // Subscribe before anything is published so no echo is missed.
    let (inbound_tx, mut inbound) = mpsc::channel(engine.config().transport.inbound_buffer.max(1));
    let _subscription = relay.subscribe(SubscriptionFilter::all(), inbound_tx).await?;
    let (failure_tx, mut failures) = mpsc::unbounded_channel();
    let (paid_tx, mut paid) = mpsc::unbounded_channel::<Paid>();

    let tick_ms = engine.config().scheduler.tick_interval_ms.max(1);
    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(actor = %engine.actor(), tick_interval_ms = tick_ms, "Client loop started");

    let mut summary = RunSummary {
        end_reason: EndReason::Shutdown,
        inbound: 0,
        accepted: 0,
        rejected: 0,
        published: 0,
        ticks: 0,
    };
    let mut actions_open = true;

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    summary.end_reason = EndReason::Shutdown;
                    break;
                }
            }

            item = inbound.recv() => {
                let Some(item) = item else {
                    warn!("Relay subscription ended");
                    summary.end_reason = EndReason::InboundClosed;
                    break;
                };
                summary.inbound = summary.inbound.saturating_add(1);
                let outcome = engine.handle_inbound(item, clock.now());
                debug!(?outcome, "Inbound processed");
            }

            Some(failure) = failures.recv() => {
                report_failure(engine, failure);
            }

            Some(Paid { name, action }) = paid.recv() => {
                match action {
                    Ok(action) => {
                        submit_ready(engine, action, clock.now(), &relay, &failure_tx, &mut summary);
                    }
                    Err(e) => {
                        engine.report_rejection(name, &e);
                        summary.rejected = summary.rejected.saturating_add(1);
                    }
                }
            }

            action = actions.recv(), if actions_open => {
                let Some(action) = action else {
                    debug!("Local action source closed");
                    actions_open = false;
                    continue;
                };
                match &payments {
                    Some(payments) if needs_payment(&action) => {
                        spawn_payment(payments, action, &paid_tx);
                    }
                    _ => submit_ready(engine, action, clock.now(), &relay, &failure_tx, &mut summary),
                }
            }

            _ = interval.tick() => {
                summary.ticks = summary.ticks.saturating_add(1);
                let batch = engine.tick(clock.now());
                summary.published = summary
                    .published
                    .saturating_add(u64::try_from(batch.len()).unwrap_or(u64::MAX));
                spawn_publish(&relay, batch, &failure_tx);
            }
        }
    }

    // Failures that raced the shutdown still get reported.
    while let Ok(failure) = failures.try_recv() {
        report_failure(engine, failure);
    }

    info!(
        reason = ?summary.end_reason,
        inbound = summary.inbound,
        accepted = summary.accepted,
        rejected = summary.rejected,
        published = summary.published,
        ticks = summary.ticks,
        "Client loop stopped"
    );
    Ok(summary)
}
