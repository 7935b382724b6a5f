//! Relay transport collaborator.
//!
//! A [`Relay`] publishes envelopes and streams matching ones back into an
//! mpsc sink: first every stored envelope, then an
//! [`Inbound::EndOfStoredEvents`] marker, then live traffic. Signature
//! checks belong to the transport; envelopes reaching the sink are trusted
//! to carry the actor that signed them.
//!
//! [`LocalRelay`] is an in-memory relay with history, used by tests and by
//! the client when no relay is configured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use relayworld_events::{Envelope, EventKind};

use crate::error::TransportError;

/// Live-traffic buffer of the in-memory relay.
const LOCAL_BROADCAST_CAPACITY: usize = 4096;

/// What a subscription delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An envelope from the relay.
    Event(Envelope),
    /// The relay has replayed everything it had stored.
    EndOfStoredEvents,
}

/// Which envelopes a subscription wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    /// Kinds to receive. Empty means every kind.
    pub kinds: Vec<EventKind>,
    /// Only envelopes created at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl SubscriptionFilter {
    /// A filter for every known kind.
    pub fn all() -> Self {
        Self {
            kinds: EventKind::ALL.to_vec(),
            since: None,
        }
    }

    /// Whether `envelope` passes the filter.
    pub fn matches(&self, envelope: &Envelope) -> bool {
        let kind_ok = self.kinds.is_empty() || self.kinds.iter().any(|k| k.code() == envelope.kind);
        let time_ok = self
            .since
            .is_none_or(|since| envelope.created_at >= since.timestamp());
        kind_ok && time_ok
    }
}

/// A live subscription. Dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap the tasks feeding a sink.
    pub const fn new(tasks: Vec<JoinHandle<()>>) -> Self {
        Self { tasks }
    }

    /// Stop delivery now.
    pub fn cancel(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Whether every feeding task has stopped.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A publish/subscribe relay.
pub trait Relay: Send + Sync {
    /// Broadcast one envelope.
    fn publish(&self, envelope: Envelope) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Stream stored and live envelopes matching `filter` into `sink`.
    fn subscribe(
        &self,
        filter: SubscriptionFilter,
        sink: mpsc::Sender<Inbound>,
    ) -> BoxFuture<'_, Result<Subscription, TransportError>>;
}

// ---------------------------------------------------------------------------
// LocalRelay
// ---------------------------------------------------------------------------

/// An in-memory relay with full history. Clones share the same relay.
#[derive(Debug, Clone)]
pub struct LocalRelay {
    history: Arc<Mutex<Vec<Envelope>>>,
    live: broadcast::Sender<Envelope>,
    offline: Arc<AtomicBool>,
}

impl Default for LocalRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRelay {
    /// Create an empty relay.
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(LOCAL_BROADCAST_CAPACITY);
        Self {
            history: Arc::new(Mutex::new(Vec::new())),
            live,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every publish fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Copy of every envelope published so far.
    pub fn history(&self) -> Vec<Envelope> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store and fan out one envelope.
    pub fn push(&self, envelope: Envelope) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("local relay is offline".to_owned()));
        }
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.push(envelope.clone());
        // No live subscribers is fine; the envelope is in the history.
        let _ = self.live.send(envelope);
        Ok(())
    }
}

impl Relay for LocalRelay {
    fn publish(&self, envelope: Envelope) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move { self.push(envelope) })
    }

    fn subscribe(
        &self,
        filter: SubscriptionFilter,
        sink: mpsc::Sender<Inbound>,
    ) -> BoxFuture<'_, Result<Subscription, TransportError>> {
        Box::pin(async move {
            // Snapshot and subscribe under the lock so nothing falls between.
            let (stored, mut rx) = {
                let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
                let stored: Vec<Envelope> = history
                    .iter()
                    .filter(|e| filter.matches(e))
                    .cloned()
                    .collect();
                (stored, self.live.subscribe())
            };

            let task = tokio::spawn(async move {
                for envelope in stored {
                    if sink.send(Inbound::Event(envelope)).await.is_err() {
                        return;
                    }
                }
                if sink.send(Inbound::EndOfStoredEvents).await.is_err() {
                    return;
                }
                loop {
                    match rx.recv().await {
                        Ok(envelope) => {
                            if filter.matches(&envelope)
                                && sink.send(Inbound::Event(envelope)).await.is_err()
                            {
                                return;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Local relay subscriber lagged, events lost");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Local relay closed");
                            return;
                        }
                    }
                }
            });
            Ok(Subscription::new(vec![task]))
        })
    }
}
