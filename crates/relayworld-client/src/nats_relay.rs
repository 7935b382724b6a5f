//! [`Relay`] backed by one or more NATS servers.
//!
//! Every configured server is treated as an independent relay. Events are
//! published to all of them and read from all of them; the engine's
//! idempotency filter drops the copies.
//!
//! # Subjects
//!
//! - **Publish:** `{prefix}.{kind code}`, e.g. `relayworld.events.31003`
//! - **Subscribe:** `{prefix}.>`
//!
//! Core NATS keeps no history, so the end-of-stored-events marker is sent
//! as soon as every subscription is in place.

use futures::StreamExt as _;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use relayworld_core::{Inbound, Relay, Subscription, SubscriptionFilter, TransportError};
use relayworld_events::Envelope;

use crate::error::ClientError;

/// Subject an envelope of kind `code` is published on.
pub fn event_subject(prefix: &str, code: u32) -> String {
    format!("{prefix}.{code}")
}

/// Wildcard subject covering every event kind.
pub fn wildcard_subject(prefix: &str) -> String {
    format!("{prefix}.>")
}

/// Publishes to and subscribes from a set of NATS servers.
#[derive(Debug, Clone)]
pub struct NatsRelay {
    clients: Vec<async_nats::Client>,
    prefix: String,
}

impl NatsRelay {
    /// Connect to every URL in `urls`. Unreachable servers are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Nats`] if no server could be reached.
    pub async fn connect(urls: &[String], prefix: &str) -> Result<Self, ClientError> {
        let mut clients = Vec::with_capacity(urls.len());
        for url in urls {
            match async_nats::connect(url.as_str()).await {
                Ok(client) => {
                    info!(url = %url, "Connected to relay");
                    clients.push(client);
                }
                Err(e) => warn!(url = %url, error = %e, "Relay unreachable, skipping"),
            }
        }
        if clients.is_empty() {
            return Err(ClientError::Nats {
                message: format!("none of {} configured relays could be reached", urls.len()),
            });
        }
        Ok(Self {
            clients,
            prefix: prefix.to_owned(),
        })
    }

    /// Number of connected servers.
    pub const fn relay_count(&self) -> usize {
        self.clients.len()
    }

    async fn publish_inner(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let payload = envelope.to_json()?;
        let subject = event_subject(&self.prefix, envelope.kind);
        let mut delivered = 0_usize;
        let mut last_error = None;
        for client in &self.clients {
            let sent = client
                .publish(subject.clone(), payload.clone().into())
                .await
                .map_err(|e| e.to_string());
            let flushed = match sent {
                Ok(()) => client.flush().await.map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };
            match flushed {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(e) => {
                    debug!(subject = %subject, error = %e, "Publish to one relay failed");
                    last_error = Some(e);
                }
            }
        }
        match (delivered, last_error) {
            (0, Some(e)) => Err(TransportError::Unavailable(e)),
            _ => Ok(()),
        }
    }

    async fn subscribe_inner(
        &self,
        filter: &SubscriptionFilter,
        sink: &mpsc::Sender<Inbound>,
    ) -> Result<Subscription, TransportError> {
        let subject = wildcard_subject(&self.prefix);
        let mut tasks = Vec::with_capacity(self.clients.len());
        for client in &self.clients {
            let mut subscriber = client
                .subscribe(subject.clone())
                .await
                .map_err(|e| TransportError::Unavailable(format!("failed to subscribe to {subject}: {e}")))?;
            let sink = sink.clone();
            let filter = filter.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(message) = subscriber.next().await {
                    let envelope = match Envelope::from_json(&message.payload) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            warn!(subject = %message.subject, error = %e, "Dropping unreadable envelope");
                            continue;
                        }
                    };
                    if !filter.matches(&envelope) {
                        continue;
                    }
                    if sink.send(Inbound::Event(envelope)).await.is_err() {
                        return;
                    }
                }
                debug!("Relay subscription stream ended");
            }));
        }
        sink.send(Inbound::EndOfStoredEvents)
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok(Subscription::new(tasks))
    }
}

impl Relay for NatsRelay {
    fn publish(&self, envelope: Envelope) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move { self.publish_inner(&envelope).await })
    }

    fn subscribe(
        &self,
        filter: SubscriptionFilter,
        sink: mpsc::Sender<Inbound>,
    ) -> BoxFuture<'_, Result<Subscription, TransportError>> {
        Box::pin(async move { self.subscribe_inner(&filter, &sink).await })
    }
}
