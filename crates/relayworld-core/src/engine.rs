//! The reconciliation engine.
//!
//! [`Engine`] is the single owner of the world store. Inbound envelopes,
//! local actions, and lifecycle ticks all pass through it one at a time;
//! the client loop in [`crate::runner`] serializes them.
//!
//! # Inbound path
//!
//! 1. Decode and validate the envelope. Invalid events are dropped and
//!    logged.
//! 2. Drop ids already applied.
//! 3. Echoes of our own events confirm the optimistic state.
//! 4. Everything else is reconciled. Events that reference an entity not
//!    yet seen wait in a bounded buffer and are retried when it appears.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use relayworld_events::{
    CodecLimits, DomainEvent, Envelope, EventBody, EventKind, IdempotencyFilter, decode, encode,
};
use relayworld_types::{ActorId, EventId, PlayerPresence};
use relayworld_world::{GatherSession, seed_nodes};

use crate::config::ClientConfig;
use crate::error::PreconditionFailure;
use crate::notify::{Change, Notice, Presenter};
use crate::reconcile::{self, Effect, ReconcileRules, Skip};
use crate::store::{WorldStats, WorldStore};
use crate::transport::Inbound;

/// What happened to one inbound item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// The event was reconciled into the store.
    Applied,
    /// The event was the echo of a local optimistic event.
    Confirmed,
    /// The event id had already been applied.
    Duplicate,
    /// The event waits for an entity it references.
    Deferred,
    /// The event was valid but had no effect on the local model.
    Refused(String),
    /// The envelope failed validation.
    Invalid(String),
    /// The relay finished replaying stored events.
    CaughtUp,
}

/// Engine-level counters for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    /// Entity counts.
    pub world: WorldStats,
    /// Event ids currently remembered as applied.
    pub applied: usize,
    /// Local events whose echo has not arrived.
    pub pending: usize,
    /// Events waiting for their target.
    pub deferred: usize,
    /// Lifecycle ticks run.
    pub ticks: u64,
}

/// The client's exclusively owned world and reconciliation state.
pub struct Engine {
    pub(crate) actor: ActorId,
    pub(crate) config: ClientConfig,
    limits: CodecLimits,
    pub(crate) rules: ReconcileRules,
    pub(crate) store: WorldStore,
    applied: IdempotencyFilter,
    pending: IdempotencyFilter,
    deferred: VecDeque<DomainEvent>,
    pub(crate) gather: Option<GatherSession>,
    presenter: Box<dyn Presenter>,
    caught_up: bool,
    pub(crate) ticks: u64,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("actor", &self.actor)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine for `config`, seeding the world's resource nodes and
    /// placing the local actor at the configured spawn point.
    pub fn new(config: ClientConfig, presenter: Box<dyn Presenter>, now: DateTime<Utc>) -> Self {
        let actor = config.actor();
        let resources = config.resource_rules();
        let mut store = WorldStore::new(config.world.grid_cell_size);
        store.seed_nodes(seed_nodes(&config.seed_layout(), &resources));
        store.record_presence(PlayerPresence {
            actor: actor.clone(),
            position: config.identity.spawn(),
            // Whole seconds, like every event timestamp.
            seen_at: DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now),
        });

        info!(
            actor = %actor,
            seed = resources.seed,
            nodes = store.nodes().len(),
            policy = ?config.reconcile.conflict_policy,
            "Engine initialized"
        );

        Self {
            rules: ReconcileRules {
                local: actor.clone(),
                policy: config.reconcile.conflict_policy,
                resources,
            },
            limits: config.codec_limits(),
            applied: IdempotencyFilter::new(config.reconcile.dedup_capacity),
            pending: IdempotencyFilter::new(config.reconcile.pending_capacity),
            deferred: VecDeque::new(),
            gather: None,
            presenter,
            caught_up: false,
            ticks: 0,
            store,
            actor,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The local actor.
    pub const fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// The reconciled world.
    pub const fn store(&self) -> &WorldStore {
        &self.store
    }

    /// The configuration the engine was built from.
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The local gather session, if one is running or just finished.
    pub const fn gather(&self) -> Option<&GatherSession> {
        self.gather.as_ref()
    }

    /// Whether the relay has finished replaying stored events.
    pub const fn is_caught_up(&self) -> bool {
        self.caught_up
    }

    /// Whether `id` is a local event still awaiting its echo.
    pub fn is_pending(&self, id: &EventId) -> bool {
        self.pending.contains(id)
    }

    /// Counters for logging.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            world: self.store.stats(),
            applied: self.applied.len(),
            pending: self.pending.len(),
            deferred: self.deferred.len(),
            ticks: self.ticks,
        }
    }

    // -----------------------------------------------------------------------
    // Inbound path
    // -----------------------------------------------------------------------

    /// Process one item from a relay subscription.
    pub fn handle_inbound(&mut self, inbound: Inbound, now: DateTime<Utc>) -> InboundOutcome {
        match inbound {
            Inbound::Event(envelope) => self.handle_envelope(&envelope, now),
            Inbound::EndOfStoredEvents => {
                if !self.caught_up {
                    self.caught_up = true;
                    let stats = self.stats();
                    info!(
                        structures = stats.world.structures,
                        claims = stats.world.claims,
                        guilds = stats.world.guilds,
                        deferred = stats.deferred,
                        "Caught up with stored events"
                    );
                    self.presenter.on_notice(&Notice::CaughtUp);
                }
                InboundOutcome::CaughtUp
            }
        }
    }

    /// Validate and reconcile one envelope.
    pub fn handle_envelope(&mut self, envelope: &Envelope, now: DateTime<Utc>) -> InboundOutcome {
        let event = match decode(envelope, &self.limits, now) {
            Ok(event) => event,
            Err(e) => {
                warn!(id = %envelope.id, kind = envelope.kind, error = %e, "Dropped invalid event");
                return InboundOutcome::Invalid(e.to_string());
            }
        };

        if self.applied.contains(&event.id) {
            debug!(id = %event.id, "Duplicate event ignored");
            return InboundOutcome::Duplicate;
        }

        if self.pending.remove(&event.id) {
            self.applied.insert(event.id);
            let effects = reconcile::confirm(&mut self.store, &event);
            self.emit(effects);
            debug!(id = %event.id, kind = %event.kind(), "Local event confirmed");
            return InboundOutcome::Confirmed;
        }

        if self.deferred.iter().any(|e| e.id == event.id) {
            return InboundOutcome::Deferred;
        }

        let outcome = self.reconcile(event, now);
        if outcome == InboundOutcome::Applied {
            self.retry_deferred(now);
        }
        outcome
    }

    fn reconcile(&mut self, event: DomainEvent, now: DateTime<Utc>) -> InboundOutcome {
        match reconcile::apply(&mut self.store, &event, &self.rules, now) {
            Ok(effects) => {
                self.applied.insert(event.id);
                debug!(
                    id = %event.id,
                    kind = %event.kind(),
                    actor = %event.actor,
                    changes = effects.len(),
                    "Event applied"
                );
                self.emit(effects);
                InboundOutcome::Applied
            }
            Err(Skip::MissingTarget) => {
                debug!(id = %event.id, kind = %event.kind(), "Event deferred until its target appears");
                self.park(event);
                InboundOutcome::Deferred
            }
            Err(Skip::Refused(reason)) => {
                self.applied.insert(event.id);
                warn!(id = %event.id, kind = %event.kind(), actor = %event.actor, %reason, "Event had no effect");
                InboundOutcome::Refused(reason)
            }
        }
    }

    fn park(&mut self, event: DomainEvent) {
        let capacity = self.config.reconcile.deferred_capacity.max(1);
        while self.deferred.len() >= capacity {
            if let Some(dropped) = self.deferred.pop_front() {
                warn!(id = %dropped.id, kind = %dropped.kind(), "Deferred buffer full, event dropped");
            }
        }
        self.deferred.push_back(event);
    }

    /// Retry parked events until a pass makes no progress.
    fn retry_deferred(&mut self, now: DateTime<Utc>) {
        loop {
            let waiting = std::mem::take(&mut self.deferred);
            let before = waiting.len();
            for event in waiting {
                // Applied events re-park themselves on a miss.
                let _ = self.reconcile(event, now);
            }
            if self.deferred.is_empty() || self.deferred.len() == before {
                break;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Outbound path
    // -----------------------------------------------------------------------

    /// Encode local events and remember their ids as pending.
    ///
    /// Nothing is recorded unless every event encodes.
    pub(crate) fn seal(&mut self, events: &[DomainEvent]) -> Result<Vec<Envelope>, PreconditionFailure> {
        let envelopes = events
            .iter()
            .map(encode)
            .collect::<Result<Vec<_>, _>>()?;
        for event in events {
            self.pending.insert(event.id);
        }
        Ok(envelopes)
    }

    /// Stamp a local event.
    pub(crate) fn event(&self, body: EventBody, now: DateTime<Utc>) -> DomainEvent {
        DomainEvent::new(self.actor.clone(), now, body)
    }

    /// Tell the presenter a local action was refused.
    pub fn report_rejection(&mut self, action: &'static str, reason: &PreconditionFailure) {
        info!(action, %reason, "Local action rejected");
        self.presenter.on_notice(&Notice::Rejected {
            action,
            reason: reason.to_string(),
        });
    }

    /// Report a failed broadcast. The optimistic state stands, but no echo
    /// is expected any more.
    pub fn report_publish_failure(&mut self, event: EventId, kind: EventKind, reason: String) {
        self.pending.remove(&event);
        warn!(id = %event, kind = %kind, %reason, "Publish failed");
        self.presenter.on_notice(&Notice::PublishFailed { event, kind, reason });
    }

    // -----------------------------------------------------------------------
    // Presentation
    // -----------------------------------------------------------------------

    pub(crate) fn emit(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Change(change) => self.presenter.on_change(&change),
                Effect::Notice(notice) => self.presenter.on_notice(&notice),
            }
        }
    }

    pub(crate) fn changed(&mut self, change: &Change) {
        self.presenter.on_change(change);
    }

    pub(crate) fn notice(&mut self, notice: &Notice) {
        self.presenter.on_notice(notice);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use relayworld_events::{GuildAction, PlayerMoved};
    use relayworld_types::GuildId;

    use super::*;
    use crate::actions::LocalAction;
    use crate::notify::{NoOpPresenter, RecordingPresenter};

    fn make_engine(actor: &str) -> Engine {
        let mut config = ClientConfig::default();
        config.identity.actor = actor.to_owned();
        Engine::new(config, Box::new(NoOpPresenter), Utc::now())
    }

    fn envelope_from(actor: &str, at: DateTime<Utc>, body: EventBody) -> Envelope {
        encode(&DomainEvent::new(ActorId::new(actor), at, body)).unwrap()
    }

    #[test]
    fn replaying_an_event_is_idempotent() {
        let mut engine = make_engine("alice");
        let now = Utc::now();
        let moved = envelope_from("bob", now, EventBody::PlayerMoved(PlayerMoved { x: 1.0, y: 2.0 }));
        assert_eq!(engine.handle_envelope(&moved, now), InboundOutcome::Applied);
        let before = engine.stats();
        assert_eq!(engine.handle_envelope(&moved, now), InboundOutcome::Duplicate);
        assert_eq!(engine.stats(), before);
    }

    #[test]
    fn failed_publishes_stop_waiting_for_an_echo() {
        let mut engine = make_engine("alice");
        let now = Utc::now();
        for step in 0..100_u32 {
            let at = now + Duration::seconds(i64::from(step));
            let sent = engine
                .submit(LocalAction::MoveTo { x: f64::from(step), y: 1.0 }, at)
                .unwrap();
            for envelope in &sent {
                let id = envelope.id.parse::<EventId>().unwrap();
                assert!(engine.is_pending(&id));
                engine.report_publish_failure(id, EventKind::PlayerMoved, "offline".to_owned());
                assert!(!engine.is_pending(&id));
            }
        }
        assert_eq!(engine.stats().pending, 0);
    }

    #[test]
    fn unanswered_echoes_are_bounded() {
        let mut config = ClientConfig::default();
        config.reconcile.pending_capacity = 8;
        let mut engine = Engine::new(config, Box::new(NoOpPresenter), Utc::now());
        let now = Utc::now();
        for step in 0..20_u32 {
            let at = now + Duration::seconds(i64::from(step));
            engine
                .submit(LocalAction::MoveTo { x: 1.0, y: f64::from(step) }, at)
                .unwrap();
        }
        assert_eq!(engine.stats().pending, 8);
    }

    #[test]
    fn invalid_envelopes_are_dropped() {
        let mut engine = make_engine("alice");
        let now = Utc::now();
        let mut bad = envelope_from("bob", now, EventBody::PlayerMoved(PlayerMoved { x: 1.0, y: 2.0 }));
        bad.kind = 1;
        assert!(matches!(engine.handle_envelope(&bad, now), InboundOutcome::Invalid(_)));
    }

    #[test]
    fn deferred_events_apply_once_target_appears() {
        let mut engine = make_engine("alice");
        let now = Utc::now();
        let guild = GuildId::new();
        let join = envelope_from(
            "bob",
            now,
            EventBody::Guild {
                guild_id: guild,
                action: GuildAction::Join,
            },
        );
        let create = envelope_from(
            "carol",
            now - Duration::seconds(5),
            EventBody::Guild {
                guild_id: guild,
                action: GuildAction::Create {
                    name: "Smiths".to_owned(),
                },
            },
        );
        assert_eq!(engine.handle_envelope(&join, now), InboundOutcome::Deferred);
        assert_eq!(engine.handle_envelope(&join, now), InboundOutcome::Deferred);
        assert_eq!(engine.stats().deferred, 1);

        assert_eq!(engine.handle_envelope(&create, now), InboundOutcome::Applied);
        assert_eq!(engine.stats().deferred, 0);
        assert!(engine.store().guilds().is_member(&guild, &ActorId::new("bob")));
        assert_eq!(engine.handle_envelope(&join, now), InboundOutcome::Duplicate);
    }

    #[test]
    fn end_of_stored_events_is_announced_once() {
        let recorder = RecordingPresenter::new();
        let mut engine = Engine::new(ClientConfig::default(), Box::new(recorder.clone()), Utc::now());
        let now = Utc::now();
        assert!(!engine.is_caught_up());
        engine.handle_inbound(Inbound::EndOfStoredEvents, now);
        engine.handle_inbound(Inbound::EndOfStoredEvents, now);
        assert!(engine.is_caught_up());
        assert_eq!(recorder.notices(), vec![Notice::CaughtUp]);
    }

    #[test]
    fn engine_seeds_nodes_and_spawns_local_actor() {
        let engine = make_engine("alice");
        assert_eq!(engine.store().nodes().len(), 50);
        assert!(engine.store().position_of(&ActorId::new("alice")).is_some());
    }
}
