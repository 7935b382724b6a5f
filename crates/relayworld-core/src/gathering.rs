//! Local gathering and the per-tick lifecycle pass.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use relayworld_events::{Envelope, EventBody, ResourceGathered, ResourceNodeUpdated};
use relayworld_ledger::inventory;
use relayworld_types::{EntityKind, Position, ResourceNodeId};
use relayworld_world::{CancelReason, GatherSession, GatherState, WorldError, resource};

use crate::engine::Engine;
use crate::error::PreconditionFailure;
use crate::notify::{Change, Notice};
use crate::scheduler;

impl Engine {
    /// Begin gathering `node`. Any gather already running is abandoned.
    pub(crate) fn start_gather(
        &mut self,
        node: &ResourceNodeId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        let target = self
            .store
            .node(node)
            .ok_or_else(|| WorldError::NodeNotFound(node.clone()))?;
        let position = self.local_position();
        let session = GatherSession::start(target, position, &self.rules.resources, now)?;

        if let Some(mut previous) = self.gather.take()
            && !previous.is_finished()
        {
            previous.cancel();
            self.notice(&Notice::GatherCancelled {
                node: previous.node().clone(),
                reason: CancelReason::Abandoned,
            });
        }
        debug!(node = %node, state = ?session.state(), "Gather started");
        self.gather = Some(session);
        Ok(Vec::new())
    }

    /// Abandon the running gather.
    pub(crate) fn cancel_gather(&mut self) -> Result<Vec<Envelope>, PreconditionFailure> {
        let Some(session) = self.gather.as_mut().filter(|s| !s.is_finished()) else {
            return Err(PreconditionFailure::NoActiveGather);
        };
        session.cancel();
        let node = session.node().clone();
        self.gather = None;
        self.notice(&Notice::GatherCancelled {
            node,
            reason: CancelReason::Abandoned,
        });
        Ok(Vec::new())
    }

    /// Run one lifecycle tick: advance the local gather, then the
    /// respawn, expiry, and decay sweeps.
    ///
    /// Returns envelopes to publish when a gather completed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Envelope> {
        self.ticks = self.ticks.saturating_add(1);
        let envelopes = self.advance_gather(now);

        let report = scheduler::run_sweeps(
            &mut self.store,
            now,
            &self.rules.resources,
            self.config.structures.decay_enabled,
        );
        if !report.is_empty() {
            debug!(
                respawned = report.respawned.len(),
                expired = report.expired.len(),
                decayed = report.decayed.len(),
                "Lifecycle sweep"
            );
        }
        for node in report.respawned {
            self.changed(&Change::updated(EntityKind::ResourceNode, node));
        }
        for region in report.expired {
            self.changed(&Change::removed(EntityKind::LandClaim, region));
        }
        for structure in report.decayed {
            self.changed(&Change::removed(EntityKind::Structure, structure));
        }

        let every = self.config.scheduler.stats_every_ticks;
        if self.ticks.checked_rem(every) == Some(0) {
            let stats = self.stats();
            info!(
                tick = stats.ticks,
                structures = stats.world.structures,
                optimistic = stats.world.optimistic_structures,
                claims = stats.world.claims,
                nodes_available = stats.world.nodes_available,
                nodes_depleted = stats.world.nodes_depleted,
                guilds = stats.world.guilds,
                players = stats.world.players,
                pending = stats.pending,
                deferred = stats.deferred,
                "World stats"
            );
        }
        envelopes
    }

    fn advance_gather(&mut self, now: DateTime<Utc>) -> Vec<Envelope> {
        let position = self.local_position();
        let Some(session) = self.gather.as_mut().filter(|s| !s.is_finished()) else {
            return Vec::new();
        };
        let node_id = session.node().clone();
        let state = match session.tick(self.store.node(&node_id), position, &self.rules.resources, now) {
            Ok(state) => state,
            Err(e) => {
                warn!(node = %node_id, error = %e, "Gather session out of step");
                self.gather = None;
                return Vec::new();
            }
        };

        match state {
            GatherState::Completed { amount } => {
                self.gather = None;
                match self.complete_gather(&node_id, amount, now) {
                    Ok(envelopes) => envelopes,
                    Err(e) => {
                        warn!(node = %node_id, error = %e, "Gather could not be completed");
                        self.notice(&Notice::Rejected {
                            action: "gather",
                            reason: e.to_string(),
                        });
                        Vec::new()
                    }
                }
            }
            GatherState::Cancelled(reason) => {
                self.gather = None;
                info!(node = %node_id, ?reason, "Gather cancelled");
                self.notice(&Notice::GatherCancelled {
                    node: node_id,
                    reason,
                });
                Vec::new()
            }
            GatherState::Idle | GatherState::InProgress { .. } => Vec::new(),
        }
    }

    /// Credit the yield, deplete the node, and emit the three records of a
    /// finished gather.
    fn complete_gather(
        &mut self,
        node_id: &ResourceNodeId,
        amount: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        let node = self
            .store
            .node(node_id)
            .ok_or_else(|| WorldError::NodeNotFound(node_id.clone()))?;
        let (kind, position) = (node.resource, node.position);
        let respawn_at = now
            .checked_add_signed(self.rules.resources.respawn_delay)
            .ok_or(WorldError::ArithmeticOverflow)?;

        let mut holdings = self.holdings();
        inventory::add_resource(&mut holdings, kind, amount)?;

        let events = [
            self.event(
                EventBody::ResourceNodeUpdated(ResourceNodeUpdated {
                    resource_id: node_id.clone(),
                    depleted: true,
                    respawn_at: Some(respawn_at),
                }),
                now,
            ),
            self.event(
                EventBody::ResourceGathered(ResourceGathered {
                    resource_id: node_id.clone(),
                    resource: kind,
                    amount,
                    x: position.x,
                    y: position.y,
                }),
                now,
            ),
            self.inventory_event(&holdings, now),
        ];
        let envelopes = self.seal(&events)?;

        if let Some(node) = self.store.node_mut(node_id) {
            resource::deplete(node, respawn_at);
        }
        self.changed(&Change::updated(EntityKind::ResourceNode, node_id.clone()));
        self.commit_inventory(holdings, now);
        info!(node = %node_id, resource = %kind, amount, respawn_at = %respawn_at, "Gather completed");
        self.notice(&Notice::GatherCompleted {
            node: node_id.clone(),
            amount,
        });
        Ok(envelopes)
    }

    fn local_position(&self) -> Position {
        self.store
            .position_of(&self.actor)
            .unwrap_or_else(|| self.config.identity.spawn())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use relayworld_events::EventKind;
    use relayworld_types::{NodeState, Resource};
    use relayworld_world::fixed_node;

    use super::*;
    use crate::actions::LocalAction;
    use crate::config::ClientConfig;
    use crate::notify::RecordingPresenter;

    fn engine_with_node(amount: u32) -> (Engine, RecordingPresenter, ResourceNodeId) {
        let recorder = RecordingPresenter::new();
        let now = Utc::now();
        let mut config = ClientConfig::default();
        config.identity.actor = "alice".to_owned();
        config.identity.spawn_x = 100.0;
        config.identity.spawn_y = 100.0;
        let mut engine = Engine::new(config, Box::new(recorder.clone()), now);
        let rules = engine.rules.resources.clone();
        let mut node = fixed_node(Resource::Wood, 0, Position::new(110.0, 100.0), &rules, now);
        node.state = NodeState::Available { amount };
        let id = node.id.clone();
        engine.store.seed_nodes([node]);
        (engine, recorder, id)
    }

    #[test]
    fn completed_gather_credits_yield_and_depletes() {
        let (mut engine, recorder, node) = engine_with_node(2);
        let now = Utc::now();
        engine
            .submit(LocalAction::StartGather { resource_id: node.clone() }, now)
            .unwrap();
        assert!(engine.tick(now + Duration::seconds(1)).is_empty());

        let done = now + Duration::seconds(3);
        let envelopes = engine.tick(done);
        let kinds: Vec<u32> = envelopes.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ResourceNodeUpdated.code(),
                EventKind::ResourceGathered.code(),
                EventKind::InventoryUpdated.code(),
            ]
        );
        assert_eq!(engine.holdings().get(&Resource::Wood), Some(&2));
        assert_eq!(
            engine.store().node(&node).unwrap().state,
            NodeState::Depleted {
                respawn_at: done + Duration::seconds(300)
            }
        );
        assert!(recorder.notices().contains(&Notice::GatherCompleted { node: node.clone(), amount: 2 }));

        // Depleted until the respawn time, then available with a fresh roll.
        engine.tick(done + Duration::seconds(299));
        assert!(engine.store().node(&node).unwrap().is_depleted());
        engine.tick(done + Duration::seconds(300));
        let amount = engine.store().node(&node).unwrap().available_amount().unwrap();
        assert!((1..=3).contains(&amount));
    }

    #[test]
    fn moving_away_cancels_the_gather() {
        let (mut engine, recorder, node) = engine_with_node(2);
        let now = Utc::now();
        engine
            .submit(LocalAction::StartGather { resource_id: node.clone() }, now)
            .unwrap();
        engine
            .submit(LocalAction::MoveTo { x: 900.0, y: 900.0 }, now + Duration::seconds(1))
            .unwrap();
        assert!(engine.tick(now + Duration::seconds(2)).is_empty());
        assert!(engine.gather().is_none());
        assert!(recorder.notices().contains(&Notice::GatherCancelled {
            node,
            reason: CancelReason::OutOfRange,
        }));
        assert!(engine.holdings().is_empty());
    }

    #[test]
    fn cancel_without_gather_is_rejected() {
        let (mut engine, _, _) = engine_with_node(2);
        assert!(matches!(
            engine.submit(LocalAction::CancelGather, Utc::now()),
            Err(PreconditionFailure::NoActiveGather)
        ));
    }

    #[test]
    fn gather_out_of_range_is_rejected() {
        let (mut engine, _, node) = engine_with_node(2);
        let now = Utc::now();
        engine
            .submit(LocalAction::MoveTo { x: 500.0, y: 500.0 }, now + Duration::seconds(1))
            .unwrap();
        let result = engine.submit(LocalAction::StartGather { resource_id: node }, now);
        assert!(matches!(
            result,
            Err(PreconditionFailure::World(WorldError::OutOfRange { .. }))
        ));
    }
}
