//! Lifecycle schedulers.
//!
//! Each sweep is a pure function of the store and a clock reading. Every
//! client runs them independently and nothing they do is broadcast.

use chrono::{DateTime, Utc};
use tracing::debug;

use relayworld_types::{RegionId, ResourceNodeId, StructureId};
use relayworld_world::{ResourceRules, is_destroyed, land, resource};

use crate::store::WorldStore;

/// What one round of sweeps changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Nodes that became available again.
    pub respawned: Vec<ResourceNodeId>,
    /// Regions whose claim lapsed.
    pub expired: Vec<RegionId>,
    /// Structures removed because their health reached zero.
    pub decayed: Vec<StructureId>,
}

impl SweepReport {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.respawned.is_empty() && self.expired.is_empty() && self.decayed.is_empty()
    }
}

/// Respawn every depleted node whose `respawn_at` has passed.
pub fn respawn_nodes(
    store: &mut WorldStore,
    now: DateTime<Utc>,
    rules: &ResourceRules,
) -> Vec<ResourceNodeId> {
    let mut respawned = Vec::new();
    for node in store.nodes_mut() {
        if let Some(amount) = resource::respawn_if_due(node, now, rules) {
            debug!(node = %node.id, amount, "Node respawned");
            respawned.push(node.id.clone());
        }
    }
    respawned
}

/// Drop every claim that has lapsed.
pub fn expire_claims(store: &mut WorldStore, now: DateTime<Utc>) -> Vec<RegionId> {
    let expired = land::expired_regions(store.claims(), now);
    for region in &expired {
        if let Some(claim) = store.remove_claim(*region) {
            debug!(region = %region, owner = %claim.owner, "Claim expired");
        }
    }
    expired
}

/// Remove every structure whose health has decayed to zero.
pub fn decay_structures(store: &mut WorldStore, now: DateTime<Utc>) -> Vec<StructureId> {
    let destroyed: Vec<StructureId> = store
        .structures()
        .values()
        .filter(|s| is_destroyed(s, now))
        .map(|s| s.id)
        .collect();
    for id in &destroyed {
        if store.remove_structure(id).is_some() {
            debug!(structure = %id, "Structure decayed");
        }
    }
    destroyed
}

/// Run every sweep once.
pub fn run_sweeps(
    store: &mut WorldStore,
    now: DateTime<Utc>,
    rules: &ResourceRules,
    decay_enabled: bool,
) -> SweepReport {
    SweepReport {
        respawned: respawn_nodes(store, now, rules),
        expired: expire_claims(store, now),
        decayed: if decay_enabled {
            decay_structures(store, now)
        } else {
            Vec::new()
        },
    }
}
