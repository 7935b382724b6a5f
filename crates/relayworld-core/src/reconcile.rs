//! Reconciliation of validated events into the world store.
//!
//! [`apply`] turns one [`DomainEvent`] into store mutations and the
//! [`Effect`]s the presentation layer should hear about. It is called for
//! every event that reaches the client from a relay, except echoes of the
//! client's own optimistic events, which go through [`confirm`] instead.
//!
//! Exclusive resources (a region, a patch of ground) are settled with the
//! configured [`ConflictPolicy`]. Timed transitions are never driven from
//! here; see [`crate::scheduler`].

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use relayworld_events::{
    DomainEvent, EventBody, GuildAction, LandClaimed, ResourceNodeUpdated, StructureChange,
    StructurePlaced,
};
use relayworld_ledger::{GuildChange, GuildOp, LedgerError, OpContext};
use relayworld_types::{
    ActorId, EntityKind, GuildId, LandClaim, NodeState, PlayerPresence, Position, Provenance,
    ResourceNode, Structure, StructurePermissions,
};
use relayworld_world::{
    Aabb, ConflictPolicy, Contender, Resolution, ResourceRules, health_at, max_health, resolve,
    resource, structure,
};

use crate::notify::{Change, Notice};
use crate::store::WorldStore;

/// Parameters the reconciler needs beyond the store.
#[derive(Debug, Clone)]
pub struct ReconcileRules {
    /// The local actor, for rollback notices and signal delivery.
    pub local: ActorId,
    /// How contested regions and placements are settled.
    pub policy: ConflictPolicy,
    /// Node lifecycle parameters.
    pub resources: ResourceRules,
}

/// Something the presentation layer should hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// An entity changed.
    Change(Change),
    /// A notice was raised.
    Notice(Notice),
}

/// Why an event was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// The event references an entity this client has not seen yet.
    MissingTarget,
    /// The event contradicts the local model and was dropped.
    Refused(String),
}

/// Map a wire guild action onto the ledger operation.
pub fn guild_op(action: &GuildAction) -> GuildOp {
    match action {
        GuildAction::Create { name } => GuildOp::Create { name: name.clone() },
        GuildAction::Join => GuildOp::Join,
        GuildAction::Leave => GuildOp::Leave,
        GuildAction::Promote { member } => GuildOp::Promote {
            member: member.clone(),
        },
        GuildAction::Demote { member } => GuildOp::Demote {
            member: member.clone(),
        },
        GuildAction::Disband => GuildOp::Disband,
        GuildAction::ClaimTerritory { region } => GuildOp::ClaimTerritory { region: *region },
        GuildAction::Deposit { resource, quantity } => GuildOp::Deposit {
            resource: *resource,
            quantity: *quantity,
        },
        GuildAction::Withdraw { resource, quantity } => GuildOp::Withdraw {
            resource: *resource,
            quantity: *quantity,
        },
    }
}

/// Build the structure a placement event describes.
pub(crate) fn structure_from(
    event: &DomainEvent,
    placed: &StructurePlaced,
    provenance: Provenance,
) -> Structure {
    let blueprint = structure::blueprint(placed.structure_type);
    Structure {
        id: placed.structure_id,
        structure_type: placed.structure_type,
        owner: event.actor.clone(),
        position: placed.position(),
        rotation: placed.rotation,
        footprint: placed.footprint(),
        material: placed.material,
        max_health: max_health(placed.structure_type, placed.material),
        decay_per_hour: blueprint.decay_per_hour,
        placed_at: event.created_at,
        permissions: StructurePermissions::default(),
        open: false,
        provenance,
        origin_event: event.id,
    }
}

/// Build the claim a land-claimed event describes.
pub(crate) fn claim_from(event: &DomainEvent, claimed: &LandClaimed, provenance: Provenance) -> LandClaim {
    LandClaim {
        region: claimed.region,
        owner: event.actor.clone(),
        expires_at: claimed.expiry,
        payment_proof: claimed.payment_proof.clone(),
        claimed_at: event.created_at,
        origin_event: event.id,
        provenance,
    }
}

/// The notification for a ledger outcome, if any.
pub(crate) fn guild_change(guild: GuildId, change: GuildChange) -> Option<Change> {
    match change {
        GuildChange::Created => Some(Change::added(EntityKind::Guild, guild)),
        GuildChange::Updated => Some(Change::updated(EntityKind::Guild, guild)),
        GuildChange::Disbanded => Some(Change::removed(EntityKind::Guild, guild)),
        GuildChange::Unchanged => None,
    }
}

const fn challenger(event: &DomainEvent) -> Contender {
    Contender {
        created_at: event.created_at,
        event: event.id,
        provenance: Provenance::Confirmed,
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Apply a remote event to the store.
///
/// # Errors
///
/// Returns [`Skip::MissingTarget`] when the event should be retried once
/// its target appears, and [`Skip::Refused`] when it has no effect.
pub fn apply(
    store: &mut WorldStore,
    event: &DomainEvent,
    rules: &ReconcileRules,
    now: DateTime<Utc>,
) -> Result<Vec<Effect>, Skip> {
    match &event.body {
        EventBody::StructurePlaced(placed) => place_structure(store, event, placed, rules),
        EventBody::StructureRemoved(removed) => {
            let id = removed.structure_id;
            let existing = store.structure(&id).ok_or(Skip::MissingTarget)?;
            if existing.owner != event.actor && health_at(existing, now) > 0 {
                return Err(Skip::Refused(format!(
                    "{} may not remove structure {id}",
                    event.actor
                )));
            }
            store.remove_structure(&id);
            Ok(vec![Effect::Change(Change::removed(EntityKind::Structure, id))])
        }
        EventBody::StructureUpdated(updated) => {
            let id = updated.structure_id;
            let existing = store.structure_mut(&id).ok_or(Skip::MissingTarget)?;
            match &updated.change {
                StructureChange::DoorToggled { open } => {
                    if !existing.structure_type.is_door() {
                        return Err(Skip::Refused(format!("structure {id} is not a door")));
                    }
                    if existing.open == *open {
                        return Ok(Vec::new());
                    }
                    existing.open = *open;
                }
                StructureChange::PermissionsChanged {
                    whitelist,
                    guilds,
                    public,
                } => {
                    if existing.owner != event.actor {
                        return Err(Skip::Refused(format!(
                            "{} may not change permissions of {id}",
                            event.actor
                        )));
                    }
                    existing.permissions = StructurePermissions {
                        whitelist: whitelist.clone(),
                        guilds: guilds.clone(),
                        public: *public,
                    };
                }
            }
            Ok(vec![Effect::Change(Change::updated(EntityKind::Structure, id))])
        }
        EventBody::LandClaimed(claimed) => claim_land(store, event, claimed, rules, now),
        EventBody::ResourceNodeUpdated(update) => update_node(store, event, update, rules, now),
        EventBody::ResourceGathered(gathered) => {
            let node = store
                .node_mut(&gathered.resource_id)
                .ok_or_else(|| Skip::Refused(format!("unknown node {}", gathered.resource_id)))?;
            let respawn_at = bounded_respawn(event.created_at, rules, now);
            if deplete_at(node, event.created_at, respawn_at, &rules.resources) {
                Ok(vec![Effect::Change(Change::updated(
                    EntityKind::ResourceNode,
                    &gathered.resource_id,
                ))])
            } else {
                Ok(Vec::new())
            }
        }
        EventBody::InventoryUpdated(update) => {
            let inventory = store.inventory_mut(&event.actor);
            if inventory.updated_at.is_some_and(|t| t > event.created_at) {
                debug!(actor = %event.actor, "Stale inventory update ignored");
                return Ok(Vec::new());
            }
            inventory.resources.clone_from(&update.resources);
            inventory.updated_at = Some(event.created_at);
            Ok(vec![Effect::Change(Change::updated(EntityKind::Inventory, &event.actor))])
        }
        EventBody::Guild { guild_id, action } => {
            let ctx = OpContext {
                actor: event.actor.clone(),
                event: event.id,
                created_at: event.created_at,
            };
            match store.guilds_mut().apply(&ctx, *guild_id, &guild_op(action)) {
                Ok(change) => Ok(guild_change(*guild_id, change)
                    .map(Effect::Change)
                    .into_iter()
                    .collect()),
                Err(LedgerError::GuildNotFound(_)) => Err(Skip::MissingTarget),
                Err(e) => Err(Skip::Refused(e.to_string())),
            }
        }
        EventBody::PlayerMoved(moved) => {
            let known = store.presence(&event.actor).is_some();
            let recorded = store.record_presence(PlayerPresence {
                actor: event.actor.clone(),
                position: Position::new(moved.x, moved.y),
                seen_at: event.created_at,
            });
            if !recorded {
                return Ok(Vec::new());
            }
            let change = if known {
                Change::updated(EntityKind::Player, &event.actor)
            } else {
                Change::added(EntityKind::Player, &event.actor)
            };
            Ok(vec![Effect::Change(change)])
        }
        EventBody::Signal(signal) => {
            if signal.recipient != rules.local {
                return Ok(Vec::new());
            }
            Ok(vec![Effect::Notice(Notice::Signal {
                from: event.actor.clone(),
                payload: signal.payload.clone(),
            })])
        }
    }
}

/// Mark the optimistic entity created by one of our own events confirmed.
///
/// Only structures and land claims carry provenance. If the entity has
/// since been displaced the echo changes nothing.
pub fn confirm(store: &mut WorldStore, event: &DomainEvent) -> Vec<Effect> {
    match &event.body {
        EventBody::StructurePlaced(placed) => {
            let id = placed.structure_id;
            match store.structure_mut(&id) {
                Some(s) if s.origin_event == event.id && s.provenance == Provenance::Optimistic => {
                    s.provenance = Provenance::Confirmed;
                    vec![Effect::Change(Change::updated(EntityKind::Structure, id))]
                }
                _ => Vec::new(),
            }
        }
        EventBody::LandClaimed(claimed) => match store.claim_mut(claimed.region) {
            Some(c) if c.origin_event == event.id && c.provenance == Provenance::Optimistic => {
                c.provenance = Provenance::Confirmed;
                vec![Effect::Change(Change::updated(EntityKind::LandClaim, claimed.region))]
            }
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Exclusive resources
// ---------------------------------------------------------------------------

fn place_structure(
    store: &mut WorldStore,
    event: &DomainEvent,
    placed: &StructurePlaced,
    rules: &ReconcileRules,
) -> Result<Vec<Effect>, Skip> {
    if store.structure(&placed.structure_id).is_some() {
        return Ok(Vec::new());
    }
    let incoming = structure_from(event, placed, Provenance::Confirmed);
    let bounds = Aabb::from_placement(incoming.position, incoming.footprint, incoming.rotation)
        .map_err(|e| Skip::Refused(e.to_string()))?;

    let contested = if incoming.is_collidable() {
        store.collisions(&bounds, None)
    } else {
        Vec::new()
    };
    for id in &contested {
        let Some(held) = store.structure(id) else {
            continue;
        };
        let incumbent = Contender {
            created_at: held.placed_at,
            event: held.origin_event,
            provenance: held.provenance,
        };
        if resolve(&incumbent, &challenger(event), rules.policy) == Resolution::KeepIncumbent {
            return Err(Skip::Refused(format!(
                "placement {} collides with structure {id}",
                placed.structure_id
            )));
        }
    }

    let mut effects = Vec::new();
    for id in contested {
        let Some(displaced) = store.remove_structure(&id) else {
            continue;
        };
        warn!(
            structure = %id,
            owner = %displaced.owner,
            winner = %event.actor,
            "Structure displaced by earlier placement"
        );
        effects.push(Effect::Change(Change::removed(EntityKind::Structure, id)));
        if displaced.owner == rules.local {
            effects.push(Effect::Notice(Notice::ConflictLost {
                entity: EntityKind::Structure,
                id: id.to_string(),
                winner: event.actor.clone(),
            }));
        }
    }
    store.insert_structure(incoming);
    effects.push(Effect::Change(Change::added(
        EntityKind::Structure,
        placed.structure_id,
    )));
    Ok(effects)
}

fn claim_land(
    store: &mut WorldStore,
    event: &DomainEvent,
    claimed: &LandClaimed,
    rules: &ReconcileRules,
    now: DateTime<Utc>,
) -> Result<Vec<Effect>, Skip> {
    let region = claimed.region;
    if claimed.expiry <= now {
        debug!(region = %region, "Claim lapsed before it arrived");
        return Ok(Vec::new());
    }

    let Some(held) = store.active_claim(region, now) else {
        let replaced = store
            .insert_claim(claim_from(event, claimed, Provenance::Confirmed))
            .is_some();
        let change = if replaced {
            Change::updated(EntityKind::LandClaim, region)
        } else {
            Change::added(EntityKind::LandClaim, region)
        };
        return Ok(vec![Effect::Change(change)]);
    };

    if held.origin_event == event.id {
        return Ok(Vec::new());
    }
    let incumbent = Contender {
        created_at: held.claimed_at,
        event: held.origin_event,
        provenance: held.provenance,
    };
    if resolve(&incumbent, &challenger(event), rules.policy) == Resolution::KeepIncumbent {
        return Err(Skip::Refused(format!(
            "region {region} already claimed by {}",
            held.owner
        )));
    }

    let loser = held.owner.clone();
    warn!(region = %region, loser = %loser, winner = %event.actor, "Land claim displaced");
    store.insert_claim(claim_from(event, claimed, Provenance::Confirmed));
    let mut effects = vec![Effect::Change(Change::updated(EntityKind::LandClaim, region))];
    if loser == rules.local {
        effects.push(Effect::Notice(Notice::ConflictLost {
            entity: EntityKind::LandClaim,
            id: region.to_string(),
            winner: event.actor.clone(),
        }));
    }
    Ok(effects)
}

// ---------------------------------------------------------------------------
// Resource nodes
// ---------------------------------------------------------------------------

/// Respawn instant for a deplete stamped at `created_at` that named none.
fn bounded_respawn(created_at: DateTime<Utc>, rules: &ReconcileRules, now: DateTime<Utc>) -> DateTime<Utc> {
    created_at
        .checked_add_signed(rules.resources.respawn_delay)
        .unwrap_or(now)
}

/// Deplete `node` as of `stamped`.
///
/// A depletion that respawned before `stamped` is retired first, so a
/// replayed history depletes the node again instead of dropping the later
/// event.
fn deplete_at(
    node: &mut ResourceNode,
    stamped: DateTime<Utc>,
    respawn_at: DateTime<Utc>,
    rules: &ResourceRules,
) -> bool {
    let respawned = resource::respawn_if_due(node, stamped, rules).is_some();
    resource::deplete(node, respawn_at) || respawned
}

fn update_node(
    store: &mut WorldStore,
    event: &DomainEvent,
    update: &ResourceNodeUpdated,
    rules: &ReconcileRules,
    now: DateTime<Utc>,
) -> Result<Vec<Effect>, Skip> {
    let node = store
        .node_mut(&update.resource_id)
        .ok_or_else(|| Skip::Refused(format!("unknown node {}", update.resource_id)))?;

    let changed = if update.depleted {
        let latest = bounded_respawn(event.created_at, rules, now);
        let respawn_at = match update.respawn_at {
            Some(requested) => requested.min(latest),
            None => now
                .checked_add_signed(rules.resources.respawn_delay)
                .unwrap_or(now),
        };
        deplete_at(node, event.created_at, respawn_at, &rules.resources)
    } else {
        match node.state {
            NodeState::Depleted { respawn_at } => {
                let amount = resource::roll_yield(node, respawn_at, &rules.resources);
                resource::replenish(node, amount);
                true
            }
            NodeState::Available { .. } => false,
        }
    };

    if changed {
        Ok(vec![Effect::Change(Change::updated(
            EntityKind::ResourceNode,
            &update.resource_id,
        ))])
    } else {
        Ok(Vec::new())
    }
}
