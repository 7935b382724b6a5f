//! Local actions.
//!
//! [`Engine::submit`] checks an action against the local model, applies it
//! optimistically, and hands back the envelopes to broadcast. A refused
//! action publishes nothing and changes nothing; the presenter hears why.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use relayworld_events::codec::MAX_GUILD_NAME_LEN;
use relayworld_events::{
    DomainEvent, Envelope, EventBody, GuildAction, InventoryUpdated, LandClaimed, PlayerMoved,
    Signal, StructureChange, StructurePlaced, StructureRemoved, StructureUpdated,
};
use relayworld_ledger::{GuildOp, OpContext, inventory};
use relayworld_types::{
    ActorId, EntityKind, GuildId, PaymentProof, PlayerPresence, Position, Provenance, RegionId,
    Resource, ResourceNodeId, Rotation, StructureId, StructureType,
};
use relayworld_world::{Aabb, WorldError, blueprint, health_at, land, placement_cost, region_for};

use crate::engine::Engine;
use crate::error::PreconditionFailure;
use crate::notify::Change;
use crate::policy;
use crate::reconcile::{claim_from, guild_change, guild_op, structure_from};

/// Something the local player asked to do.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LocalAction {
    /// Build a structure with its corner at `(x, y)`.
    PlaceStructure {
        /// What to build.
        structure_type: StructureType,
        /// Corner x.
        x: f64,
        /// Corner y.
        y: f64,
        /// Orientation.
        #[serde(default)]
        rotation: Rotation,
        /// Building material.
        material: Resource,
    },
    /// Remove an owned or decayed structure.
    RemoveStructure {
        /// Target.
        structure_id: StructureId,
    },
    /// Open or close a door.
    ToggleDoor {
        /// Target door.
        structure_id: StructureId,
    },
    /// Replace an owned structure's access rules.
    SetPermissions {
        /// Target.
        structure_id: StructureId,
        /// Actors allowed access.
        #[serde(default)]
        whitelist: BTreeSet<ActorId>,
        /// Guilds whose members are allowed access.
        #[serde(default)]
        guilds: BTreeSet<GuildId>,
        /// Open to everyone.
        #[serde(default)]
        public: bool,
    },
    /// Claim a region. Without a proof the client asks its payment
    /// collaborator for one first.
    ClaimLand {
        /// Region to claim.
        region: RegionId,
        /// Proof of payment, if already obtained.
        #[serde(default)]
        payment_proof: Option<PaymentProof>,
    },
    /// Begin gathering a node.
    StartGather {
        /// Target node.
        resource_id: ResourceNodeId,
    },
    /// Abandon the current gather.
    CancelGather,
    /// Move the local player.
    MoveTo {
        /// New x.
        x: f64,
        /// New y.
        y: f64,
    },
    /// Found a guild.
    CreateGuild {
        /// Display name.
        name: String,
    },
    /// Join a guild.
    JoinGuild {
        /// Target guild.
        guild_id: GuildId,
    },
    /// Leave a guild.
    LeaveGuild {
        /// Target guild.
        guild_id: GuildId,
    },
    /// Make a member an admin.
    PromoteMember {
        /// Target guild.
        guild_id: GuildId,
        /// Member to promote.
        member: ActorId,
    },
    /// Take admin rights from a member.
    DemoteMember {
        /// Target guild.
        guild_id: GuildId,
        /// Member to demote.
        member: ActorId,
    },
    /// Dissolve a guild.
    DisbandGuild {
        /// Target guild.
        guild_id: GuildId,
    },
    /// Add a claimed region to the guild's territory.
    ClaimTerritory {
        /// Target guild.
        guild_id: GuildId,
        /// Region the caller holds a claim on.
        region: RegionId,
    },
    /// Move resources from the local inventory into the treasury.
    DepositToGuild {
        /// Target guild.
        guild_id: GuildId,
        /// Resource type.
        resource: Resource,
        /// Whole units.
        quantity: Decimal,
    },
    /// Move resources from the treasury into the local inventory.
    WithdrawFromGuild {
        /// Target guild.
        guild_id: GuildId,
        /// Resource type.
        resource: Resource,
        /// Whole units.
        quantity: Decimal,
    },
    /// Send an opaque payload to another actor.
    SendSignal {
        /// Addressee.
        recipient: ActorId,
        /// Uninterpreted payload.
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl LocalAction {
    /// Short name used in logs and rejection notices.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PlaceStructure { .. } => "place_structure",
            Self::RemoveStructure { .. } => "remove_structure",
            Self::ToggleDoor { .. } => "toggle_door",
            Self::SetPermissions { .. } => "set_permissions",
            Self::ClaimLand { .. } => "claim_land",
            Self::StartGather { .. } => "start_gather",
            Self::CancelGather => "cancel_gather",
            Self::MoveTo { .. } => "move_to",
            Self::CreateGuild { .. } => "create_guild",
            Self::JoinGuild { .. } => "join_guild",
            Self::LeaveGuild { .. } => "leave_guild",
            Self::PromoteMember { .. } => "promote_member",
            Self::DemoteMember { .. } => "demote_member",
            Self::DisbandGuild { .. } => "disband_guild",
            Self::ClaimTerritory { .. } => "claim_territory",
            Self::DepositToGuild { .. } => "deposit_to_guild",
            Self::WithdrawFromGuild { .. } => "withdraw_from_guild",
            Self::SendSignal { .. } => "send_signal",
        }
    }
}

impl Engine {
    /// Check, apply, and encode one local action.
    ///
    /// Returns the envelopes to publish, in order. The caller broadcasts
    /// them; the optimistic state is already in the store.
    ///
    /// # Errors
    ///
    /// Returns a [`PreconditionFailure`] when the action is not allowed
    /// right now. The store is untouched and the presenter is told.
    pub fn submit(
        &mut self,
        action: LocalAction,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        let name = action.name();
        let result = match action {
            LocalAction::PlaceStructure {
                structure_type,
                x,
                y,
                rotation,
                material,
            } => self.place_structure(structure_type, Position::new(x, y), rotation, material, now),
            LocalAction::RemoveStructure { structure_id } => self.remove_structure(structure_id, now),
            LocalAction::ToggleDoor { structure_id } => self.toggle_door(structure_id, now),
            LocalAction::SetPermissions {
                structure_id,
                whitelist,
                guilds,
                public,
            } => self.set_permissions(
                structure_id,
                StructureChange::PermissionsChanged {
                    whitelist,
                    guilds,
                    public,
                },
                now,
            ),
            LocalAction::ClaimLand {
                region,
                payment_proof,
            } => self.claim_land(
                region,
                payment_proof.unwrap_or_else(|| PaymentProof(String::new())),
                now,
            ),
            LocalAction::StartGather { resource_id } => self.start_gather(&resource_id, now),
            LocalAction::CancelGather => self.cancel_gather(),
            LocalAction::MoveTo { x, y } => self.move_to(Position::new(x, y), now),
            LocalAction::CreateGuild { name } => self.create_guild(name, now),
            LocalAction::JoinGuild { guild_id } => self.guild_action(guild_id, GuildAction::Join, now),
            LocalAction::LeaveGuild { guild_id } => {
                self.guild_action(guild_id, GuildAction::Leave, now)
            }
            LocalAction::PromoteMember { guild_id, member } => {
                self.guild_action(guild_id, GuildAction::Promote { member }, now)
            }
            LocalAction::DemoteMember { guild_id, member } => {
                self.guild_action(guild_id, GuildAction::Demote { member }, now)
            }
            LocalAction::DisbandGuild { guild_id } => {
                self.guild_action(guild_id, GuildAction::Disband, now)
            }
            LocalAction::ClaimTerritory { guild_id, region } => {
                self.guild_action(guild_id, GuildAction::ClaimTerritory { region }, now)
            }
            LocalAction::DepositToGuild {
                guild_id,
                resource,
                quantity,
            } => self.guild_action(guild_id, GuildAction::Deposit { resource, quantity }, now),
            LocalAction::WithdrawFromGuild {
                guild_id,
                resource,
                quantity,
            } => self.guild_action(guild_id, GuildAction::Withdraw { resource, quantity }, now),
            LocalAction::SendSignal { recipient, payload } => {
                self.send_signal(recipient, payload, now)
            }
        };

        match &result {
            Ok(envelopes) => debug!(action = name, events = envelopes.len(), "Local action applied"),
            Err(e) => self.report_rejection(name, e),
        }
        result
    }

    // -----------------------------------------------------------------------
    // Structures
    // -----------------------------------------------------------------------

    fn place_structure(
        &mut self,
        structure_type: StructureType,
        position: Position,
        rotation: Rotation,
        material: Resource,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        let footprint = blueprint(structure_type).footprint;
        let bounds = Aabb::from_placement(position, footprint, rotation)?;
        self.check_build_area(&bounds, now)?;

        let incoming_collides = structure_type.is_solid() || structure_type.is_door();
        if incoming_collides && let Some(existing) = self.store.first_collision(&bounds, None) {
            return Err(WorldError::Collision(existing).into());
        }

        let consume = self.config.structures.consume_materials;
        let mut holdings = self.holdings();
        if consume {
            inventory::consume(&mut holdings, &placement_cost(structure_type, material))?;
        }

        let placed = StructurePlaced {
            structure_id: StructureId::new(),
            structure_type,
            x: position.x,
            y: position.y,
            width: footprint.width,
            height: footprint.height,
            rotation,
            material,
        };
        let placement = self.event(EventBody::StructurePlaced(placed.clone()), now);
        let mut events = vec![placement.clone()];
        if consume {
            events.push(self.inventory_event(&holdings, now));
        }
        let envelopes = self.seal(&events)?;

        self.store
            .insert_structure(structure_from(&placement, &placed, Provenance::Optimistic));
        self.changed(&Change::added(EntityKind::Structure, placed.structure_id));
        if consume {
            self.commit_inventory(holdings, now);
        }
        Ok(envelopes)
    }

    /// Every region the box touches must admit the local actor.
    fn check_build_area(&self, bounds: &Aabb, now: DateTime<Utc>) -> Result<(), PreconditionFailure> {
        let size = self.config.world.region_size;
        let (Some(low), Some(high)) = (
            region_for(Position::new(bounds.min_x, bounds.min_y), size),
            region_for(Position::new(bounds.max_x, bounds.max_y), size),
        ) else {
            return Err(WorldError::InvalidPosition.into());
        };
        let require_claim = self.config.structures.require_claim_to_build;
        for x in low.x..=high.x {
            for y in low.y..=high.y {
                let region = RegionId::new(x, y);
                if !policy::can_build(&self.store, &self.actor, region, now, require_claim) {
                    return Err(PreconditionFailure::BuildNotPermitted {
                        region,
                        actor: self.actor.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn remove_structure(
        &mut self,
        id: StructureId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        let structure = self
            .store
            .structure(&id)
            .ok_or(PreconditionFailure::UnknownStructure(id))?;
        if structure.owner != self.actor && health_at(structure, now) > 0 {
            return Err(PreconditionFailure::NotOwner {
                structure: id,
                actor: self.actor.clone(),
            });
        }

        let event = self.event(
            EventBody::StructureRemoved(StructureRemoved { structure_id: id }),
            now,
        );
        let envelopes = self.seal(&[event])?;
        self.store.remove_structure(&id);
        self.changed(&Change::removed(EntityKind::Structure, id));
        Ok(envelopes)
    }

    fn toggle_door(
        &mut self,
        id: StructureId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        let door = self
            .store
            .structure(&id)
            .ok_or(PreconditionFailure::UnknownStructure(id))?;
        if !door.structure_type.is_door() {
            return Err(PreconditionFailure::NotADoor(id));
        }
        if !policy::can_access_structure(&self.store, &self.actor, door) {
            return Err(PreconditionFailure::AccessDenied {
                structure: id,
                actor: self.actor.clone(),
            });
        }
        let open = !door.open;
        // A closing door becomes solid again.
        if !open && let Some(existing) = self.store.first_collision(&Aabb::of(door), Some(id)) {
            return Err(WorldError::Collision(existing).into());
        }

        let event = self.event(
            EventBody::StructureUpdated(StructureUpdated {
                structure_id: id,
                change: StructureChange::DoorToggled { open },
            }),
            now,
        );
        let envelopes = self.seal(&[event])?;
        if let Some(door) = self.store.structure_mut(&id) {
            door.open = open;
        }
        self.changed(&Change::updated(EntityKind::Structure, id));
        Ok(envelopes)
    }

    fn set_permissions(
        &mut self,
        id: StructureId,
        change: StructureChange,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        let structure = self
            .store
            .structure(&id)
            .ok_or(PreconditionFailure::UnknownStructure(id))?;
        if structure.owner != self.actor {
            return Err(PreconditionFailure::NotOwner {
                structure: id,
                actor: self.actor.clone(),
            });
        }
        let StructureChange::PermissionsChanged {
            whitelist,
            guilds,
            public,
        } = &change
        else {
            return Ok(Vec::new());
        };
        if let Some(bad) = whitelist.iter().find(|a| !a.is_well_formed()) {
            return Err(PreconditionFailure::InvalidActor(bad.to_string()));
        }
        let (whitelist, guilds, public) = (whitelist.clone(), guilds.clone(), *public);

        let event = self.event(
            EventBody::StructureUpdated(StructureUpdated {
                structure_id: id,
                change,
            }),
            now,
        );
        let envelopes = self.seal(&[event])?;
        if let Some(structure) = self.store.structure_mut(&id) {
            structure.permissions.whitelist = whitelist;
            structure.permissions.guilds = guilds;
            structure.permissions.public = public;
        }
        self.changed(&Change::updated(EntityKind::Structure, id));
        Ok(envelopes)
    }

    // -----------------------------------------------------------------------
    // Land
    // -----------------------------------------------------------------------

    fn claim_land(
        &mut self,
        region: RegionId,
        payment_proof: PaymentProof,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        land::check_claimable(self.store.claims(), region, &payment_proof, now)?;
        let expiry = now
            .checked_add_signed(self.config.claims.duration())
            .ok_or(WorldError::ArithmeticOverflow)?;

        let claimed = LandClaimed {
            region,
            payment_proof,
            expiry,
        };
        let event = self.event(EventBody::LandClaimed(claimed.clone()), now);
        let envelopes = self.seal(std::slice::from_ref(&event))?;
        let replaced = self
            .store
            .insert_claim(claim_from(&event, &claimed, Provenance::Optimistic));
        let change = if replaced.is_some() {
            Change::updated(EntityKind::LandClaim, region)
        } else {
            Change::added(EntityKind::LandClaim, region)
        };
        self.changed(&change);
        info!(region = %region, expiry = %expiry, "Land claimed");
        Ok(envelopes)
    }

    // -----------------------------------------------------------------------
    // Movement & signals
    // -----------------------------------------------------------------------

    fn move_to(
        &mut self,
        position: Position,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        if !position.is_finite() {
            return Err(WorldError::InvalidPosition.into());
        }
        let event = self.event(
            EventBody::PlayerMoved(PlayerMoved {
                x: position.x,
                y: position.y,
            }),
            now,
        );
        let seen_at = event.created_at;
        let envelopes = self.seal(&[event])?;
        self.store.record_presence(PlayerPresence {
            actor: self.actor.clone(),
            position,
            seen_at,
        });
        self.changed(&Change::updated(EntityKind::Player, self.actor.clone()));
        Ok(envelopes)
    }

    fn send_signal(
        &mut self,
        recipient: ActorId,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        if !recipient.is_well_formed() {
            return Err(PreconditionFailure::InvalidActor(recipient.to_string()));
        }
        let event = self.event(EventBody::Signal(Signal { recipient, payload }), now);
        self.seal(&[event])
    }

    // -----------------------------------------------------------------------
    // Guilds
    // -----------------------------------------------------------------------

    fn create_guild(
        &mut self,
        name: String,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        let name = name.trim().to_owned();
        if name.is_empty() || name.chars().count() > MAX_GUILD_NAME_LEN {
            return Err(PreconditionFailure::InvalidGuildName {
                max: MAX_GUILD_NAME_LEN,
            });
        }
        self.guild_action(GuildId::new(), GuildAction::Create { name }, now)
    }

    fn guild_action(
        &mut self,
        guild: GuildId,
        action: GuildAction,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PreconditionFailure> {
        let op = guild_op(&action);
        let mut holdings = self.holdings();
        {
            let store = &self.store;
            store.guilds().check_local(&self.actor, guild, &op, &holdings, |region| {
                store.owns_region(region, &self.actor, now)
            })?;
        }
        if let GuildOp::ClaimTerritory { region } = &op
            && let Some(owner) = self.store.territory_holder(*region, now)
            && owner.id != guild
        {
            return Err(WorldError::RegionClaimed {
                region: *region,
                owner: owner.founder.clone(),
            }
            .into());
        }

        // Treasury movements mirror into the local inventory.
        let inventory_moved = match &op {
            GuildOp::Deposit { resource, quantity } => {
                let units = inventory::whole_units(*quantity)?;
                inventory::remove_resource(&mut holdings, *resource, units)?;
                true
            }
            GuildOp::Withdraw { resource, quantity } => {
                let units = inventory::whole_units(*quantity)?;
                inventory::add_resource(&mut holdings, *resource, units)?;
                true
            }
            _ => false,
        };

        let event = self.event(
            EventBody::Guild {
                guild_id: guild,
                action,
            },
            now,
        );
        let ctx = OpContext {
            actor: self.actor.clone(),
            event: event.id,
            created_at: event.created_at,
        };
        let mut events = vec![event];
        if inventory_moved {
            events.push(self.inventory_event(&holdings, now));
        }
        let envelopes = self.seal(&events)?;

        let change = self.store.guilds_mut().apply(&ctx, guild, &op)?;
        if let Some(change) = guild_change(guild, change) {
            self.changed(&change);
        }
        if inventory_moved {
            self.commit_inventory(holdings, now);
        }
        Ok(envelopes)
    }

    // -----------------------------------------------------------------------
    // Inventory helpers
    // -----------------------------------------------------------------------

    /// Copy of the local actor's resource totals.
    pub(crate) fn holdings(&self) -> BTreeMap<Resource, u32> {
        self.store
            .inventory(&self.actor)
            .map(|i| i.resources.clone())
            .unwrap_or_default()
    }

    /// An inventory-updated event carrying `resources` as the new totals.
    pub(crate) fn inventory_event(
        &self,
        resources: &BTreeMap<Resource, u32>,
        now: DateTime<Utc>,
    ) -> DomainEvent {
        self.event(
            EventBody::InventoryUpdated(InventoryUpdated {
                resources: resources.clone(),
            }),
            now,
        )
    }

    /// Replace the local totals with `resources`.
    pub(crate) fn commit_inventory(&mut self, resources: BTreeMap<Resource, u32>, now: DateTime<Utc>) {
        let stamped = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let actor = self.actor.clone();
        let inventory = self.store.inventory_mut(&actor);
        inventory.resources = resources;
        inventory.updated_at = Some(stamped);
        self.changed(&Change::updated(EntityKind::Inventory, actor));
    }

    /// Credit resources to the local actor without broadcasting. Used for
    /// starting kits and tests.
    ///
    /// # Errors
    ///
    /// Returns a ledger error if the total would overflow.
    pub fn grant(&mut self, resource: Resource, amount: u32) -> Result<(), PreconditionFailure> {
        let actor = self.actor.clone();
        inventory::add_resource(&mut self.store.inventory_mut(&actor).resources, resource, amount)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use relayworld_events::{CodecLimits, EventKind, decode};
    use relayworld_ledger::LedgerError;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::config::ClientConfig;
    use crate::notify::{NoOpPresenter, Notice, RecordingPresenter};

    fn make_engine(actor: &str) -> Engine {
        let mut config = ClientConfig::default();
        config.identity.actor = actor.to_owned();
        Engine::new(config, Box::new(NoOpPresenter), Utc::now())
    }

    fn kinds(envelopes: &[Envelope]) -> Vec<u32> {
        envelopes.iter().map(|e| e.kind).collect()
    }

    fn place_wall(x: f64, y: f64) -> LocalAction {
        LocalAction::PlaceStructure {
            structure_type: StructureType::Wall,
            x,
            y,
            rotation: Rotation::Deg0,
            material: Resource::Wood,
        }
    }

    #[test]
    fn actions_parse_from_json() {
        let action: LocalAction =
            serde_json::from_str(r#"{"action":"claim_land","region":"3-3","payment_proof":"lnbc1"}"#)
                .unwrap();
        assert_eq!(
            action,
            LocalAction::ClaimLand {
                region: RegionId::new(3, 3),
                payment_proof: Some(PaymentProof("lnbc1".to_owned())),
            }
        );
        let action: LocalAction = serde_json::from_str(r#"{"action":"cancel_gather"}"#).unwrap();
        assert_eq!(action.name(), "cancel_gather");
    }

    #[test]
    fn placement_consumes_materials_and_emits_two_events() {
        let mut engine = make_engine("alice");
        let now = Utc::now();
        engine.grant(Resource::Wood, 50).unwrap();

        let envelopes = engine.submit(place_wall(10.0, 10.0), now).unwrap();
        assert_eq!(
            kinds(&envelopes),
            vec![EventKind::StructurePlaced.code(), EventKind::InventoryUpdated.code()]
        );
        let structure = engine.store().structures().values().next().unwrap();
        assert_eq!(structure.provenance, Provenance::Optimistic);
        let cost = placement_cost(StructureType::Wall, Resource::Wood);
        let left = engine.holdings().get(&Resource::Wood).copied().unwrap_or(0);
        assert_eq!(left, 50 - cost.get(&Resource::Wood).copied().unwrap());

        // Every emitted envelope passes our own validation.
        for envelope in &envelopes {
            assert!(decode(envelope, &CodecLimits::default(), now).is_ok());
        }
    }

    #[test]
    fn overlapping_placement_is_rejected_without_side_effects() {
        let recorder = RecordingPresenter::new();
        let mut engine = Engine::new(ClientConfig::default(), Box::new(recorder.clone()), Utc::now());
        let now = Utc::now();
        engine.grant(Resource::Wood, 100).unwrap();
        assert!(engine.submit(place_wall(10.0, 10.0), now).is_ok());
        let before = engine.stats();
        let holdings = engine.holdings();

        let result = engine.submit(place_wall(11.0, 10.0), now);
        assert!(matches!(
            result,
            Err(PreconditionFailure::World(WorldError::Collision(_)))
        ));
        assert_eq!(engine.stats(), before);
        assert_eq!(engine.holdings(), holdings);
        assert!(
            recorder
                .notices()
                .iter()
                .any(|n| matches!(n, Notice::Rejected { action: "place_structure", .. }))
        );
    }

    #[test]
    fn placement_without_materials_is_rejected() {
        let mut engine = make_engine("alice");
        let result = engine.submit(place_wall(10.0, 10.0), Utc::now());
        assert!(matches!(
            result,
            Err(PreconditionFailure::Ledger(LedgerError::InsufficientResource { .. }))
        ));
        assert!(engine.store().structures().is_empty());
    }

    #[test]
    fn building_on_foreign_claim_is_refused() {
        let mut bob = make_engine("bob");
        let mut alice = make_engine("alice");
        let now = Utc::now();
        let claim = alice
            .submit(
                LocalAction::ClaimLand {
                    region: RegionId::new(0, 0),
                    payment_proof: Some(PaymentProof("lnbc1".to_owned())),
                },
                now,
            )
            .unwrap();
        for envelope in &claim {
            bob.handle_envelope(envelope, now);
        }
        bob.grant(Resource::Wood, 50).unwrap();
        let result = bob.submit(place_wall(10.0, 10.0), now);
        assert!(matches!(
            result,
            Err(PreconditionFailure::BuildNotPermitted { .. })
        ));
    }

    #[test]
    fn claim_requires_proof_and_free_region() {
        let mut engine = make_engine("alice");
        let now = Utc::now();
        let region = RegionId::new(3, 3);
        let missing = engine.submit(
            LocalAction::ClaimLand {
                region,
                payment_proof: None,
            },
            now,
        );
        assert!(matches!(
            missing,
            Err(PreconditionFailure::World(WorldError::MissingPaymentProof))
        ));

        let claim = LocalAction::ClaimLand {
            region,
            payment_proof: Some(PaymentProof("lnbc1".to_owned())),
        };
        assert!(engine.submit(claim.clone(), now).is_ok());
        let stored = engine.store().active_claim(region, now).unwrap();
        assert_eq!(stored.provenance, Provenance::Optimistic);
        assert_eq!(stored.expires_at, now + Duration::days(7));
        assert!(matches!(
            engine.submit(claim, now),
            Err(PreconditionFailure::World(WorldError::RegionClaimed { .. }))
        ));
    }

    #[test]
    fn door_toggle_flips_state() {
        let mut engine = make_engine("alice");
        let now = Utc::now();
        engine.grant(Resource::Wood, 50).unwrap();
        engine
            .submit(
                LocalAction::PlaceStructure {
                    structure_type: StructureType::Door,
                    x: 20.0,
                    y: 20.0,
                    rotation: Rotation::Deg0,
                    material: Resource::Wood,
                },
                now,
            )
            .unwrap();
        let id = *engine.store().structures().keys().next().unwrap();
        engine.submit(LocalAction::ToggleDoor { structure_id: id }, now).unwrap();
        assert!(engine.store().structure(&id).unwrap().open);
        engine.submit(LocalAction::ToggleDoor { structure_id: id }, now).unwrap();
        assert!(!engine.store().structure(&id).unwrap().open);
    }

    #[test]
    fn only_owner_changes_permissions() {
        let mut alice = make_engine("alice");
        let mut bob = make_engine("bob");
        let now = Utc::now();
        alice.grant(Resource::Wood, 50).unwrap();
        let placed = alice.submit(place_wall(10.0, 10.0), now).unwrap();
        for envelope in &placed {
            bob.handle_envelope(envelope, now);
        }
        let id = *bob.store().structures().keys().next().unwrap();
        let change = LocalAction::SetPermissions {
            structure_id: id,
            whitelist: BTreeSet::from([ActorId::new("carol")]),
            guilds: BTreeSet::new(),
            public: false,
        };
        assert!(matches!(
            bob.submit(change.clone(), now),
            Err(PreconditionFailure::NotOwner { .. })
        ));
        assert!(alice.submit(change, now).is_ok());
        let structure = alice.store().structure(&id).unwrap();
        assert!(structure.permissions.whitelist.contains(&ActorId::new("carol")));
    }

    #[test]
    fn guild_lifecycle_moves_resources() {
        let mut engine = make_engine("alice");
        let now = Utc::now();
        engine.grant(Resource::Stone, 10).unwrap();
        engine
            .submit(LocalAction::CreateGuild { name: "Masons".to_owned() }, now)
            .unwrap();
        let guild = engine.store().guilds().iter().next().map(|g| g.id).unwrap();

        let deposit = engine
            .submit(
                LocalAction::DepositToGuild {
                    guild_id: guild,
                    resource: Resource::Stone,
                    quantity: dec!(4),
                },
                now,
            )
            .unwrap();
        assert_eq!(
            kinds(&deposit),
            vec![EventKind::GuildManagement.code(), EventKind::InventoryUpdated.code()]
        );
        assert_eq!(engine.store().guilds().balance(&guild, Resource::Stone), dec!(4));
        assert_eq!(engine.holdings().get(&Resource::Stone), Some(&6));

        let overdraw = engine.submit(
            LocalAction::WithdrawFromGuild {
                guild_id: guild,
                resource: Resource::Stone,
                quantity: dec!(5),
            },
            now,
        );
        assert!(matches!(
            overdraw,
            Err(PreconditionFailure::Ledger(LedgerError::InsufficientTreasury { .. }))
        ));

        engine
            .submit(
                LocalAction::WithdrawFromGuild {
                    guild_id: guild,
                    resource: Resource::Stone,
                    quantity: dec!(4),
                },
                now,
            )
            .unwrap();
        assert_eq!(engine.holdings().get(&Resource::Stone), Some(&10));
        assert!(engine.submit(LocalAction::DisbandGuild { guild_id: guild }, now).is_ok());
        assert!(engine.store().guilds().is_empty());
    }

    #[test]
    fn guild_names_are_bounded() {
        let mut engine = make_engine("alice");
        let now = Utc::now();
        let long = "x".repeat(MAX_GUILD_NAME_LEN + 1);
        for name in [String::from("   "), long] {
            assert!(matches!(
                engine.submit(LocalAction::CreateGuild { name }, now),
                Err(PreconditionFailure::InvalidGuildName { .. })
            ));
        }
    }

    #[test]
    fn move_updates_presence() {
        let mut engine = make_engine("alice");
        let now = Utc::now() + Duration::seconds(1);
        engine.submit(LocalAction::MoveTo { x: 7.0, y: 9.0 }, now).unwrap();
        assert_eq!(
            engine.store().position_of(&ActorId::new("alice")),
            Some(Position::new(7.0, 9.0))
        );
        assert!(engine.submit(LocalAction::MoveTo { x: f64::NAN, y: 0.0 }, now).is_err());
    }
}
