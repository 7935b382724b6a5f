//! Typed domain events and their per-kind content schemas.
//!
//! Content structs double as the JSON schema of each kind's `content`
//! string. Guild management is the exception: its wire form keeps `action`
//! and `payload` apart, and [`GuildAction`] is resolved by the codec.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use relayworld_types::{
    ActorId, EventId, Footprint, GuildId, PaymentProof, Position, RegionId, Resource,
    ResourceNodeId, Rotation, StructureId, StructureType,
};

use crate::kind::EventKind;

// ---------------------------------------------------------------------------
// Structure contents
// ---------------------------------------------------------------------------

/// Content of a structure-placed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructurePlaced {
    /// Identifier chosen by the placing client.
    pub structure_id: StructureId,
    /// Kind of structure.
    pub structure_type: StructureType,
    /// Minimum corner x.
    pub x: f64,
    /// Minimum corner y.
    pub y: f64,
    /// Unrotated width.
    pub width: f64,
    /// Unrotated height.
    pub height: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: Rotation,
    /// Building material.
    pub material: Resource,
}

impl StructurePlaced {
    /// Minimum corner as a [`Position`].
    pub const fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Unrotated footprint.
    pub const fn footprint(&self) -> Footprint {
        Footprint::new(self.width, self.height)
    }
}

/// Content of a structure-removed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRemoved {
    /// Structure to remove.
    pub structure_id: StructureId,
}

/// What a structure-updated event changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructureChange {
    /// A door was opened or closed.
    DoorToggled {
        /// New open state.
        open: bool,
    },
    /// The owner replaced the access rules.
    PermissionsChanged {
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
}

/// Content of a structure-updated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureUpdated {
    /// Structure being changed.
    pub structure_id: StructureId,
    /// The change.
    pub change: StructureChange,
}

// ---------------------------------------------------------------------------
// Land & resource contents
// ---------------------------------------------------------------------------

/// Content of a land-claimed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandClaimed {
    /// Region being claimed.
    pub region: RegionId,
    /// Token from the payment collaborator.
    pub payment_proof: PaymentProof,
    /// Expiry instant, unix seconds on the wire.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expiry: DateTime<Utc>,
}

/// Content of a resource-node-updated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNodeUpdated {
    /// Node being changed.
    pub resource_id: ResourceNodeId,
    /// `true` for a deplete, `false` for a replenish.
    pub depleted: bool,
    /// Respawn instant chosen by the depleting client, unix seconds.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub respawn_at: Option<DateTime<Utc>>,
}

/// Content of a resource-gathered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGathered {
    /// Node gathered from.
    pub resource_id: ResourceNodeId,
    /// Resource type credited.
    pub resource: Resource,
    /// Units credited.
    pub amount: u32,
    /// Gatherer x at completion.
    pub x: f64,
    /// Gatherer y at completion.
    pub y: f64,
}

/// Content of an inventory-updated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUpdated {
    /// Full resource totals of the signer.
    pub resources: BTreeMap<Resource, u32>,
}

/// Content of a player-moved event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerMoved {
    /// New x.
    pub x: f64,
    /// New y.
    pub y: f64,
}

/// Content of a signal event. The payload is never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Actor the payload is addressed to.
    pub recipient: ActorId,
    /// Opaque payload forwarded to the presentation layer.
    #[serde(default)]
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Guild management
// ---------------------------------------------------------------------------

/// Wire discriminator of a guild action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuildActionKind {
    /// See [`GuildAction::Create`].
    Create,
    /// See [`GuildAction::Join`].
    Join,
    /// See [`GuildAction::Leave`].
    Leave,
    /// See [`GuildAction::Promote`].
    Promote,
    /// See [`GuildAction::Demote`].
    Demote,
    /// See [`GuildAction::Disband`].
    Disband,
    /// See [`GuildAction::ClaimTerritory`].
    ClaimTerritory,
    /// See [`GuildAction::Deposit`].
    Deposit,
    /// See [`GuildAction::Withdraw`].
    Withdraw,
}

/// Wire content of a guild-management event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildManagementContent {
    /// Which action.
    pub action: GuildActionKind,
    /// Target guild. Chosen by the founder on create.
    pub guild_id: GuildId,
    /// Action-specific fields.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A typed guild action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuildAction {
    /// Found a new guild; the signer becomes founder.
    Create {
        /// Display name.
        name: String,
    },
    /// The signer joins.
    Join,
    /// The signer leaves.
    Leave,
    /// Grant admin to a member.
    Promote {
        /// Member to promote.
        member: ActorId,
    },
    /// Revoke admin from a member.
    Demote {
        /// Member to demote.
        member: ActorId,
    },
    /// Remove the guild entirely.
    Disband,
    /// Add a region to the guild's territory.
    ClaimTerritory {
        /// Region the signer holds a claim on.
        region: RegionId,
    },
    /// Move resources from the signer's inventory into the treasury.
    Deposit {
        /// Resource moved.
        resource: Resource,
        /// Positive quantity.
        quantity: Decimal,
    },
    /// Move resources from the treasury to the signer.
    Withdraw {
        /// Resource moved.
        resource: Resource,
        /// Positive quantity.
        quantity: Decimal,
    },
}

impl GuildAction {
    /// Wire discriminator for this action.
    pub const fn kind(&self) -> GuildActionKind {
        match self {
            Self::Create { .. } => GuildActionKind::Create,
            Self::Join => GuildActionKind::Join,
            Self::Leave => GuildActionKind::Leave,
            Self::Promote { .. } => GuildActionKind::Promote,
            Self::Demote { .. } => GuildActionKind::Demote,
            Self::Disband => GuildActionKind::Disband,
            Self::ClaimTerritory { .. } => GuildActionKind::ClaimTerritory,
            Self::Deposit { .. } => GuildActionKind::Deposit,
            Self::Withdraw { .. } => GuildActionKind::Withdraw,
        }
    }
}

/// Payload of a create action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NamePayload {
    pub name: String,
}

/// Payload of a promote or demote action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MemberPayload {
    pub member: ActorId,
}

/// Payload of a territory claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RegionPayload {
    pub region: RegionId,
}

/// Payload of a deposit or withdraw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TransferPayload {
    pub resource: Resource,
    pub quantity: Decimal,
}

// ---------------------------------------------------------------------------
// DomainEvent
// ---------------------------------------------------------------------------

/// Typed body of a validated event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    /// A structure was placed.
    StructurePlaced(StructurePlaced),
    /// A structure was removed.
    StructureRemoved(StructureRemoved),
    /// A structure's door state or permissions changed.
    StructureUpdated(StructureUpdated),
    /// A region was claimed.
    LandClaimed(LandClaimed),
    /// A resource node was depleted or replenished.
    ResourceNodeUpdated(ResourceNodeUpdated),
    /// A gather completed.
    ResourceGathered(ResourceGathered),
    /// The signer's inventory totals.
    InventoryUpdated(InventoryUpdated),
    /// A guild action.
    Guild {
        /// Target guild.
        guild_id: GuildId,
        /// The action.
        action: GuildAction,
    },
    /// The signer moved.
    PlayerMoved(PlayerMoved),
    /// Signaling payload addressed to one actor.
    Signal(Signal),
}

impl EventBody {
    /// Kind discriminator of the body.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StructurePlaced(_) => EventKind::StructurePlaced,
            Self::StructureRemoved(_) => EventKind::StructureRemoved,
            Self::StructureUpdated(_) => EventKind::StructureUpdated,
            Self::LandClaimed(_) => EventKind::LandClaimed,
            Self::ResourceNodeUpdated(_) => EventKind::ResourceNodeUpdated,
            Self::ResourceGathered(_) => EventKind::ResourceGathered,
            Self::InventoryUpdated(_) => EventKind::InventoryUpdated,
            Self::Guild { .. } => EventKind::GuildManagement,
            Self::PlayerMoved(_) => EventKind::PlayerMoved,
            Self::Signal(_) => EventKind::Signal,
        }
    }
}

/// A validated event ready to be reconciled.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// Signer.
    pub actor: ActorId,
    /// Declared creation time, whole seconds.
    pub created_at: DateTime<Utc>,
    /// Typed content.
    pub body: EventBody,
}

impl DomainEvent {
    /// Stamp a new locally originated event with a fresh id.
    ///
    /// The timestamp is truncated to whole seconds so that the value held
    /// locally matches what peers decode from the wire.
    pub fn new(actor: ActorId, created_at: DateTime<Utc>, body: EventBody) -> Self {
        let created_at =
            DateTime::from_timestamp(created_at.timestamp(), 0).unwrap_or(created_at);
        Self {
            id: EventId::new(),
            actor,
            created_at,
            body,
        }
    }

    /// Kind discriminator.
    pub const fn kind(&self) -> EventKind {
        self.body.kind()
    }

    /// Ordering key used for deterministic conflict resolution.
    pub const fn order_key(&self) -> (DateTime<Utc>, EventId) {
        (self.created_at, self.id)
    }
}
