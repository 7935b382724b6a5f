//! Core entity structs of the reconciled world model.
//!
//! These are plain data. The rules that create and mutate them live in
//! `relayworld-world` (spatial and lifecycle), `relayworld-ledger` (guilds
//! and inventories), and `relayworld-core` (reconciliation).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Provenance, Resource, Rotation, StructureType, TreasuryEntryType};
use crate::ids::{
    ActorId, EventId, GuildId, RegionId, ResourceNodeId, StructureId, TreasuryEntryId,
};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub y: f64,
}

impl Position {
    /// Construct a position.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Whether both coordinates are finite numbers.
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Unrotated width and height of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Footprint {
    /// Extent along x before rotation.
    pub width: f64,
    /// Extent along y before rotation.
    pub height: f64,
}

impl Footprint {
    /// Construct a footprint.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The axis-aligned extent once `rotation` is applied.
    pub const fn rotated(self, rotation: Rotation) -> Self {
        if rotation.swaps_axes() {
            Self {
                width: self.height,
                height: self.width,
            }
        } else {
            self
        }
    }

    /// Whether both extents are finite and strictly positive.
    pub fn is_valid(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// Who besides the owner may interact with a structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StructurePermissions {
    /// Actors explicitly allowed access.
    pub whitelist: BTreeSet<ActorId>,
    /// Guilds whose members are allowed access.
    pub guilds: BTreeSet<GuildId>,
    /// If true, anyone may interact.
    pub public: bool,
}

/// A structure placed in the world.
///
/// `position` is the minimum corner of the rotation-resolved footprint.
/// Health is not stored: it is derived from `max_health`, `decay_per_hour`
/// and `placed_at` for any given instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Structure {
    /// Unique structure identifier.
    pub id: StructureId,
    /// Kind of structure.
    pub structure_type: StructureType,
    /// Actor who placed it.
    pub owner: ActorId,
    /// Minimum corner in world space.
    pub position: Position,
    /// Placement rotation.
    #[ts(type = "number")]
    pub rotation: Rotation,
    /// Unrotated footprint.
    pub footprint: Footprint,
    /// Building material.
    pub material: Resource,
    /// Health at placement time.
    pub max_health: u32,
    /// Health lost per elapsed hour.
    pub decay_per_hour: u32,
    /// Creation timestamp of the placing event.
    pub placed_at: DateTime<Utc>,
    /// Access rules.
    pub permissions: StructurePermissions,
    /// Open state. Only meaningful for doors.
    pub open: bool,
    /// Optimistic until the placing event echoes back.
    pub provenance: Provenance,
    /// The event that placed it.
    pub origin_event: EventId,
}

impl Structure {
    /// Footprint after applying the structure's rotation.
    pub const fn resolved_footprint(&self) -> Footprint {
        self.footprint.rotated(self.rotation)
    }

    /// Whether the structure currently blocks other placements.
    pub const fn is_collidable(&self) -> bool {
        self.structure_type.is_solid() && !(self.structure_type.is_door() && self.open)
    }
}

// ---------------------------------------------------------------------------
// LandClaim
// ---------------------------------------------------------------------------

/// Opaque proof-of-payment token produced by the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PaymentProof(pub String);

impl PaymentProof {
    /// Whether the token is present. Tokens are never verified here.
    pub fn is_present(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

/// Exclusive ownership of a region until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LandClaim {
    /// The claimed region.
    #[ts(type = "string")]
    pub region: RegionId,
    /// Actor who paid for the claim.
    pub owner: ActorId,
    /// The claim lapses once the clock reaches this instant.
    pub expires_at: DateTime<Utc>,
    /// Payment token supplied with the claim.
    pub payment_proof: PaymentProof,
    /// Creation timestamp of the claiming event.
    pub claimed_at: DateTime<Utc>,
    /// The claiming event.
    pub origin_event: EventId,
    /// Optimistic until the claiming event echoes back.
    pub provenance: Provenance,
}

impl LandClaim {
    /// Whether the claim is still in force at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

// ---------------------------------------------------------------------------
// ResourceNode
// ---------------------------------------------------------------------------

/// Harvest state of a resource node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "state", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NodeState {
    /// Ready to be gathered for `amount` units.
    Available {
        /// Units credited to whoever completes a gather.
        amount: u32,
    },
    /// Exhausted until `respawn_at`.
    Depleted {
        /// When the node becomes available again.
        respawn_at: DateTime<Utc>,
    },
}

/// A harvestable node generated at world-seed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceNode {
    /// Seeded identifier such as `wood-0`.
    pub id: ResourceNodeId,
    /// Resource yielded.
    pub resource: Resource,
    /// Location in world space.
    pub position: Position,
    /// Current harvest state.
    pub state: NodeState,
}

impl ResourceNode {
    /// Yield if the node is available.
    pub const fn available_amount(&self) -> Option<u32> {
        match self.state {
            NodeState::Available { amount } => Some(amount),
            NodeState::Depleted { .. } => None,
        }
    }

    /// Whether the node is currently depleted.
    pub const fn is_depleted(&self) -> bool {
        matches!(self.state, NodeState::Depleted { .. })
    }
}

// ---------------------------------------------------------------------------
// Guild
// ---------------------------------------------------------------------------

/// A guild with shared territory and treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Guild {
    /// Unique guild identifier.
    pub id: GuildId,
    /// Display name.
    pub name: String,
    /// Creator. Always a member and an admin.
    pub founder: ActorId,
    /// All members, admins included.
    pub members: BTreeSet<ActorId>,
    /// Members allowed to manage the guild.
    pub admins: BTreeSet<ActorId>,
    /// Regions claimed as guild territory.
    #[ts(type = "Array<string>")]
    pub territory: BTreeSet<RegionId>,
    /// Treasury balances. May be negative after racing withdrawals.
    #[ts(type = "Record<string, string>")]
    pub treasury: BTreeMap<Resource, Decimal>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest event timestamp applied to the guild.
    pub last_activity: DateTime<Utc>,
}

/// One append-only movement of resources in or out of a guild treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TreasuryEntry {
    /// Unique entry identifier.
    pub id: TreasuryEntryId,
    /// Guild whose treasury moved.
    pub guild: GuildId,
    /// Member who moved resources.
    pub actor: ActorId,
    /// Direction of the movement.
    pub entry_type: TreasuryEntryType,
    /// Resource moved.
    pub resource: Resource,
    /// Quantity moved (always positive).
    #[ts(as = "String")]
    pub quantity: Decimal,
    /// Event that recorded the movement.
    pub event: EventId,
    /// Creation timestamp of that event.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Inventory & presence
// ---------------------------------------------------------------------------

/// Per-actor resource totals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Inventory {
    /// Resource type to quantity held.
    pub resources: BTreeMap<Resource, u32>,
    /// Timestamp of the last applied inventory broadcast.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Last broadcast position of an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayerPresence {
    /// The actor.
    pub actor: ActorId,
    /// Where they were.
    pub position: Position,
    /// When they reported it.
    pub seen_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn make_structure(structure_type: StructureType, open: bool) -> Structure {
        Structure {
            id: StructureId::new(),
            structure_type,
            owner: ActorId::new("alice"),
            position: Position::new(0.0, 0.0),
            rotation: Rotation::Deg90,
            footprint: Footprint::new(4.0, 1.0),
            material: Resource::Wood,
            max_health: 100,
            decay_per_hour: 1,
            placed_at: Utc::now(),
            permissions: StructurePermissions::default(),
            open,
            provenance: Provenance::Confirmed,
            origin_event: EventId::new(),
        }
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(6.0, 8.0);
        assert_eq!(a.distance_to(b), 10.0);
    }

    #[test]
    fn non_finite_positions_are_flagged() {
        assert!(Position::new(1.0, 2.0).is_finite());
        assert!(!Position::new(f64::NAN, 2.0).is_finite());
        assert!(!Position::new(1.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn rotation_resolves_footprint() {
        let s = make_structure(StructureType::Wall, false);
        let resolved = s.resolved_footprint();
        assert_eq!(resolved.width, 1.0);
        assert_eq!(resolved.height, 4.0);
    }

    #[test]
    fn open_doors_do_not_collide() {
        assert!(make_structure(StructureType::Door, false).is_collidable());
        assert!(!make_structure(StructureType::Door, true).is_collidable());
        assert!(!make_structure(StructureType::Floor, false).is_collidable());
    }

    #[test]
    fn claim_expires_at_boundary() {
        let now = Utc::now();
        let claim = LandClaim {
            region: RegionId::new(3, 3),
            owner: ActorId::new("alice"),
            expires_at: now,
            payment_proof: PaymentProof("proof".to_owned()),
            claimed_at: now,
            origin_event: EventId::new(),
            provenance: Provenance::Confirmed,
        };
        assert!(!claim.is_active(now));
        assert!(claim.is_active(now - chrono::Duration::seconds(1)));
    }

    #[test]
    fn blank_payment_proof_is_absent() {
        assert!(!PaymentProof("  ".to_owned()).is_present());
        assert!(PaymentProof("lnbc1".to_owned()).is_present());
    }

    #[test]
    fn node_state_is_tagged() {
        let json = serde_json::to_value(NodeState::Available { amount: 2 }).unwrap();
        assert_eq!(json["state"], "available");
        assert_eq!(json["amount"], 2);
    }
}
