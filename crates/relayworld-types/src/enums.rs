//! Enumeration types shared across the Relayworld crates.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// A harvestable resource type.
///
/// Used as the key of actor inventories and guild treasuries, as the type
/// of a resource node, and as the building material of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Resource {
    /// Lumber from trees.
    Wood,
    /// Quarried stone.
    Stone,
    /// Ore and scrap metal.
    Metal,
    /// Plant fiber.
    Fiber,
    /// Rare crystal deposits.
    Crystal,
}

impl Resource {
    /// Every resource type, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Wood,
        Self::Stone,
        Self::Metal,
        Self::Fiber,
        Self::Crystal,
    ];

    /// Lowercase wire name, also used as the resource-node id prefix.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wood => "wood",
            Self::Stone => "stone",
            Self::Metal => "metal",
            Self::Fiber => "fiber",
            Self::Crystal => "crystal",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known [`Resource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownResource(pub String);

impl fmt::Display for UnknownResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource: {}", self.0)
    }
}

impl std::error::Error for UnknownResource {}

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownResource(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// StructureType
// ---------------------------------------------------------------------------

/// The kind of a placed structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StructureType {
    /// Wooden wall segment.
    Wall,
    /// Walkable floor tile. Never blocks placement of other structures.
    Floor,
    /// Door that blocks movement only while closed.
    Door,
    /// Storage chest.
    Storage,
    /// Reinforced wall segment.
    StoneWall,
    /// Low fence segment.
    Fence,
    /// Crafting workbench.
    Workbench,
    /// Campfire.
    Campfire,
}

impl StructureType {
    /// Whether the structure occupies space for collision purposes.
    ///
    /// Doors are collidable in principle; whether a particular door blocks
    /// depends on its open state.
    pub const fn is_solid(self) -> bool {
        !matches!(self, Self::Floor)
    }

    /// Whether the structure has an open/closed interaction state.
    pub const fn is_door(self) -> bool {
        matches!(self, Self::Door)
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Placement rotation, restricted to right angles.
///
/// Serialized as its degree value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    /// No rotation.
    #[default]
    Deg0,
    /// Quarter turn.
    Deg90,
    /// Half turn.
    Deg180,
    /// Three-quarter turn.
    Deg270,
}

impl Rotation {
    /// Rotation in degrees.
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Whether width and height trade places under this rotation.
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Returned when a rotation is not one of 0, 90, 180, or 270 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRotation(pub u16);

impl fmt::Display for InvalidRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rotation must be 0, 90, 180 or 270 degrees, got {}", self.0)
    }
}

impl std::error::Error for InvalidRotation {}

impl TryFrom<u16> for Rotation {
    type Error = InvalidRotation;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Whether a locally held entity has been seen back on the relay stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Provenance {
    /// Applied from a local action; its broadcast has not echoed back yet.
    Optimistic,
    /// Applied from, or confirmed by, an event received from a relay.
    Confirmed,
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// Entity categories reported in change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EntityKind {
    /// A placed structure.
    Structure,
    /// A land claim on a region.
    LandClaim,
    /// A harvestable resource node.
    ResourceNode,
    /// A guild.
    Guild,
    /// An actor inventory.
    Inventory,
    /// An actor's last known position.
    Player,
}

// ---------------------------------------------------------------------------
// TreasuryEntryType
// ---------------------------------------------------------------------------

/// Direction of a guild treasury movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TreasuryEntryType {
    /// A member moved resources from their inventory into the treasury.
    Deposit,
    /// A member took resources out of the treasury.
    Withdraw,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names_roundtrip() {
        for resource in Resource::ALL {
            assert_eq!(resource.as_str().parse::<Resource>().ok(), Some(resource));
        }
        assert!("gold".parse::<Resource>().is_err());
    }

    #[test]
    fn resource_serializes_lowercase() {
        let json = serde_json::to_string(&Resource::Crystal).ok();
        assert_eq!(json.as_deref(), Some("\"crystal\""));
    }

    #[test]
    fn rotation_accepts_right_angles_only() {
        assert_eq!(Rotation::try_from(90).ok(), Some(Rotation::Deg90));
        assert!(Rotation::try_from(45).is_err());
        let parsed: Result<Rotation, _> = serde_json::from_str("270");
        assert_eq!(parsed.ok(), Some(Rotation::Deg270));
        let rejected: Result<Rotation, _> = serde_json::from_str("30");
        assert!(rejected.is_err());
    }

    #[test]
    fn quarter_turns_swap_axes() {
        assert!(!Rotation::Deg0.swaps_axes());
        assert!(Rotation::Deg90.swaps_axes());
        assert!(!Rotation::Deg180.swaps_axes());
        assert!(Rotation::Deg270.swaps_axes());
    }

    #[test]
    fn structure_type_uses_snake_case() {
        let json = serde_json::to_string(&StructureType::StoneWall).ok();
        assert_eq!(json.as_deref(), Some("\"stone_wall\""));
    }

    #[test]
    fn floors_never_collide() {
        assert!(!StructureType::Floor.is_solid());
        assert!(StructureType::Door.is_solid());
        assert!(StructureType::Wall.is_solid());
    }
}
