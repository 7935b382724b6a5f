//! Integer discriminators for the domain event kinds.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A recognized domain event kind.
///
/// Codes sit in the parameterized-replaceable range used by public relays
/// so that relays index them without special configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A structure was placed.
    StructurePlaced,
    /// A structure was destroyed or decayed away.
    StructureRemoved,
    /// A door was toggled or a structure's permissions changed.
    StructureUpdated,
    /// A region was claimed.
    LandClaimed,
    /// A resource node was depleted or replenished.
    ResourceNodeUpdated,
    /// A gather completed.
    ResourceGathered,
    /// An actor broadcast their inventory totals.
    InventoryUpdated,
    /// Guild lifecycle, membership, territory, or treasury change.
    GuildManagement,
    /// An actor moved.
    PlayerMoved,
    /// Opaque signaling payload addressed to one actor.
    Signal,
}

impl EventKind {
    /// Every kind, in code order.
    pub const ALL: [Self; 10] = [
        Self::StructurePlaced,
        Self::StructureRemoved,
        Self::StructureUpdated,
        Self::LandClaimed,
        Self::ResourceNodeUpdated,
        Self::ResourceGathered,
        Self::InventoryUpdated,
        Self::GuildManagement,
        Self::PlayerMoved,
        Self::Signal,
    ];

    /// Wire discriminator.
    pub const fn code(self) -> u32 {
        match self {
            Self::StructurePlaced => 31001,
            Self::StructureRemoved => 31002,
            Self::StructureUpdated => 31003,
            Self::LandClaimed => 31101,
            Self::ResourceNodeUpdated => 31201,
            Self::ResourceGathered => 31202,
            Self::InventoryUpdated => 31301,
            Self::GuildManagement => 31401,
            Self::PlayerMoved => 31501,
            Self::Signal => 31601,
        }
    }

    /// Look up a kind by wire discriminator.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Value of the `t` tag attached to envelopes of this kind.
    pub const fn topic(self) -> &'static str {
        match self {
            Self::StructurePlaced | Self::StructureRemoved | Self::StructureUpdated => "structure",
            Self::LandClaimed => "land",
            Self::ResourceNodeUpdated | Self::ResourceGathered => "resource",
            Self::InventoryUpdated => "inventory",
            Self::GuildManagement => "guild",
            Self::PlayerMoved => "presence",
            Self::Signal => "signal",
        }
    }

    /// Kebab-case name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::StructurePlaced => "structure-placed",
            Self::StructureRemoved => "structure-removed",
            Self::StructureUpdated => "structure-updated",
            Self::LandClaimed => "land-claimed",
            Self::ResourceNodeUpdated => "resource-node-updated",
            Self::ResourceGathered => "resource-gathered",
            Self::InventoryUpdated => "inventory-updated",
            Self::GuildManagement => "guild-management",
            Self::PlayerMoved => "player-moved",
            Self::Signal => "signal",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique_and_resolvable() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_code(kind.code()), Some(kind));
        }
        let mut codes: Vec<u32> = EventKind::ALL.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), EventKind::ALL.len());
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(EventKind::from_code(1), None);
    }
}
