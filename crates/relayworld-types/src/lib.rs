//! Shared type definitions for the Relayworld reconciliation engine.
//!
//! Every crate in the workspace speaks in these types. Entity and id types
//! are exported to `TypeScript` via `ts-rs` for the presentation layer.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier newtypes (UUID v7 ids, actor keys, region and node ids)
//! - [`enums`] -- Resources, structure types, rotation, provenance
//! - [`structs`] -- Structures, land claims, resource nodes, guilds, inventories

pub mod enums;
pub mod ids;
pub mod structs;

pub use enums::{
    EntityKind, InvalidRotation, Provenance, Resource, Rotation, StructureType,
    TreasuryEntryType, UnknownResource,
};
pub use ids::{
    ActorId, EventId, GuildId, ParseRegionError, RegionId, ResourceNodeId, StructureId,
    TreasuryEntryId,
};
pub use structs::{
    Footprint, Guild, Inventory, LandClaim, NodeState, PaymentProof, PlayerPresence, Position,
    ResourceNode, Structure, StructurePermissions, TreasuryEntry,
};

#[cfg(test)]
mod tests {
    #[test]
    fn export_bindings() {
        // Writes the TypeScript bindings to `bindings/` next to the crate.
        use ts_rs::TS;

        let _ = crate::ids::EventId::export_all();
        let _ = crate::ids::StructureId::export_all();
        let _ = crate::ids::GuildId::export_all();
        let _ = crate::ids::TreasuryEntryId::export_all();
        let _ = crate::ids::ActorId::export_all();
        let _ = crate::ids::ResourceNodeId::export_all();

        let _ = crate::enums::Resource::export_all();
        let _ = crate::enums::StructureType::export_all();
        let _ = crate::enums::Provenance::export_all();
        let _ = crate::enums::EntityKind::export_all();
        let _ = crate::enums::TreasuryEntryType::export_all();

        let _ = crate::structs::Position::export_all();
        let _ = crate::structs::Footprint::export_all();
        let _ = crate::structs::StructurePermissions::export_all();
        let _ = crate::structs::Structure::export_all();
        let _ = crate::structs::PaymentProof::export_all();
        let _ = crate::structs::LandClaim::export_all();
        let _ = crate::structs::NodeState::export_all();
        let _ = crate::structs::ResourceNode::export_all();
        let _ = crate::structs::Guild::export_all();
        let _ = crate::structs::TreasuryEntry::export_all();
        let _ = crate::structs::Inventory::export_all();
        let _ = crate::structs::PlayerPresence::export_all();
    }
}
