//! Structure blueprints and decay.
//!
//! - [`blueprint`] returns the default footprint, durability, decay rate,
//!   and material cost for each [`StructureType`]
//! - [`health_at`] derives current health from placement time, so decay is
//!   a pure function of `(structure, now)` and never needs a broadcast

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use relayworld_types::{Footprint, Resource, Structure, StructureType};

/// Static parameters of a structure type.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    /// Default unrotated footprint.
    pub footprint: Footprint,
    /// Health at placement, before the material multiplier.
    pub base_health: u32,
    /// Health lost per elapsed hour.
    pub decay_per_hour: u32,
    /// Units of the chosen material consumed on placement.
    pub material_units: u32,
}

/// Return the blueprint for a given [`StructureType`].
pub const fn blueprint(structure_type: StructureType) -> Blueprint {
    let (width, height, base_health, decay_per_hour, material_units) = match structure_type {
        StructureType::Wall => (4.0, 1.0, 100, 2, 4),
        StructureType::Floor => (4.0, 4.0, 80, 1, 4),
        StructureType::Door => (2.0, 1.0, 60, 2, 3),
        StructureType::Storage => (2.0, 2.0, 80, 1, 6),
        StructureType::StoneWall => (4.0, 1.0, 250, 1, 6),
        StructureType::Fence => (4.0, 0.5, 40, 3, 2),
        StructureType::Workbench => (3.0, 2.0, 100, 1, 5),
        StructureType::Campfire => (2.0, 2.0, 50, 5, 3),
    };
    Blueprint {
        footprint: Footprint::new(width, height),
        base_health,
        decay_per_hour,
        material_units,
    }
}

/// Durability multiplier of a building material.
pub const fn material_multiplier(material: Resource) -> u32 {
    match material {
        Resource::Wood | Resource::Fiber => 1,
        Resource::Stone | Resource::Crystal => 2,
        Resource::Metal => 3,
    }
}

/// Health at placement for a type built from `material`.
pub const fn max_health(structure_type: StructureType, material: Resource) -> u32 {
    blueprint(structure_type)
        .base_health
        .saturating_mul(material_multiplier(material))
}

/// Resources consumed by placing a structure of this type and material.
pub fn placement_cost(structure_type: StructureType, material: Resource) -> BTreeMap<Resource, u32> {
    BTreeMap::from([(material, blueprint(structure_type).material_units)])
}

/// Health remaining at `now`. Whole elapsed hours count towards decay.
pub fn health_at(structure: &Structure, now: DateTime<Utc>) -> u32 {
    let elapsed_hours = now
        .signed_duration_since(structure.placed_at)
        .num_hours()
        .max(0);
    let elapsed_hours = u32::try_from(elapsed_hours).unwrap_or(u32::MAX);
    let decayed = elapsed_hours.saturating_mul(structure.decay_per_hour);
    structure.max_health.saturating_sub(decayed)
}

/// Whether decay has worn the structure down to nothing at `now`.
pub fn is_destroyed(structure: &Structure, now: DateTime<Utc>) -> bool {
    health_at(structure, now) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use relayworld_types::{
        ActorId, EventId, Position, Provenance, Rotation, StructureId, StructurePermissions,
    };

    use super::*;

    fn make_structure(placed_at: DateTime<Utc>) -> Structure {
        Structure {
            id: StructureId::new(),
            structure_type: StructureType::Wall,
            owner: ActorId::new("alice"),
            position: Position::new(0.0, 0.0),
            rotation: Rotation::Deg0,
            footprint: blueprint(StructureType::Wall).footprint,
            material: Resource::Wood,
            max_health: max_health(StructureType::Wall, Resource::Wood),
            decay_per_hour: blueprint(StructureType::Wall).decay_per_hour,
            placed_at,
            permissions: StructurePermissions::default(),
            open: false,
            provenance: Provenance::Confirmed,
            origin_event: EventId::new(),
        }
    }

    #[test]
    fn fresh_structure_is_at_full_health() {
        let now = Utc::now();
        let wall = make_structure(now);
        assert_eq!(health_at(&wall, now), 100);
    }

    #[test]
    fn decay_counts_whole_hours() {
        let placed = Utc::now();
        let wall = make_structure(placed);
        assert_eq!(health_at(&wall, placed + Duration::minutes(59)), 100);
        assert_eq!(health_at(&wall, placed + Duration::hours(10)), 80);
    }

    #[test]
    fn decay_bottoms_out_at_zero() {
        let placed = Utc::now();
        let wall = make_structure(placed);
        assert!(!is_destroyed(&wall, placed + Duration::hours(49)));
        assert!(is_destroyed(&wall, placed + Duration::hours(50)));
        assert_eq!(health_at(&wall, placed + Duration::days(365)), 0);
    }

    #[test]
    fn clock_behind_placement_does_not_heal() {
        let placed = Utc::now();
        let wall = make_structure(placed);
        assert_eq!(health_at(&wall, placed - Duration::hours(5)), 100);
    }

    #[test]
    fn material_scales_health() {
        assert_eq!(max_health(StructureType::Wall, Resource::Stone), 200);
        assert_eq!(max_health(StructureType::Wall, Resource::Metal), 300);
    }

    #[test]
    fn placement_cost_uses_material() {
        let cost = placement_cost(StructureType::Storage, Resource::Stone);
        assert_eq!(cost.get(&Resource::Stone), Some(&6));
        assert_eq!(cost.len(), 1);
    }
}
