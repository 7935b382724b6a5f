//! The reconciled in-memory world model.
//!
//! [`WorldStore`] owns every entity the client knows about and keeps the
//! collision grid in step with the structure map. It enforces no rules by
//! itself: the reconciler and local actions decide what to write, the store
//! only keeps the indexes consistent.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use relayworld_ledger::GuildRegistry;
use relayworld_types::{
    ActorId, Guild, Inventory, LandClaim, PlayerPresence, Position, Provenance, RegionId,
    ResourceNode, ResourceNodeId, Structure, StructureId,
};
use relayworld_world::{Aabb, Nearby, SpatialGrid, land, within_radius};

/// Entity counts for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorldStats {
    /// Placed structures.
    pub structures: usize,
    /// Structures still awaiting their echo.
    pub optimistic_structures: usize,
    /// Land claims held (active or awaiting the sweep).
    pub claims: usize,
    /// Nodes ready to gather.
    pub nodes_available: usize,
    /// Nodes waiting to respawn.
    pub nodes_depleted: usize,
    /// Known guilds.
    pub guilds: usize,
    /// Actors with a known position.
    pub players: usize,
}

/// Everything the client currently believes about the world.
#[derive(Debug, Clone)]
pub struct WorldStore {
    structures: BTreeMap<StructureId, Structure>,
    grid: SpatialGrid,
    claims: BTreeMap<RegionId, LandClaim>,
    nodes: BTreeMap<ResourceNodeId, ResourceNode>,
    guilds: GuildRegistry,
    inventories: BTreeMap<ActorId, Inventory>,
    presence: BTreeMap<ActorId, PlayerPresence>,
}

impl WorldStore {
    /// Create an empty store with a collision grid of `cell_size`.
    pub fn new(cell_size: f64) -> Self {
        Self {
            structures: BTreeMap::new(),
            grid: SpatialGrid::new(cell_size),
            claims: BTreeMap::new(),
            nodes: BTreeMap::new(),
            guilds: GuildRegistry::new(),
            inventories: BTreeMap::new(),
            presence: BTreeMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Structures
    // -----------------------------------------------------------------------

    /// All structures by id.
    pub const fn structures(&self) -> &BTreeMap<StructureId, Structure> {
        &self.structures
    }

    /// Look up a structure.
    pub fn structure(&self, id: &StructureId) -> Option<&Structure> {
        self.structures.get(id)
    }

    /// Mutable access for changes that do not move the footprint.
    pub fn structure_mut(&mut self, id: &StructureId) -> Option<&mut Structure> {
        self.structures.get_mut(id)
    }

    /// Insert a structure and index its footprint.
    pub fn insert_structure(&mut self, structure: Structure) {
        if let Some(previous) = self.structures.remove(&structure.id) {
            self.grid.remove(&previous);
        }
        self.grid.insert(&structure);
        debug!(structure = %structure.id, owner = %structure.owner, "Structure stored");
        self.structures.insert(structure.id, structure);
    }

    /// Remove a structure and drop it from the grid.
    pub fn remove_structure(&mut self, id: &StructureId) -> Option<Structure> {
        let removed = self.structures.remove(id)?;
        self.grid.remove(&removed);
        Some(removed)
    }

    /// Collidable structures overlapping `bounds`, ignoring `except`.
    pub fn collisions(&self, bounds: &Aabb, except: Option<StructureId>) -> Vec<StructureId> {
        self.grid
            .candidates(bounds)
            .into_iter()
            .filter(|id| Some(*id) != except)
            .filter_map(|id| self.structures.get(&id))
            .filter(|s| s.is_collidable() && Aabb::of(s).overlaps(bounds))
            .map(|s| s.id)
            .collect()
    }

    /// First collidable structure overlapping `bounds`, ignoring `except`.
    pub fn first_collision(&self, bounds: &Aabb, except: Option<StructureId>) -> Option<StructureId> {
        self.grid.first_collision(bounds, &self.structures, except)
    }

    // -----------------------------------------------------------------------
    // Land claims
    // -----------------------------------------------------------------------

    /// All claims by region, including lapsed ones not yet swept.
    pub const fn claims(&self) -> &BTreeMap<RegionId, LandClaim> {
        &self.claims
    }

    /// The claim in force on `region` at `now`.
    pub fn active_claim(&self, region: RegionId, now: DateTime<Utc>) -> Option<&LandClaim> {
        land::active_claim(&self.claims, region, now)
    }

    /// Whether `actor` holds the active claim on `region`.
    pub fn owns_region(&self, region: RegionId, actor: &ActorId, now: DateTime<Utc>) -> bool {
        land::is_owned_by(&self.claims, region, actor, now)
    }

    /// Guild holding `region` as territory at `now`.
    ///
    /// Territory stands on an active claim held by a current admin of the
    /// guild. Once that claim lapses or passes to an outsider the territory
    /// admits nobody.
    pub fn territory_holder(&self, region: RegionId, now: DateTime<Utc>) -> Option<&Guild> {
        let claim = self.active_claim(region, now)?;
        self.guilds
            .listing_territory(region)
            .find(|g| g.admins.contains(&claim.owner))
    }

    /// Store a claim, replacing any previous claim on the same region.
    pub fn insert_claim(&mut self, claim: LandClaim) -> Option<LandClaim> {
        self.claims.insert(claim.region, claim)
    }

    /// Remove the claim on `region`.
    pub fn remove_claim(&mut self, region: RegionId) -> Option<LandClaim> {
        self.claims.remove(&region)
    }

    /// Mutable access to the claim on `region`.
    pub fn claim_mut(&mut self, region: RegionId) -> Option<&mut LandClaim> {
        self.claims.get_mut(&region)
    }

    // -----------------------------------------------------------------------
    // Resource nodes
    // -----------------------------------------------------------------------

    /// Replace the node set with freshly seeded nodes.
    pub fn seed_nodes(&mut self, nodes: impl IntoIterator<Item = ResourceNode>) {
        self.nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
    }

    /// All nodes by id.
    pub const fn nodes(&self) -> &BTreeMap<ResourceNodeId, ResourceNode> {
        &self.nodes
    }

    /// Look up a node.
    pub fn node(&self, id: &ResourceNodeId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Mutable access to a node.
    pub fn node_mut(&mut self, id: &ResourceNodeId) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(id)
    }

    /// Mutable access to every node, for the respawn sweep.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut ResourceNode> {
        self.nodes.values_mut()
    }

    // -----------------------------------------------------------------------
    // Guilds
    // -----------------------------------------------------------------------

    /// The guild registry.
    pub const fn guilds(&self) -> &GuildRegistry {
        &self.guilds
    }

    /// Mutable guild registry.
    pub const fn guilds_mut(&mut self) -> &mut GuildRegistry {
        &mut self.guilds
    }

    // -----------------------------------------------------------------------
    // Inventories & presence
    // -----------------------------------------------------------------------

    /// Inventory of `actor`, if anything is known about it.
    pub fn inventory(&self, actor: &ActorId) -> Option<&Inventory> {
        self.inventories.get(actor)
    }

    /// Inventory of `actor`, created empty on first use.
    pub fn inventory_mut(&mut self, actor: &ActorId) -> &mut Inventory {
        self.inventories.entry(actor.clone()).or_default()
    }

    /// Last known position of `actor`.
    pub fn position_of(&self, actor: &ActorId) -> Option<Position> {
        self.presence.get(actor).map(|p| p.position)
    }

    /// Last known presence of `actor`.
    pub fn presence(&self, actor: &ActorId) -> Option<&PlayerPresence> {
        self.presence.get(actor)
    }

    /// Record a position report, keeping the newest one per actor.
    ///
    /// Returns `false` if an equally new or newer report is already held.
    pub fn record_presence(&mut self, presence: PlayerPresence) -> bool {
        if let Some(current) = self.presence.get(&presence.actor)
            && current.seen_at > presence.seen_at
        {
            return false;
        }
        self.presence.insert(presence.actor.clone(), presence);
        true
    }

    /// Players and nodes within `radius` of `center`, nearest first.
    pub fn nearby(&self, center: Position, radius: f64) -> Vec<Nearby> {
        within_radius(
            center,
            radius,
            self.presence.iter().map(|(actor, p)| (actor, p.position)),
            self.nodes.values(),
        )
    }

    /// Entity counts.
    pub fn stats(&self) -> WorldStats {
        let nodes_depleted = self.nodes.values().filter(|n| n.is_depleted()).count();
        WorldStats {
            structures: self.structures.len(),
            optimistic_structures: self
                .structures
                .values()
                .filter(|s| s.provenance == Provenance::Optimistic)
                .count(),
            claims: self.claims.len(),
            nodes_available: self.nodes.len().saturating_sub(nodes_depleted),
            nodes_depleted,
            guilds: self.guilds.len(),
            players: self.presence.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use relayworld_types::{
        EventId, Footprint, NodeState, PaymentProof, Resource, Rotation, StructurePermissions,
        StructureType,
    };

    use super::*;

    fn make_structure(x: f64, structure_type: StructureType) -> Structure {
        Structure {
            id: StructureId::new(),
            structure_type,
            owner: ActorId::new("alice"),
            position: Position::new(x, 0.0),
            rotation: Rotation::Deg0,
            footprint: Footprint::new(4.0, 1.0),
            material: Resource::Wood,
            max_health: 100,
            decay_per_hour: 2,
            placed_at: Utc::now(),
            permissions: StructurePermissions::default(),
            open: false,
            provenance: Provenance::Optimistic,
            origin_event: EventId::new(),
        }
    }

    #[test]
    fn removal_clears_the_grid() {
        let mut store = WorldStore::new(8.0);
        let wall = make_structure(0.0, StructureType::Wall);
        let id = wall.id;
        store.insert_structure(wall);

        let query = Aabb::from_placement(Position::new(1.0, 0.0), Footprint::new(1.0, 1.0), Rotation::Deg0)
            .unwrap();
        assert_eq!(store.first_collision(&query, None), Some(id));
        assert_eq!(store.first_collision(&query, Some(id)), None);

        assert!(store.remove_structure(&id).is_some());
        assert_eq!(store.first_collision(&query, None), None);
        assert!(store.collisions(&query, None).is_empty());
    }

    #[test]
    fn open_doors_stop_colliding() {
        let mut store = WorldStore::new(8.0);
        let door = make_structure(0.0, StructureType::Door);
        let id = door.id;
        store.insert_structure(door);
        let query = Aabb::from_placement(Position::new(1.0, 0.0), Footprint::new(1.0, 1.0), Rotation::Deg0)
            .unwrap();
        assert_eq!(store.collisions(&query, None), vec![id]);
        store.structure_mut(&id).unwrap().open = true;
        assert!(store.collisions(&query, None).is_empty());
    }

    #[test]
    fn presence_keeps_the_newest_report() {
        let mut store = WorldStore::new(8.0);
        let now = Utc::now();
        let alice = ActorId::new("alice");
        assert!(store.record_presence(PlayerPresence {
            actor: alice.clone(),
            position: Position::new(5.0, 5.0),
            seen_at: now,
        }));
        assert!(!store.record_presence(PlayerPresence {
            actor: alice.clone(),
            position: Position::new(9.0, 9.0),
            seen_at: now - Duration::seconds(1),
        }));
        assert_eq!(store.position_of(&alice), Some(Position::new(5.0, 5.0)));
    }

    #[test]
    fn stats_count_entities() {
        let mut store = WorldStore::new(8.0);
        let now = Utc::now();
        store.insert_structure(make_structure(0.0, StructureType::Wall));
        store.seed_nodes([
            ResourceNode {
                id: ResourceNodeId::seeded(Resource::Wood, 0),
                resource: Resource::Wood,
                position: Position::new(0.0, 0.0),
                state: NodeState::Available { amount: 2 },
            },
            ResourceNode {
                id: ResourceNodeId::seeded(Resource::Wood, 1),
                resource: Resource::Wood,
                position: Position::new(3.0, 0.0),
                state: NodeState::Depleted { respawn_at: now },
            },
        ]);
        store.insert_claim(LandClaim {
            region: RegionId::new(0, 0),
            owner: ActorId::new("alice"),
            expires_at: now + Duration::days(1),
            payment_proof: PaymentProof("lnbc1".to_owned()),
            claimed_at: now,
            origin_event: EventId::new(),
            provenance: Provenance::Confirmed,
        });

        let stats = store.stats();
        assert_eq!(stats.structures, 1);
        assert_eq!(stats.optimistic_structures, 1);
        assert_eq!(stats.claims, 1);
        assert_eq!(stats.nodes_available, 1);
        assert_eq!(stats.nodes_depleted, 1);
        assert!(store.owns_region(RegionId::new(0, 0), &ActorId::new("alice"), now));
    }
}
