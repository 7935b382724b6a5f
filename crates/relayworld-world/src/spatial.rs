//! Grid-bucketed spatial queries.
//!
//! Three query families: footprint collision against placed structures,
//! region addressing for land ownership, and Euclidean proximity over
//! players and resource nodes. Structures are bucketed by grid cell so that
//! a collision test only inspects structures sharing a cell with the
//! candidate footprint.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use relayworld_types::{
    ActorId, Footprint, Position, RegionId, ResourceNode, ResourceNodeId, Rotation, Structure,
    StructureId,
};

use crate::error::WorldError;

/// Cells touched by one footprint beyond which bucketing is abandoned and
/// the footprint is filed under a single overflow list.
const MAX_CELLS_PER_FOOTPRINT: i64 = 1024;

// ---------------------------------------------------------------------------
// Axis-aligned boxes
// ---------------------------------------------------------------------------

/// A rotation-resolved footprint placed in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum x.
    pub min_x: f64,
    /// Minimum y.
    pub min_y: f64,
    /// Maximum x.
    pub max_x: f64,
    /// Maximum y.
    pub max_y: f64,
}

impl Aabb {
    /// Box for a footprint at `position` under `rotation`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidPosition`] or
    /// [`WorldError::InvalidFootprint`] for non-finite or empty input.
    pub fn from_placement(
        position: Position,
        footprint: Footprint,
        rotation: Rotation,
    ) -> Result<Self, WorldError> {
        if !position.is_finite() {
            return Err(WorldError::InvalidPosition);
        }
        if !footprint.is_valid() {
            return Err(WorldError::InvalidFootprint);
        }
        let resolved = footprint.rotated(rotation);
        Ok(Self {
            min_x: position.x,
            min_y: position.y,
            max_x: position.x + resolved.width,
            max_y: position.y + resolved.height,
        })
    }

    /// Box occupied by a placed structure.
    pub fn of(structure: &Structure) -> Self {
        let resolved = structure.resolved_footprint();
        Self {
            min_x: structure.position.x,
            min_y: structure.position.y,
            max_x: structure.position.x + resolved.width,
            max_y: structure.position.y + resolved.height,
        }
    }

    /// Strict overlap test. Boxes that merely share an edge do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

// ---------------------------------------------------------------------------
// Region addressing
// ---------------------------------------------------------------------------

/// Region containing `position`, tiling the plane into squares of
/// `region_size`.
///
/// Returns `None` for non-finite positions or a non-positive tile size.
#[allow(clippy::cast_possible_truncation)] // float-to-int `as` saturates, which clamps far-out positions to the edge tiles
pub fn region_for(position: Position, region_size: f64) -> Option<RegionId> {
    if !position.is_finite() || !region_size.is_finite() || region_size <= 0.0 {
        return None;
    }
    let rx = (position.x / region_size).floor() as i32;
    let ry = (position.y / region_size).floor() as i32;
    Some(RegionId::new(rx, ry))
}

// ---------------------------------------------------------------------------
// Structure grid
// ---------------------------------------------------------------------------

type Cell = (i64, i64);

/// Bucket index of structures by grid cell.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<Cell, BTreeSet<StructureId>>,
    oversized: BTreeSet<StructureId>,
}

impl SpatialGrid {
    /// Create an empty grid. Non-positive sizes fall back to one unit.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            oversized: BTreeSet::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)] // saturating float-to-int conversion
    fn cell_index(&self, value: f64) -> i64 {
        (value / self.cell_size).floor() as i64
    }

    /// Cells covered by `bounds`, or `None` if there are too many to list.
    fn cells_for(&self, bounds: &Aabb) -> Option<Vec<Cell>> {
        let (x0, x1) = (self.cell_index(bounds.min_x), self.cell_index(bounds.max_x));
        let (y0, y1) = (self.cell_index(bounds.min_y), self.cell_index(bounds.max_y));
        let width = x1.checked_sub(x0)?.checked_add(1)?;
        let height = y1.checked_sub(y0)?.checked_add(1)?;
        if width.checked_mul(height)? > MAX_CELLS_PER_FOOTPRINT {
            return None;
        }
        let mut cells = Vec::new();
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                cells.push((cx, cy));
            }
        }
        Some(cells)
    }

    /// File a structure under every cell its footprint touches.
    pub fn insert(&mut self, structure: &Structure) {
        let bounds = Aabb::of(structure);
        match self.cells_for(&bounds) {
            Some(cells) => {
                for cell in cells {
                    self.cells.entry(cell).or_default().insert(structure.id);
                }
            }
            None => {
                self.oversized.insert(structure.id);
            }
        }
    }

    /// Remove a structure previously inserted with the same footprint.
    pub fn remove(&mut self, structure: &Structure) {
        let bounds = Aabb::of(structure);
        if let Some(cells) = self.cells_for(&bounds) {
            for cell in cells {
                if let Some(bucket) = self.cells.get_mut(&cell) {
                    bucket.remove(&structure.id);
                    if bucket.is_empty() {
                        self.cells.remove(&cell);
                    }
                }
            }
        }
        self.oversized.remove(&structure.id);
    }

    /// Structures sharing at least one cell with `bounds`.
    pub fn candidates(&self, bounds: &Aabb) -> BTreeSet<StructureId> {
        let mut found = self.oversized.clone();
        match self.cells_for(bounds) {
            Some(cells) => {
                for cell in cells {
                    if let Some(bucket) = self.cells.get(&cell) {
                        found.extend(bucket.iter().copied());
                    }
                }
            }
            None => {
                for bucket in self.cells.values() {
                    found.extend(bucket.iter().copied());
                }
            }
        }
        found
    }

    /// First collidable structure overlapping `bounds`, ignoring `except`.
    ///
    /// Open doors and floors never collide.
    pub fn first_collision(
        &self,
        bounds: &Aabb,
        structures: &BTreeMap<StructureId, Structure>,
        except: Option<StructureId>,
    ) -> Option<StructureId> {
        self.candidates(bounds)
            .into_iter()
            .filter(|id| Some(*id) != except)
            .filter_map(|id| structures.get(&id))
            .find(|s| s.is_collidable() && Aabb::of(s).overlaps(bounds))
            .map(|s| s.id)
    }
}

// ---------------------------------------------------------------------------
// Proximity
// ---------------------------------------------------------------------------

/// An entity found by a proximity query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NearbyEntity {
    /// A player at their last reported position.
    Player(ActorId),
    /// A resource node.
    Node(ResourceNodeId),
}

/// A proximity hit and its distance from the query center.
#[derive(Debug, Clone, PartialEq)]
pub struct Nearby {
    /// What was found.
    pub entity: NearbyEntity,
    /// Euclidean distance from the center.
    pub distance: f64,
}

/// All players and nodes within `radius` of `center`, nearest first.
pub fn within_radius<'a>(
    center: Position,
    radius: f64,
    players: impl IntoIterator<Item = (&'a ActorId, Position)>,
    nodes: impl IntoIterator<Item = &'a ResourceNode>,
) -> Vec<Nearby> {
    let mut hits: Vec<Nearby> = players
        .into_iter()
        .map(|(actor, position)| Nearby {
            entity: NearbyEntity::Player(actor.clone()),
            distance: center.distance_to(position),
        })
        .chain(nodes.into_iter().map(|node| Nearby {
            entity: NearbyEntity::Node(node.id.clone()),
            distance: center.distance_to(node.position),
        }))
        .filter(|hit| hit.distance <= radius)
        .collect();
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.entity.cmp(&b.entity))
    });
    hits
}
