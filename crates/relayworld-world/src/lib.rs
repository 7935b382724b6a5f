//! Spatial rules and time-driven lifecycles of the Relayworld world.
//!
//! Everything here is a pure function of entity state and a clock reading,
//! so each client can evaluate it independently and arrive at the same
//! answer.
//!
//! # Modules
//!
//! - [`spatial`] -- Footprint collision, region addressing, proximity
//! - [`structure`] -- Blueprints, placement cost, decay
//! - [`resource`] -- Node deplete/respawn and deterministic yield rolls
//! - [`gather`] -- Local gather session state machine
//! - [`land`] -- Claim activity, claimability, expiry
//! - [`conflict`] -- Policy for contested claims and placements
//! - [`seed`] -- Deterministic node generation
//! - [`random`] -- `xorshift64` helpers
//! - [`error`] -- [`WorldError`]

pub mod conflict;
pub mod error;
pub mod gather;
pub mod land;
pub mod random;
pub mod resource;
pub mod seed;
pub mod spatial;
pub mod structure;

pub use conflict::{ConflictPolicy, Contender, Resolution, resolve};
pub use error::WorldError;
pub use gather::{CancelReason, GatherSession, GatherState, check_gatherable};
pub use resource::{NodeRules, ResourceRules};
pub use seed::{SeedLayout, fixed_node, seed_nodes};
pub use spatial::{Aabb, Nearby, NearbyEntity, SpatialGrid, region_for, within_radius};
pub use structure::{Blueprint, blueprint, health_at, is_destroyed, max_health, placement_cost};
