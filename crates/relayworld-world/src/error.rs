//! Error types for the `relayworld-world` crate.
//!
//! These are precondition failures: a local action that would violate a
//! spatial or lifecycle rule is rejected with one of these before anything
//! is published.

use relayworld_types::{ActorId, RegionId, ResourceNodeId, StructureId};

/// Errors raised by spatial and lifecycle checks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// No resource node with this id exists.
    #[error("resource node not found: {0}")]
    NodeNotFound(ResourceNodeId),

    /// The node is depleted and cannot be gathered.
    #[error("resource node {0} is depleted")]
    NodeDepleted(ResourceNodeId),

    /// The requester is too far from the node.
    #[error("resource node {node} is {distance:.1} away, gather range is {range:.1}")]
    OutOfRange {
        /// Target node.
        node: ResourceNodeId,
        /// Measured distance.
        distance: f64,
        /// Allowed distance.
        range: f64,
    },

    /// The proposed footprint overlaps an existing collidable structure.
    #[error("placement collides with structure {0}")]
    Collision(StructureId),

    /// The footprint has a zero, negative, or non-finite extent.
    #[error("invalid footprint")]
    InvalidFootprint,

    /// A coordinate was NaN or infinite.
    #[error("invalid position")]
    InvalidPosition,

    /// The region already has an active claim.
    #[error("region {region} is already claimed by {owner}")]
    RegionClaimed {
        /// The contested region.
        region: RegionId,
        /// Current owner.
        owner: ActorId,
    },

    /// No payment proof accompanied the claim.
    #[error("land claim requires a payment proof")]
    MissingPaymentProof,

    /// A gather session was ticked after it had already finished.
    #[error("gather session is not in progress")]
    SessionNotActive,

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,
}
