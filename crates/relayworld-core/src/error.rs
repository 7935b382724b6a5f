//! Error types for the `relayworld-core` crate.

use relayworld_events::CodecError;
use relayworld_ledger::LedgerError;
use relayworld_types::{ActorId, RegionId, StructureId};
use relayworld_world::WorldError;

/// A local action was refused before anything was published or mutated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PreconditionFailure {
    /// A spatial or lifecycle rule was violated.
    #[error(transparent)]
    World(#[from] WorldError),

    /// A guild, treasury, or inventory rule was violated.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The resulting event could not be encoded.
    #[error("event could not be encoded: {0}")]
    Encode(String),

    /// No structure with this id is known.
    #[error("structure not found: {0}")]
    UnknownStructure(StructureId),

    /// Only the owner may do this to the structure.
    #[error("{actor} does not own structure {structure}")]
    NotOwner {
        /// The structure.
        structure: StructureId,
        /// The actor.
        actor: ActorId,
    },

    /// The structure is not a door.
    #[error("structure {0} is not a door")]
    NotADoor(StructureId),

    /// The actor may not interact with the structure.
    #[error("{actor} may not use structure {structure}")]
    AccessDenied {
        /// The structure.
        structure: StructureId,
        /// The actor.
        actor: ActorId,
    },

    /// The actor may not build in the region.
    #[error("{actor} may not build in region {region}")]
    BuildNotPermitted {
        /// The region.
        region: RegionId,
        /// The actor.
        actor: ActorId,
    },

    /// The guild name is empty or too long.
    #[error("guild name must be 1 to {max} characters")]
    InvalidGuildName {
        /// Longest accepted name.
        max: usize,
    },

    /// An actor id in the action is malformed.
    #[error("malformed actor id: {0}")]
    InvalidActor(String),

    /// There is no gather in progress to cancel.
    #[error("no gather in progress")]
    NoActiveGather,

    /// The payment collaborator could not produce a proof.
    #[error("payment failed: {0}")]
    Payment(String),
}

impl From<CodecError> for PreconditionFailure {
    fn from(error: CodecError) -> Self {
        Self::Encode(error.to_string())
    }
}

/// Errors raised by a relay transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The relay could not be reached or refused the operation.
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    /// The envelope could not be serialized.
    #[error("failed to serialize envelope: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The subscription's receiving side has gone away.
    #[error("subscription closed")]
    Closed,
}

/// Errors that stop the client loop.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Subscribing to the relay failed.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying transport error.
        #[from]
        source: TransportError,
    },
}
