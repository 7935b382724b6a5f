//! Error types for the `relayworld-ledger` crate.

use rust_decimal::Decimal;

use relayworld_types::{ActorId, GuildId, RegionId, Resource};

/// Errors raised by guild, treasury, and inventory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Treasury quantities must be strictly positive.
    #[error("quantity must be positive, got {quantity}")]
    NonPositiveQuantity {
        /// The invalid quantity.
        quantity: Decimal,
    },

    /// Inventory transfers must move whole units that fit a `u32`.
    #[error("quantity {quantity} is not a whole number of units")]
    FractionalQuantity {
        /// The invalid quantity.
        quantity: Decimal,
    },

    /// A required builder field was not set.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The actor holds less of a resource than required.
    #[error("insufficient {resource}: need {required}, have {available}")]
    InsufficientResource {
        /// The resource.
        resource: Resource,
        /// Amount required.
        required: u32,
        /// Amount held.
        available: u32,
    },

    /// The guild treasury holds less than a local withdrawal asks for.
    #[error("guild treasury holds {available} {resource}, cannot withdraw {requested}")]
    InsufficientTreasury {
        /// The resource.
        resource: Resource,
        /// Amount requested.
        requested: Decimal,
        /// Treasury balance.
        available: Decimal,
    },

    /// No guild with this id exists.
    #[error("guild not found: {0}")]
    GuildNotFound(GuildId),

    /// A guild with this id already exists.
    #[error("guild already exists: {0}")]
    GuildExists(GuildId),

    /// The actor is not a member of the guild.
    #[error("{actor} is not a member of guild {guild}")]
    NotAMember {
        /// The guild.
        guild: GuildId,
        /// The actor.
        actor: ActorId,
    },

    /// The actor is already a member of the guild.
    #[error("{actor} is already a member of guild {guild}")]
    AlreadyMember {
        /// The guild.
        guild: GuildId,
        /// The actor.
        actor: ActorId,
    },

    /// The actor is not an admin of the guild.
    #[error("{actor} is not an admin of guild {guild}")]
    NotAnAdmin {
        /// The guild.
        guild: GuildId,
        /// The actor.
        actor: ActorId,
    },

    /// Only the founder may perform this action.
    #[error("only the founder of guild {0} may do this")]
    NotFounder(GuildId),

    /// The founder cannot leave or be demoted.
    #[error("the founder of guild {0} cannot leave or be demoted")]
    FounderIsPermanent(GuildId),

    /// The admin does not hold an active claim on the region.
    #[error("{actor} holds no active claim on region {region}")]
    TerritoryNotOwned {
        /// The region.
        region: RegionId,
        /// The admin.
        actor: ActorId,
    },

    /// The guild name is empty.
    #[error("guild name must not be empty")]
    EmptyName,

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in ledger calculation")]
    ArithmeticOverflow,
}
