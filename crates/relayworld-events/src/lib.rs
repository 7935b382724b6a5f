//! Wire envelope, codec, and idempotency filter for Relayworld.
//!
//! Relays carry [`Envelope`]s: signed, timestamped, tagged JSON documents.
//! This crate turns them into typed [`DomainEvent`]s (and back), and
//! provides the [`IdempotencyFilter`] that makes at-least-once delivery
//! safe to apply.
//!
//! # Modules
//!
//! - [`envelope`] -- Raw wire unit
//! - [`kind`] -- Integer kind discriminators
//! - [`domain`] -- Typed events and per-kind content schemas
//! - [`codec`] -- Validation (`decode`) and encoding (`encode`)
//! - [`dedup`] -- Bounded applied-id set
//! - [`error`] -- [`CodecError`]

pub mod codec;
pub mod dedup;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod kind;

pub use codec::{CodecLimits, decode, encode};
pub use dedup::IdempotencyFilter;
pub use domain::{
    DomainEvent, EventBody, GuildAction, GuildActionKind, InventoryUpdated, LandClaimed,
    PlayerMoved, ResourceGathered, ResourceNodeUpdated, Signal, StructureChange,
    StructurePlaced, StructureRemoved, StructureUpdated,
};
pub use envelope::Envelope;
pub use error::CodecError;
pub use kind::EventKind;
