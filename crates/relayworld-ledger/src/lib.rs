//! Guilds, treasuries, and inventories for Relayworld.
//!
//! Everything that moves resources between actors and guilds lives here.
//! The ledger does not know about transport: callers hand it operations
//! together with the signer and timestamp of the event that carried them.
//!
//! # Modules
//!
//! - [`guild`] -- [`GuildRegistry`] with local precondition checks and
//!   event-driven reconciliation
//! - [`treasury`] -- Append-only treasury entries and balances
//! - [`inventory`] -- Checked inventory arithmetic
//! - [`error`] -- [`LedgerError`]

pub mod error;
pub mod guild;
pub mod inventory;
pub mod treasury;

pub use error::LedgerError;
pub use guild::{GuildChange, GuildOp, GuildRegistry, OpContext};
pub use treasury::{TreasuryEntryBuilder, apply_entry, replay_balances, signed_delta};
