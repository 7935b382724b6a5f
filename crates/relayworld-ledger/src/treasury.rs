//! Guild treasury entries and balances.
//!
//! The treasury is an append-only list of [`TreasuryEntry`] values. Each
//! guild also carries running balances, updated as entries are applied in
//! event order. Balances are allowed to go negative: two members racing a
//! withdrawal past the same balance are both honoured once broadcast.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use relayworld_types::{
    ActorId, EventId, GuildId, Resource, TreasuryEntry, TreasuryEntryId, TreasuryEntryType,
};

use crate::error::LedgerError;

// ---------------------------------------------------------------------------
// Entry builder
// ---------------------------------------------------------------------------

/// Builder for validated [`TreasuryEntry`] values.
#[derive(Debug)]
pub struct TreasuryEntryBuilder {
    guild: GuildId,
    entry_type: TreasuryEntryType,
    resource: Resource,
    actor: Option<ActorId>,
    quantity: Option<Decimal>,
    event: Option<(EventId, DateTime<Utc>)>,
}

impl TreasuryEntryBuilder {
    /// Start an entry for `guild`.
    pub const fn new(guild: GuildId, entry_type: TreasuryEntryType, resource: Resource) -> Self {
        Self {
            guild,
            entry_type,
            resource,
            actor: None,
            quantity: None,
            event: None,
        }
    }

    /// Member moving the resources.
    #[must_use]
    pub fn actor(mut self, actor: ActorId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Positive quantity moved.
    #[must_use]
    pub const fn quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Event that records the movement.
    #[must_use]
    pub const fn event(mut self, id: EventId, created_at: DateTime<Utc>) -> Self {
        self.event = Some((id, created_at));
        self
    }

    /// Validate and produce the entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingField`] for unset fields and
    /// [`LedgerError::NonPositiveQuantity`] for zero or negative quantities.
    pub fn build(self) -> Result<TreasuryEntry, LedgerError> {
        let actor = self.actor.ok_or(LedgerError::MissingField("actor"))?;
        let quantity = self.quantity.ok_or(LedgerError::MissingField("quantity"))?;
        let (event, created_at) = self.event.ok_or(LedgerError::MissingField("event"))?;
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveQuantity { quantity });
        }
        Ok(TreasuryEntry {
            id: TreasuryEntryId::new(),
            guild: self.guild,
            actor,
            entry_type: self.entry_type,
            resource: self.resource,
            quantity,
            event,
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

/// Signed effect of an entry on its guild's balance.
pub fn signed_delta(entry: &TreasuryEntry) -> Decimal {
    match entry.entry_type {
        TreasuryEntryType::Deposit => entry.quantity,
        TreasuryEntryType::Withdraw => -entry.quantity,
    }
}

/// Apply an entry to a balance map.
///
/// # Errors
///
/// Returns [`LedgerError::ArithmeticOverflow`] if the balance would leave
/// the representable range.
pub fn apply_entry(
    balances: &mut BTreeMap<Resource, Decimal>,
    entry: &TreasuryEntry,
) -> Result<Decimal, LedgerError> {
    let balance = balances.entry(entry.resource).or_insert(Decimal::ZERO);
    *balance = balance
        .checked_add(signed_delta(entry))
        .ok_or(LedgerError::ArithmeticOverflow)?;
    Ok(*balance)
}

/// Recompute a guild's balances from the append-only entry list.
pub fn replay_balances(entries: &[TreasuryEntry], guild: GuildId) -> BTreeMap<Resource, Decimal> {
    let mut balances = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.guild == guild) {
        let balance = balances.entry(entry.resource).or_insert(Decimal::ZERO);
        *balance = balance.saturating_add(signed_delta(entry));
    }
    balances
}
