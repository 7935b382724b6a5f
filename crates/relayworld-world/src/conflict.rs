//! Deterministic resolution of contested exclusive resources.
//!
//! Land claims on one region and structures with overlapping footprints are
//! mutually exclusive. When a second event contests an entity already held,
//! the policy decides which side survives:
//!
//! 1. **Earliest timestamp**: the event with the smaller
//!    `(created_at, event id)` wins, regardless of arrival order, so every
//!    client converges on the same winner.
//! 2. **Arrival order**: whichever confirmed event this client applied
//!    first wins.
//!
//! Under both policies a confirmed event beats a local optimistic entity
//! whose own broadcast has not yet echoed back, unless the timestamp policy
//! says the optimistic one was first.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use relayworld_types::{EventId, Provenance};

/// The policy used to settle conflicting exclusive claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Smallest `(created_at, event id)` wins.
    #[default]
    EarliestTimestamp,
    /// First confirmed application wins.
    ArrivalOrder,
}

/// One side of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contender {
    /// Declared creation time of the event.
    pub created_at: DateTime<Utc>,
    /// Event identifier, the tie-breaker.
    pub event: EventId,
    /// Whether the side has been seen on the relay stream.
    pub provenance: Provenance,
}

impl Contender {
    const fn key(&self) -> (DateTime<Utc>, EventId) {
        (self.created_at, self.event)
    }
}

/// Which side survives a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The entity already held stays; the incoming event has no effect.
    KeepIncumbent,
    /// The incoming event displaces the held entity.
    Displace,
}

/// Settle a conflict between the held `incumbent` and an inbound
/// `challenger`.
pub fn resolve(incumbent: &Contender, challenger: &Contender, policy: ConflictPolicy) -> Resolution {
    match policy {
        ConflictPolicy::EarliestTimestamp => {
            if challenger.key() < incumbent.key() {
                Resolution::Displace
            } else {
                Resolution::KeepIncumbent
            }
        }
        ConflictPolicy::ArrivalOrder => {
            let optimistic_incumbent = incumbent.provenance == Provenance::Optimistic;
            let confirmed_challenger = challenger.provenance == Provenance::Confirmed;
            if optimistic_incumbent && confirmed_challenger {
                Resolution::Displace
            } else {
                Resolution::KeepIncumbent
            }
        }
    }
}
