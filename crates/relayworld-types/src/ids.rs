//! Type-safe identifier wrappers.
//!
//! Locally generated entities (structures, guilds, events, treasury
//! entries) use UUID v7 so that ids sort by creation time and can act as a
//! deterministic tie-breaker between events with the same timestamp.
//!
//! Actors are identified by the public key the transport verified the
//! signature against, so [`ActorId`] is a string newtype. Resource nodes use
//! human-readable seeded names such as `wood-0`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::enums::Resource;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id! {
    /// Unique identifier for a broadcast event envelope.
    EventId
}

define_id! {
    /// Unique identifier for a placed structure.
    StructureId
}

define_id! {
    /// Unique identifier for a guild.
    GuildId
}

define_id! {
    /// Unique identifier for a guild treasury entry.
    TreasuryEntryId
}

// ---------------------------------------------------------------------------
// ActorId
// ---------------------------------------------------------------------------

/// Maximum accepted length of an actor public key string.
pub const MAX_ACTOR_ID_LEN: usize = 128;

/// The signer of an event: a public key rendered as a string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActorId(pub String);

impl ActorId {
    /// Wrap a public key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is non-empty, bounded, and free of whitespace.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= MAX_ACTOR_ID_LEN
            && !self.0.chars().any(char::is_whitespace)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ResourceNodeId
// ---------------------------------------------------------------------------

/// Identifier of a seeded resource node, formatted `<resource>-<index>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceNodeId(pub String);

impl ResourceNodeId {
    /// Build the id of the `index`-th node of the given resource.
    pub fn seeded(resource: Resource, index: u32) -> Self {
        Self(format!("{}-{index}", resource.as_str()))
    }

    /// Borrow the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the id into its resource and index parts.
    ///
    /// Returns `None` when the id does not follow the seeded format.
    pub fn parts(&self) -> Option<(Resource, u32)> {
        let (name, index) = self.0.rsplit_once('-')?;
        let resource = Resource::from_str(name).ok()?;
        let index = index.parse::<u32>().ok()?;
        Some((resource, index))
    }
}

impl fmt::Display for ResourceNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RegionId
// ---------------------------------------------------------------------------

/// A fixed-size land tile addressed by integer-divided coordinates.
///
/// Rendered as `"<rx>-<ry>"`, e.g. `"3-3"` or `"-1--2"`.
///
/// Bindings render it as a plain `string`; fields holding one carry a
/// `#[ts(type = "string")]` override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId {
    /// Tile column.
    pub x: i32,
    /// Tile row.
    pub y: i32,
}

impl RegionId {
    /// Construct a region id from tile coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.x, self.y)
    }
}

/// Error returned when a region string is not of the form `"<rx>-<ry>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRegionError(pub String);

impl fmt::Display for ParseRegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid region id: {:?}", self.0)
    }
}

impl std::error::Error for ParseRegionError {}

impl FromStr for RegionId {
    type Err = ParseRegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The separator is the first dash that follows a digit, so a leading
        // minus sign on either coordinate is kept with its number.
        let bytes = s.as_bytes();
        let split = bytes
            .iter()
            .enumerate()
            .skip(1)
            .find(|(i, b)| {
                **b == b'-'
                    && i.checked_sub(1)
                        .and_then(|prev| bytes.get(prev))
                        .is_some_and(u8::is_ascii_digit)
            })
            .map(|(i, _)| i)
            .ok_or_else(|| ParseRegionError(s.to_owned()))?;

        let (left, right) = s.split_at(split);
        let right = right.get(1..).ok_or_else(|| ParseRegionError(s.to_owned()))?;
        match (left.parse::<i32>(), right.parse::<i32>()) {
            (Ok(x), Ok(y)) => Ok(Self { x, y }),
            _ => Err(ParseRegionError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for RegionId {
    type Error = ParseRegionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RegionId> for String {
    fn from(region: RegionId) -> Self {
        region.to_string()
    }
}
