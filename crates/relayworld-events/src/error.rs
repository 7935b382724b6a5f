//! Error types for the `relayworld-events` crate.

use crate::kind::EventKind;

/// Why an inbound envelope was rejected, or an outbound one could not be
/// built.
///
/// Inbound failures are logged and the envelope dropped. They never reach
/// the caller of the reconciliation loop.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A required envelope field was empty.
    #[error("missing envelope field: {0}")]
    MissingField(&'static str),

    /// The `kind` is not a domain event kind.
    #[error("unrecognized event kind {0}")]
    UnknownKind(u32),

    /// The envelope id is not a valid identifier.
    #[error("malformed event id: {0:?}")]
    MalformedEventId(String),

    /// The signer key is not well-formed.
    #[error("malformed actor key: {0:?}")]
    MalformedActor(String),

    /// The declared creation time cannot be represented or is too far ahead
    /// of the local clock.
    #[error("implausible created_at timestamp: {0}")]
    ImplausibleTimestamp(i64),

    /// The content did not match the schema of its kind.
    #[error("malformed {kind} content: {source}")]
    MalformedContent {
        /// Kind whose schema was violated.
        kind: EventKind,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A referenced identifier inside the content is malformed.
    #[error("malformed {field} reference: {value:?}")]
    MalformedReference {
        /// Content field holding the reference.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// A coordinate or extent was NaN or infinite.
    #[error("non-finite coordinate in {0}")]
    NonFiniteCoordinate(&'static str),

    /// A footprint extent was zero or negative.
    #[error("footprint must have positive extents")]
    InvalidFootprint,

    /// A quantity that must be positive was zero or negative.
    #[error("quantity must be positive in {0}")]
    NonPositiveQuantity(&'static str),

    /// A land claim carried no payment proof.
    #[error("land claim has no payment proof")]
    MissingPaymentProof,

    /// A land claim expiry was not after its creation time, or too far out.
    #[error("claim expiry {expiry} outside allowed window")]
    ClaimWindow {
        /// Declared expiry, unix seconds.
        expiry: i64,
    },

    /// A guild name was empty or too long.
    #[error("invalid guild name")]
    InvalidGuildName,

    /// Content exceeded the configured size bound.
    #[error("content of {size} bytes exceeds limit of {limit}")]
    ContentTooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Outbound content could not be serialized.
    #[error("failed to encode content: {source}")]
    Encode {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
