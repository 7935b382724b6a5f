//! The signed wire unit carried by relays.
//!
//! Envelopes arrive from an untrusted network, so every field is kept in its
//! raw form here. [`crate::codec::decode`] is the only way to turn one into a
//! typed [`crate::DomainEvent`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A broadcast event as published to and received from relays.
///
/// Signature verification happens in the transport before an envelope
/// reaches the engine, so no signature field is carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Envelope {
    /// Unique event identifier.
    #[serde(default)]
    pub id: String,
    /// Integer discriminator of the event type.
    #[serde(default)]
    pub kind: u32,
    /// Public key of the signer.
    #[serde(default, alias = "pubkey")]
    pub actor: String,
    /// Creation time in unix seconds, as declared by the signer.
    #[serde(default)]
    pub created_at: i64,
    /// JSON document whose schema depends on `kind`.
    #[serde(default)]
    pub content: String,
    /// Indexable key/value tags, e.g. `["t", "structure"]`.
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
}

impl Envelope {
    /// First value of the first tag named `name`.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.iter().find_map(|tag| match tag.as_slice() {
            [key, value, ..] if key == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// Parse an envelope from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the bytes are not an envelope.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize the envelope to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
