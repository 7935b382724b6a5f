//! Envelope validation and encoding.
//!
//! [`decode`] is the boundary between the untrusted relay stream and the
//! reconciler: anything it returns is structurally sound and semantically
//! plausible. Whether the event's effect is *allowed* given current world
//! state is decided later, during reconciliation.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use relayworld_types::{ActorId, EventId};

use crate::domain::{
    DomainEvent, EventBody, GuildAction, GuildActionKind, GuildManagementContent, MemberPayload,
    NamePayload, RegionPayload, StructureChange, TransferPayload,
};
use crate::envelope::Envelope;
use crate::error::CodecError;
use crate::kind::EventKind;

/// Longest accepted guild name, in characters.
pub const MAX_GUILD_NAME_LEN: usize = 64;

/// Bounds applied while validating inbound envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLimits {
    /// How far ahead of the local clock `created_at` may be.
    pub max_future_skew: Duration,
    /// Longest accepted land-claim duration.
    pub max_claim_duration: Duration,
    /// Largest accepted `content` string, in bytes.
    pub max_content_bytes: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_future_skew: Duration::minutes(10),
            max_claim_duration: Duration::days(30),
            max_content_bytes: 16 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Validate a raw envelope and produce a typed event.
///
/// `now` is the local clock reading, used to reject events stamped
/// implausibly far in the future.
///
/// # Errors
///
/// Returns a [`CodecError`] describing the first violation found.
pub fn decode(
    envelope: &Envelope,
    limits: &CodecLimits,
    now: DateTime<Utc>,
) -> Result<DomainEvent, CodecError> {
    if envelope.id.is_empty() {
        return Err(CodecError::MissingField("id"));
    }
    if envelope.actor.is_empty() {
        return Err(CodecError::MissingField("actor"));
    }
    if envelope.content.is_empty() {
        return Err(CodecError::MissingField("content"));
    }
    if envelope.content.len() > limits.max_content_bytes {
        return Err(CodecError::ContentTooLarge {
            size: envelope.content.len(),
            limit: limits.max_content_bytes,
        });
    }

    let kind = EventKind::from_code(envelope.kind).ok_or(CodecError::UnknownKind(envelope.kind))?;

    let id: EventId = envelope
        .id
        .parse()
        .ok()
        .ok_or_else(|| CodecError::MalformedEventId(envelope.id.clone()))?;

    let actor = ActorId::new(envelope.actor.clone());
    if !actor.is_well_formed() {
        return Err(CodecError::MalformedActor(envelope.actor.clone()));
    }

    let created_at = DateTime::from_timestamp(envelope.created_at, 0)
        .filter(|ts| {
            envelope.created_at > 0
                && now
                    .checked_add_signed(limits.max_future_skew)
                    .is_some_and(|latest| *ts <= latest)
        })
        .ok_or(CodecError::ImplausibleTimestamp(envelope.created_at))?;

    let body = decode_body(kind, &envelope.content)?;
    validate_body(&body, created_at, limits)?;

    Ok(DomainEvent {
        id,
        actor,
        created_at,
        body,
    })
}

fn parse_content<T: DeserializeOwned>(kind: EventKind, content: &str) -> Result<T, CodecError> {
    serde_json::from_str(content).map_err(|source| CodecError::MalformedContent { kind, source })
}

fn parse_payload<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, CodecError> {
    serde_json::from_value(payload).map_err(|source| CodecError::MalformedContent {
        kind: EventKind::GuildManagement,
        source,
    })
}

fn decode_body(kind: EventKind, content: &str) -> Result<EventBody, CodecError> {
    let body = match kind {
        EventKind::StructurePlaced => EventBody::StructurePlaced(parse_content(kind, content)?),
        EventKind::StructureRemoved => EventBody::StructureRemoved(parse_content(kind, content)?),
        EventKind::StructureUpdated => EventBody::StructureUpdated(parse_content(kind, content)?),
        EventKind::LandClaimed => EventBody::LandClaimed(parse_content(kind, content)?),
        EventKind::ResourceNodeUpdated => {
            EventBody::ResourceNodeUpdated(parse_content(kind, content)?)
        }
        EventKind::ResourceGathered => EventBody::ResourceGathered(parse_content(kind, content)?),
        EventKind::InventoryUpdated => EventBody::InventoryUpdated(parse_content(kind, content)?),
        EventKind::GuildManagement => {
            let wire: GuildManagementContent = parse_content(kind, content)?;
            EventBody::Guild {
                guild_id: wire.guild_id,
                action: decode_guild_action(wire.action, wire.payload)?,
            }
        }
        EventKind::PlayerMoved => EventBody::PlayerMoved(parse_content(kind, content)?),
        EventKind::Signal => EventBody::Signal(parse_content(kind, content)?),
    };
    Ok(body)
}

fn decode_guild_action(
    kind: GuildActionKind,
    payload: serde_json::Value,
) -> Result<GuildAction, CodecError> {
    let action = match kind {
        GuildActionKind::Create => {
            let p: NamePayload = parse_payload(payload)?;
            GuildAction::Create { name: p.name }
        }
        GuildActionKind::Join => GuildAction::Join,
        GuildActionKind::Leave => GuildAction::Leave,
        GuildActionKind::Promote => {
            let p: MemberPayload = parse_payload(payload)?;
            GuildAction::Promote { member: p.member }
        }
        GuildActionKind::Demote => {
            let p: MemberPayload = parse_payload(payload)?;
            GuildAction::Demote { member: p.member }
        }
        GuildActionKind::Disband => GuildAction::Disband,
        GuildActionKind::ClaimTerritory => {
            let p: RegionPayload = parse_payload(payload)?;
            GuildAction::ClaimTerritory { region: p.region }
        }
        GuildActionKind::Deposit => {
            let p: TransferPayload = parse_payload(payload)?;
            GuildAction::Deposit {
                resource: p.resource,
                quantity: p.quantity,
            }
        }
        GuildActionKind::Withdraw => {
            let p: TransferPayload = parse_payload(payload)?;
            GuildAction::Withdraw {
                resource: p.resource,
                quantity: p.quantity,
            }
        }
    };
    Ok(action)
}

// ---------------------------------------------------------------------------
// Semantic validation
// ---------------------------------------------------------------------------

fn finite(value: f64, field: &'static str) -> Result<(), CodecError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CodecError::NonFiniteCoordinate(field))
    }
}

fn validate_body(
    body: &EventBody,
    created_at: DateTime<Utc>,
    limits: &CodecLimits,
) -> Result<(), CodecError> {
    match body {
        EventBody::StructurePlaced(placed) => {
            finite(placed.x, "x")?;
            finite(placed.y, "y")?;
            if !placed.footprint().is_valid() {
                return Err(CodecError::InvalidFootprint);
            }
        }
        EventBody::StructureUpdated(updated) => {
            if let StructureChange::PermissionsChanged { whitelist, .. } = &updated.change {
                if let Some(bad) = whitelist.iter().find(|a| !a.is_well_formed()) {
                    return Err(CodecError::MalformedReference {
                        field: "whitelist",
                        value: bad.to_string(),
                    });
                }
            }
        }
        EventBody::LandClaimed(claim) => {
            if !claim.payment_proof.is_present() {
                return Err(CodecError::MissingPaymentProof);
            }
            let within_window = created_at
                .checked_add_signed(limits.max_claim_duration)
                .is_some_and(|latest| claim.expiry <= latest);
            if claim.expiry <= created_at || !within_window {
                return Err(CodecError::ClaimWindow {
                    expiry: claim.expiry.timestamp(),
                });
            }
        }
        EventBody::ResourceNodeUpdated(update) => {
            if update.resource_id.parts().is_none() {
                return Err(CodecError::MalformedReference {
                    field: "resource_id",
                    value: update.resource_id.to_string(),
                });
            }
        }
        EventBody::ResourceGathered(gathered) => {
            let matches_type = gathered
                .resource_id
                .parts()
                .is_some_and(|(resource, _)| resource == gathered.resource);
            if !matches_type {
                return Err(CodecError::MalformedReference {
                    field: "resource_id",
                    value: gathered.resource_id.to_string(),
                });
            }
            if gathered.amount == 0 {
                return Err(CodecError::NonPositiveQuantity("amount"));
            }
            finite(gathered.x, "x")?;
            finite(gathered.y, "y")?;
        }
        EventBody::Guild { action, .. } => validate_guild_action(action)?,
        EventBody::PlayerMoved(moved) => {
            finite(moved.x, "x")?;
            finite(moved.y, "y")?;
        }
        EventBody::Signal(signal) => {
            if !signal.recipient.is_well_formed() {
                return Err(CodecError::MalformedReference {
                    field: "recipient",
                    value: signal.recipient.to_string(),
                });
            }
        }
        EventBody::StructureRemoved(_) | EventBody::InventoryUpdated(_) => {}
    }
    Ok(())
}

fn validate_guild_action(action: &GuildAction) -> Result<(), CodecError> {
    match action {
        GuildAction::Create { name } => {
            let trimmed = name.trim();
            if trimmed.is_empty() || trimmed.chars().count() > MAX_GUILD_NAME_LEN {
                return Err(CodecError::InvalidGuildName);
            }
        }
        GuildAction::Promote { member } | GuildAction::Demote { member } => {
            if !member.is_well_formed() {
                return Err(CodecError::MalformedReference {
                    field: "member",
                    value: member.to_string(),
                });
            }
        }
        GuildAction::Deposit { quantity, .. } | GuildAction::Withdraw { quantity, .. } => {
            if *quantity <= Decimal::ZERO {
                return Err(CodecError::NonPositiveQuantity("quantity"));
            }
        }
        GuildAction::Join
        | GuildAction::Leave
        | GuildAction::Disband
        | GuildAction::ClaimTerritory { .. } => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Build the wire envelope for a locally originated event.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if the content cannot be serialized.
pub fn encode(event: &DomainEvent) -> Result<Envelope, CodecError> {
    let kind = event.kind();
    let content = encode_content(&event.body)?;
    let mut tags = vec![vec!["t".to_owned(), kind.topic().to_owned()]];
    if let Some((name, value)) = reference_tag(&event.body) {
        tags.push(vec![name.to_owned(), value]);
    }

    Ok(Envelope {
        id: event.id.to_string(),
        kind: kind.code(),
        actor: event.actor.to_string(),
        created_at: event.created_at.timestamp(),
        content,
        tags,
    })
}

fn encode_content(body: &EventBody) -> Result<String, CodecError> {
    let content = match body {
        EventBody::StructurePlaced(c) => serde_json::to_string(c)?,
        EventBody::StructureRemoved(c) => serde_json::to_string(c)?,
        EventBody::StructureUpdated(c) => serde_json::to_string(c)?,
        EventBody::LandClaimed(c) => serde_json::to_string(c)?,
        EventBody::ResourceNodeUpdated(c) => serde_json::to_string(c)?,
        EventBody::ResourceGathered(c) => serde_json::to_string(c)?,
        EventBody::InventoryUpdated(c) => serde_json::to_string(c)?,
        EventBody::PlayerMoved(c) => serde_json::to_string(c)?,
        EventBody::Signal(c) => serde_json::to_string(c)?,
        EventBody::Guild { guild_id, action } => {
            let payload = match action {
                GuildAction::Create { name } => {
                    serde_json::to_value(NamePayload { name: name.clone() })?
                }
                GuildAction::Promote { member } | GuildAction::Demote { member } => {
                    serde_json::to_value(MemberPayload {
                        member: member.clone(),
                    })?
                }
                GuildAction::ClaimTerritory { region } => {
                    serde_json::to_value(RegionPayload { region: *region })?
                }
                GuildAction::Deposit { resource, quantity }
                | GuildAction::Withdraw { resource, quantity } => {
                    serde_json::to_value(TransferPayload {
                        resource: *resource,
                        quantity: *quantity,
                    })?
                }
                GuildAction::Join | GuildAction::Leave | GuildAction::Disband => {
                    serde_json::Value::Null
                }
            };
            serde_json::to_string(&GuildManagementContent {
                action: action.kind(),
                guild_id: *guild_id,
                payload,
            })?
        }
    };
    Ok(content)
}

/// The indexable reference tag for a body, if it has one.
fn reference_tag(body: &EventBody) -> Option<(&'static str, String)> {
    match body {
        EventBody::StructurePlaced(c) => Some(("id", c.structure_id.to_string())),
        EventBody::StructureRemoved(c) => Some(("id", c.structure_id.to_string())),
        EventBody::StructureUpdated(c) => Some(("id", c.structure_id.to_string())),
        EventBody::LandClaimed(c) => Some(("region", c.region.to_string())),
        EventBody::ResourceNodeUpdated(c) => Some(("id", c.resource_id.to_string())),
        EventBody::ResourceGathered(c) => Some(("id", c.resource_id.to_string())),
        EventBody::Guild { guild_id, .. } => Some(("guild", guild_id.to_string())),
        EventBody::Signal(c) => Some(("p", c.recipient.to_string())),
        EventBody::InventoryUpdated(_) | EventBody::PlayerMoved(_) => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::{LandClaimed, StructurePlaced};
    use relayworld_types::{PaymentProof, RegionId, Resource, Rotation, StructureId, StructureType};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn envelope(kind: EventKind, content: &str) -> Envelope {
        Envelope {
            id: EventId::new().to_string(),
            kind: kind.code(),
            actor: "alice".to_owned(),
            created_at: now().timestamp(),
            content: content.to_owned(),
            tags: vec![],
        }
    }

    #[test]
    fn decodes_structure_placed() {
        let id = StructureId::new();
        let content = format!(
            r#"{{"structure_id":"{id}","structure_type":"wall","x":1.0,"y":2.0,"width":4.0,"height":1.0,"rotation":90,"material":"wood"}}"#
        );
        let event = decode(&envelope(EventKind::StructurePlaced, &content), &CodecLimits::default(), now())
            .unwrap();
        match event.body {
            EventBody::StructurePlaced(placed) => {
                assert_eq!(placed.structure_id, id);
                assert_eq!(placed.rotation, Rotation::Deg90);
                assert_eq!(placed.structure_type, StructureType::Wall);
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let mut env = envelope(EventKind::Signal, "{}");
        env.kind = 1;
        let result = decode(&env, &CodecLimits::default(), now());
        assert!(matches!(result, Err(CodecError::UnknownKind(1))));
    }

    #[test]
    fn rejects_missing_fields() {
        let mut env = envelope(EventKind::StructureRemoved, "{}");
        env.id = String::new();
        assert!(matches!(
            decode(&env, &CodecLimits::default(), now()),
            Err(CodecError::MissingField("id"))
        ));

        let env = envelope(EventKind::StructureRemoved, "");
        assert!(matches!(
            decode(&env, &CodecLimits::default(), now()),
            Err(CodecError::MissingField("content"))
        ));
    }

    #[test]
    fn rejects_malformed_structure_reference() {
        let env = envelope(EventKind::StructureRemoved, r#"{"structure_id":"not-a-uuid"}"#);
        assert!(matches!(
            decode(&env, &CodecLimits::default(), now()),
            Err(CodecError::MalformedContent { .. })
        ));
    }

    #[test]
    fn rejects_future_timestamps() {
        let mut env = envelope(EventKind::PlayerMoved, r#"{"x":1.0,"y":1.0}"#);
        env.created_at = now().timestamp() + 3600;
        assert!(matches!(
            decode(&env, &CodecLimits::default(), now()),
            Err(CodecError::ImplausibleTimestamp(_))
        ));
    }

    #[test]
    fn rejects_bad_rotation_and_footprint() {
        let id = StructureId::new();
        let rotated = format!(
            r#"{{"structure_id":"{id}","structure_type":"wall","x":1.0,"y":2.0,"width":4.0,"height":1.0,"rotation":45,"material":"wood"}}"#
        );
        assert!(decode(&envelope(EventKind::StructurePlaced, &rotated), &CodecLimits::default(), now()).is_err());

        let flat = format!(
            r#"{{"structure_id":"{id}","structure_type":"wall","x":1.0,"y":2.0,"width":0.0,"height":1.0,"material":"wood"}}"#
        );
        assert!(matches!(
            decode(&envelope(EventKind::StructurePlaced, &flat), &CodecLimits::default(), now()),
            Err(CodecError::InvalidFootprint)
        ));
    }

    #[test]
    fn land_claim_requires_proof_and_window() {
        let expiry = now().timestamp() + 3600;
        let ok = format!(r#"{{"region":"3-3","payment_proof":"lnbc1","expiry":{expiry}}}"#);
        assert!(decode(&envelope(EventKind::LandClaimed, &ok), &CodecLimits::default(), now()).is_ok());

        let no_proof = format!(r#"{{"region":"3-3","payment_proof":"","expiry":{expiry}}}"#);
        assert!(matches!(
            decode(&envelope(EventKind::LandClaimed, &no_proof), &CodecLimits::default(), now()),
            Err(CodecError::MissingPaymentProof)
        ));

        let past = now().timestamp() - 1;
        let expired = format!(r#"{{"region":"3-3","payment_proof":"lnbc1","expiry":{past}}}"#);
        assert!(matches!(
            decode(&envelope(EventKind::LandClaimed, &expired), &CodecLimits::default(), now()),
            Err(CodecError::ClaimWindow { .. })
        ));
    }

    #[test]
    fn gathered_resource_must_match_node() {
        let content = r#"{"resource_id":"wood-0","resource":"stone","amount":2,"x":0.0,"y":0.0}"#;
        assert!(matches!(
            decode(&envelope(EventKind::ResourceGathered, content), &CodecLimits::default(), now()),
            Err(CodecError::MalformedReference { .. })
        ));
    }

    #[test]
    fn guild_deposit_requires_positive_quantity() {
        let guild = relayworld_types::GuildId::new();
        let content = format!(
            r#"{{"action":"deposit","guild_id":"{guild}","payload":{{"resource":"wood","quantity":"-3"}}}}"#
        );
        assert!(matches!(
            decode(&envelope(EventKind::GuildManagement, &content), &CodecLimits::default(), now()),
            Err(CodecError::NonPositiveQuantity(_))
        ));
    }

    #[test]
    fn oversized_content_is_rejected() {
        let limits = CodecLimits {
            max_content_bytes: 8,
            ..CodecLimits::default()
        };
        let env = envelope(EventKind::PlayerMoved, r#"{"x":1.0,"y":1.0}"#);
        assert!(matches!(
            decode(&env, &limits, now()),
            Err(CodecError::ContentTooLarge { .. })
        ));
    }

    #[test]
    fn encoded_events_decode_to_the_same_event() {
        let actor = ActorId::new("alice");
        let bodies = vec![
            EventBody::StructurePlaced(StructurePlaced {
                structure_id: StructureId::new(),
                structure_type: StructureType::Door,
                x: 3.0,
                y: 4.0,
                width: 1.0,
                height: 2.0,
                rotation: Rotation::Deg270,
                material: Resource::Wood,
            }),
            EventBody::LandClaimed(LandClaimed {
                region: RegionId::new(3, 3),
                payment_proof: PaymentProof("lnbc1".to_owned()),
                expiry: now() + Duration::days(1),
            }),
            EventBody::Guild {
                guild_id: relayworld_types::GuildId::new(),
                action: GuildAction::Withdraw {
                    resource: Resource::Stone,
                    quantity: dec!(5),
                },
            },
        ];

        for body in bodies {
            let event = DomainEvent::new(actor.clone(), now(), body);
            let envelope = encode(&event).unwrap();
            assert_eq!(envelope.tag("t"), Some(event.kind().topic()));
            let decoded = decode(&envelope, &CodecLimits::default(), now()).unwrap();
            assert_eq!(decoded, event);
        }
    }
}
