//! Land-claim lifecycle: `Unclaimed -> Claimed(owner, expiry) -> Unclaimed`.
//!
//! Expiry is computed locally from the stored instant and never announced.
//! A region whose claim has lapsed counts as unclaimed even before the
//! sweep removes it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use relayworld_types::{ActorId, LandClaim, PaymentProof, RegionId};

use crate::error::WorldError;

/// The active claim on `region` at `now`, if any.
pub fn active_claim<'a>(
    claims: &'a BTreeMap<RegionId, LandClaim>,
    region: RegionId,
    now: DateTime<Utc>,
) -> Option<&'a LandClaim> {
    claims.get(&region).filter(|claim| claim.is_active(now))
}

/// Whether `actor` holds the active claim on `region`.
pub fn is_owned_by(
    claims: &BTreeMap<RegionId, LandClaim>,
    region: RegionId,
    actor: &ActorId,
    now: DateTime<Utc>,
) -> bool {
    active_claim(claims, region, now).is_some_and(|claim| &claim.owner == actor)
}

/// Check the local preconditions for claiming `region`.
///
/// # Errors
///
/// Returns [`WorldError::MissingPaymentProof`] when no token was supplied
/// and [`WorldError::RegionClaimed`] when an active claim exists.
pub fn check_claimable(
    claims: &BTreeMap<RegionId, LandClaim>,
    region: RegionId,
    proof: &PaymentProof,
    now: DateTime<Utc>,
) -> Result<(), WorldError> {
    if !proof.is_present() {
        return Err(WorldError::MissingPaymentProof);
    }
    if let Some(claim) = active_claim(claims, region, now) {
        return Err(WorldError::RegionClaimed {
            region,
            owner: claim.owner.clone(),
        });
    }
    Ok(())
}

/// Regions whose claim has lapsed at `now`.
pub fn expired_regions(claims: &BTreeMap<RegionId, LandClaim>, now: DateTime<Utc>) -> Vec<RegionId> {
    claims
        .values()
        .filter(|claim| !claim.is_active(now))
        .map(|claim| claim.region)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use relayworld_types::{EventId, Provenance};

    use super::*;

    fn make_claim(region: RegionId, owner: &str, expires_at: DateTime<Utc>) -> LandClaim {
        LandClaim {
            region,
            owner: ActorId::new(owner),
            expires_at,
            payment_proof: PaymentProof("lnbc1".to_owned()),
            claimed_at: expires_at - Duration::days(1),
            origin_event: EventId::new(),
            provenance: Provenance::Confirmed,
        }
    }

    #[test]
    fn claimed_region_rejects_second_claim() {
        let now = Utc::now();
        let region = RegionId::new(3, 3);
        let claims = BTreeMap::from([(region, make_claim(region, "alice", now + Duration::hours(1)))]);
        let result = check_claimable(&claims, region, &PaymentProof("p".to_owned()), now);
        assert!(matches!(result, Err(WorldError::RegionClaimed { .. })));
        assert!(is_owned_by(&claims, region, &ActorId::new("alice"), now));
        assert!(!is_owned_by(&claims, region, &ActorId::new("bob"), now));
    }

    #[test]
    fn lapsed_claim_frees_region() {
        let now = Utc::now();
        let region = RegionId::new(3, 3);
        let claims = BTreeMap::from([(region, make_claim(region, "alice", now))]);
        assert!(active_claim(&claims, region, now).is_none());
        assert!(check_claimable(&claims, region, &PaymentProof("p".to_owned()), now).is_ok());
        assert_eq!(expired_regions(&claims, now), vec![region]);
        assert!(expired_regions(&claims, now - Duration::seconds(1)).is_empty());
    }

    #[test]
    fn claim_needs_payment_proof() {
        let claims = BTreeMap::new();
        let result = check_claimable(&claims, RegionId::new(0, 0), &PaymentProof(String::new()), Utc::now());
        assert_eq!(result, Err(WorldError::MissingPaymentProof));
    }
}
