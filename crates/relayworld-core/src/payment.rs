//! Payment collaborator for land claims.
//!
//! The core never inspects a proof. It only needs one to exist before a
//! claim is broadcast.

use futures::future::BoxFuture;

use relayworld_types::{PaymentProof, RegionId};

use crate::actions::LocalAction;
use crate::error::PreconditionFailure;

/// Produces proof-of-payment tokens for region claims.
pub trait PaymentCollaborator: Send + Sync {
    /// Pay for a claim on `region` and return the proof.
    fn create_claim_payment(&self, region: RegionId) -> BoxFuture<'_, Result<PaymentProof, String>>;
}

/// Hands out a fixed-format token without paying anything. For local play
/// and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPayment {
    prefix: String,
}

impl StaticPayment {
    /// Tokens look like `<prefix>-<region>`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl PaymentCollaborator for StaticPayment {
    fn create_claim_payment(&self, region: RegionId) -> BoxFuture<'_, Result<PaymentProof, String>> {
        Box::pin(async move {
            if self.prefix.is_empty() {
                return Err("no payment method configured".to_owned());
            }
            Ok(PaymentProof(format!("{}-{region}", self.prefix)))
        })
    }
}

/// Resolve a claim without a proof by paying for it first.
///
/// Every other action, and claims that already carry a proof, pass through
/// unchanged.
///
/// # Errors
///
/// Returns [`PreconditionFailure::Payment`] if the collaborator fails.
pub async fn claim_land_paid(
    action: LocalAction,
    payments: &dyn PaymentCollaborator,
) -> Result<LocalAction, PreconditionFailure> {
    match action {
        LocalAction::ClaimLand {
            region,
            payment_proof: None,
        } => {
            let proof = payments
                .create_claim_payment(region)
                .await
                .map_err(PreconditionFailure::Payment)?;
            Ok(LocalAction::ClaimLand {
                region,
                payment_proof: Some(proof),
            })
        }
        other => Ok(other),
    }
}
