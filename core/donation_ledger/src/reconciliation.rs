//! # Proof Reconciliation Engine
//!
//! Validates an NGO's work-proof claims against the campaign wallet and
//! produces the [`WorkProofDraft`] a store persists.
//!
//! The only ceiling is the aggregate one: the sum claimed in a proof must fit
//! in `received − used so far`. A single condition may be claimed beyond its
//! own goal as long as the aggregate fits.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::errors::{LedgerError, Result};
use crate::types::{
    AllocationClaim, Amount, Campaign, CampaignSnapshot, ConditionAllocation, Rupees,
    WorkProofDraft,
};
use crate::verification::VerifiedPhoto;

/// Received / used / remaining money of a campaign, as seen by the
/// reconciliation check. `used` is the raw sum of prior claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub received: Amount,
    pub used: Amount,
    pub remaining: Amount,
}

pub fn balance(snapshot: &CampaignSnapshot) -> Balance {
    let received = snapshot.campaign.total_raised;
    let used: Amount = snapshot.work_proofs.iter().map(|p| p.total_claimed()).sum();
    Balance {
        received,
        used,
        remaining: (received - used).max(0),
    }
}

/// Field-level validation that needs no wallet state: returns the claims with
/// zero amounts dropped.
pub fn validate_claims(
    campaign: &Campaign,
    claims: &[AllocationClaim],
    description: &str,
) -> Result<Vec<AllocationClaim>> {
    for claim in claims {
        if claim.amount < 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "allocation for \"{}\" is negative ({})",
                claim.condition,
                Rupees(claim.amount)
            )));
        }
    }

    let kept: Vec<AllocationClaim> = claims.iter().filter(|c| c.amount > 0).cloned().collect();
    if kept.is_empty() {
        return Err(LedgerError::MissingRequiredField("allocations"));
    }
    if description.trim().is_empty() {
        return Err(LedgerError::MissingRequiredField("description"));
    }

    let mut seen = HashSet::new();
    for claim in &kept {
        if campaign.condition(&claim.condition).is_none() {
            return Err(LedgerError::UnknownCondition(claim.condition.clone()));
        }
        if !seen.insert(claim.condition.as_str()) {
            return Err(LedgerError::DuplicateCondition(claim.condition.clone()));
        }
    }

    Ok(kept)
}

/// Sum of claims, rejecting overflow.
pub fn total_claimed(claims: &[AllocationClaim]) -> Result<Amount> {
    claims.iter().try_fold(0 as Amount, |acc, c| {
        acc.checked_add(c.amount)
            .ok_or_else(|| LedgerError::InvalidAmount("allocation total overflows".to_string()))
    })
}

/// Reject when `claimed` does not fit in the wallet's remaining balance.
pub fn ensure_balance(snapshot: &CampaignSnapshot, claimed: Amount) -> Result<Balance> {
    let balance = balance(snapshot);
    if claimed > balance.remaining {
        return Err(LedgerError::InsufficientBalance {
            requested: claimed,
            received: balance.received,
            used: balance.used,
            remaining: balance.remaining,
        });
    }
    Ok(balance)
}

/// Validate a full proof against `snapshot` and build its write set.
pub fn reconcile_proof(
    snapshot: &CampaignSnapshot,
    claims: &[AllocationClaim],
    photos: &[VerifiedPhoto],
    description: &str,
) -> Result<WorkProofDraft> {
    let kept = validate_claims(&snapshot.campaign, claims, description)?;
    if photos.is_empty() {
        return Err(LedgerError::MissingRequiredField("photos"));
    }

    let claimed = total_claimed(&kept)?;
    let balance = ensure_balance(snapshot, claimed)?;

    debug!(
        campaign_id = snapshot.campaign.id,
        claimed,
        remaining = balance.remaining,
        "Reconciled work proof"
    );

    let allocations = kept
        .into_iter()
        .map(|c| ConditionAllocation {
            percentage: c.amount as f64 / claimed as f64 * 100.0,
            condition: c.condition,
            amount: c.amount,
        })
        .collect();

    Ok(WorkProofDraft {
        allocations,
        photos: photos.iter().map(|p| p.reference().to_string()).collect(),
        description: description.trim().to_string(),
    })
}
