//! # Wallet Aggregator
//!
//! Read models for the donor and NGO views, recomputed from a snapshot on
//! every call.
//!
//! `used` is clamped to `received` on the read path even though the
//! reconciliation engine already refuses over-claims, so historical data that
//! predates the check still renders a non-negative `remaining`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::goals::GoalTracker;
use crate::types::{
    Amount, CampaignId, CampaignSnapshot, ConditionAllocation, Donation, Priority, ProofId,
    ProofStatus, WorkProof,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConditionBreakdown {
    pub title: String,
    pub priority: Priority,
    /// `0` when unbounded.
    pub goal: Amount,
    pub raised: Amount,
    /// Claimed in work proofs, without a per-condition ceiling.
    pub used: Amount,
    /// `None` when unbounded.
    pub remaining_goal: Option<Amount>,
    pub percent_funded: f64,
}

/// The allocation breakdown of one work proof, as shown to donors.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProofBreakdown {
    pub proof_id: ProofId,
    pub description: String,
    pub photos: Vec<String>,
    pub status: ProofStatus,
    pub total_used: Amount,
    pub allocations: Vec<ConditionAllocation>,
    pub submitted_at: DateTime<Utc>,
}

impl From<&WorkProof> for ProofBreakdown {
    fn from(proof: &WorkProof) -> Self {
        Self {
            proof_id: proof.id,
            description: proof.description.clone(),
            photos: proof.photos.clone(),
            status: proof.status,
            total_used: proof.total_claimed(),
            allocations: proof.allocations.clone(),
            submitted_at: proof.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WalletSummary {
    pub campaign_id: CampaignId,
    pub received: Amount,
    pub used: Amount,
    pub remaining: Amount,
    pub total_goal: Amount,
    pub percent_funded: f64,
    pub percent_used: f64,
    pub conditions: Vec<ConditionBreakdown>,
    pub latest_proof: Option<ProofBreakdown>,
}

/// A donation as shown to its donor, alongside the campaign's wallet and the
/// latest proof breakdown (proofs are campaign-wide, not per donation).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DonationView {
    pub donation: Donation,
    pub campaign_name: String,
    pub received: Amount,
    pub used: Amount,
    pub remaining: Amount,
    pub proof_breakdown: Option<ProofBreakdown>,
}

/// `part / whole` as a percentage; `0.0` when `whole` is zero.
pub fn percent_of(part: Amount, whole: Amount) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Most recent proof; ties on timestamp go to the higher id.
pub fn latest_proof(proofs: &[WorkProof]) -> Option<&WorkProof> {
    proofs.iter().max_by_key(|p| (p.created_at, p.id))
}

fn used_by_condition(proofs: &[WorkProof], title: &str) -> Amount {
    proofs
        .iter()
        .flat_map(|p| p.allocations.iter())
        .filter(|a| a.condition == title)
        .map(|a| a.amount)
        .sum()
}

pub fn summarize(snapshot: &CampaignSnapshot) -> WalletSummary {
    let campaign = &snapshot.campaign;
    let tracker = GoalTracker::new(snapshot);

    let received = campaign.total_raised;
    let claimed: Amount = snapshot.work_proofs.iter().map(|p| p.total_claimed()).sum();
    let used = claimed.min(received).max(0);
    let remaining = (received - used).max(0);

    let conditions = campaign
        .conditions
        .iter()
        .map(|c| {
            let raised = tracker.raised(&c.title);
            ConditionBreakdown {
                title: c.title.clone(),
                priority: c.priority,
                goal: c.fund_estimate,
                raised,
                used: used_by_condition(&snapshot.work_proofs, &c.title),
                remaining_goal: tracker.condition_remaining(c).limit(),
                percent_funded: percent_of(raised, c.fund_estimate),
            }
        })
        .collect();

    WalletSummary {
        campaign_id: campaign.id,
        received,
        used,
        remaining,
        total_goal: campaign.total_goal,
        percent_funded: percent_of(received, campaign.total_goal),
        percent_used: percent_of(used, received),
        conditions,
        latest_proof: latest_proof(&snapshot.work_proofs).map(ProofBreakdown::from),
    }
}

pub fn donation_view(snapshot: &CampaignSnapshot, donation: Donation) -> DonationView {
    let wallet = summarize(snapshot);
    DonationView {
        donation,
        campaign_name: snapshot.campaign.name.clone(),
        received: wallet.received,
        used: wallet.used,
        remaining: wallet.remaining,
        proof_breakdown: wallet.latest_proof,
    }
}
