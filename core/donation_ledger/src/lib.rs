//! # Donation Ledger
//!
//! Accounting core for NGO fundraising campaigns: donations are split across a
//! campaign's funding conditions without exceeding any goal, and NGOs account
//! for the money they spend through photo-backed work proofs.
//!
//! | Phase        | Entry Point(s)                                               |
//! |--------------|--------------------------------------------------------------|
//! | Registration | [`DonationLedger::register_campaign`], `set_campaign_status` |
//! | Funding      | [`DonationLedger::quote_donation`], [`DonationLedger::donate`] |
//! | Spending     | [`DonationLedger::submit_work_proof`], `record_work_proof`   |
//! | Read models  | `wallet`, `donation_views`, `donor_profile`                  |
//! | Audit        | [`DonationLedger::audit`], `audit_all`                       |
//!
//! ## Architecture
//!
//! The engines ([`goals`], [`allocation`], [`reconciliation`], [`wallet`],
//! [`rewards`]) are pure functions of a [`CampaignSnapshot`]. Persistence is
//! delegated to a [`LedgerStore`], which runs every write decision inside its
//! own per-campaign atomic step. This file only wires the two together.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

pub mod allocation;
pub mod errors;
pub mod goals;
pub mod invariants;
pub mod reconciliation;
pub mod registration;
pub mod rewards;
pub mod storage;
pub mod types;
pub mod verification;
pub mod wallet;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod test_concurrency;
#[cfg(test)]
mod test_scenarios;

pub use allocation::AllocationPlan;
pub use errors::{LedgerError, Result, VerificationFailure};
pub use invariants::InvariantViolation;
pub use rewards::{DonorProfile, Rank};
pub use storage::{LedgerStore, MemoryLedgerStore};
pub use types::*;
pub use verification::{
    ConditionTarget, FileStore, ImageVerifier, PhotoUpload, ProofIntake, VerificationPolicy,
    VerificationReport, VerificationStatus, VerifiedPhoto, MAX_PHOTO_BYTES,
};
pub use wallet::{DonationView, WalletSummary};

use allocation::{cancelled_draft, plan_donation, validate_request};
use reconciliation::{ensure_balance, reconcile_proof, total_claimed, validate_claims};
use verification::targets_for;

/// How a donation ended up once it was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationOutcome {
    Accepted,
    /// Accepted for less than requested because a goal capped it.
    Adjusted,
    /// A concurrent donation filled the goal first.
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DonationReceipt {
    pub donation: Donation,
    pub requested: Amount,
    pub accepted: Amount,
    pub adjusted: bool,
    pub status: DonationOutcome,
}

impl DonationReceipt {
    fn from_donation(donation: Donation) -> Self {
        let status = match donation.status {
            DonationStatus::Cancelled => DonationOutcome::Cancelled,
            DonationStatus::Success if donation.was_adjusted() => DonationOutcome::Adjusted,
            DonationStatus::Success => DonationOutcome::Accepted,
        };
        Self {
            requested: donation.requested_amount,
            accepted: donation.counted_amount(),
            adjusted: donation.was_adjusted(),
            status,
            donation,
        }
    }

    /// Confirmation line for the donor.
    pub fn message(&self) -> String {
        match self.status {
            DonationOutcome::Accepted => {
                format!("Donation of {} received. Thank you!", Rupees(self.accepted))
            }
            DonationOutcome::Adjusted => format!(
                "Only {} of your {} donation was accepted, because the funding goal is nearly reached.",
                Rupees(self.accepted),
                Rupees(self.requested)
            ),
            DonationOutcome::Cancelled => format!(
                "The funding goal was reached before your donation of {} could be applied. Nothing was charged.",
                Rupees(self.requested)
            ),
        }
    }
}

/// A work proof as submitted by an NGO, photos not yet verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofSubmission {
    pub claims: Vec<AllocationClaim>,
    pub photos: Vec<PhotoUpload>,
    pub description: String,
}

#[derive(Clone)]
pub struct DonationLedger {
    store: Arc<dyn LedgerStore>,
}

impl DonationLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────

    pub async fn register_campaign(&self, new: NewCampaign) -> Result<Campaign> {
        let new = registration::normalize(new)?;
        let campaign = self.store.create_campaign(new).await?;
        info!(
            campaign_id = campaign.id,
            ngo_id = %campaign.ngo_id,
            goal = campaign.total_goal,
            "Campaign registered"
        );
        Ok(campaign)
    }

    pub async fn get_campaign(&self, id: CampaignId) -> Result<Campaign> {
        self.store.get_campaign(id).await
    }

    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        self.store.list_campaigns().await
    }

    pub async fn set_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<Campaign> {
        let campaign = self.store.set_campaign_status(id, status).await?;
        info!(campaign_id = id, status = status.as_str(), "Campaign status changed");
        Ok(campaign)
    }

    // ─────────────────────────────────────────────────────────
    // Funding
    // ─────────────────────────────────────────────────────────

    /// Plan a donation against current state without writing anything.
    pub async fn quote_donation(
        &self,
        campaign_id: CampaignId,
        request: &DonationRequest,
    ) -> Result<AllocationPlan> {
        validate_request(request)?;
        let snapshot = self.store.snapshot(campaign_id).await?;
        plan_donation(&snapshot, request)
    }

    /// Quote, then commit.
    ///
    /// Any rejection from the quote is returned as-is with nothing written.
    /// The commit re-plans on fresh state inside the store's atomic step; if
    /// the goal filled in between, the donation is recorded as cancelled.
    pub async fn donate(
        &self,
        campaign_id: CampaignId,
        request: DonationRequest,
    ) -> Result<DonationReceipt> {
        if let Err(e) = self.quote_donation(campaign_id, &request).await {
            warn!(campaign_id, donor_id = %request.donor_id, "Donation rejected: {e}");
            return Err(e);
        }

        let donation = self
            .store
            .commit_donation(campaign_id, &|fresh| match plan_donation(fresh, &request) {
                Ok(plan) => Ok(plan.into_draft(&request.donor_id)),
                Err(e) if e.is_goal_reached() => Ok(cancelled_draft(&request)),
                Err(e) => Err(e),
            })
            .await?;

        let receipt = DonationReceipt::from_donation(donation);
        match receipt.status {
            DonationOutcome::Cancelled => warn!(
                campaign_id,
                donation_id = receipt.donation.id,
                requested = receipt.requested,
                "Donation cancelled: goal reached at write time"
            ),
            _ => info!(
                campaign_id,
                donation_id = receipt.donation.id,
                requested = receipt.requested,
                accepted = receipt.accepted,
                "Donation accepted"
            ),
        }
        Ok(receipt)
    }

    // ─────────────────────────────────────────────────────────
    // Spending
    // ─────────────────────────────────────────────────────────

    /// Validate, verify every photo, store them, then record the proof.
    ///
    /// Field and balance checks run before the verifier is called, so a proof
    /// that could never be recorded does not cost a verification round trip.
    pub async fn submit_work_proof(
        &self,
        campaign_id: CampaignId,
        submission: ProofSubmission,
        intake: &ProofIntake,
    ) -> Result<WorkProof> {
        let snapshot = self.store.snapshot(campaign_id).await?;
        let claims = validate_claims(&snapshot.campaign, &submission.claims, &submission.description)?;
        if submission.photos.is_empty() {
            return Err(LedgerError::MissingRequiredField("photos"));
        }
        if let Err(e) = ensure_balance(&snapshot, total_claimed(&claims)?) {
            warn!(campaign_id, "Work proof rejected: {e}");
            return Err(e);
        }

        let targets = targets_for(&snapshot.campaign, &claims);
        let photos = intake.verify_and_store(submission.photos, &targets).await?;

        self.record_work_proof(campaign_id, &claims, &photos, &submission.description)
            .await
    }

    /// Record a proof whose photos are already verified and stored.
    pub async fn record_work_proof(
        &self,
        campaign_id: CampaignId,
        claims: &[AllocationClaim],
        photos: &[VerifiedPhoto],
        description: &str,
    ) -> Result<WorkProof> {
        let proof = self
            .store
            .commit_work_proof(campaign_id, &|fresh| {
                reconcile_proof(fresh, claims, photos, description)
            })
            .await?;
        info!(
            campaign_id,
            proof_id = proof.id,
            claimed = proof.total_claimed(),
            photos = proof.photos.len(),
            lowest_confidence = ?photos.iter().map(VerifiedPhoto::confidence).min(),
            "Work proof recorded"
        );
        Ok(proof)
    }

    pub async fn work_proofs(&self, campaign_id: CampaignId) -> Result<Vec<WorkProof>> {
        self.store.query_work_proofs(campaign_id).await
    }

    pub async fn donations(&self, campaign_id: CampaignId) -> Result<Vec<Donation>> {
        self.store.query_donations(campaign_id).await
    }

    // ─────────────────────────────────────────────────────────
    // Read models
    // ─────────────────────────────────────────────────────────

    pub async fn wallet(&self, campaign_id: CampaignId) -> Result<WalletSummary> {
        let snapshot = self.store.snapshot(campaign_id).await?;
        Ok(wallet::summarize(&snapshot))
    }

    /// Every donation of `donor_id`, each with its campaign's wallet and latest proof.
    pub async fn donation_views(&self, donor_id: &str) -> Result<Vec<DonationView>> {
        let donations = self.store.query_donations_by_donor(donor_id).await?;
        let mut snapshots: HashMap<CampaignId, CampaignSnapshot> = HashMap::new();
        let mut views = Vec::with_capacity(donations.len());

        for donation in donations {
            let campaign_id = donation.campaign_id;
            if !snapshots.contains_key(&campaign_id) {
                let fresh = self.store.snapshot(campaign_id).await?;
                snapshots.insert(campaign_id, fresh);
            }
            if let Some(snapshot) = snapshots.get(&campaign_id) {
                views.push(wallet::donation_view(snapshot, donation));
            }
        }
        Ok(views)
    }

    pub async fn donor_profile(&self, donor_id: &str) -> Result<DonorProfile> {
        let donations = self.store.query_donations_by_donor(donor_id).await?;
        Ok(rewards::donor_profile(donor_id, &donations))
    }

    // ─────────────────────────────────────────────────────────
    // Audit
    // ─────────────────────────────────────────────────────────

    pub async fn audit(&self, campaign_id: CampaignId) -> Result<Vec<InvariantViolation>> {
        let snapshot = self.store.snapshot(campaign_id).await?;
        Ok(invariants::check_snapshot(&snapshot))
    }

    /// Campaigns with at least one violation.
    pub async fn audit_all(&self) -> Result<Vec<(CampaignId, Vec<InvariantViolation>)>> {
        let mut dirty = Vec::new();
        for campaign in self.store.list_campaigns().await? {
            let violations = self.audit(campaign.id).await?;
            if !violations.is_empty() {
                dirty.push((campaign.id, violations));
            }
        }
        Ok(dirty)
    }
}
