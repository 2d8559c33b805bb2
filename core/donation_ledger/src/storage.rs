//! # Storage
//!
//! The [`LedgerStore`] boundary and an in-memory implementation.
//!
//! ## Atomic transforms
//!
//! Writes never come as "read, decide, blind write". A caller hands the store
//! a transform; the store loads a fresh [`CampaignSnapshot`], runs the
//! transform and applies its write set in one step that is serialized per
//! campaign. Campaigns do not contend with each other.
//!
//! | Operation                    | Write set                                            |
//! |------------------------------|------------------------------------------------------|
//! | `commit_donation`            | append donation (+ shares), `total_raised += amount` |
//! | `commit_work_proof`          | append proof (+ allocations)                          |
//! | `create_campaign`            | insert campaign with `total_raised = 0`              |
//! | `set_campaign_status`        | soft status change                                   |
//!
//! Every aggregate update bumps `Campaign::version`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::errors::{LedgerError, Result};
use crate::types::{
    Campaign, CampaignId, CampaignSnapshot, CampaignStatus, Donation, DonationDraft,
    DonationStatus, NewCampaign, ProofStatus, WorkProof, WorkProofDraft,
};

/// Decides a donation's write set from fresh campaign state.
pub type DonationTransform<'a> = dyn Fn(&CampaignSnapshot) -> Result<DonationDraft> + Send + Sync + 'a;

/// Decides a work proof's write set from fresh campaign state.
pub type ProofTransform<'a> = dyn Fn(&CampaignSnapshot) -> Result<WorkProofDraft> + Send + Sync + 'a;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_campaign(&self, campaign: NewCampaign) -> Result<Campaign>;

    async fn get_campaign(&self, id: CampaignId) -> Result<Campaign>;

    async fn list_campaigns(&self) -> Result<Vec<Campaign>>;

    async fn set_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<Campaign>;

    /// Campaign plus both ledgers, read consistently.
    async fn snapshot(&self, id: CampaignId) -> Result<CampaignSnapshot>;

    async fn query_donations(&self, campaign_id: CampaignId) -> Result<Vec<Donation>>;

    async fn query_donations_by_donor(&self, donor_id: &str) -> Result<Vec<Donation>>;

    async fn query_work_proofs(&self, campaign_id: CampaignId) -> Result<Vec<WorkProof>>;

    /// Append the donation decided by `transform` and fold its amount into the
    /// campaign aggregate, atomically.
    async fn commit_donation(
        &self,
        campaign_id: CampaignId,
        transform: &DonationTransform<'_>,
    ) -> Result<Donation>;

    /// Append the work proof decided by `transform`, atomically with the
    /// balance read it was decided on.
    async fn commit_work_proof(
        &self,
        campaign_id: CampaignId,
        transform: &ProofTransform<'_>,
    ) -> Result<WorkProof>;
}

// ─────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────

/// Process-local [`LedgerStore`]. Each campaign's book sits behind its own
/// mutex, held for the whole transform-and-apply step.
#[derive(Default)]
pub struct MemoryLedgerStore {
    books: RwLock<BTreeMap<CampaignId, Arc<Mutex<CampaignSnapshot>>>>,
    next_campaign_id: AtomicI64,
    next_donation_id: AtomicI64,
    next_proof_id: AtomicI64,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn book(&self, id: CampaignId) -> Result<Arc<Mutex<CampaignSnapshot>>> {
        self.books
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LedgerError::CampaignNotFound(id))
    }

    async fn all_books(&self) -> Vec<Arc<Mutex<CampaignSnapshot>>> {
        self.books.read().await.values().cloned().collect()
    }
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_campaign(&self, new: NewCampaign) -> Result<Campaign> {
        let now = Utc::now();
        let campaign = Campaign {
            id: next_id(&self.next_campaign_id),
            total_goal: new.total_goal(),
            ngo_id: new.ngo_id,
            name: new.name,
            description: new.description,
            category: new.category,
            conditions: new.conditions,
            total_raised: 0,
            status: CampaignStatus::PendingVerification,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let book = CampaignSnapshot {
            campaign: campaign.clone(),
            donations: Vec::new(),
            work_proofs: Vec::new(),
        };
        self.books
            .write()
            .await
            .insert(campaign.id, Arc::new(Mutex::new(book)));
        Ok(campaign)
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Campaign> {
        Ok(self.book(id).await?.lock().await.campaign.clone())
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let mut campaigns = Vec::new();
        for book in self.all_books().await {
            campaigns.push(book.lock().await.campaign.clone());
        }
        Ok(campaigns)
    }

    async fn set_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<Campaign> {
        let book = self.book(id).await?;
        let mut book = book.lock().await;
        book.campaign.status = status;
        book.campaign.version += 1;
        book.campaign.updated_at = Utc::now();
        Ok(book.campaign.clone())
    }

    async fn snapshot(&self, id: CampaignId) -> Result<CampaignSnapshot> {
        Ok(self.book(id).await?.lock().await.clone())
    }

    async fn query_donations(&self, campaign_id: CampaignId) -> Result<Vec<Donation>> {
        Ok(self.book(campaign_id).await?.lock().await.donations.clone())
    }

    async fn query_donations_by_donor(&self, donor_id: &str) -> Result<Vec<Donation>> {
        let mut found = Vec::new();
        for book in self.all_books().await {
            let book = book.lock().await;
            found.extend(book.donations.iter().filter(|d| d.donor_id == donor_id).cloned());
        }
        found.sort_by_key(|d| (d.created_at, d.id));
        Ok(found)
    }

    async fn query_work_proofs(&self, campaign_id: CampaignId) -> Result<Vec<WorkProof>> {
        Ok(self.book(campaign_id).await?.lock().await.work_proofs.clone())
    }

    async fn commit_donation(
        &self,
        campaign_id: CampaignId,
        transform: &DonationTransform<'_>,
    ) -> Result<Donation> {
        let book = self.book(campaign_id).await?;
        let mut book = book.lock().await;

        let draft = transform(&book)?;
        let total_raised = match draft.status {
            DonationStatus::Success => book
                .campaign
                .total_raised
                .checked_add(draft.amount)
                .ok_or_else(|| LedgerError::InvalidAmount("campaign total overflows".to_string()))?,
            DonationStatus::Cancelled => book.campaign.total_raised,
        };
        let now = Utc::now();
        let donation = Donation {
            id: next_id(&self.next_donation_id),
            donor_id: draft.donor_id,
            campaign_id,
            condition: draft.condition,
            requested_amount: draft.requested_amount,
            amount: draft.amount,
            shares: draft.shares,
            status: draft.status,
            created_at: now,
        };

        if donation.status == DonationStatus::Success {
            book.campaign.total_raised = total_raised;
            book.campaign.version += 1;
            book.campaign.updated_at = now;
        }
        book.donations.push(donation.clone());
        Ok(donation)
    }

    async fn commit_work_proof(
        &self,
        campaign_id: CampaignId,
        transform: &ProofTransform<'_>,
    ) -> Result<WorkProof> {
        let book = self.book(campaign_id).await?;
        let mut book = book.lock().await;

        let draft = transform(&book)?;
        let proof = WorkProof {
            id: next_id(&self.next_proof_id),
            campaign_id,
            allocations: draft.allocations,
            photos: draft.photos,
            description: draft.description,
            status: ProofStatus::Pending,
            created_at: Utc::now(),
        };
        book.work_proofs.push(proof.clone());
        Ok(proof)
    }
}
