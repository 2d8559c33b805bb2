//! Builders shared by the unit tests. Amounts are given in whole rupees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::types::{
    rupees, AllocationClaim, Campaign, CampaignSnapshot, CampaignStatus, ConditionAllocation,
    ConditionShare, Donation, DonationId, DonationStatus, FundingCondition, NewCampaign, Priority,
    ProofId, ProofStatus, WorkProof,
};
use crate::verification::{
    ConditionTarget, FileStore, ImageVerifier, PhotoUpload, ProofIntake, VerificationPolicy,
    VerificationReport, VerificationStatus, VerifiedPhoto,
};

fn conditions(layout: &[(&str, i64)]) -> Vec<FundingCondition> {
    layout.iter()
        .map(|(title, goal)| FundingCondition {
            title: title.to_string(),
            description: format!("{title} for the community"),
            fund_estimate: rupees(*goal),
            priority: Priority::Medium,
        })
        .collect()
}

pub fn new_campaign(layout: &[(&str, i64)]) -> NewCampaign {
    NewCampaign {
        ngo_id: "ngo-1".into(),
        name: "Flood Relief".into(),
        description: "Relief for flood-affected families".into(),
        category: "disaster".into(),
        conditions: conditions(layout),
    }
}

pub fn campaign_with(layout: &[(&str, i64)]) -> Campaign {
    let conditions = conditions(layout);
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Campaign {
        id: 1,
        ngo_id: "ngo-1".into(),
        name: "Flood Relief".into(),
        description: String::new(),
        category: "disaster".into(),
        total_goal: conditions.iter().map(|c| c.fund_estimate).sum(),
        conditions,
        total_raised: 0,
        status: CampaignStatus::Active,
        version: 0,
        created_at: at,
        updated_at: at,
    }
}

/// Successful donation from `donor-1` whose amount is the sum of its shares.
pub fn donation_to(id: DonationId, shares: &[(&str, i64)]) -> Donation {
    let shares: Vec<ConditionShare> = shares
        .iter()
        .map(|(condition, amount)| ConditionShare {
            condition: condition.to_string(),
            amount: rupees(*amount),
        })
        .collect();
    let amount = shares.iter().map(|s| s.amount).sum();
    Donation {
        id,
        donor_id: "donor-1".into(),
        campaign_id: 1,
        condition: "General".into(),
        requested_amount: amount,
        amount,
        shares,
        status: DonationStatus::Success,
        created_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
    }
}

/// Snapshot whose aggregate matches the given donations.
pub fn snapshot(mut campaign: Campaign, donations: Vec<Donation>) -> CampaignSnapshot {
    campaign.total_raised = donations.iter().map(|d| d.counted_amount()).sum();
    CampaignSnapshot {
        campaign,
        donations,
        work_proofs: Vec::new(),
    }
}

/// Snapshot with an aggregate but no itemised donations.
pub fn snapshot_with_raised(mut campaign: Campaign, total_raised: i64) -> CampaignSnapshot {
    campaign.total_raised = total_raised;
    CampaignSnapshot {
        campaign,
        donations: Vec::new(),
        work_proofs: Vec::new(),
    }
}

pub fn proof_of(id: ProofId, allocations: &[(&str, i64)]) -> WorkProof {
    WorkProof {
        id,
        campaign_id: 1,
        allocations: allocations
            .iter()
            .map(|(condition, amount)| ConditionAllocation {
                condition: condition.to_string(),
                amount: rupees(*amount),
                percentage: 0.0,
            })
            .collect(),
        photos: vec![format!("/api/file/{id}")],
        description: "work done".into(),
        status: ProofStatus::Pending,
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
    }
}

pub fn claim(condition: &str, amount: i64) -> AllocationClaim {
    AllocationClaim {
        condition: condition.to_string(),
        amount: rupees(amount),
    }
}

pub fn verified(reference: &str) -> VerifiedPhoto {
    VerifiedPhoto::new(reference.to_string(), 95)
}

// ─────────────────────────────────────────────────────────
// Collaborator fakes
// ─────────────────────────────────────────────────────────

/// Returns the same report for every photo and counts calls.
pub struct FakeVerifier {
    pub report: VerificationReport,
    pub calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn passing() -> Self {
        Self::with(VerificationReport {
            satisfies_conditions: true,
            is_ai_generated: false,
            confidence: 96,
            reasoning: "work matches the allocated conditions".into(),
            verification_status: VerificationStatus::Verified,
        })
    }

    pub fn with(report: VerificationReport) -> Self {
        Self {
            report,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageVerifier for FakeVerifier {
    async fn verify(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _targets: &[ConditionTarget],
    ) -> crate::errors::Result<VerificationReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.report.clone())
    }
}

/// Keeps uploaded file names; references look like `/api/file/<n>`.
#[derive(Default)]
pub struct FakeFiles {
    pub stored: Mutex<Vec<String>>,
}

#[async_trait]
impl FileStore for FakeFiles {
    async fn put(&self, _bytes: Vec<u8>, _content_type: &str, file_name: &str) -> crate::errors::Result<String> {
        let mut stored = self.stored.lock().unwrap();
        stored.push(file_name.to_string());
        Ok(format!("/api/file/{}", stored.len()))
    }
}

pub fn intake(verifier: Arc<FakeVerifier>, files: Arc<FakeFiles>) -> ProofIntake {
    ProofIntake::new(verifier, files, VerificationPolicy::default())
}

pub fn photo(name: &str) -> PhotoUpload {
    PhotoUpload {
        file_name: name.to_string(),
        mime_type: "image/jpeg".into(),
        bytes: vec![0xff, 0xd8, 0xff, 0xe0],
    }
}
