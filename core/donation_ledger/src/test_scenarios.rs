use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::invariants::assert_all_invariants;
use crate::storage::{DonationTransform, ProofTransform};
use crate::test_support::{claim, intake, new_campaign, photo, FakeFiles, FakeVerifier};
use crate::*;

fn give(donor: &str, amount: i64, target: Option<&str>) -> DonationRequest {
    DonationRequest {
        donor_id: donor.to_string(),
        amount: rupees(amount),
        target_condition: target.map(str::to_string),
    }
}

fn proof(claims: Vec<AllocationClaim>) -> ProofSubmission {
    ProofSubmission {
        claims,
        photos: vec![photo("site.jpg")],
        description: "Distributed rations at the relief camp".into(),
    }
}

async fn setup(conditions: &[(&str, i64)]) -> (DonationLedger, CampaignId) {
    let ledger = DonationLedger::new(Arc::new(MemoryLedgerStore::new()));
    let campaign = ledger
        .register_campaign(new_campaign(conditions))
        .await
        .unwrap();
    (ledger, campaign.id)
}

async fn assert_clean(ledger: &DonationLedger, id: CampaignId) {
    assert_all_invariants(&ledger.store().snapshot(id).await.unwrap());
}

// ─────────────────────────────────────────────────────────
// Funding
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_whole_campaign_donation_is_water_filled() {
    let (ledger, id) = setup(&[("Food", 500), ("Shelter", 300)]).await;

    let receipt = ledger.donate(id, give("donor-1", 1000, None)).await.unwrap();

    assert_eq!(receipt.requested, rupees(1000));
    assert_eq!(receipt.accepted, rupees(800));
    assert_eq!(receipt.status, DonationOutcome::Adjusted);
    assert_eq!(
        receipt.donation.shares,
        vec![
            ConditionShare { condition: "Food".into(), amount: rupees(500) },
            ConditionShare { condition: "Shelter".into(), amount: rupees(300) },
        ]
    );

    let wallet = ledger.wallet(id).await.unwrap();
    assert_eq!(wallet.received, rupees(800));
    assert!(wallet.conditions.iter().all(|c| c.raised <= c.goal));
    assert_clean(&ledger, id).await;
}

#[tokio::test]
async fn test_donation_is_clamped_to_remaining_goal() {
    let (ledger, id) = setup(&[("Food", 100)]).await;
    ledger.donate(id, give("donor-1", 90, None)).await.unwrap();

    let receipt = ledger.donate(id, give("donor-2", 20, None)).await.unwrap();

    assert_eq!(receipt.accepted, rupees(10));
    assert!(receipt.adjusted);
    assert_eq!(receipt.donation.amount, rupees(10));
    assert_eq!(receipt.donation.requested_amount, rupees(20));
    assert!(receipt.message().contains("₹10"));
    assert_eq!(ledger.get_campaign(id).await.unwrap().total_raised, rupees(100));
    assert_clean(&ledger, id).await;
}

#[tokio::test]
async fn test_unbounded_condition_accepts_past_campaign_goal() {
    let (ledger, id) = setup(&[("Food", 100), ("Transport", 0)]).await;
    ledger.donate(id, give("donor-1", 100, Some("Food"))).await.unwrap();

    let campaign = ledger.get_campaign(id).await.unwrap();
    assert_eq!(campaign.total_raised, campaign.total_goal);

    let targeted = ledger
        .donate(id, give("donor-2", 50, Some("Transport")))
        .await
        .unwrap();
    assert_eq!(targeted.accepted, rupees(50));
    assert_eq!(targeted.status, DonationOutcome::Accepted);

    let general = ledger.donate(id, give("donor-3", 30, None)).await.unwrap();
    assert_eq!(general.accepted, rupees(30));
    assert_eq!(general.donation.shares[0].condition, "Transport");

    assert_eq!(ledger.get_campaign(id).await.unwrap().total_raised, rupees(180));
    assert_clean(&ledger, id).await;
}

#[tokio::test]
async fn test_full_condition_rejects_targeted_donation() {
    let (ledger, id) = setup(&[("Food", 100), ("Transport", 0)]).await;
    ledger.donate(id, give("donor-1", 100, Some("Food"))).await.unwrap();

    let err = ledger
        .donate(id, give("donor-2", 5, Some("Food")))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::ConditionGoalReached {
            condition: "Food".into(),
            goal: rupees(100),
            raised: rupees(100),
        }
    );
    assert_eq!(ledger.donations(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_campaign_goal_blocks_targeted_donation_to_open_condition() {
    let (ledger, id) = setup(&[("Food", 100), ("Transport", 0)]).await;
    ledger.donate(id, give("donor-1", 100, Some("Transport"))).await.unwrap();

    let err = ledger
        .donate(id, give("donor-2", 10, Some("Food")))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::ConditionGoalReached {
            condition: "Food".into(),
            goal: rupees(100),
            raised: rupees(100),
        }
    );
    assert_eq!(ledger.wallet(id).await.unwrap().received, rupees(100));
}

#[tokio::test]
async fn test_donation_overflowing_the_total_is_rejected() {
    let (ledger, id) = setup(&[("Transport", 0)]).await;
    let huge = DonationRequest {
        donor_id: "donor-1".into(),
        amount: i64::MAX / 2 + 1,
        target_condition: None,
    };

    let first = ledger.donate(id, huge.clone()).await.unwrap();
    assert_eq!(first.accepted, i64::MAX / 2 + 1);

    let err = ledger.donate(id, huge).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)), "{err:?}");

    let campaign = ledger.get_campaign(id).await.unwrap();
    assert_eq!(campaign.total_raised, i64::MAX / 2 + 1);
    assert_eq!(campaign.version, 1);
    assert_eq!(ledger.donations(id).await.unwrap().len(), 1);
    assert_clean(&ledger, id).await;
}

#[tokio::test]
async fn test_all_goals_reached_writes_nothing() {
    let (ledger, id) = setup(&[("Food", 100)]).await;
    ledger.donate(id, give("donor-1", 100, None)).await.unwrap();

    let err = ledger.donate(id, give("donor-2", 10, None)).await.unwrap_err();
    assert_eq!(err.kind(), "all_goals_reached");
    assert_eq!(ledger.donations(id).await.unwrap().len(), 1);
    assert_eq!(ledger.get_campaign(id).await.unwrap().version, 1);
}

#[tokio::test]
async fn test_unknown_condition_and_closed_campaign() {
    let (ledger, id) = setup(&[("Food", 100)]).await;

    assert_eq!(
        ledger.quote_donation(id, &give("donor-1", 10, Some("Medicine"))).await,
        Err(LedgerError::UnknownCondition("Medicine".into()))
    );

    ledger.set_campaign_status(id, CampaignStatus::Closed).await.unwrap();
    assert_eq!(
        ledger.donate(id, give("donor-1", 10, None)).await.unwrap_err(),
        LedgerError::CampaignClosed(id)
    );
    assert!(ledger.donations(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_campaign_without_conditions_keeps_unallocated_money() {
    let (ledger, id) = setup(&[]).await;

    let receipt = ledger.donate(id, give("donor-1", 75, None)).await.unwrap();
    assert_eq!(receipt.accepted, rupees(75));
    assert!(receipt.donation.shares.is_empty());
    assert_eq!(receipt.donation.condition, GENERAL_CONDITION);
    assert_clean(&ledger, id).await;
}

#[tokio::test]
async fn test_quote_does_not_write() {
    let (ledger, id) = setup(&[("Food", 500), ("Shelter", 300)]).await;

    let plan = ledger.quote_donation(id, &give("donor-1", 900, None)).await.unwrap();
    assert_eq!(plan.accepted, rupees(800));
    assert!(plan.adjusted());
    assert!(ledger.donations(id).await.unwrap().is_empty());
}

/// Lands a competing donation between the quote and the commit.
struct RacingStore {
    inner: MemoryLedgerStore,
    competitor: Mutex<Option<DonationDraft>>,
}

#[async_trait]
impl LedgerStore for RacingStore {
    async fn create_campaign(&self, campaign: NewCampaign) -> Result<Campaign> {
        self.inner.create_campaign(campaign).await
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Campaign> {
        self.inner.get_campaign(id).await
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        self.inner.list_campaigns().await
    }

    async fn set_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<Campaign> {
        self.inner.set_campaign_status(id, status).await
    }

    async fn snapshot(&self, id: CampaignId) -> Result<CampaignSnapshot> {
        self.inner.snapshot(id).await
    }

    async fn query_donations(&self, campaign_id: CampaignId) -> Result<Vec<Donation>> {
        self.inner.query_donations(campaign_id).await
    }

    async fn query_donations_by_donor(&self, donor_id: &str) -> Result<Vec<Donation>> {
        self.inner.query_donations_by_donor(donor_id).await
    }

    async fn query_work_proofs(&self, campaign_id: CampaignId) -> Result<Vec<WorkProof>> {
        self.inner.query_work_proofs(campaign_id).await
    }

    async fn commit_donation(
        &self,
        campaign_id: CampaignId,
        transform: &DonationTransform<'_>,
    ) -> Result<Donation> {
        let competitor = self.competitor.lock().unwrap().take();
        if let Some(draft) = competitor {
            self.inner
                .commit_donation(campaign_id, &move |_| Ok(draft.clone()))
                .await?;
        }
        self.inner.commit_donation(campaign_id, transform).await
    }

    async fn commit_work_proof(
        &self,
        campaign_id: CampaignId,
        transform: &ProofTransform<'_>,
    ) -> Result<WorkProof> {
        self.inner.commit_work_proof(campaign_id, transform).await
    }
}

#[tokio::test]
async fn test_donation_losing_the_race_is_recorded_as_cancelled() {
    let store = Arc::new(RacingStore {
        inner: MemoryLedgerStore::new(),
        competitor: Mutex::new(Some(DonationDraft {
            donor_id: "donor-fast".into(),
            condition: GENERAL_CONDITION.into(),
            requested_amount: rupees(100),
            amount: rupees(100),
            shares: vec![ConditionShare { condition: "Food".into(), amount: rupees(100) }],
            status: DonationStatus::Success,
        })),
    });
    let ledger = DonationLedger::new(store);
    let id = ledger
        .register_campaign(new_campaign(&[("Food", 100)]))
        .await
        .unwrap()
        .id;

    let receipt = ledger.donate(id, give("donor-slow", 40, None)).await.unwrap();

    assert_eq!(receipt.status, DonationOutcome::Cancelled);
    assert_eq!(receipt.accepted, 0);
    assert_eq!(receipt.donation.requested_amount, rupees(40));
    assert_eq!(ledger.get_campaign(id).await.unwrap().total_raised, rupees(100));
    assert_eq!(ledger.donations(id).await.unwrap().len(), 2);
    assert_eq!(ledger.donor_profile("donor-slow").await.unwrap().donation_count, 0);
    assert_clean(&ledger, id).await;
}

// ─────────────────────────────────────────────────────────
// Spending
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_overclaim_is_rejected_before_verification() {
    let (ledger, id) = setup(&[("Food", 500)]).await;
    ledger.donate(id, give("donor-1", 500, None)).await.unwrap();

    let verifier = Arc::new(FakeVerifier::passing());
    let files = Arc::new(FakeFiles::default());
    let intake = intake(verifier.clone(), files.clone());

    let err = ledger
        .submit_work_proof(id, proof(vec![claim("Food", 600)]), &intake)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        LedgerError::InsufficientBalance {
            requested: rupees(600),
            received: rupees(500),
            used: 0,
            remaining: rupees(500),
        }
    );
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.wallet(id).await.unwrap().used, 0);
}

#[tokio::test]
async fn test_cumulative_claims_cannot_exceed_received() {
    let (ledger, id) = setup(&[("Food", 500)]).await;
    ledger.donate(id, give("donor-1", 400, None)).await.unwrap();
    let intake = intake(Arc::new(FakeVerifier::passing()), Arc::new(FakeFiles::default()));

    let first = ledger
        .submit_work_proof(id, proof(vec![claim("Food", 200)]), &intake)
        .await
        .unwrap();
    assert_eq!(first.status, ProofStatus::Pending);
    assert_eq!(first.photos, vec!["/api/file/1".to_string()]);

    let err = ledger
        .submit_work_proof(id, proof(vec![claim("Food", 250)]), &intake)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "insufficient_balance");

    let wallet = ledger.wallet(id).await.unwrap();
    assert_eq!(wallet.used, rupees(200));
    assert_eq!(wallet.remaining, rupees(200));
    assert_eq!(ledger.work_proofs(id).await.unwrap().len(), 1);
    assert_clean(&ledger, id).await;
}

#[tokio::test]
async fn test_failed_verification_stores_nothing() {
    let (ledger, id) = setup(&[("Food", 500)]).await;
    ledger.donate(id, give("donor-1", 300, None)).await.unwrap();

    let mut report = FakeVerifier::passing().report;
    report.is_ai_generated = true;
    let files = Arc::new(FakeFiles::default());
    let intake = intake(Arc::new(FakeVerifier::with(report)), files.clone());

    let err = ledger
        .submit_work_proof(id, proof(vec![claim("Food", 100)]), &intake)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        LedgerError::VerificationFailed {
            index: 0,
            reason: VerificationFailure::AiGenerated,
        }
    );
    assert!(files.stored.lock().unwrap().is_empty());
    assert!(ledger.work_proofs(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_proof_requires_photos() {
    let (ledger, id) = setup(&[("Food", 500)]).await;
    ledger.donate(id, give("donor-1", 300, None)).await.unwrap();
    let intake = intake(Arc::new(FakeVerifier::passing()), Arc::new(FakeFiles::default()));

    let mut submission = proof(vec![claim("Food", 100)]);
    submission.photos.clear();
    assert_eq!(
        ledger.submit_work_proof(id, submission, &intake).await,
        Err(LedgerError::MissingRequiredField("photos"))
    );
}

#[tokio::test]
async fn test_closed_campaign_still_accounts_for_spending() {
    let (ledger, id) = setup(&[("Food", 500)]).await;
    ledger.donate(id, give("donor-1", 300, None)).await.unwrap();
    ledger.set_campaign_status(id, CampaignStatus::Closed).await.unwrap();
    let intake = intake(Arc::new(FakeVerifier::passing()), Arc::new(FakeFiles::default()));

    let recorded = ledger
        .submit_work_proof(id, proof(vec![claim("Food", 300)]), &intake)
        .await
        .unwrap();
    assert_eq!(recorded.total_claimed(), rupees(300));
    assert_eq!(ledger.wallet(id).await.unwrap().remaining, 0);
}

// ─────────────────────────────────────────────────────────
// Read models
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_wallet_reads_are_idempotent() {
    let (ledger, id) = setup(&[("Food", 500), ("Shelter", 300)]).await;
    ledger.donate(id, give("donor-1", 250, None)).await.unwrap();

    let first = ledger.wallet(id).await.unwrap();
    let second = ledger.wallet(id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_donors_see_latest_proof_and_earn_badges() {
    let (ledger, id) = setup(&[("Food", 50_000)]).await;
    for _ in 0..5 {
        ledger.donate(id, give("donor-1", 6_000, None)).await.unwrap();
    }
    ledger.donate(id, give("donor-2", 100, None)).await.unwrap();

    let intake = intake(Arc::new(FakeVerifier::passing()), Arc::new(FakeFiles::default()));
    ledger
        .submit_work_proof(id, proof(vec![claim("Food", 1_000)]), &intake)
        .await
        .unwrap();
    let latest = ledger
        .submit_work_proof(id, proof(vec![claim("Food", 2_000)]), &intake)
        .await
        .unwrap();

    let views = ledger.donation_views("donor-1").await.unwrap();
    assert_eq!(views.len(), 5);
    for view in &views {
        let breakdown = view.proof_breakdown.as_ref().unwrap();
        assert_eq!(breakdown.proof_id, latest.id);
        assert_eq!(view.used, rupees(3_000));
    }

    let profile = ledger.donor_profile("donor-1").await.unwrap();
    assert_eq!(profile.total_donated, rupees(30_000));
    assert_eq!(profile.rank, Rank::Silver);
    assert_eq!(profile.badges.len(), 3);
}

#[tokio::test]
async fn test_registration_is_validated_and_audit_is_clean() {
    let ledger = DonationLedger::new(Arc::new(MemoryLedgerStore::new()));
    let err = ledger
        .register_campaign(new_campaign(&[("Food", 10), ("Food", 20)]))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::DuplicateCondition("Food".into()));
    assert!(ledger.list_campaigns().await.unwrap().is_empty());

    let id = ledger
        .register_campaign(new_campaign(&[("Food", 10)]))
        .await
        .unwrap()
        .id;
    ledger.donate(id, give("donor-1", 10, None)).await.unwrap();
    assert!(ledger.audit_all().await.unwrap().is_empty());
}
