use std::sync::Arc;

use crate::goals::GoalTracker;
use crate::invariants::assert_all_invariants;
use crate::test_support::{claim, new_campaign, verified};
use crate::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_donations_never_overshoot() {
    let ledger = DonationLedger::new(Arc::new(MemoryLedgerStore::new()));
    let id = ledger
        .register_campaign(new_campaign(&[("Food", 1_000), ("Shelter", 500)]))
        .await
        .unwrap()
        .id;

    let mut handles = Vec::new();
    for i in 0..50i64 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            let target = (i % 3 == 0).then(|| "Shelter".to_string());
            ledger
                .donate(
                    id,
                    DonationRequest {
                        donor_id: format!("donor-{i}"),
                        amount: rupees(37 + i),
                        target_condition: target,
                    },
                )
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => accepted += receipt.accepted,
            Err(e) => assert!(e.is_goal_reached(), "unexpected rejection: {e}"),
        }
    }

    let snapshot = ledger.store().snapshot(id).await.unwrap();
    assert_eq!(snapshot.campaign.total_raised, rupees(1_500));
    assert_eq!(accepted, rupees(1_500));

    let tracker = GoalTracker::new(&snapshot);
    assert_eq!(tracker.raised("Food"), rupees(1_000));
    assert_eq!(tracker.raised("Shelter"), rupees(500));
    assert_all_invariants(&snapshot);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_proofs_never_overspend() {
    let ledger = DonationLedger::new(Arc::new(MemoryLedgerStore::new()));
    let id = ledger
        .register_campaign(new_campaign(&[("Food", 1_000)]))
        .await
        .unwrap()
        .id;
    ledger
        .donate(
            id,
            DonationRequest {
                donor_id: "donor-1".into(),
                amount: rupees(500),
                target_condition: None,
            },
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .record_work_proof(
                    id,
                    &[claim("Food", 100)],
                    &[verified(&format!("/api/file/{i}"))],
                    "ration kits",
                )
                .await
        }));
    }

    let mut recorded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => recorded += 1,
            Err(e) => assert_eq!(e.kind(), "insufficient_balance"),
        }
    }

    assert_eq!(recorded, 5);
    let wallet = ledger.wallet(id).await.unwrap();
    assert_eq!(wallet.used, rupees(500));
    assert_eq!(wallet.remaining, 0);
    assert_all_invariants(&ledger.store().snapshot(id).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_campaigns_do_not_interfere() {
    let ledger = DonationLedger::new(Arc::new(MemoryLedgerStore::new()));
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(
            ledger
                .register_campaign(new_campaign(&[("Food", 200)]))
                .await
                .unwrap()
                .id,
        );
    }

    let mut handles = Vec::new();
    for &id in &ids {
        for _ in 0..5 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .donate(
                        id,
                        DonationRequest {
                            donor_id: "donor-1".into(),
                            amount: rupees(30),
                            target_condition: Some("Food".into()),
                        },
                    )
                    .await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for id in ids {
        assert_eq!(ledger.get_campaign(id).await.unwrap().total_raised, rupees(150));
    }
}
