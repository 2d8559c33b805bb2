//! Ledger invariants, checked over a [`CampaignSnapshot`].
//!
//! INV-1: a bounded condition's `raised` never exceeds its `fund_estimate`.
//! INV-2: `total_raised ≤ total_goal` when the goal is set and every condition
//!        is bounded (an unbounded condition makes the campaign goal advisory).
//! INV-3: money claimed in proofs never exceeds money received.
//! INV-4: the aggregate equals the sum of successful donation amounts.
//! INV-5: a successful donation's shares, when present, sum to its amount.

use serde::Serialize;

use crate::goals::raised_by_condition;
use crate::types::{Amount, CampaignSnapshot, DonationId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "invariant", rename_all = "snake_case")]
pub enum InvariantViolation {
    ConditionOverFunded {
        condition: String,
        goal: Amount,
        raised: Amount,
    },
    CampaignOverFunded {
        goal: Amount,
        raised: Amount,
    },
    UsedExceedsReceived {
        used: Amount,
        received: Amount,
    },
    AggregateMismatch {
        aggregate: Amount,
        ledger_sum: Amount,
    },
    ShareMismatch {
        donation_id: DonationId,
        amount: Amount,
        shares: Amount,
    },
}

pub fn check_snapshot(snapshot: &CampaignSnapshot) -> Vec<InvariantViolation> {
    let campaign = &snapshot.campaign;
    let mut violations = Vec::new();

    let raised = raised_by_condition(&snapshot.donations);
    for condition in campaign.conditions.iter().filter(|c| c.is_bounded()) {
        let r = raised.get(&condition.title).copied().unwrap_or(0);
        if r > condition.fund_estimate {
            violations.push(InvariantViolation::ConditionOverFunded {
                condition: condition.title.clone(),
                goal: condition.fund_estimate,
                raised: r,
            });
        }
    }

    if campaign.has_goal()
        && !campaign.has_unbounded_condition()
        && campaign.total_raised > campaign.total_goal
    {
        violations.push(InvariantViolation::CampaignOverFunded {
            goal: campaign.total_goal,
            raised: campaign.total_raised,
        });
    }

    let used: Amount = snapshot.work_proofs.iter().map(|p| p.total_claimed()).sum();
    if used > campaign.total_raised {
        violations.push(InvariantViolation::UsedExceedsReceived {
            used,
            received: campaign.total_raised,
        });
    }

    let ledger_sum: Amount = snapshot.donations.iter().map(|d| d.counted_amount()).sum();
    if ledger_sum != campaign.total_raised {
        violations.push(InvariantViolation::AggregateMismatch {
            aggregate: campaign.total_raised,
            ledger_sum,
        });
    }

    for donation in snapshot.donations.iter().filter(|d| d.counted_amount() > 0) {
        let shares: Amount = donation.shares.iter().map(|s| s.amount).sum();
        if !donation.shares.is_empty() && shares != donation.amount {
            violations.push(InvariantViolation::ShareMismatch {
                donation_id: donation.id,
                amount: donation.amount,
                shares,
            });
        }
    }

    violations
}

/// Panic with every violation found. Test helper.
#[cfg(test)]
pub fn assert_all_invariants(snapshot: &CampaignSnapshot) {
    let violations = check_snapshot(snapshot);
    assert!(
        violations.is_empty(),
        "invariants violated for campaign {}: {:?}",
        snapshot.campaign.id,
        violations
    );
}
