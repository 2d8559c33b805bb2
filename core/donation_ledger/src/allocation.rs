//! # Allocation Engine
//!
//! Turns a [`DonationRequest`] into an [`AllocationPlan`]: how much of the
//! requested amount is accepted and how it is split across funding conditions.
//!
//! ## Precedence
//!
//! 1. Condition caps are strict. A targeted condition with no room rejects the
//!    donation; a partial fit is clamped.
//! 2. A whole-campaign donation is split across every condition that still has
//!    room using water-filling: equal shares, each capped at the condition's
//!    remaining capacity, excess redistributed to conditions that are still open.
//! 3. The campaign goal caps the donation only when every participating
//!    condition is bounded. Once an unbounded condition takes part, the
//!    campaign total is advisory.
//! 4. With no open condition and the campaign goal met, the donation is
//!    rejected with `AllGoalsReached`. A targeted donation blocked only by the
//!    campaign goal reports `ConditionGoalReached` with the campaign figures.
//!
//! The engine is pure. Stores call it inside their per-campaign transaction so
//! the decision is always taken against the state it is written onto.

use serde::Serialize;
use tracing::debug;

use crate::errors::{LedgerError, Result};
use crate::goals::{Capacity, GoalTracker};
use crate::types::{
    Amount, CampaignSnapshot, CampaignStatus, ConditionShare, DonationDraft, DonationRequest,
    DonationStatus, Rupees, MIN_DONATION,
};

/// Outcome of planning one donation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AllocationPlan {
    /// Condition label to record (`"General"` for whole-campaign donations).
    pub condition: String,
    pub requested: Amount,
    pub accepted: Amount,
    /// Per-condition split; empty when the campaign has no open condition to
    /// credit (the money still counts toward `total_raised`).
    pub shares: Vec<ConditionShare>,
}

impl AllocationPlan {
    pub fn adjusted(&self) -> bool {
        self.accepted != self.requested
    }

    pub fn into_draft(self, donor_id: &str) -> DonationDraft {
        DonationDraft {
            donor_id: donor_id.to_string(),
            condition: self.condition,
            requested_amount: self.requested,
            amount: self.accepted,
            shares: self.shares,
            status: DonationStatus::Success,
        }
    }
}

/// Record of a donation that lost the race to a filling goal.
pub fn cancelled_draft(request: &DonationRequest) -> DonationDraft {
    DonationDraft {
        donor_id: request.donor_id.clone(),
        condition: request.condition_label(),
        requested_amount: request.amount,
        amount: 0,
        shares: Vec::new(),
        status: DonationStatus::Cancelled,
    }
}

/// Check the request shape before touching campaign state.
pub fn validate_request(request: &DonationRequest) -> Result<()> {
    if request.donor_id.trim().is_empty() {
        return Err(LedgerError::MissingRequiredField("donor_id"));
    }
    if request.amount <= 0 {
        return Err(LedgerError::InvalidAmount(format!(
            "donation amount must be positive, got {}",
            Rupees(request.amount)
        )));
    }
    if request.amount < MIN_DONATION {
        return Err(LedgerError::InvalidAmount(format!(
            "minimum donation amount is {}",
            Rupees(MIN_DONATION)
        )));
    }
    Ok(())
}

/// Plan a donation against `snapshot`.
pub fn plan_donation(snapshot: &CampaignSnapshot, request: &DonationRequest) -> Result<AllocationPlan> {
    validate_request(request)?;

    let campaign = &snapshot.campaign;
    if campaign.status == CampaignStatus::Closed {
        return Err(LedgerError::CampaignClosed(campaign.id));
    }

    let tracker = GoalTracker::new(snapshot);

    let participants = match request.target() {
        Some(title) => {
            let condition = campaign
                .condition(title)
                .ok_or_else(|| LedgerError::UnknownCondition(title.to_string()))?;
            if tracker.condition_remaining(condition).is_exhausted() {
                return Err(LedgerError::ConditionGoalReached {
                    condition: condition.title.clone(),
                    goal: condition.fund_estimate,
                    raised: tracker.raised(&condition.title),
                });
            }
            vec![condition]
        }
        None => {
            let available = tracker.available_conditions();
            if available.is_empty() && tracker.campaign_remaining().is_exhausted() {
                return Err(all_goals_reached(&tracker, snapshot));
            }
            available
        }
    };

    let capacities: Vec<Capacity> = participants
        .iter()
        .map(|c| tracker.condition_remaining(c))
        .collect();

    // Campaign goal only binds when nothing unbounded takes part.
    let mut budget = request.amount;
    if capacities.iter().all(Capacity::is_bounded) {
        budget = tracker.campaign_remaining().clamp(budget);
        if budget == 0 {
            return Err(match request.target() {
                // The condition has room but the campaign goal is met.
                Some(title) => LedgerError::ConditionGoalReached {
                    condition: title.to_string(),
                    goal: campaign.total_goal,
                    raised: tracker.total_raised(),
                },
                None => all_goals_reached(&tracker, snapshot),
            });
        }
    }

    let (accepted, shares) = if participants.is_empty() {
        (budget, Vec::new())
    } else {
        let split = water_fill(budget, &capacities);
        let shares: Vec<ConditionShare> = participants
            .iter()
            .zip(split)
            .filter(|(_, amount)| *amount > 0)
            .map(|(c, amount)| ConditionShare {
                condition: c.title.clone(),
                amount,
            })
            .collect();
        (shares.iter().map(|s| s.amount).sum(), shares)
    };
    ensure_representable(&tracker, accepted, &shares)?;

    let plan = AllocationPlan {
        condition: request.condition_label(),
        requested: request.amount,
        accepted,
        shares,
    };

    debug!(
        campaign_id = campaign.id,
        requested = plan.requested,
        accepted = plan.accepted,
        shares = plan.shares.len(),
        "Planned donation"
    );

    Ok(plan)
}

fn all_goals_reached(tracker: &GoalTracker<'_>, snapshot: &CampaignSnapshot) -> LedgerError {
    LedgerError::AllGoalsReached {
        campaign_id: snapshot.campaign.id,
        goal: snapshot.campaign.total_goal,
        raised: tracker.total_raised(),
    }
}

/// Reject a plan whose amounts would overflow the campaign total or a
/// condition's raised figure once written.
fn ensure_representable(
    tracker: &GoalTracker<'_>,
    accepted: Amount,
    shares: &[ConditionShare],
) -> Result<()> {
    let overflow = || {
        LedgerError::InvalidAmount(format!(
            "donation of {} would overflow the campaign total",
            Rupees(accepted)
        ))
    };
    tracker.total_raised().checked_add(accepted).ok_or_else(overflow)?;
    for share in shares {
        tracker
            .raised(&share.condition)
            .checked_add(share.amount)
            .ok_or_else(overflow)?;
    }
    Ok(())
}

/// Capacity-aware equal split of `amount` across `capacities`.
///
/// Returns one share per capacity, in order. Shares never exceed their
/// capacity; the sum is `min(amount, Σ capacity)`. Minor units that do not
/// divide evenly go one each to open slots in declaration order.
pub fn water_fill(amount: Amount, capacities: &[Capacity]) -> Vec<Amount> {
    let mut shares = vec![0; capacities.len()];
    let room = |i: usize, shares: &[Amount]| match capacities[i] {
        Capacity::Bounded(cap) => (cap - shares[i]).max(0),
        Capacity::Unbounded => Amount::MAX,
    };

    let mut open: Vec<usize> = (0..capacities.len())
        .filter(|&i| room(i, &shares) > 0)
        .collect();
    let mut left = amount.max(0);

    while left > 0 && !open.is_empty() {
        let even = left / open.len() as Amount;

        if even == 0 {
            for &i in &open {
                if left == 0 {
                    break;
                }
                shares[i] += 1;
                left -= 1;
            }
        } else {
            for &i in &open {
                let give = even.min(room(i, &shares));
                shares[i] += give;
                left -= give;
            }
        }

        open.retain(|&i| room(i, &shares) > 0);
    }

    shares
}
