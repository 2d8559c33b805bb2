//! # Goal Tracker
//!
//! Read-side capacity computation over a [`CampaignSnapshot`]. Nothing here is
//! cached: a tracker borrows one snapshot and is rebuilt for every decision.
//!
//! | Figure                   | Definition                                         |
//! |--------------------------|----------------------------------------------------|
//! | `raised(condition)`      | Σ successful donation shares credited to the title |
//! | `condition_remaining`    | `max(0, fund_estimate − raised)`, or unbounded     |
//! | `campaign_remaining`     | `max(0, total_goal − total_raised)`, or unbounded  |
//! | `available_conditions`   | unbounded, or `raised < fund_estimate`             |

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{Amount, CampaignSnapshot, Donation, FundingCondition};

/// Room left under a goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum Capacity {
    Bounded(Amount),
    Unbounded,
}

impl Capacity {
    pub fn bounded(goal: Amount, raised: Amount) -> Self {
        Self::Bounded((goal - raised).max(0))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Bounded(left) if *left <= 0)
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, Self::Bounded(_))
    }

    /// Remaining room, `None` when unbounded.
    pub fn limit(&self) -> Option<Amount> {
        match self {
            Self::Bounded(left) => Some(*left),
            Self::Unbounded => None,
        }
    }

    /// `min(amount, remaining)`; unbounded capacity never clamps.
    pub fn clamp(&self, amount: Amount) -> Amount {
        match self {
            Self::Bounded(left) => amount.min(*left).max(0),
            Self::Unbounded => amount,
        }
    }
}

/// Sum successful donation shares by condition title. Writes are checked
/// against overflow, so saturation here only guards corrupted history.
pub fn raised_by_condition(donations: &[Donation]) -> HashMap<String, Amount> {
    let mut raised: HashMap<String, Amount> = HashMap::new();
    for donation in donations.iter().filter(|d| d.counted_amount() > 0) {
        for share in &donation.shares {
            let sum = raised.entry(share.condition.clone()).or_default();
            *sum = sum.saturating_add(share.amount);
        }
    }
    raised
}

pub struct GoalTracker<'a> {
    snapshot: &'a CampaignSnapshot,
    raised: HashMap<String, Amount>,
}

impl<'a> GoalTracker<'a> {
    pub fn new(snapshot: &'a CampaignSnapshot) -> Self {
        Self {
            snapshot,
            raised: raised_by_condition(&snapshot.donations),
        }
    }

    pub fn raised(&self, title: &str) -> Amount {
        self.raised.get(title).copied().unwrap_or(0)
    }

    pub fn total_raised(&self) -> Amount {
        self.snapshot.campaign.total_raised
    }

    pub fn condition_remaining(&self, condition: &FundingCondition) -> Capacity {
        if condition.is_bounded() {
            Capacity::bounded(condition.fund_estimate, self.raised(&condition.title))
        } else {
            Capacity::Unbounded
        }
    }

    pub fn campaign_remaining(&self) -> Capacity {
        let campaign = &self.snapshot.campaign;
        if campaign.has_goal() {
            Capacity::bounded(campaign.total_goal, campaign.total_raised)
        } else {
            Capacity::Unbounded
        }
    }

    /// Conditions that can still take money, in declaration order.
    pub fn available_conditions(&self) -> Vec<&'a FundingCondition> {
        self.snapshot
            .campaign
            .conditions
            .iter()
            .filter(|c| !c.is_bounded() || self.raised(&c.title) < c.fund_estimate)
            .collect()
    }
}
