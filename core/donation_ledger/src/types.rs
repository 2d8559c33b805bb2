//! # Types
//!
//! Shared data structures used across all modules of the donation ledger.
//!
//! ## Design decisions
//!
//! ### Fixed-point money
//!
//! Every stored or compared amount is an [`Amount`] in minor units (paise).
//! Floats only appear in derived percentages for display.
//!
//! ### Aggregate / ledger split
//!
//! A [`Campaign`] carries the authoritative running `total_raised` aggregate.
//! Per-condition `raised` and `used` figures are never stored on the campaign;
//! they are derived from the [`Donation`] and [`WorkProof`] ledgers held in a
//! [`CampaignSnapshot`].
//!
//! ### Donation lifecycle
//!
//! ```text
//! (requested) ──► Success   (amount possibly adjusted down, permanently)
//!      └────────► Cancelled (goal already met at write time; counts for nothing)
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Money in minor units (1/100 of a rupee).
pub type Amount = i64;
pub type CampaignId = i64;
pub type DonationId = i64;
pub type ProofId = i64;

pub const MINOR_UNITS_PER_RUPEE: Amount = 100;

/// Smallest donation the ledger accepts (₹1).
pub const MIN_DONATION: Amount = MINOR_UNITS_PER_RUPEE;

/// Condition label recorded on donations that did not target a specific condition.
pub const GENERAL_CONDITION: &str = "General";

/// Convert whole rupees into minor units.
pub const fn rupees(whole: i64) -> Amount {
    whole * MINOR_UNITS_PER_RUPEE
}

/// Display wrapper rendering an [`Amount`] as rupees, e.g. `₹1,250.50`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rupees(pub Amount);

impl fmt::Display for Rupees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MINOR_UNITS_PER_RUPEE as u64;
        let frac = abs % MINOR_UNITS_PER_RUPEE as u64;

        let digits = whole.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        if frac == 0 {
            write!(f, "{sign}₹{grouped}")
        } else {
            write!(f, "{sign}₹{grouped}.{frac:02}")
        }
    }
}

// ─────────────────────────────────────────────────────────
// Campaigns
// ─────────────────────────────────────────────────────────

/// Soft lifecycle status of a campaign. Campaigns are never deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Registered; the NGO's identity documents are awaiting review.
    PendingVerification,
    /// Open for donations.
    Active,
    /// No longer accepting donations. Proofs may still be filed.
    Closed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingVerification => "pending_verification",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending_verification" => Some(Self::PendingVerification),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Advisory priority of a funding condition. Never used in accounting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "High" => Some(Self::High),
            "Medium" => Some(Self::Medium),
            "Low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// A named sub-goal of a campaign. `title` is the natural key shared by
/// donations and work proofs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingCondition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Goal in minor units; `0` means unbounded.
    pub fund_estimate: Amount,
    #[serde(default)]
    pub priority: Priority,
}

impl FundingCondition {
    pub fn is_bounded(&self) -> bool {
        self.fund_estimate > 0
    }
}

/// An NGO's fundraising listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    /// Identity of the owning NGO account.
    pub ngo_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub conditions: Vec<FundingCondition>,
    /// Sum of condition goals; `0` means no goal.
    pub total_goal: Amount,
    /// Authoritative running total of accepted donations.
    pub total_raised: Amount,
    pub status: CampaignStatus,
    /// Bumped on every aggregate update; used for compare-and-swap.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn condition(&self, title: &str) -> Option<&FundingCondition> {
        self.conditions.iter().find(|c| c.title == title)
    }

    pub fn has_goal(&self) -> bool {
        self.total_goal > 0
    }

    /// True when some condition has no goal, which makes the campaign-level
    /// goal advisory for donations routed to it.
    pub fn has_unbounded_condition(&self) -> bool {
        self.conditions.iter().any(|c| !c.is_bounded())
    }
}

/// Registration payload for a new campaign.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub ngo_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub conditions: Vec<FundingCondition>,
}

impl NewCampaign {
    pub fn total_goal(&self) -> Amount {
        self.conditions.iter().map(|c| c.fund_estimate).sum()
    }
}

// ─────────────────────────────────────────────────────────
// Donations
// ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Success,
    Cancelled,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(Self::Success),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// The part of a donation credited to one funding condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionShare {
    pub condition: String,
    pub amount: Amount,
}

/// A donor's request, before allocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRequest {
    pub donor_id: String,
    pub amount: Amount,
    /// Condition title, or `None` / `"General"` for the whole campaign.
    #[serde(default)]
    pub target_condition: Option<String>,
}

impl DonationRequest {
    /// The targeted condition title, treating the `"General"` sentinel as no target.
    pub fn target(&self) -> Option<&str> {
        self.target_condition
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != GENERAL_CONDITION)
    }

    /// Label stored on the resulting donation record.
    pub fn condition_label(&self) -> String {
        self.target().unwrap_or(GENERAL_CONDITION).to_string()
    }
}

/// An immutable donation record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub donor_id: String,
    pub campaign_id: CampaignId,
    /// Targeted condition title or [`GENERAL_CONDITION`].
    pub condition: String,
    /// What the donor asked to give.
    pub requested_amount: Amount,
    /// What counted toward `total_raised`.
    pub amount: Amount,
    pub shares: Vec<ConditionShare>,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
}

impl Donation {
    /// Only successful donations count toward any total.
    pub fn counted_amount(&self) -> Amount {
        match self.status {
            DonationStatus::Success => self.amount,
            DonationStatus::Cancelled => 0,
        }
    }

    pub fn was_adjusted(&self) -> bool {
        self.status == DonationStatus::Success && self.amount != self.requested_amount
    }
}

/// Write set produced by the allocation engine for one donation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DonationDraft {
    pub donor_id: String,
    pub condition: String,
    pub requested_amount: Amount,
    pub amount: Amount,
    pub shares: Vec<ConditionShare>,
    pub status: DonationStatus,
}

// ─────────────────────────────────────────────────────────
// Work proofs
// ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    Pending,
    Verified,
    Rejected,
}

impl ProofStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Money an NGO claims to have spent on one condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationClaim {
    pub condition: String,
    pub amount: Amount,
}

/// A claim as persisted on a work proof, with its share of the proof total.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionAllocation {
    pub condition: String,
    pub amount: Amount,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkProof {
    pub id: ProofId,
    pub campaign_id: CampaignId,
    pub allocations: Vec<ConditionAllocation>,
    /// Opaque file-storage references.
    pub photos: Vec<String>,
    pub description: String,
    pub status: ProofStatus,
    pub created_at: DateTime<Utc>,
}

impl WorkProof {
    pub fn total_claimed(&self) -> Amount {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// Write set produced by the reconciliation engine for one proof.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkProofDraft {
    pub allocations: Vec<ConditionAllocation>,
    pub photos: Vec<String>,
    pub description: String,
}

/// One consistent read of a campaign and its ledgers. Every engine in this
/// crate is a pure function of a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    pub campaign: Campaign,
    pub donations: Vec<Donation>,
    pub work_proofs: Vec<WorkProof>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rupees_display() {
        assert_eq!(Rupees(rupees(500)).to_string(), "₹500");
        assert_eq!(Rupees(rupees(1_250) + 50).to_string(), "₹1,250.50");
        assert_eq!(Rupees(rupees(100_000)).to_string(), "₹100,000");
        assert_eq!(Rupees(-5).to_string(), "-₹0.05");
    }

    #[test]
    fn general_sentinel_is_not_a_target() {
        let mut req = DonationRequest {
            donor_id: "d1".into(),
            amount: rupees(10),
            target_condition: Some("General".into()),
        };
        assert_eq!(req.target(), None);
        assert_eq!(req.condition_label(), GENERAL_CONDITION);

        req.target_condition = Some("Food".into());
        assert_eq!(req.target(), Some("Food"));
        assert_eq!(req.condition_label(), "Food");
    }

    #[test]
    fn status_round_trips_through_storage_strings() {
        for s in [
            CampaignStatus::PendingVerification,
            CampaignStatus::Active,
            CampaignStatus::Closed,
        ] {
            assert_eq!(CampaignStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(DonationStatus::parse("cancelled"), Some(DonationStatus::Cancelled));
        assert_eq!(ProofStatus::parse("bogus"), None);
    }
}
