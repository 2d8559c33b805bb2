//! Ledger error taxonomy.
//!
//! Every validation error is raised before any store mutation and carries the
//! capacity figures a caller needs to offer a corrected amount.

use serde::Serialize;
use thiserror::Error;

use crate::types::{Amount, CampaignId, Rupees};

/// Why a photo was refused as proof of work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum VerificationFailure {
    #[error("image appears to be AI-generated")]
    AiGenerated,

    #[error("image does not show work for the allocated conditions")]
    ConditionMismatch,

    #[error("verification confidence {confidence}% is below the required {required}%")]
    LowConfidence { confidence: u8, required: u8 },

    #[error("verification status is {status}; manual review required")]
    Unverified { status: String },

    #[error("unsupported media: {detail}")]
    UnsupportedMedia { detail: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(
        "The funding goal for \"{}\" has been reached (goal {}, raised {}, remaining {})",
        .condition, rupee(.goal), rupee(.raised), gap(.goal, .raised)
    )]
    ConditionGoalReached {
        condition: String,
        goal: Amount,
        raised: Amount,
    },

    #[error(
        "All conditions and the goal of campaign {} have been reached (goal {}, raised {})",
        .campaign_id, rupee(.goal), rupee(.raised)
    )]
    AllGoalsReached {
        campaign_id: CampaignId,
        goal: Amount,
        raised: Amount,
    },

    #[error(
        "Claimed amount {} exceeds available balance {} (received {}, already used {})",
        rupee(.requested), rupee(.remaining), rupee(.received), rupee(.used)
    )]
    InsufficientBalance {
        requested: Amount,
        received: Amount,
        used: Amount,
        remaining: Amount,
    },

    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("Photo #{index} failed verification: {reason}")]
    VerificationFailed {
        index: usize,
        reason: VerificationFailure,
    },

    #[error("Campaign {0} not found")]
    CampaignNotFound(CampaignId),

    #[error("Unknown funding condition \"{0}\"")]
    UnknownCondition(String),

    #[error("Duplicate funding condition \"{0}\"")]
    DuplicateCondition(String),

    #[error("Campaign {0} is closed to donations")]
    CampaignClosed(CampaignId),

    #[error("Concurrent update conflict on campaign {0}")]
    Conflict(CampaignId),

    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Image verifier unavailable: {0}")]
    VerifierUnavailable(String),
}

impl LedgerError {
    /// Short snake_case identifier, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::ConditionGoalReached { .. } => "condition_goal_reached",
            Self::AllGoalsReached { .. } => "all_goals_reached",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::MissingRequiredField(_) => "missing_required_field",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::CampaignNotFound(_) => "campaign_not_found",
            Self::UnknownCondition(_) => "unknown_condition",
            Self::DuplicateCondition(_) => "duplicate_condition",
            Self::CampaignClosed(_) => "campaign_closed",
            Self::Conflict(_) => "conflict",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::VerifierUnavailable(_) => "verifier_unavailable",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_) | Self::StoreUnavailable(_) | Self::VerifierUnavailable(_)
        )
    }

    /// Rejections caused by a goal filling up; a donation racing into one of
    /// these at commit time is recorded as cancelled.
    pub fn is_goal_reached(&self) -> bool {
        matches!(
            self,
            Self::ConditionGoalReached { .. } | Self::AllGoalsReached { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

fn rupee(amount: &Amount) -> Rupees {
    Rupees(*amount)
}

fn gap(goal: &Amount, raised: &Amount) -> Rupees {
    Rupees((goal - raised).max(0))
}
