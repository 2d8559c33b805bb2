//! Donor rank and badges: pure functions of a donor's successful donations.

use serde::Serialize;

use crate::types::{rupees, Amount, Donation, DonationStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Rank {
    Bronze,
    Silver,
    Gold,
    Diamond,
}

/// Cumulative donation needed for each rank, highest first.
pub const RANK_THRESHOLDS: [(Rank, Amount); 4] = [
    (Rank::Diamond, rupees(100_000)),
    (Rank::Gold, rupees(50_000)),
    (Rank::Silver, rupees(25_000)),
    (Rank::Bronze, 0),
];

/// Donation counts that earn a badge.
pub const BADGE_MILESTONES: [u32; 8] = [1, 5, 10, 25, 50, 100, 150, 200];

pub fn rank_for(total_donated: Amount) -> Rank {
    RANK_THRESHOLDS
        .iter()
        .find(|(_, threshold)| total_donated >= *threshold)
        .map(|(rank, _)| *rank)
        .unwrap_or(Rank::Bronze)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub key: String,
    pub label: String,
}

pub fn badges_for(donation_count: u32) -> Vec<Badge> {
    let mut badges = Vec::new();
    if donation_count >= 1 {
        badges.push(Badge {
            key: "first_donation".to_string(),
            label: "First Donation".to_string(),
        });
    }
    for milestone in BADGE_MILESTONES.iter().filter(|m| donation_count >= **m) {
        let label = match milestone {
            1 => "1st Donation".to_string(),
            n => format!("{n} Donations Complete"),
        };
        badges.push(Badge {
            key: format!("{milestone}_donations"),
            label,
        });
    }
    badges
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DonorProfile {
    pub donor_id: String,
    pub total_donated: Amount,
    pub donation_count: u32,
    pub rank: Rank,
    pub badges: Vec<Badge>,
}

pub fn donor_profile(donor_id: &str, donations: &[Donation]) -> DonorProfile {
    let counted: Vec<&Donation> = donations
        .iter()
        .filter(|d| d.donor_id == donor_id && d.status == DonationStatus::Success)
        .collect();
    let total_donated = counted
        .iter()
        .fold(0 as Amount, |acc, d| acc.saturating_add(d.amount));
    let donation_count = counted.len() as u32;

    DonorProfile {
        donor_id: donor_id.to_string(),
        total_donated,
        donation_count,
        rank: rank_for(total_donated),
        badges: badges_for(donation_count),
    }
}
