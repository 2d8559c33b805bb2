//! # Photo verification
//!
//! Work-proof photos must pass the external image verifier before a proof can
//! be recorded. The precondition is enforced by type: the reconciliation
//! engine only accepts [`VerifiedPhoto`] values, and those are only produced
//! by [`ProofIntake::verify_and_store`] after a report passes the
//! [`VerificationPolicy`] and the bytes were handed to the [`FileStore`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::errors::{LedgerError, Result, VerificationFailure};
use crate::types::{AllocationClaim, Campaign};

/// Accepted photo content types.
pub const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// Largest photo accepted, in bytes (10 MiB).
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Default minimum verifier confidence, in percent.
pub const DEFAULT_MIN_CONFIDENCE: u8 = 90;

/// A condition a photo is checked against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionTarget {
    pub title: String,
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    #[serde(rename = "VERIFIED")]
    Verified,
    #[serde(rename = "PARTIALLY VERIFIED")]
    PartiallyVerified,
    #[serde(rename = "NOT VERIFIED")]
    #[default]
    NotVerified,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::PartiallyVerified => "PARTIALLY VERIFIED",
            Self::NotVerified => "NOT VERIFIED",
        }
    }
}

/// What the image verifier says about one photo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub satisfies_conditions: bool,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    /// 0-100. Fractions are rounded down, out-of-range values clamped.
    #[serde(default, deserialize_with = "confidence_percent")]
    pub confidence: u8,
    #[serde(default)]
    pub reasoning: String,
    /// Missing status reads as `NOT VERIFIED`.
    #[serde(default)]
    pub verification_status: VerificationStatus,
}

fn confidence_percent<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_nan() {
        return Ok(0);
    }
    Ok(raw.clamp(0.0, 100.0).floor() as u8)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub min_confidence: u8,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl VerificationPolicy {
    pub fn evaluate(&self, report: &VerificationReport) -> std::result::Result<(), VerificationFailure> {
        if report.is_ai_generated {
            return Err(VerificationFailure::AiGenerated);
        }
        if !report.satisfies_conditions {
            return Err(VerificationFailure::ConditionMismatch);
        }
        if report.confidence < self.min_confidence {
            return Err(VerificationFailure::LowConfidence {
                confidence: report.confidence,
                required: self.min_confidence,
            });
        }
        if report.verification_status != VerificationStatus::Verified {
            return Err(VerificationFailure::Unverified {
                status: report.verification_status.as_str().to_string(),
            });
        }
        Ok(())
    }
}

/// Boundary to the external image-verification service.
#[async_trait]
pub trait ImageVerifier: Send + Sync {
    async fn verify(
        &self,
        image: &[u8],
        mime_type: &str,
        targets: &[ConditionTarget],
    ) -> Result<VerificationReport>;
}

/// Boundary to blob storage. Returns an opaque, retrievable reference.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>, content_type: &str, file_name: &str) -> Result<String>;
}

/// A photo as uploaded by the NGO, not yet verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// A photo that passed verification and was stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerifiedPhoto {
    reference: String,
    confidence: u8,
}

impl VerifiedPhoto {
    pub(crate) fn new(reference: String, confidence: u8) -> Self {
        Self {
            reference,
            confidence,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }
}

/// Conditions a proof's photos are checked against: those that received a
/// non-zero allocation, or every campaign condition when none resolve.
pub fn targets_for(campaign: &Campaign, claims: &[AllocationClaim]) -> Vec<ConditionTarget> {
    let allocated: Vec<ConditionTarget> = claims
        .iter()
        .filter(|c| c.amount > 0)
        .filter_map(|c| campaign.condition(&c.condition))
        .map(|c| ConditionTarget {
            title: c.title.clone(),
            description: c.description.clone(),
        })
        .collect();

    if !allocated.is_empty() {
        return allocated;
    }

    campaign
        .conditions
        .iter()
        .map(|c| ConditionTarget {
            title: c.title.clone(),
            description: c.description.clone(),
        })
        .collect()
}

fn check_media(photo: &PhotoUpload) -> std::result::Result<(), VerificationFailure> {
    let mime = photo.mime_type.to_ascii_lowercase();
    if !ACCEPTED_IMAGE_TYPES.contains(&mime.as_str()) {
        return Err(VerificationFailure::UnsupportedMedia {
            detail: format!("content type {} is not an accepted image type", photo.mime_type),
        });
    }
    if photo.bytes.is_empty() {
        return Err(VerificationFailure::UnsupportedMedia {
            detail: "image is empty".to_string(),
        });
    }
    if photo.bytes.len() > MAX_PHOTO_BYTES {
        return Err(VerificationFailure::UnsupportedMedia {
            detail: format!(
                "image is {} bytes, larger than the {} byte limit",
                photo.bytes.len(),
                MAX_PHOTO_BYTES
            ),
        });
    }
    Ok(())
}

/// Verifies proof photos and stores the ones that pass.
#[derive(Clone)]
pub struct ProofIntake {
    verifier: Arc<dyn ImageVerifier>,
    files: Arc<dyn FileStore>,
    policy: VerificationPolicy,
}

impl ProofIntake {
    pub fn new(
        verifier: Arc<dyn ImageVerifier>,
        files: Arc<dyn FileStore>,
        policy: VerificationPolicy,
    ) -> Self {
        Self {
            verifier,
            files,
            policy,
        }
    }

    /// Verify every photo first, then store them all. Nothing is stored when
    /// any photo fails.
    pub async fn verify_and_store(
        &self,
        photos: Vec<PhotoUpload>,
        targets: &[ConditionTarget],
    ) -> Result<Vec<VerifiedPhoto>> {
        if photos.is_empty() {
            return Err(LedgerError::MissingRequiredField("photos"));
        }

        let mut confidences = Vec::with_capacity(photos.len());
        for (index, photo) in photos.iter().enumerate() {
            check_media(photo).map_err(|reason| LedgerError::VerificationFailed { index, reason })?;

            let report = self
                .verifier
                .verify(&photo.bytes, &photo.mime_type, targets)
                .await?;

            if let Err(reason) = self.policy.evaluate(&report) {
                warn!(
                    index,
                    confidence = report.confidence,
                    status = report.verification_status.as_str(),
                    "Photo failed verification: {reason}"
                );
                return Err(LedgerError::VerificationFailed { index, reason });
            }
            confidences.push(report.confidence);
        }

        let mut verified = Vec::with_capacity(photos.len());
        for (photo, confidence) in photos.into_iter().zip(confidences) {
            let reference = self
                .files
                .put(photo.bytes, &photo.mime_type, &photo.file_name)
                .await?;
            verified.push(VerifiedPhoto::new(reference, confidence));
        }

        info!("{} proof photo(s) verified and stored", verified.len());
        Ok(verified)
    }
}
