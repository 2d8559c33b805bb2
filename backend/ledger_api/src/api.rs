//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use donation_ledger::wallet::ConditionBreakdown;
use donation_ledger::{
    AllocationClaim, AllocationPlan, Campaign, CampaignId, CampaignStatus, Donation,
    DonationLedger, DonationOutcome, DonationReceipt, DonationRequest, DonationView,
    DonorProfile, NewCampaign, PhotoUpload, ProofIntake, ProofSubmission, WalletSummary,
    WorkProof,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::{ApiError, Result};

/// Body limit for proof submissions, which carry base64 photos of up to
/// [`donation_ledger::MAX_PHOTO_BYTES`] each.
pub const PROOF_BODY_LIMIT: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub ledger: DonationLedger,
    pub intake: ProofIntake,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/campaigns", get(list_campaigns).post(register_campaign))
        .route("/campaigns/:id", get(get_campaign))
        .route("/campaigns/:id/status", put(set_campaign_status))
        .route("/campaigns/:id/wallet", get(get_wallet))
        .route("/campaigns/:id/donations", get(list_donations).post(donate))
        .route("/campaigns/:id/donations/quote", post(quote_donation))
        .route(
            "/campaigns/:id/proofs",
            get(list_proofs)
                .post(submit_proof)
                .layer(DefaultBodyLimit::max(PROOF_BODY_LIMIT)),
        )
        .route("/donors/:id/profile", get(get_donor_profile))
        .route("/donors/:id/donations", get(get_donor_donations))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: CampaignStatus,
}

#[derive(Debug, Deserialize)]
pub struct PhotoPayload {
    pub file_name: String,
    pub mime_type: String,
    /// Standard-alphabet base64 of the image bytes.
    pub data_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct ProofRequest {
    pub allocations: Vec<AllocationClaim>,
    #[serde(default)]
    pub photos: Vec<PhotoPayload>,
    #[serde(default)]
    pub description: String,
}

impl ProofRequest {
    fn into_submission(self) -> Result<ProofSubmission> {
        let photos = self
            .photos
            .into_iter()
            .enumerate()
            .map(|(i, photo)| -> Result<PhotoUpload> {
                let bytes = general_purpose::STANDARD
                    .decode(photo.data_base64.trim())
                    .map_err(|e| ApiError::BadRequest(format!("photos[{i}] is not valid base64: {e}")))?;
                Ok(PhotoUpload {
                    file_name: photo.file_name,
                    mime_type: photo.mime_type,
                    bytes,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ProofSubmission {
            claims: self.allocations,
            photos,
            description: self.description,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct CampaignsResponse {
    pub count: usize,
    pub campaigns: Vec<Campaign>,
}

#[derive(Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub raised_by_condition: Vec<ConditionBreakdown>,
}

#[derive(Serialize)]
pub struct DonationsResponse {
    pub campaign_id: CampaignId,
    pub count: usize,
    pub donations: Vec<Donation>,
}

#[derive(Serialize)]
pub struct ReceiptResponse {
    #[serde(flatten)]
    pub receipt: DonationReceipt,
    pub message: String,
}

#[derive(Serialize)]
pub struct ProofsResponse {
    pub campaign_id: CampaignId,
    pub count: usize,
    pub proofs: Vec<WorkProof>,
}

#[derive(Serialize)]
pub struct DonorDonationsResponse {
    pub donor_id: String,
    pub count: usize,
    pub donations: Vec<DonationView>,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /campaigns`
pub async fn list_campaigns(State(state): State<Arc<ApiState>>) -> Result<Json<CampaignsResponse>> {
    let campaigns = state.ledger.list_campaigns().await?;
    Ok(Json(CampaignsResponse {
        count: campaigns.len(),
        campaigns,
    }))
}

/// `POST /campaigns`
pub async fn register_campaign(
    State(state): State<Arc<ApiState>>,
    Json(new): Json<NewCampaign>,
) -> Result<(StatusCode, Json<Campaign>)> {
    let campaign = state.ledger.register_campaign(new).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// `GET /campaigns/:id`
///
/// The campaign plus how much each condition has raised against its goal.
pub async fn get_campaign(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CampaignId>,
) -> Result<Json<CampaignDetail>> {
    let campaign = state.ledger.get_campaign(id).await?;
    let wallet = state.ledger.wallet(id).await?;
    Ok(Json(CampaignDetail {
        campaign,
        raised_by_condition: wallet.conditions,
    }))
}

/// `PUT /campaigns/:id/status`
pub async fn set_campaign_status(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CampaignId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Campaign>> {
    Ok(Json(state.ledger.set_campaign_status(id, update.status).await?))
}

/// `GET /campaigns/:id/wallet`
pub async fn get_wallet(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CampaignId>,
) -> Result<Json<WalletSummary>> {
    Ok(Json(state.ledger.wallet(id).await?))
}

/// `GET /campaigns/:id/donations`
pub async fn list_donations(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CampaignId>,
) -> Result<Json<DonationsResponse>> {
    let donations = state.ledger.donations(id).await?;
    Ok(Json(DonationsResponse {
        campaign_id: id,
        count: donations.len(),
        donations,
    }))
}

/// `POST /campaigns/:id/donations`
///
/// `201` for accepted and adjusted donations. A donation cancelled because the
/// goal filled while it was in flight is still a recorded outcome, so it is
/// returned as `200` with `status: "cancelled"`.
pub async fn donate(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CampaignId>,
    Json(request): Json<DonationRequest>,
) -> Result<(StatusCode, Json<ReceiptResponse>)> {
    let receipt = state.ledger.donate(id, request).await?;
    let status = match receipt.status {
        DonationOutcome::Cancelled => StatusCode::OK,
        _ => StatusCode::CREATED,
    };
    let message = receipt.message();
    Ok((status, Json(ReceiptResponse { receipt, message })))
}

/// `POST /campaigns/:id/donations/quote`
pub async fn quote_donation(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CampaignId>,
    Json(request): Json<DonationRequest>,
) -> Result<Json<AllocationPlan>> {
    Ok(Json(state.ledger.quote_donation(id, &request).await?))
}

/// `GET /campaigns/:id/proofs`
pub async fn list_proofs(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CampaignId>,
) -> Result<Json<ProofsResponse>> {
    let proofs = state.ledger.work_proofs(id).await?;
    Ok(Json(ProofsResponse {
        campaign_id: id,
        count: proofs.len(),
        proofs,
    }))
}

/// `POST /campaigns/:id/proofs`
pub async fn submit_proof(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CampaignId>,
    body: std::result::Result<Json<ProofRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WorkProof>)> {
    let Json(request) = body?;
    let submission = request.into_submission()?;
    let proof = state
        .ledger
        .submit_work_proof(id, submission, &state.intake)
        .await?;
    Ok((StatusCode::CREATED, Json(proof)))
}

/// `GET /donors/:id/profile`
pub async fn get_donor_profile(
    State(state): State<Arc<ApiState>>,
    Path(donor_id): Path<String>,
) -> Result<Json<DonorProfile>> {
    Ok(Json(state.ledger.donor_profile(&donor_id).await?))
}

/// `GET /donors/:id/donations`
pub async fn get_donor_donations(
    State(state): State<Arc<ApiState>>,
    Path(donor_id): Path<String>,
) -> Result<Json<DonorDonationsResponse>> {
    let donations = state.ledger.donation_views(&donor_id).await?;
    Ok(Json(DonorDonationsResponse {
        count: donations.len(),
        donor_id,
        donations,
    }))
}
