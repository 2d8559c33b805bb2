//! Application-wide error types and their HTTP rendering.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use donation_ledger::LedgerError;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rejected request body: {0}")]
    Body(#[from] JsonRejection),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Ledger(e) => ledger_status(e),
            Self::Database(_) | Self::Migrate(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Body(e) => e.status(),
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ledger(e) => e.kind(),
            Self::Database(_) | Self::Migrate(_) => "store_unavailable",
            Self::BadRequest(_) => "bad_request",
            Self::Body(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
            Self::Body(_) => "bad_request",
            Self::Config(_) => "config",
        }
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidAmount(_)
        | LedgerError::MissingRequiredField(_)
        | LedgerError::UnknownCondition(_)
        | LedgerError::DuplicateCondition(_) => StatusCode::BAD_REQUEST,
        LedgerError::CampaignNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::ConditionGoalReached { .. }
        | LedgerError::AllGoalsReached { .. }
        | LedgerError::InsufficientBalance { .. }
        | LedgerError::CampaignClosed(_)
        | LedgerError::Conflict(_) => StatusCode::CONFLICT,
        LedgerError::VerificationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::StoreUnavailable(_) | LedgerError::VerifierUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Figures a client needs to offer a corrected request.
fn ledger_detail(err: &LedgerError) -> Value {
    match err {
        LedgerError::ConditionGoalReached { condition, goal, raised } => json!({
            "condition": condition,
            "goal": goal,
            "raised": raised,
            "remaining": (goal - raised).max(0),
        }),
        LedgerError::AllGoalsReached { campaign_id, goal, raised } => json!({
            "campaign_id": campaign_id,
            "goal": goal,
            "raised": raised,
            "remaining": (goal - raised).max(0),
        }),
        LedgerError::InsufficientBalance { requested, received, used, remaining } => json!({
            "requested": requested,
            "received": received,
            "used": used,
            "remaining": remaining,
        }),
        LedgerError::VerificationFailed { index, reason } => json!({
            "photo_index": index,
            "failure": reason,
        }),
        LedgerError::MissingRequiredField(field) => json!({ "field": field }),
        LedgerError::UnknownCondition(title) | LedgerError::DuplicateCondition(title) => {
            json!({ "condition": title })
        }
        LedgerError::CampaignNotFound(id)
        | LedgerError::CampaignClosed(id)
        | LedgerError::Conflict(id) => json!({ "campaign_id": id }),
        LedgerError::InvalidAmount(_)
        | LedgerError::StoreUnavailable(_)
        | LedgerError::VerifierUnavailable(_) => Value::Null,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }

        let detail = match &self {
            Self::Ledger(e) => ledger_detail(e),
            _ => Value::Null,
        };
        let body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "detail": detail,
        });
        (status, Json(body)).into_response()
    }
}
