//! HTTP clients for the image-verification and file-storage services.
//!
//! Both services answer with the envelope `{ "success", "data", "message" }`.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied on transport errors, `429` and `5xx`
//!   responses, up to [`MAX_BACKOFF_MS`] between attempts.
//! * Other `4xx` responses and `success: false` envelopes are hard failures.
//! * Once retries run out the call fails with a retryable ledger error:
//!   `VerifierUnavailable` for the verifier, `StoreUnavailable` for file storage.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use donation_ledger::{ConditionTarget, FileStore, ImageVerifier, LedgerError, VerificationReport};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

const INITIAL_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 8_000;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyImageRequest<'a> {
    /// Base64, standard alphabet.
    image: String,
    mime_type: &'a str,
    conditions: &'a [ConditionTarget],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    file_url: String,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }
}

fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Send the request built by `build`, retrying transient failures. Returns the
/// first non-retryable response, or a message describing the last failure.
async fn send_with_backoff<F>(policy: &RetryPolicy, what: &str, build: F) -> Result<Response, String>
where
    F: Fn() -> Result<RequestBuilder, reqwest::Error>,
{
    let mut backoff = policy.initial_backoff;
    let max_backoff = Duration::from_millis(MAX_BACKOFF_MS);
    let mut attempt = 0;

    loop {
        let failure = match build().map_err(|e| e.to_string())?.send().await {
            Ok(resp) if retryable_status(resp.status()) => format!("{what} returned {}", resp.status()),
            Ok(resp) => return Ok(resp),
            Err(e) => format!("{what} request failed: {e}"),
        };

        if attempt >= policy.max_retries {
            return Err(failure);
        }
        attempt += 1;
        warn!("{failure} (will retry in {}ms)", backoff.as_millis());
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}

/// Decode an envelope response, flattening every failure into a message.
async fn unwrap_envelope<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T, String> {
    let status = resp.status();
    let body: Envelope<T> = resp
        .json()
        .await
        .map_err(|e| format!("{what} returned {status} with an unreadable body: {e}"))?;

    match (body.success, body.data) {
        (true, Some(data)) if status.is_success() => Ok(data),
        _ => Err(format!(
            "{what} returned {status}: {}",
            body.message.unwrap_or_else(|| "no message".to_string())
        )),
    }
}

// ─────────────────────────────────────────────────────────
// Image verification
// ─────────────────────────────────────────────────────────

/// `POST {base}/api/verify-image` with the photo base64-encoded in JSON.
pub struct HttpImageVerifier {
    client: Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl HttpImageVerifier {
    pub fn new(client: Client, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/verify-image", base_url.trim_end_matches('/')),
            policy,
        }
    }
}

#[async_trait]
impl ImageVerifier for HttpImageVerifier {
    async fn verify(
        &self,
        image: &[u8],
        mime_type: &str,
        targets: &[ConditionTarget],
    ) -> donation_ledger::Result<VerificationReport> {
        let payload = VerifyImageRequest {
            image: general_purpose::STANDARD.encode(image),
            mime_type,
            conditions: targets,
        };

        let resp = send_with_backoff(&self.policy, "image verifier", || {
            Ok(self.client.post(&self.endpoint).json(&payload))
        })
        .await
        .map_err(LedgerError::VerifierUnavailable)?;

        let report: VerificationReport = unwrap_envelope("image verifier", resp)
            .await
            .map_err(LedgerError::VerifierUnavailable)?;
        debug!(
            confidence = report.confidence,
            status = report.verification_status.as_str(),
            "Image verified"
        );
        Ok(report)
    }
}

// ─────────────────────────────────────────────────────────
// File storage
// ─────────────────────────────────────────────────────────

/// `POST {base}/api/upload-file` as multipart form field `file`.
pub struct HttpFileStore {
    client: Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl HttpFileStore {
    pub fn new(client: Client, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/upload-file", base_url.trim_end_matches('/')),
            policy,
        }
    }
}

#[async_trait]
impl FileStore for HttpFileStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        file_name: &str,
    ) -> donation_ledger::Result<String> {
        let resp = send_with_backoff(&self.policy, "file store", || {
            let part = reqwest::multipart::Part::bytes(bytes.clone())
                .file_name(file_name.to_string())
                .mime_str(content_type)?;
            let form = reqwest::multipart::Form::new().part("file", part);
            Ok(self.client.post(&self.endpoint).multipart(form))
        })
        .await
        .map_err(LedgerError::StoreUnavailable)?;

        let uploaded: UploadedFile = unwrap_envelope("file store", resp)
            .await
            .map_err(LedgerError::StoreUnavailable)?;
        debug!(file_url = %uploaded.file_url, "Photo stored");
        Ok(uploaded.file_url)
    }
}
