//! Application configuration loaded from environment variables.

use crate::errors::{ApiError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database URL (`sqlite:./donation_ledger.db`, `sqlite::memory:`)
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Base URL of the file-storage service
    pub file_store_url: String,
    /// Base URL of the image-verification service
    pub verifier_url: String,
    /// Minimum verifier confidence (0-100) for a proof photo to pass
    pub verify_min_confidence: u8,
    /// Per-request timeout for collaborator calls
    pub http_timeout_secs: u64,
    /// Retries after the first attempt for a collaborator call
    pub collaborator_max_retries: u32,
    /// How often the auditor re-checks every campaign
    pub audit_interval_secs: u64,
    /// Retries of a ledger write that lost a concurrent update
    pub store_max_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let verify_min_confidence: u8 = parse(&lookup, "VERIFY_MIN_CONFIDENCE", "90")?;
        if verify_min_confidence > 100 {
            return Err(ApiError::Config(
                "VERIFY_MIN_CONFIDENCE must be between 0 and 100".to_string(),
            ));
        }

        Ok(Config {
            database_url: text("DATABASE_URL", "sqlite:./donation_ledger.db"),
            api_port: parse(&lookup, "API_PORT", "3001")?,
            file_store_url: text("FILE_STORE_URL", "http://localhost:5000"),
            verifier_url: text("VERIFIER_URL", "http://localhost:5000"),
            verify_min_confidence,
            http_timeout_secs: parse(&lookup, "HTTP_TIMEOUT_SECS", "30")?,
            collaborator_max_retries: parse(&lookup, "COLLABORATOR_MAX_RETRIES", "3")?,
            audit_interval_secs: parse(&lookup, "AUDIT_INTERVAL_SECS", "60")?,
            store_max_retries: parse(&lookup, "STORE_MAX_RETRIES", "5")?,
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T> {
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ApiError::Config(format!("Invalid {key}")))
}
