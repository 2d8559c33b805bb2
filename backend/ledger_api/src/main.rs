//! Donation Ledger service entry point.
//!
//! Serves the ledger over a small Axum REST API backed by SQLite, with photo
//! verification and file storage delegated to external HTTP services. A
//! background auditor re-checks the ledger invariants on an interval.

mod api;
mod auditor;
mod clients;
mod config;
mod db;
mod errors;

use std::sync::Arc;
use std::time::Duration;

use donation_ledger::{DonationLedger, ProofIntake, VerificationPolicy};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use auditor::AuditorState;
use clients::{HttpFileStore, HttpImageVerifier, RetryPolicy};
use config::Config;
use db::SqliteLedgerStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Optional .env file.
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let pool = db::init_pool(&config.database_url).await?;
    let store = SqliteLedgerStore::new(pool, config.store_max_retries);
    let ledger = DonationLedger::new(Arc::new(store));

    // Shared by both collaborator clients.
    let client = Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;
    let retry = RetryPolicy::new(config.collaborator_max_retries);
    let intake = ProofIntake::new(
        Arc::new(HttpImageVerifier::new(client.clone(), &config.verifier_url, retry.clone())),
        Arc::new(HttpFileStore::new(client, &config.file_store_url, retry)),
        VerificationPolicy {
            min_confidence: config.verify_min_confidence,
        },
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {e}");
            }
            info!("Shutdown requested");
            shutdown.cancel();
        });
    }

    // ─── Background auditor ───────────────────────────────
    let auditor_state = Arc::new(AuditorState {
        ledger: ledger.clone(),
        config: config.clone(),
    });
    let auditor = tokio::spawn(auditor::run(auditor_state, shutdown.clone()));

    // ─── REST API ─────────────────────────────────────────
    let app = api::router(Arc::new(api::ApiState { ledger, intake }));

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    auditor.await?;
    info!("Stopped");
    Ok(())
}
