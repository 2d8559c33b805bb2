//! Long-running background task that re-checks the ledger invariants of every
//! campaign and reports violations. It only reads.

use std::sync::Arc;
use std::time::Duration;

use donation_ledger::DonationLedger;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;

pub struct AuditorState {
    pub ledger: DonationLedger,
    pub config: Config,
}

/// Audit every `audit_interval_secs` until `token` is cancelled.
pub async fn run(state: Arc<AuditorState>, token: CancellationToken) {
    let interval = Duration::from_secs(state.config.audit_interval_secs.max(1));
    info!("Auditor starting, interval {}s", interval.as_secs());

    loop {
        match audit_once(&state.ledger).await {
            Ok(0) => debug!("Audit pass clean"),
            Ok(dirty) => warn!("Audit pass found {dirty} campaign(s) with violations"),
            Err(e) => error!("Audit pass failed: {e}"),
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Auditor stopped");
}

/// Perform a single audit pass. Returns how many campaigns had violations.
async fn audit_once(ledger: &DonationLedger) -> donation_ledger::Result<usize> {
    let dirty = ledger.audit_all().await?;
    for (campaign_id, violations) in &dirty {
        for violation in violations {
            warn!(campaign_id, ?violation, "Ledger invariant violated");
        }
    }
    Ok(dirty.len())
}
