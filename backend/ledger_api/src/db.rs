//! Database layer: migrations and the SQLite-backed [`LedgerStore`].
//!
//! ## Atomic commits
//!
//! A ledger write runs as one transaction: load the campaign snapshot, run the
//! caller's transform, then compare-and-swap `campaigns.version` while
//! folding the amount into `total_raised`. A lost CAS (or SQLite reporting the
//! database busy) rolls back and retries with exponential back-off, up to
//! `max_retries` times, then surfaces [`LedgerError::Conflict`].

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use donation_ledger::storage::{DonationTransform, ProofTransform};
use donation_ledger::{
    Campaign, CampaignId, CampaignSnapshot, CampaignStatus, ConditionAllocation, ConditionShare,
    Donation, DonationStatus, FundingCondition, LedgerError, LedgerStore, NewCampaign, Priority,
    ProofStatus, WorkProof,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::errors::Result;

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 500;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to `:memory:` is its own database, so keep exactly one
    // and never recycle it.
    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Rows
// ─────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: i64,
    ngo_id: String,
    name: String,
    description: String,
    category: String,
    total_goal: i64,
    total_raised: i64,
    status: String,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

#[derive(sqlx::FromRow)]
struct ConditionRow {
    campaign_id: i64,
    title: String,
    description: String,
    fund_estimate: i64,
    priority: String,
}

#[derive(sqlx::FromRow)]
struct DonationRow {
    id: i64,
    campaign_id: i64,
    donor_id: String,
    condition: String,
    requested_amount: i64,
    amount: i64,
    status: String,
    created_at: i64,
}

#[derive(sqlx::FromRow)]
struct ShareRow {
    donation_id: i64,
    condition: String,
    amount: i64,
}

#[derive(sqlx::FromRow)]
struct ProofRow {
    id: i64,
    campaign_id: i64,
    description: String,
    status: String,
    created_at: i64,
}

#[derive(sqlx::FromRow)]
struct AllocationRow {
    proof_id: i64,
    condition: String,
    amount: i64,
    percentage: f64,
}

#[derive(sqlx::FromRow)]
struct PhotoRow {
    proof_id: i64,
    reference: String,
}

fn unavailable(e: sqlx::Error) -> LedgerError {
    warn!("Ledger store error: {e}");
    LedgerError::StoreUnavailable(e.to_string())
}

fn corrupt(what: &str, raw: impl std::fmt::Display) -> LedgerError {
    LedgerError::StoreUnavailable(format!("unreadable {what} in store: {raw}"))
}

fn timestamp(secs: i64) -> donation_ledger::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| corrupt("timestamp", secs))
}

/// SQLite reports a lost race between two writers as BUSY / LOCKED
/// (including the extended `BUSY_SNAPSHOT` and `LOCKED_SHAREDCACHE` codes).
fn is_contention(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("5") | Some("6") | Some("262") | Some("517"))
        }
        _ => false,
    }
}

impl CampaignRow {
    fn into_campaign(self, conditions: Vec<FundingCondition>) -> donation_ledger::Result<Campaign> {
        Ok(Campaign {
            id: self.id,
            status: CampaignStatus::parse(&self.status)
                .ok_or_else(|| corrupt("campaign status", &self.status))?,
            ngo_id: self.ngo_id,
            name: self.name,
            description: self.description,
            category: self.category,
            conditions,
            total_goal: self.total_goal,
            total_raised: self.total_raised,
            version: self.version,
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}

impl ConditionRow {
    fn into_condition(self) -> donation_ledger::Result<FundingCondition> {
        Ok(FundingCondition {
            priority: Priority::parse(&self.priority)
                .ok_or_else(|| corrupt("condition priority", &self.priority))?,
            title: self.title,
            description: self.description,
            fund_estimate: self.fund_estimate,
        })
    }
}

fn assemble_donations(
    rows: Vec<DonationRow>,
    shares: Vec<ShareRow>,
) -> donation_ledger::Result<Vec<Donation>> {
    let mut by_donation: HashMap<i64, Vec<ConditionShare>> = HashMap::new();
    for share in shares {
        by_donation.entry(share.donation_id).or_default().push(ConditionShare {
            condition: share.condition,
            amount: share.amount,
        });
    }

    rows.into_iter()
        .map(|row| {
            Ok(Donation {
                id: row.id,
                status: DonationStatus::parse(&row.status)
                    .ok_or_else(|| corrupt("donation status", &row.status))?,
                shares: by_donation.remove(&row.id).unwrap_or_default(),
                donor_id: row.donor_id,
                campaign_id: row.campaign_id,
                condition: row.condition,
                requested_amount: row.requested_amount,
                amount: row.amount,
                created_at: timestamp(row.created_at)?,
            })
        })
        .collect()
}

fn assemble_proofs(
    rows: Vec<ProofRow>,
    allocations: Vec<AllocationRow>,
    photos: Vec<PhotoRow>,
) -> donation_ledger::Result<Vec<WorkProof>> {
    let mut allocs: HashMap<i64, Vec<ConditionAllocation>> = HashMap::new();
    for a in allocations {
        allocs.entry(a.proof_id).or_default().push(ConditionAllocation {
            condition: a.condition,
            amount: a.amount,
            percentage: a.percentage,
        });
    }
    let mut refs: HashMap<i64, Vec<String>> = HashMap::new();
    for p in photos {
        refs.entry(p.proof_id).or_default().push(p.reference);
    }

    rows.into_iter()
        .map(|row| {
            Ok(WorkProof {
                id: row.id,
                campaign_id: row.campaign_id,
                allocations: allocs.remove(&row.id).unwrap_or_default(),
                photos: refs.remove(&row.id).unwrap_or_default(),
                status: ProofStatus::parse(&row.status)
                    .ok_or_else(|| corrupt("proof status", &row.status))?,
                description: row.description,
                created_at: timestamp(row.created_at)?,
            })
        })
        .collect()
}

// ─────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────

const CAMPAIGN_COLUMNS: &str = "id, ngo_id, name, description, category, total_goal, \
     total_raised, status, version, created_at, updated_at";

async fn load_campaign(conn: &mut SqliteConnection, id: CampaignId) -> donation_ledger::Result<Campaign> {
    let row: Option<CampaignRow> =
        sqlx::query_as(&format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(unavailable)?;
    let row = row.ok_or(LedgerError::CampaignNotFound(id))?;

    let conditions: Vec<ConditionRow> = sqlx::query_as(
        r#"
        SELECT campaign_id, title, description, fund_estimate, priority
        FROM   conditions
        WHERE  campaign_id = ?1
        ORDER  BY position ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(unavailable)?;

    let conditions = conditions
        .into_iter()
        .map(ConditionRow::into_condition)
        .collect::<donation_ledger::Result<Vec<_>>>()?;
    row.into_campaign(conditions)
}

async fn load_donations(
    conn: &mut SqliteConnection,
    campaign_id: CampaignId,
) -> donation_ledger::Result<Vec<Donation>> {
    let rows: Vec<DonationRow> = sqlx::query_as(
        r#"
        SELECT id, campaign_id, donor_id, condition, requested_amount, amount, status, created_at
        FROM   donations
        WHERE  campaign_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(campaign_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(unavailable)?;

    let shares: Vec<ShareRow> = sqlx::query_as(
        r#"
        SELECT s.donation_id, s.condition, s.amount
        FROM   donation_shares s
        JOIN   donations d ON d.id = s.donation_id
        WHERE  d.campaign_id = ?1
        ORDER  BY s.donation_id ASC, s.position ASC
        "#,
    )
    .bind(campaign_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(unavailable)?;

    assemble_donations(rows, shares)
}

async fn load_proofs(
    conn: &mut SqliteConnection,
    campaign_id: CampaignId,
) -> donation_ledger::Result<Vec<WorkProof>> {
    let rows: Vec<ProofRow> = sqlx::query_as(
        r#"
        SELECT id, campaign_id, description, status, created_at
        FROM   work_proofs
        WHERE  campaign_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(campaign_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(unavailable)?;

    let allocations: Vec<AllocationRow> = sqlx::query_as(
        r#"
        SELECT a.proof_id, a.condition, a.amount, a.percentage
        FROM   proof_allocations a
        JOIN   work_proofs p ON p.id = a.proof_id
        WHERE  p.campaign_id = ?1
        ORDER  BY a.proof_id ASC, a.position ASC
        "#,
    )
    .bind(campaign_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(unavailable)?;

    let photos: Vec<PhotoRow> = sqlx::query_as(
        r#"
        SELECT ph.proof_id, ph.reference
        FROM   proof_photos ph
        JOIN   work_proofs p ON p.id = ph.proof_id
        WHERE  p.campaign_id = ?1
        ORDER  BY ph.proof_id ASC, ph.position ASC
        "#,
    )
    .bind(campaign_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(unavailable)?;

    assemble_proofs(rows, allocations, photos)
}

async fn load_snapshot(
    conn: &mut SqliteConnection,
    id: CampaignId,
) -> donation_ledger::Result<CampaignSnapshot> {
    Ok(CampaignSnapshot {
        campaign: load_campaign(conn, id).await?,
        donations: load_donations(conn, id).await?,
        work_proofs: load_proofs(conn, id).await?,
    })
}

// ─────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────

/// Outcome of one commit attempt; `None` means the CAS lost to a concurrent writer.
type Attempt<T> = donation_ledger::Result<Option<T>>;

#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
    max_retries: u32,
}

impl SqliteLedgerStore {
    pub fn new(pool: SqlitePool, max_retries: u32) -> Self {
        Self { pool, max_retries }
    }

    /// Run `attempt` until it wins its CAS, backing off between tries.
    async fn with_retry<T, F, Fut>(&self, campaign_id: CampaignId, mut attempt: F) -> donation_ledger::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut backoff = INITIAL_BACKOFF_MS;
        for tries in 0..=self.max_retries {
            if let Some(done) = attempt().await? {
                return Ok(done);
            }
            if tries < self.max_retries {
                debug!(campaign_id, tries, "Lost concurrent update (retrying in {backoff}ms)");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                backoff = (backoff * 2).min(MAX_BACKOFF_MS);
            }
        }
        warn!(campaign_id, "Giving up after {} retries", self.max_retries);
        Err(LedgerError::Conflict(campaign_id))
    }

    async fn try_commit_donation(
        &self,
        campaign_id: CampaignId,
        transform: &DonationTransform<'_>,
    ) -> Attempt<Donation> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let snapshot = load_snapshot(&mut tx, campaign_id).await?;
        let draft = transform(&snapshot)?;
        let now = Utc::now();
        let success = draft.status == DonationStatus::Success;

        let (delta, bump) = if success { (draft.amount, 1) } else { (0, 0) };
        if snapshot.campaign.total_raised.checked_add(delta).is_none() {
            return Err(LedgerError::InvalidAmount("campaign total overflows".to_string()));
        }
        let swapped = sqlx::query(
            r#"
            UPDATE campaigns
            SET    total_raised = total_raised + ?1,
                   version      = version + ?2,
                   updated_at   = CASE WHEN ?2 = 1 THEN ?3 ELSE updated_at END
            WHERE  id = ?4 AND version = ?5
            "#,
        )
        .bind(delta)
        .bind(bump)
        .bind(now.timestamp())
        .bind(campaign_id)
        .bind(snapshot.campaign.version)
        .execute(&mut *tx)
        .await;

        match swapped {
            Ok(result) if result.rows_affected() == 1 => {}
            Ok(_) => return Ok(None),
            Err(e) if is_contention(&e) => return Ok(None),
            Err(e) => return Err(unavailable(e)),
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO donations
                (campaign_id, donor_id, condition, requested_amount, amount, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(campaign_id)
        .bind(&draft.donor_id)
        .bind(&draft.condition)
        .bind(draft.requested_amount)
        .bind(draft.amount)
        .bind(draft.status.as_str())
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;
        let id = inserted.last_insert_rowid();

        for (position, share) in draft.shares.iter().enumerate() {
            sqlx::query(
                "INSERT INTO donation_shares (donation_id, position, condition, amount) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(&share.condition)
            .bind(share.amount)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }

        match tx.commit().await {
            Ok(()) => {}
            Err(e) if is_contention(&e) => return Ok(None),
            Err(e) => return Err(unavailable(e)),
        }

        Ok(Some(Donation {
            id,
            donor_id: draft.donor_id,
            campaign_id,
            condition: draft.condition,
            requested_amount: draft.requested_amount,
            amount: draft.amount,
            shares: draft.shares,
            status: draft.status,
            created_at: timestamp(now.timestamp())?,
        }))
    }

    async fn try_commit_work_proof(
        &self,
        campaign_id: CampaignId,
        transform: &ProofTransform<'_>,
    ) -> Attempt<WorkProof> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let snapshot = load_snapshot(&mut tx, campaign_id).await?;
        let draft = transform(&snapshot)?;
        let now = Utc::now();

        // Proofs leave the aggregate alone; the version bump serializes them
        // against each other and against donations.
        let swapped = sqlx::query(
            "UPDATE campaigns SET version = version + 1, updated_at = ?1 WHERE id = ?2 AND version = ?3",
        )
        .bind(now.timestamp())
        .bind(campaign_id)
        .bind(snapshot.campaign.version)
        .execute(&mut *tx)
        .await;

        match swapped {
            Ok(result) if result.rows_affected() == 1 => {}
            Ok(_) => return Ok(None),
            Err(e) if is_contention(&e) => return Ok(None),
            Err(e) => return Err(unavailable(e)),
        }

        let status = ProofStatus::Pending;
        let inserted = sqlx::query(
            "INSERT INTO work_proofs (campaign_id, description, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(campaign_id)
        .bind(&draft.description)
        .bind(status.as_str())
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;
        let id = inserted.last_insert_rowid();

        for (position, allocation) in draft.allocations.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO proof_allocations (proof_id, position, condition, amount, percentage)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(id)
            .bind(position as i64)
            .bind(&allocation.condition)
            .bind(allocation.amount)
            .bind(allocation.percentage)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }
        for (position, reference) in draft.photos.iter().enumerate() {
            sqlx::query("INSERT INTO proof_photos (proof_id, position, reference) VALUES (?1, ?2, ?3)")
                .bind(id)
                .bind(position as i64)
                .bind(reference)
                .execute(&mut *tx)
                .await
                .map_err(unavailable)?;
        }

        match tx.commit().await {
            Ok(()) => {}
            Err(e) if is_contention(&e) => return Ok(None),
            Err(e) => return Err(unavailable(e)),
        }

        Ok(Some(WorkProof {
            id,
            campaign_id,
            allocations: draft.allocations,
            photos: draft.photos,
            description: draft.description,
            status,
            created_at: timestamp(now.timestamp())?,
        }))
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn create_campaign(&self, new: NewCampaign) -> donation_ledger::Result<Campaign> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO campaigns
                (ngo_id, name, description, category, total_goal, total_raised, status, version,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, 0, ?7, ?7)
            "#,
        )
        .bind(&new.ngo_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.category)
        .bind(new.total_goal())
        .bind(CampaignStatus::PendingVerification.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;
        let id = inserted.last_insert_rowid();

        for (position, condition) in new.conditions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO conditions (campaign_id, position, title, description, fund_estimate, priority)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(id)
            .bind(position as i64)
            .bind(&condition.title)
            .bind(&condition.description)
            .bind(condition.fund_estimate)
            .bind(condition.priority.as_str())
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }

        let campaign = load_campaign(&mut tx, id).await?;
        tx.commit().await.map_err(unavailable)?;
        Ok(campaign)
    }

    async fn get_campaign(&self, id: CampaignId) -> donation_ledger::Result<Campaign> {
        let mut conn = self.pool.acquire().await.map_err(unavailable)?;
        load_campaign(&mut conn, id).await
    }

    async fn list_campaigns(&self) -> donation_ledger::Result<Vec<Campaign>> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let rows: Vec<CampaignRow> =
            sqlx::query_as(&format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY id ASC"))
                .fetch_all(&mut *tx)
                .await
                .map_err(unavailable)?;

        let condition_rows: Vec<ConditionRow> = sqlx::query_as(
            r#"
            SELECT campaign_id, title, description, fund_estimate, priority
            FROM   conditions
            ORDER  BY campaign_id ASC, position ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(unavailable)?;

        let mut conditions: HashMap<i64, Vec<FundingCondition>> = HashMap::new();
        for row in condition_rows {
            let campaign_id = row.campaign_id;
            conditions
                .entry(campaign_id)
                .or_default()
                .push(row.into_condition()?);
        }

        rows.into_iter()
            .map(|row| {
                let own = conditions.remove(&row.id).unwrap_or_default();
                row.into_campaign(own)
            })
            .collect()
    }

    async fn set_campaign_status(
        &self,
        id: CampaignId,
        status: CampaignStatus,
    ) -> donation_ledger::Result<Campaign> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let updated = sqlx::query(
            "UPDATE campaigns SET status = ?1, version = version + 1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(status.as_str())
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;
        if updated.rows_affected() == 0 {
            return Err(LedgerError::CampaignNotFound(id));
        }

        let campaign = load_campaign(&mut tx, id).await?;
        tx.commit().await.map_err(unavailable)?;
        Ok(campaign)
    }

    async fn snapshot(&self, id: CampaignId) -> donation_ledger::Result<CampaignSnapshot> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        load_snapshot(&mut tx, id).await
    }

    async fn query_donations(&self, campaign_id: CampaignId) -> donation_ledger::Result<Vec<Donation>> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        load_campaign(&mut tx, campaign_id).await?;
        load_donations(&mut tx, campaign_id).await
    }

    async fn query_donations_by_donor(&self, donor_id: &str) -> donation_ledger::Result<Vec<Donation>> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let rows: Vec<DonationRow> = sqlx::query_as(
            r#"
            SELECT id, campaign_id, donor_id, condition, requested_amount, amount, status, created_at
            FROM   donations
            WHERE  donor_id = ?1
            ORDER  BY created_at ASC, id ASC
            "#,
        )
        .bind(donor_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(unavailable)?;

        let shares: Vec<ShareRow> = sqlx::query_as(
            r#"
            SELECT s.donation_id, s.condition, s.amount
            FROM   donation_shares s
            JOIN   donations d ON d.id = s.donation_id
            WHERE  d.donor_id = ?1
            ORDER  BY s.donation_id ASC, s.position ASC
            "#,
        )
        .bind(donor_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(unavailable)?;

        assemble_donations(rows, shares)
    }

    async fn query_work_proofs(&self, campaign_id: CampaignId) -> donation_ledger::Result<Vec<WorkProof>> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        load_campaign(&mut tx, campaign_id).await?;
        load_proofs(&mut tx, campaign_id).await
    }

    async fn commit_donation(
        &self,
        campaign_id: CampaignId,
        transform: &DonationTransform<'_>,
    ) -> donation_ledger::Result<Donation> {
        let donation = self
            .with_retry(campaign_id, move || self.try_commit_donation(campaign_id, transform))
            .await?;
        debug!(campaign_id, donation_id = donation.id, "Donation committed");
        Ok(donation)
    }

    async fn commit_work_proof(
        &self,
        campaign_id: CampaignId,
        transform: &ProofTransform<'_>,
    ) -> donation_ledger::Result<WorkProof> {
        let proof = self
            .with_retry(campaign_id, move || self.try_commit_work_proof(campaign_id, transform))
            .await?;
        debug!(campaign_id, proof_id = proof.id, "Work proof committed");
        Ok(proof)
    }
}
