//! `sqlx::SqlitePool`-backed implementations of the persistence-boundary
//! traits the lower crates declare (`ldf_download::JobRepo`,
//! `ldf_audit::AuditSink`/`DistributionLogSink`, `ldf_access::TokenValidator`),
//! plus the row structs and string<->enum helpers each crate's own store
//! module uses (`ldf_version_cache::source_type_str` is the model this
//! follows, duplicated here because it is private to that crate).

use anyhow::{Context, Result};
use ldf_access::{TokenClaims, TokenValidator};
use ldf_audit::{AuditSink, DistributionLogSink};
use ldf_download::JobRepo;
use ldf_types::{
    AuditEvent, DistributionLogEntry, DownloadJob, DownloadJobStatus, LogLevel, Role,
};
use sqlx::SqlitePool;
use uuid::Uuid;

pub fn role_str(role: Role) -> &'static str {
    match role {
        Role::Viewer => "viewer",
        Role::Operator => "operator",
        Role::Admin => "admin",
        Role::Root => "root",
    }
}

pub fn role_from_str(s: &str) -> Result<Role> {
    match s {
        "viewer" => Ok(Role::Viewer),
        "operator" => Ok(Role::Operator),
        "admin" => Ok(Role::Admin),
        "root" => Ok(Role::Root),
        other => anyhow::bail!("unknown role {other}"),
    }
}

fn job_status_str(status: DownloadJobStatus) -> &'static str {
    match status {
        DownloadJobStatus::Pending => "pending",
        DownloadJobStatus::Verifying => "verifying",
        DownloadJobStatus::Downloading => "downloading",
        DownloadJobStatus::Complete => "complete",
        DownloadJobStatus::Failed => "failed",
        DownloadJobStatus::Cancelled => "cancelled",
    }
}

fn job_status_from_str(s: &str) -> Result<DownloadJobStatus> {
    Ok(match s {
        "pending" => DownloadJobStatus::Pending,
        "verifying" => DownloadJobStatus::Verifying,
        "downloading" => DownloadJobStatus::Downloading,
        "complete" => DownloadJobStatus::Complete,
        "failed" => DownloadJobStatus::Failed,
        "cancelled" => DownloadJobStatus::Cancelled,
        other => anyhow::bail!("unknown download job status {other}"),
    })
}

fn log_level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

pub(crate) fn log_level_from_str(s: &str) -> Result<LogLevel> {
    Ok(match s {
        "info" => LogLevel::Info,
        "warn" => LogLevel::Warn,
        "error" => LogLevel::Error,
        other => anyhow::bail!("unknown log level {other}"),
    })
}

#[derive(sqlx::FromRow)]
struct DownloadJobRow {
    id: String,
    distribution_id: String,
    component_id: String,
    source_id: String,
    source_name: String,
    component_ids: String,
    version: String,
    url: String,
    status: String,
    progress_bytes: i64,
    total_bytes: i64,
    checksum: Option<String>,
    checksum_type: Option<String>,
    error_message: Option<String>,
    attempts: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<DownloadJobRow> for DownloadJob {
    type Error = anyhow::Error;

    fn try_from(row: DownloadJobRow) -> Result<Self> {
        Ok(DownloadJob {
            id: row.id.parse().context("download_jobs.id")?,
            distribution_id: row.distribution_id.parse().context("download_jobs.distribution_id")?,
            component_id: row.component_id.parse().context("download_jobs.component_id")?,
            source_id: row.source_id.parse().context("download_jobs.source_id")?,
            source_name: row.source_name,
            component_ids: serde_json::from_str(&row.component_ids).context("download_jobs.component_ids")?,
            version: row.version,
            url: row.url,
            status: job_status_from_str(&row.status)?,
            progress_bytes: row.progress_bytes,
            total_bytes: row.total_bytes,
            checksum: row.checksum,
            checksum_type: row.checksum_type,
            error_message: row.error_message,
            attempts: row.attempts as i32,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `ldf_download::JobRepo` backed by the `download_jobs` table.
pub struct SqlxJobRepo {
    pool: SqlitePool,
}

impl SqlxJobRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a freshly planned job. Jobs the planner returned verbatim
    /// from `existing` are already persisted and must not be re-inserted.
    pub async fn insert(&self, job: &DownloadJob) -> Result<()> {
        sqlx::query(
            "INSERT INTO download_jobs
                (id, distribution_id, component_id, source_id, source_name, component_ids, version,
                 url, status, progress_bytes, total_bytes, checksum, checksum_type, error_message,
                 attempts, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id.to_string())
        .bind(job.distribution_id.to_string())
        .bind(job.component_id.to_string())
        .bind(job.source_id.to_string())
        .bind(&job.source_name)
        .bind(serde_json::to_string(&job.component_ids).unwrap_or_default())
        .bind(&job.version)
        .bind(&job.url)
        .bind(job_status_str(job.status))
        .bind(job.progress_bytes)
        .bind(job.total_bytes)
        .bind(&job.checksum)
        .bind(&job.checksum_type)
        .bind(&job.error_message)
        .bind(job.attempts)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .context("insert download job")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobRepo for SqlxJobRepo {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<DownloadJob>> {
        let row: Option<DownloadJobRow> = sqlx::query_as("SELECT * FROM download_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("get_by_id")?;
        row.map(TryFrom::try_from).transpose()
    }

    async fn list_active(&self) -> Result<Vec<DownloadJob>> {
        let rows: Vec<DownloadJobRow> = sqlx::query_as(
            "SELECT * FROM download_jobs WHERE status IN ('pending', 'verifying', 'downloading') ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .context("list_active")?;
        rows.into_iter().map(TryFrom::try_from).collect()
    }

    async fn list_by_distribution(&self, distribution_id: Uuid) -> Result<Vec<DownloadJob>> {
        let rows: Vec<DownloadJobRow> = sqlx::query_as(
            "SELECT * FROM download_jobs WHERE distribution_id = ? ORDER BY created_at",
        )
        .bind(distribution_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("list_by_distribution")?;
        rows.into_iter().map(TryFrom::try_from).collect()
    }

    async fn delete_by_distribution(&self, distribution_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM download_jobs WHERE distribution_id = ?")
            .bind(distribution_id.to_string())
            .execute(&self.pool)
            .await
            .context("delete_by_distribution")?;
        Ok(result.rows_affected())
    }

    async fn claim_next_pending(&self) -> Result<Option<DownloadJob>> {
        let mut tx = self.pool.begin().await.context("begin claim_next_pending")?;
        let row: Option<DownloadJobRow> = sqlx::query_as(
            "SELECT * FROM download_jobs WHERE status = 'pending' ORDER BY created_at LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await
        .context("claim_next_pending select")?;

        let Some(row) = row else {
            tx.commit().await.ok();
            return Ok(None);
        };

        sqlx::query("UPDATE download_jobs SET status = 'verifying', updated_at = ? WHERE id = ? AND status = 'pending'")
            .bind(chrono::Utc::now())
            .bind(&row.id)
            .execute(&mut *tx)
            .await
            .context("claim_next_pending update")?;
        tx.commit().await.context("commit claim_next_pending")?;

        let mut job: DownloadJob = row.try_into()?;
        job.status = DownloadJobStatus::Verifying;
        Ok(Some(job))
    }

    async fn save(&self, job: &DownloadJob) -> Result<()> {
        sqlx::query(
            "UPDATE download_jobs SET status = ?, progress_bytes = ?, total_bytes = ?, checksum = ?,
                checksum_type = ?, error_message = ?, attempts = ?, updated_at = ? WHERE id = ?",
        )
        .bind(job_status_str(job.status))
        .bind(job.progress_bytes)
        .bind(job.total_bytes)
        .bind(&job.checksum)
        .bind(&job.checksum_type)
        .bind(&job.error_message)
        .bind(job.attempts)
        .bind(job.updated_at)
        .bind(job.id.to_string())
        .execute(&self.pool)
        .await
        .context("save download job")?;
        Ok(())
    }

    async fn owner_id(&self, distribution_id: Uuid) -> Result<Uuid> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT owner_id FROM distributions WHERE id = ?")
                .bind(distribution_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .context("owner_id lookup")?;
        match row {
            Some((Some(owner),)) => owner.parse().context("parse owner_id"),
            Some((None,)) => Ok(Uuid::nil()),
            None => anyhow::bail!("distribution {distribution_id} not found"),
        }
    }
}

/// `ldf_audit::AuditSink` backed by the `audit_events` table.
pub struct SqlxAuditSink {
    pool: SqlitePool,
}

impl SqlxAuditSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditSink for SqlxAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_events (id, action, user_id, user_name, resource, client_ip, detail, success, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(&event.action)
        .bind(event.user_id.map(|id| id.to_string()))
        .bind(&event.user_name)
        .bind(&event.resource)
        .bind(&event.client_ip)
        .bind(&event.detail)
        .bind(event.success)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await
        .context("insert audit event")?;
        Ok(())
    }
}

/// `ldf_audit::DistributionLogSink` backed by the `distribution_logs` table.
pub struct SqlxLogSink {
    pool: SqlitePool,
}

impl SqlxLogSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DistributionLogSink for SqlxLogSink {
    async fn append(&self, entry: &DistributionLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO distribution_logs (id, distribution_id, level, message, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(entry.distribution_id.to_string())
        .bind(log_level_str(entry.level))
        .bind(&entry.message)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .context("insert distribution log")?;
        Ok(())
    }
}

/// `ldf_access::TokenValidator` backed by the `users.token` column.
pub struct SqlxTokenValidator {
    pool: SqlitePool,
}

impl SqlxTokenValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TokenValidator for SqlxTokenValidator {
    async fn validate(&self, token: &str) -> Result<TokenClaims> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, name, role FROM users WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .context("validate token")?;

        let (id, name, role) = row.ok_or_else(|| anyhow::anyhow!("unknown token"))?;
        Ok(TokenClaims {
            user_id: id.parse().context("parse user id")?,
            user_name: name,
            role: role_from_str(&role)?,
        })
    }
}

