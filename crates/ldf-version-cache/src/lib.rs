//! Persisted upstream version cache and the sync-job finite state machine.
//!
//! The FSM, generalized from `shipper_state::PublishState`'s file-backed
//! persistence to a `sqlx`-backed table, is:
//!
//! ```text
//! pending --(start)--> running --(ok)--> completed
//!                         |
//!                         +-(err)--> failed
//! ```
//!
//! The "coalesce concurrent sync" rule plays the role `shipper-lock` plays
//! for publishes: a running job for the same source blocks a second one,
//! expressed here as `start_sync`'s check-then-insert happening inside a
//! single transaction instead of a filesystem lock.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use ldf_types::{RetrievalMethod, SourceVersion, SourceVersionType, SyncJobStatus, VersionSyncJob};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Why a sync was not started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncSkipReason {
    /// A sync for this source is already running.
    AlreadyRunning(VersionSyncJob),
    /// The most recent completed sync is within `sync.cache_duration`.
    WithinCacheWindow,
}

pub struct VersionCacheStore {
    pool: SqlitePool,
}

impl VersionCacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upserts a batch of versions for one source in a single transaction,
    /// returning the count of rows that did not already exist.
    pub async fn bulk_upsert(
        &self,
        source_id: Uuid,
        source_type: RetrievalMethod,
        versions: &[SourceVersion],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await.context("begin bulk_upsert transaction")?;
        let mut inserted = 0u64;

        for version in versions {
            let existing: Option<(String,)> = sqlx::query_as(
                "SELECT version FROM source_versions WHERE source_id = ? AND source_type = ? AND version = ?",
            )
            .bind(source_id.to_string())
            .bind(source_type_str(source_type))
            .bind(&version.version)
            .fetch_optional(&mut *tx)
            .await
            .context("check existing source_version")?;

            if existing.is_none() {
                inserted += 1;
            }

            sqlx::query(
                "INSERT INTO source_versions
                    (source_id, source_type, version, version_type, release_date, download_url,
                     checksum, checksum_type, file_size, is_stable, discovered_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(source_id, source_type, version) DO UPDATE SET
                    version_type = excluded.version_type,
                    release_date = excluded.release_date,
                    download_url = excluded.download_url,
                    checksum = excluded.checksum,
                    checksum_type = excluded.checksum_type,
                    file_size = excluded.file_size,
                    is_stable = excluded.is_stable",
            )
            .bind(source_id.to_string())
            .bind(source_type_str(source_type))
            .bind(&version.version)
            .bind(version_type_str(version.version_type))
            .bind(version.release_date)
            .bind(&version.download_url)
            .bind(&version.checksum)
            .bind(&version.checksum_type)
            .bind(version.file_size)
            .bind(version.is_stable)
            .bind(version.discovered_at)
            .execute(&mut *tx)
            .await
            .context("upsert source_version")?;
        }

        tx.commit().await.context("commit bulk_upsert transaction")?;
        Ok(inserted)
    }

    /// Lists versions for a source, newest-discovered first, with an
    /// optional `version_type` filter.
    pub async fn list_paginated(
        &self,
        source_id: Uuid,
        source_type: RetrievalMethod,
        limit: i64,
        offset: i64,
        version_type: Option<SourceVersionType>,
    ) -> Result<(Vec<SourceVersion>, i64)> {
        let rows: Vec<SourceVersionRow> = match version_type {
            Some(vt) => sqlx::query_as(
                "SELECT * FROM source_versions
                 WHERE source_id = ? AND source_type = ? AND version_type = ?
                 ORDER BY discovered_at DESC LIMIT ? OFFSET ?",
            )
            .bind(source_id.to_string())
            .bind(source_type_str(source_type))
            .bind(version_type_str(vt))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("list_paginated query")?,
            None => sqlx::query_as(
                "SELECT * FROM source_versions
                 WHERE source_id = ? AND source_type = ?
                 ORDER BY discovered_at DESC LIMIT ? OFFSET ?",
            )
            .bind(source_id.to_string())
            .bind(source_type_str(source_type))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("list_paginated query")?,
        };

        let total: (i64,) = match version_type {
            Some(vt) => sqlx::query_as(
                "SELECT COUNT(*) FROM source_versions WHERE source_id = ? AND source_type = ? AND version_type = ?",
            )
            .bind(source_id.to_string())
            .bind(source_type_str(source_type))
            .bind(version_type_str(vt))
            .fetch_one(&self.pool)
            .await
            .context("list_paginated count")?,
            None => sqlx::query_as(
                "SELECT COUNT(*) FROM source_versions WHERE source_id = ? AND source_type = ?",
            )
            .bind(source_id.to_string())
            .bind(source_type_str(source_type))
            .fetch_one(&self.pool)
            .await
            .context("list_paginated count")?,
        };

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    pub async fn get_latest_stable(
        &self,
        source_id: Uuid,
        source_type: RetrievalMethod,
    ) -> Result<Option<SourceVersion>> {
        let row: Option<SourceVersionRow> = sqlx::query_as(
            "SELECT * FROM source_versions
             WHERE source_id = ? AND source_type = ? AND is_stable = 1
             ORDER BY discovered_at DESC LIMIT 1",
        )
        .bind(source_id.to_string())
        .bind(source_type_str(source_type))
        .fetch_optional(&self.pool)
        .await
        .context("get_latest_stable")?;
        Ok(row.map(Into::into))
    }

    pub async fn get_latest_longterm(
        &self,
        source_id: Uuid,
        source_type: RetrievalMethod,
    ) -> Result<Option<SourceVersion>> {
        let row: Option<SourceVersionRow> = sqlx::query_as(
            "SELECT * FROM source_versions
             WHERE source_id = ? AND source_type = ? AND version_type = 'longterm'
             ORDER BY discovered_at DESC LIMIT 1",
        )
        .bind(source_id.to_string())
        .bind(source_type_str(source_type))
        .fetch_optional(&self.pool)
        .await
        .context("get_latest_longterm")?;
        Ok(row.map(Into::into))
    }

    pub async fn get_running_sync_job(
        &self,
        source_id: Uuid,
        source_type: RetrievalMethod,
    ) -> Result<Option<VersionSyncJob>> {
        let row: Option<SyncJobRow> = sqlx::query_as(
            "SELECT * FROM version_sync_jobs
             WHERE source_id = ? AND source_type = ? AND status = 'running'
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(source_id.to_string())
        .bind(source_type_str(source_type))
        .fetch_optional(&self.pool)
        .await
        .context("get_running_sync_job")?;
        Ok(row.map(Into::into))
    }

    /// Atomically checks the concurrency rule and the cache-duration gate,
    /// and if both pass, inserts and runs a new job — all inside one
    /// transaction, the way `claim_next_pending` (in `ldf-server::db`)
    /// claims a download job. Doing the running-job check and the
    /// insert/mark-running transition as separate pool calls would let two
    /// concurrent callers both observe no running job and both proceed.
    ///
    /// `cache_duration_minutes = 0` disables the cache-window gate. Manual
    /// syncs should pass `force = true` to bypass the gate (but not the
    /// concurrency rule, which always applies).
    pub async fn start_sync(
        &self,
        source_id: Uuid,
        source_type: RetrievalMethod,
        cache_duration_minutes: i64,
        force: bool,
    ) -> Result<Result<VersionSyncJob, SyncSkipReason>> {
        let mut tx = self.pool.begin().await.context("begin start_sync transaction")?;

        let running: Option<SyncJobRow> = sqlx::query_as(
            "SELECT * FROM version_sync_jobs
             WHERE source_id = ? AND source_type = ? AND status = 'running'
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(source_id.to_string())
        .bind(source_type_str(source_type))
        .fetch_optional(&mut *tx)
        .await
        .context("start_sync running lookup")?;

        if let Some(row) = running {
            tx.commit().await.ok();
            return Ok(Err(SyncSkipReason::AlreadyRunning(row.into())));
        }

        if !force && cache_duration_minutes > 0 {
            let last_completed: Option<(chrono::DateTime<Utc>,)> = sqlx::query_as(
                "SELECT completed_at FROM version_sync_jobs
                 WHERE source_id = ? AND source_type = ? AND status = 'completed' AND completed_at IS NOT NULL
                 ORDER BY completed_at DESC LIMIT 1",
            )
            .bind(source_id.to_string())
            .bind(source_type_str(source_type))
            .fetch_optional(&mut *tx)
            .await
            .context("start_sync last completed lookup")?;

            if let Some((completed_at,)) = last_completed {
                let cutoff = Utc::now() - ChronoDuration::minutes(cache_duration_minutes);
                if completed_at > cutoff {
                    tx.commit().await.ok();
                    return Ok(Err(SyncSkipReason::WithinCacheWindow));
                }
            }
        }

        let created_at = Utc::now();
        let job_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO version_sync_jobs
                (id, source_id, source_type, status, versions_found, versions_new, created_at)
             VALUES (?, ?, ?, 'pending', 0, 0, ?)",
        )
        .bind(job_id.to_string())
        .bind(source_id.to_string())
        .bind(source_type_str(source_type))
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .context("start_sync insert")?;

        let started_at = Utc::now();
        sqlx::query(
            "UPDATE version_sync_jobs SET status = 'running', started_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(started_at)
        .bind(job_id.to_string())
        .execute(&mut *tx)
        .await
        .context("start_sync mark running")?;

        tx.commit().await.context("commit start_sync transaction")?;

        Ok(Ok(VersionSyncJob {
            id: job_id,
            source_id,
            source_type,
            status: SyncJobStatus::Running,
            versions_found: 0,
            versions_new: 0,
            started_at: Some(started_at),
            completed_at: None,
            error_message: None,
            created_at,
        }))
    }

    /// `running -> completed`.
    pub async fn mark_completed(&self, job_id: Uuid, versions_found: i64, versions_new: i64) -> Result<()> {
        sqlx::query(
            "UPDATE version_sync_jobs
             SET status = 'completed', completed_at = ?, versions_found = ?, versions_new = ?
             WHERE id = ? AND status = 'running'",
        )
        .bind(Utc::now())
        .bind(versions_found)
        .bind(versions_new)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .context("mark sync job completed")?;
        Ok(())
    }

    /// `running -> failed`.
    pub async fn mark_failed(&self, job_id: Uuid, error_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE version_sync_jobs
             SET status = 'failed', completed_at = ?, error_message = ?
             WHERE id = ? AND status = 'running'",
        )
        .bind(Utc::now())
        .bind(error_message)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .context("mark sync job failed")?;
        Ok(())
    }
}

fn source_type_str(t: RetrievalMethod) -> &'static str {
    match t {
        RetrievalMethod::Release => "release",
        RetrievalMethod::Git => "git",
        RetrievalMethod::Directory => "directory",
    }
}

fn version_type_str(t: SourceVersionType) -> &'static str {
    match t {
        SourceVersionType::Stable => "stable",
        SourceVersionType::Longterm => "longterm",
        SourceVersionType::Mainline => "mainline",
        SourceVersionType::LinuxNext => "linux_next",
    }
}

#[derive(sqlx::FromRow)]
struct SourceVersionRow {
    source_id: String,
    source_type: String,
    version: String,
    version_type: String,
    release_date: Option<chrono::DateTime<Utc>>,
    download_url: String,
    checksum: Option<String>,
    checksum_type: Option<String>,
    file_size: Option<i64>,
    is_stable: bool,
    discovered_at: chrono::DateTime<Utc>,
}

impl From<SourceVersionRow> for SourceVersion {
    fn from(row: SourceVersionRow) -> Self {
        SourceVersion {
            source_id: row.source_id.parse().unwrap_or_default(),
            source_type: parse_retrieval_method(&row.source_type),
            version: row.version,
            version_type: parse_version_type(&row.version_type),
            release_date: row.release_date,
            download_url: row.download_url,
            checksum: row.checksum,
            checksum_type: row.checksum_type,
            file_size: row.file_size,
            is_stable: row.is_stable,
            discovered_at: row.discovered_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SyncJobRow {
    id: String,
    source_id: String,
    source_type: String,
    status: String,
    versions_found: i64,
    versions_new: i64,
    started_at: Option<chrono::DateTime<Utc>>,
    completed_at: Option<chrono::DateTime<Utc>>,
    error_message: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl From<SyncJobRow> for VersionSyncJob {
    fn from(row: SyncJobRow) -> Self {
        VersionSyncJob {
            id: row.id.parse().unwrap_or_default(),
            source_id: row.source_id.parse().unwrap_or_default(),
            source_type: parse_retrieval_method(&row.source_type),
            status: parse_job_status(&row.status),
            versions_found: row.versions_found,
            versions_new: row.versions_new,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

fn parse_retrieval_method(s: &str) -> RetrievalMethod {
    match s {
        "git" => RetrievalMethod::Git,
        "directory" => RetrievalMethod::Directory,
        _ => RetrievalMethod::Release,
    }
}

fn parse_version_type(s: &str) -> SourceVersionType {
    match s {
        "longterm" => SourceVersionType::Longterm,
        "mainline" => SourceVersionType::Mainline,
        "linux_next" => SourceVersionType::LinuxNext,
        _ => SourceVersionType::Stable,
    }
}

fn parse_job_status(s: &str) -> SyncJobStatus {
    match s {
        "running" => SyncJobStatus::Running,
        "completed" => SyncJobStatus::Completed,
        "failed" => SyncJobStatus::Failed,
        _ => SyncJobStatus::Pending,
    }
}
