//! Shared application state handed to every handler via `State<Arc<AppState>>`.

use std::sync::Arc;

use dashmap::DashMap;
use ldf_access::RateLimiters;
use ldf_audit::{AuditSink, DistributionLogSink};
use ldf_download::CancellationRegistry;
use ldf_forge::ForgeRegistry;
use ldf_retry::RetryStrategyConfig;
use ldf_storage::StorageBackend;
use ldf_version_cache::VersionCacheStore;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{SqlxAuditSink, SqlxJobRepo, SqlxLogSink, SqlxTokenValidator};

/// Everything a handler needs to serve a request. One instance is built at
/// startup and shared behind an `Arc` across the whole listener.
pub struct AppState {
    pub pool: SqlitePool,
    pub storage: Arc<dyn StorageBackend>,
    pub version_cache: VersionCacheStore,
    pub forges: ForgeRegistry,
    pub rate_limiters: Arc<RateLimiters>,
    pub cancellations: CancellationRegistry,
    pub job_repo: Arc<SqlxJobRepo>,
    pub audit: Arc<dyn AuditSink>,
    pub logs: Arc<dyn DistributionLogSink>,
    pub token_validator: Arc<SqlxTokenValidator>,
    pub http_client: reqwest::Client,
    pub retry_config: RetryStrategyConfig,
    pub master_key: [u8; ldf_settings::KEY_LEN],
    /// Serializes concurrent writers per distribution — `routes::downloads`'
    /// `plan` (read-diff-insert over the job table) and `flush` (delete-all)
    /// both hold this for their full read-then-write sequence.
    pub distribution_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl AppState {
    pub fn new(pool: SqlitePool, storage: Arc<dyn StorageBackend>, master_key: [u8; ldf_settings::KEY_LEN]) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("ldf-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            version_cache: VersionCacheStore::new(pool.clone()),
            forges: ForgeRegistry::new(),
            rate_limiters: Arc::new(RateLimiters::new()),
            cancellations: CancellationRegistry::new(),
            job_repo: Arc::new(SqlxJobRepo::new(pool.clone())),
            audit: Arc::new(SqlxAuditSink::new(pool.clone())),
            logs: Arc::new(SqlxLogSink::new(pool.clone())),
            token_validator: Arc::new(SqlxTokenValidator::new(pool.clone())),
            http_client,
            retry_config: RetryStrategyConfig::default(),
            master_key,
            distribution_locks: DashMap::new(),
            storage,
            pool,
        }
    }

    /// Returns the per-distribution write lock, creating it on first use.
    pub fn distribution_lock(&self, distribution_id: Uuid) -> Arc<Mutex<()>> {
        self.distribution_locks
            .entry(distribution_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
