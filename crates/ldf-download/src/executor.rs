//! Worker-pool executor: claims pending jobs and runs them through
//! verify (HEAD) -> download (streamed) -> checksum -> complete, with
//! per-job cooperative cancellation and retry/backoff on transient failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::stream::poll_fn;
use futures_util::StreamExt;
use ldf_retry::{retry_async, ErrorClass, RetryStrategyConfig};
use ldf_storage::{StorageBackend, StorageError, UploadStream};
use ldf_types::{DownloadJob, DownloadJobStatus};
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Persistence boundary the executor needs; satisfied by whatever owns the
/// job table (kept out of this crate so it stays storage-agnostic).
#[async_trait::async_trait]
pub trait JobRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<DownloadJob>>;
    async fn list_active(&self) -> anyhow::Result<Vec<DownloadJob>>;
    async fn list_by_distribution(&self, distribution_id: Uuid) -> anyhow::Result<Vec<DownloadJob>>;
    async fn delete_by_distribution(&self, distribution_id: Uuid) -> anyhow::Result<u64>;
    /// Atomically claims the oldest pending job, if any, flipping it to `Verifying`.
    async fn claim_next_pending(&self) -> anyhow::Result<Option<DownloadJob>>;
    async fn save(&self, job: &DownloadJob) -> anyhow::Result<()>;
    /// Owning user of a distribution, for building its storage key prefix.
    async fn owner_id(&self, distribution_id: Uuid) -> anyhow::Result<Uuid>;
}

/// Minimum interval between persisted progress updates for a running job.
const PROGRESS_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
/// Minimum byte delta between persisted progress updates.
const PROGRESS_FLUSH_BYTES: i64 = 1024 * 1024;

/// Registry of cooperative-cancellation signals, one per in-flight job.
#[derive(Default, Clone)]
pub struct CancellationRegistry {
    senders: Arc<DashMap<Uuid, watch::Sender<bool>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, job_id: Uuid) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        self.senders.insert(job_id, tx);
        rx
    }

    fn unregister(&self, job_id: Uuid) {
        self.senders.remove(&job_id);
    }

    /// Signals cancellation for `job_id`. Returns `false` if the job is not
    /// currently running (the caller should still flip its stored status).
    pub fn cancel(&self, job_id: Uuid) -> bool {
        match self.senders.get(&job_id) {
            Some(tx) => {
                let _ = tx.send(true);
                true
            }
            None => false,
        }
    }
}

/// Classifies a reqwest failure into retryable/permanent/cancelled.
fn classify_reqwest_error(err: &reqwest::Error) -> ErrorClass {
    if err.is_timeout() || err.is_connect() {
        return ErrorClass::Retryable;
    }
    if let Some(status) = err.status() {
        if status.as_u16() == 429 || status.is_server_error() {
            return ErrorClass::Retryable;
        }
        return ErrorClass::Permanent;
    }
    ErrorClass::Retryable
}

/// Runs a fixed pool of `worker_count` workers pulling from `repo` until the
/// returned [`tokio::task::JoinSet`] is awaited out or the process exits.
/// Each worker loops: claim a pending job, execute it, repeat; sleeps briefly
/// when the queue is empty.
pub fn spawn_worker_pool(
    repo: Arc<dyn JobRepo>,
    storage: Arc<dyn StorageBackend>,
    client: reqwest::Client,
    cancellation: CancellationRegistry,
    retry_config: RetryStrategyConfig,
    worker_count: usize,
) -> tokio::task::JoinSet<()> {
    let mut set = tokio::task::JoinSet::new();
    for worker_id in 0..worker_count {
        let repo = repo.clone();
        let storage = storage.clone();
        let client = client.clone();
        let cancellation = cancellation.clone();
        let retry_config = retry_config.clone();
        set.spawn(async move {
            loop {
                match repo.claim_next_pending().await {
                    Ok(Some(job)) => {
                        let rx = cancellation.register(job.id);
                        let outcome = execute_job(
                            job.clone(),
                            repo.as_ref(),
                            storage.as_ref(),
                            &client,
                            rx,
                            &retry_config,
                        )
                        .await;
                        cancellation.unregister(job.id);
                        if let Err(err) = outcome {
                            tracing::warn!(job_id = %job.id, worker_id, error = %err, "download job failed");
                        }
                    }
                    Ok(None) => tokio::time::sleep(Duration::from_millis(500)).await,
                    Err(err) => {
                        tracing::error!(worker_id, error = %err, "failed to claim next job");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }
    set
}

/// Runs one job through verify -> download -> checksum -> complete, retrying
/// transient failures with backoff and honoring cooperative cancellation.
pub async fn execute_job(
    mut job: DownloadJob,
    repo: &dyn JobRepo,
    storage: &dyn StorageBackend,
    client: &reqwest::Client,
    mut cancel_rx: watch::Receiver<bool>,
    retry_config: &RetryStrategyConfig,
) -> anyhow::Result<()> {
    if *cancel_rx.borrow() {
        return mark_cancelled(&mut job, repo).await;
    }

    job.status = DownloadJobStatus::Verifying;
    job.updated_at = chrono::Utc::now();
    repo.save(&job).await?;

    let total_bytes = retry_async(
        retry_config,
        |_attempt| head_content_length(client, &job.url),
        |err: &reqwest::Error| classify_reqwest_error(err),
    )
    .await;

    let total_bytes = match total_bytes {
        Ok(len) => len,
        Err(err) => return mark_failed(&mut job, repo, &format!("preflight failed: {err}")).await,
    };

    if *cancel_rx.borrow() {
        return mark_cancelled(&mut job, repo).await;
    }

    job.status = DownloadJobStatus::Downloading;
    job.total_bytes = total_bytes;
    job.updated_at = chrono::Utc::now();
    repo.save(&job).await?;

    let owner_id = repo.owner_id(job.distribution_id).await?;
    let filename = job.url.rsplit('/').next().unwrap_or(&job.version);
    let key = ldf_storage::distribution_key(
        &owner_id.to_string(),
        &job.distribution_id.to_string(),
        filename,
    );
    let download_result = stream_download(client, &job, storage, &key, repo, &mut cancel_rx).await;

    match download_result {
        Ok(StreamOutcome::Cancelled) => mark_cancelled(&mut job, repo).await,
        Ok(StreamOutcome::Completed(hash)) => {
            if let (Some(expected), Some(_algo)) = (&job.checksum, &job.checksum_type) {
                if &hash != expected {
                    return mark_failed(&mut job, repo, "checksum verification failed").await;
                }
            }
            job.status = DownloadJobStatus::Complete;
            job.progress_bytes = job.total_bytes;
            job.updated_at = chrono::Utc::now();
            repo.save(&job).await?;
            Ok(())
        }
        Err(err) => mark_failed(&mut job, repo, &err.to_string()).await,
    }
}

enum StreamOutcome {
    Completed(String),
    Cancelled,
}

async fn head_content_length(client: &reqwest::Client, url: &str) -> Result<i64, reqwest::Error> {
    let response = client.head(url).send().await?.error_for_status()?;
    Ok(response
        .content_length()
        .map(|len| len as i64)
        .unwrap_or(0))
}

/// Outcome of the channel-fed side of [`stream_download`]: either the HTTP
/// body was read to completion (with the resulting checksum) or cancellation
/// cut it short and the in-flight upload should be treated as incomplete.
enum DrainOutcome {
    Completed(String),
    Cancelled,
}

/// Downloads `job.url` and relays each chunk straight into `storage.upload`
/// through a bounded channel, so the artifact is never buffered in full —
/// the HTTP read and the storage write run concurrently, backpressured by
/// the channel.
async fn stream_download(
    client: &reqwest::Client,
    job: &DownloadJob,
    storage: &dyn StorageBackend,
    key: &str,
    repo: &dyn JobRepo,
    cancel_rx: &mut watch::Receiver<bool>,
) -> anyhow::Result<StreamOutcome> {
    let response = client.get(&job.url).send().await?.error_for_status()?;
    let mut http_stream = response.bytes_stream();

    let (tx, mut rx) = mpsc::channel::<Result<Bytes, StorageError>>(8);
    let upload_stream: UploadStream = poll_fn(move |cx| rx.poll_recv(cx)).boxed();
    let upload_fut = storage.upload(key, upload_stream, job.total_bytes.max(0) as u64, "application/octet-stream");

    let drain_fut = async {
        let mut hasher = Sha256::new();
        let mut received: i64 = 0;
        let mut last_flush = Instant::now();
        let mut last_flush_bytes: i64 = 0;
        let mut progress_job = job.clone();

        loop {
            tokio::select! {
                biased;
                _ = cancel_rx.changed() => {
                    if *cancel_rx.borrow() {
                        let _ = tx.send(Err(StorageError::Transient("download cancelled".to_string()))).await;
                        return Ok(DrainOutcome::Cancelled);
                    }
                }
                chunk = http_stream.next() => {
                    match chunk {
                        Some(chunk) => {
                            let chunk = chunk.map_err(anyhow::Error::from)?;
                            hasher.update(&chunk);
                            received += chunk.len() as i64;
                            if tx.send(Ok(chunk)).await.is_err() {
                                break;
                            }

                            let elapsed = last_flush.elapsed() >= PROGRESS_FLUSH_INTERVAL;
                            let grew = received - last_flush_bytes >= PROGRESS_FLUSH_BYTES;
                            if elapsed || grew {
                                progress_job.progress_bytes = received;
                                progress_job.updated_at = chrono::Utc::now();
                                repo.save(&progress_job).await?;
                                last_flush = Instant::now();
                                last_flush_bytes = received;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        Ok::<_, anyhow::Error>(DrainOutcome::Completed(hex::encode(hasher.finalize())))
    };

    let (drain_result, upload_result) = tokio::join!(drain_fut, upload_fut);
    match drain_result? {
        DrainOutcome::Cancelled => Ok(StreamOutcome::Cancelled),
        DrainOutcome::Completed(hash) => {
            upload_result?;
            Ok(StreamOutcome::Completed(hash))
        }
    }
}

async fn mark_failed(job: &mut DownloadJob, repo: &dyn JobRepo, message: &str) -> anyhow::Result<()> {
    job.status = DownloadJobStatus::Failed;
    job.error_message = Some(message.to_string());
    job.updated_at = chrono::Utc::now();
    repo.save(job).await
}

async fn mark_cancelled(job: &mut DownloadJob, repo: &dyn JobRepo) -> anyhow::Result<()> {
    job.status = DownloadJobStatus::Cancelled;
    job.updated_at = chrono::Utc::now();
    repo.save(job).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_an_unregistered_job_returns_false() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel(Uuid::new_v4()));
    }

    #[test]
    fn registering_then_cancelling_flips_the_receiver() {
        let registry = CancellationRegistry::new();
        let job_id = Uuid::new_v4();
        let rx = registry.register(job_id);
        assert!(registry.cancel(job_id));
        assert!(*rx.borrow());
    }
}
