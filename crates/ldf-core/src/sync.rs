//! Discovery-sync orchestration: runs a [`ForgeRegistry`] lookup through the
//! sync-job FSM and lands the result in the [`VersionCacheStore`].

use ldf_forge::ForgeRegistry;
use ldf_types::{RetrievalMethod, SourceVersion, SourceVersionType, UpstreamSource};
use ldf_version_cache::{SyncSkipReason, VersionCacheStore};

/// Outcome of a single call to [`run_sync`].
#[derive(Debug)]
pub enum SyncOutcome {
    Completed { versions_found: i64, versions_new: i64 },
    Skipped(SyncSkipReason),
    Failed(String),
}

/// Starts (or skips) a sync for `source`, discovers versions through
/// `registry`, and persists them through `store`.
///
/// Mirrors the FSM transition sequence the store enforces: `start_sync`
/// atomically gates on a running job or the cache window and, if it may
/// proceed, inserts and runs the job in the same transaction; the terminal
/// transition is `mark_completed` or `mark_failed` depending on whether
/// discovery succeeded.
pub async fn run_sync(
    registry: &ForgeRegistry,
    store: &VersionCacheStore,
    source: &UpstreamSource,
    cache_duration_minutes: i64,
    force: bool,
) -> anyhow::Result<SyncOutcome> {
    let job = match store
        .start_sync(source.id, source.retrieval_method, cache_duration_minutes, force)
        .await?
    {
        Err(reason) => return Ok(SyncOutcome::Skipped(reason)),
        Ok(job) => job,
    };

    let repo = match registry.get_provider(source.forge_type).parse_repo_info(&source.url) {
        Ok(repo) => repo,
        Err(err) => {
            store.mark_failed(job.id, &err.to_string()).await?;
            return Ok(SyncOutcome::Failed(err.to_string()));
        }
    };

    let discovered = match registry.discover_versions(source.forge_type, &repo).await {
        Ok(versions) => versions,
        Err(err) => {
            store.mark_failed(job.id, &err.to_string()).await?;
            return Ok(SyncOutcome::Failed(err.to_string()));
        }
    };

    let versions: Vec<SourceVersion> = discovered
        .into_iter()
        .map(|d| SourceVersion {
            source_id: source.id,
            source_type: source.retrieval_method,
            version: d.version,
            version_type: if d.is_prerelease {
                SourceVersionType::Mainline
            } else {
                SourceVersionType::Stable
            },
            release_date: d.release_date,
            download_url: source.url_template.clone().unwrap_or_default(),
            checksum: None,
            checksum_type: None,
            file_size: None,
            is_stable: !d.is_prerelease,
            discovered_at: chrono::Utc::now(),
        })
        .collect();

    let versions_found = versions.len() as i64;
    let versions_new = match store.bulk_upsert(source.id, source.retrieval_method, &versions).await {
        Ok(new) => new as i64,
        Err(err) => {
            store.mark_failed(job.id, &err.to_string()).await?;
            return Ok(SyncOutcome::Failed(err.to_string()));
        }
    };

    store.mark_completed(job.id, versions_found, versions_new).await?;

    Ok(SyncOutcome::Completed {
        versions_found,
        versions_new,
    })
}

/// `LatestStable`/`LatestLts` classification, generalized as a shared
/// helper for whichever layer needs to distinguish the two retrieval kinds
/// when choosing a `RetrievalMethod`.
pub fn retrieval_method_matches(method: RetrievalMethod, source: &UpstreamSource) -> bool {
    method == source.retrieval_method
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_method_matches_compares_exact_kind() {
        let source = UpstreamSource {
            id: uuid::Uuid::new_v4(),
            name: "kernel".into(),
            url: "https://github.com/torvalds/linux".into(),
            component_ids: vec![],
            retrieval_method: RetrievalMethod::Git,
            url_template: None,
            priority: 0,
            enabled: true,
            is_system: true,
            owner_id: None,
            forge_type: ldf_types::ForgeType::GitHub,
            version_filter: String::new(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(retrieval_method_matches(RetrievalMethod::Git, &source));
        assert!(!retrieval_method_matches(RetrievalMethod::Release, &source));
    }
}
