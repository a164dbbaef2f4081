//! Plan-and-enqueue orchestration: resolves each component's effective
//! source and target version, then hands the resulting [`ArtifactRequest`]s
//! to [`ldf_download::create_jobs_for_distribution`].

use ldf_download::{create_jobs_for_distribution, ArtifactRequest, TemplateVars};
use ldf_source::{effective_source, resolve_version};
use ldf_types::{Component, DownloadJob, MirrorConfig, UpstreamSource};
use ldf_version_cache::VersionCacheStore;
use uuid::Uuid;

/// One component that could not be resolved to a download, and why.
#[derive(Debug, Clone)]
pub struct UnresolvedComponent {
    pub component_id: Uuid,
    pub reason: String,
}

/// Result of planning a distribution's downloads: jobs ready to enqueue,
/// plus whichever components had no effective source or no resolvable
/// version, so the caller can surface those to the user instead of silently
/// dropping them.
#[derive(Debug, Default)]
pub struct EnqueuePlan {
    pub jobs: Vec<DownloadJob>,
    pub unresolved: Vec<UnresolvedComponent>,
}

/// Resolves every `component` against `sources` and the version cache, and
/// plans the deduplicated job set for `distribution_id`.
pub async fn plan_distribution_downloads(
    store: &VersionCacheStore,
    distribution_id: Uuid,
    user_id: Uuid,
    components: &[Component],
    sources: &[UpstreamSource],
    mirrors: &[MirrorConfig],
    existing_jobs: &[DownloadJob],
) -> anyhow::Result<EnqueuePlan> {
    let mut requests = Vec::with_capacity(components.len());
    let mut unresolved = Vec::new();

    for component in components {
        let candidate_sources: Vec<&UpstreamSource> = sources
            .iter()
            .filter(|s| s.component_ids.contains(&component.id))
            .cloned()
            .collect();

        let source = match effective_source(&candidate_sources, user_id) {
            Some(source) => source,
            None => {
                unresolved.push(UnresolvedComponent {
                    component_id: component.id,
                    reason: "no enabled upstream source configured".to_string(),
                });
                continue;
            }
        };

        let version = resolve_version(
            store,
            component.default_version_rule,
            component.default_version.as_deref(),
            Some(source),
            source.retrieval_method,
        )
        .await?;

        let version = match version {
            Some(version) => version,
            None => {
                unresolved.push(UnresolvedComponent {
                    component_id: component.id,
                    reason: "no resolvable version for the configured rule".to_string(),
                });
                continue;
            }
        };

        let url_template = source
            .url_template
            .clone()
            .unwrap_or_else(|| "{base_url}".to_string());

        requests.push(ArtifactRequest {
            distribution_id,
            component_id: component.id,
            source_id: source.id,
            source_name: source.name.clone(),
            version: version.version.clone(),
            url_template,
            template_vars: TemplateVars {
                base_url: source.url.clone(),
                name: component.name.clone(),
                version: version.version.clone(),
                tag: version.version.clone(),
                major_x: major_x(&version.version),
                repo: source.name.clone(),
            },
            checksum: version.checksum.clone(),
            checksum_type: version.checksum_type.clone(),
        });
    }

    let jobs = create_jobs_for_distribution(&requests, mirrors, existing_jobs);

    Ok(EnqueuePlan { jobs, unresolved })
}

/// Derives the `{major_x}` template variable: the leading numeric component
/// of a dotted version string, e.g. `"6.12.3"` -> `"6"`.
fn major_x(version: &str) -> String {
    version.split('.').next().unwrap_or(version).to_string()
}
