//! Download job planning: URL templating, mirror rewrite, and dedup.

use ldf_types::{DownloadJob, DownloadJobStatus, MirrorConfig};
use uuid::Uuid;

/// One artifact a distribution needs, before mirror rewrite or dedup.
#[derive(Debug, Clone)]
pub struct ArtifactRequest {
    pub distribution_id: Uuid,
    pub component_id: Uuid,
    pub source_id: Uuid,
    pub source_name: String,
    pub version: String,
    pub url_template: String,
    pub template_vars: TemplateVars,
    pub checksum: Option<String>,
    pub checksum_type: Option<String>,
}

/// Substitution variables for a `url_template`.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub base_url: String,
    pub name: String,
    pub version: String,
    pub tag: String,
    pub major_x: String,
    pub repo: String,
}

/// Materializes `{base_url, name, version, tag, major_x, repo}` placeholders.
pub fn substitute_template(template: &str, vars: &TemplateVars) -> String {
    template
        .replace("{base_url}", &vars.base_url)
        .replace("{name}", &vars.name)
        .replace("{version}", &vars.version)
        .replace("{tag}", &vars.tag)
        .replace("{major_x}", &vars.major_x)
        .replace("{repo}", &vars.repo)
}

/// Rewrites `url` against the longest enabled [`MirrorConfig`] prefix match;
/// among equal-length matches the highest `priority` value wins. Returns
/// `url` unchanged when no mirror matches.
pub fn apply_mirror_rewrite(url: &str, mirrors: &[MirrorConfig]) -> String {
    let best = mirrors
        .iter()
        .filter(|m| m.enabled && url.starts_with(&m.url_prefix))
        .max_by_key(|m| (m.url_prefix.len(), m.priority));

    match best {
        Some(mirror) => format!("{}{}", mirror.mirror_url, &url[mirror.url_prefix.len()..]),
        None => url.to_string(),
    }
}

/// Plans the deduplicated job set for a distribution's artifact requests.
///
/// Jobs whose `(source_id, version)` is identical are merged into one job
/// carrying the union of `component_ids`. Jobs already present in `existing`
/// for the same `(source_id, version)` are returned verbatim instead of
/// being recreated.
pub fn create_jobs_for_distribution(
    requests: &[ArtifactRequest],
    mirrors: &[MirrorConfig],
    existing: &[DownloadJob],
) -> Vec<DownloadJob> {
    let mut by_key: Vec<(Uuid, String, DownloadJob)> = Vec::new();

    for request in requests {
        let key = (request.source_id, request.version.clone());

        if let Some(job) = existing
            .iter()
            .find(|j| j.source_id == key.0 && j.version == key.1)
        {
            if !by_key.iter().any(|(id, v, _)| *id == key.0 && *v == key.1) {
                by_key.push((key.0, key.1, job.clone()));
            }
            continue;
        }

        if let Some((_, _, job)) = by_key
            .iter_mut()
            .find(|(id, v, _)| *id == key.0 && *v == key.1)
        {
            if !job.component_ids.contains(&request.component_id) {
                job.component_ids.push(request.component_id);
            }
            continue;
        }

        let raw_url = substitute_template(&request.url_template, &request.template_vars);
        let url = apply_mirror_rewrite(&raw_url, mirrors);
        let now = chrono::Utc::now();

        by_key.push((
            key.0,
            key.1.clone(),
            DownloadJob {
                id: Uuid::new_v4(),
                distribution_id: request.distribution_id,
                component_id: request.component_id,
                source_id: request.source_id,
                source_name: request.source_name.clone(),
                component_ids: vec![request.component_id],
                version: request.version.clone(),
                url,
                status: DownloadJobStatus::Pending,
                progress_bytes: 0,
                total_bytes: 0,
                checksum: request.checksum.clone(),
                checksum_type: request.checksum_type.clone(),
                error_message: None,
                attempts: 0,
                created_at: now,
                updated_at: now,
            },
        ));
    }

    by_key.into_iter().map(|(_, _, job)| job).collect()
}

/// Applies the `retry_job` transition rule, failing if the job is not in a
/// retriable state.
pub fn retry_job(job: &mut DownloadJob) -> Result<(), &'static str> {
    if !job.status.is_retriable() {
        return Err("job is not in a retriable state");
    }
    job.status = DownloadJobStatus::Pending;
    job.progress_bytes = 0;
    job.error_message = None;
    job.attempts += 1;
    job.updated_at = chrono::Utc::now();
    Ok(())
}

/// Applies the `cancel_job` transition rule, failing if the job is not
/// cancellable.
pub fn cancel_job(job: &mut DownloadJob) -> Result<(), &'static str> {
    if !job.status.is_cancellable() {
        return Err("job is not cancellable from its current state");
    }
    job.status = DownloadJobStatus::Cancelled;
    job.updated_at = chrono::Utc::now();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source_id: Uuid, component_id: Uuid, version: &str) -> ArtifactRequest {
        ArtifactRequest {
            distribution_id: Uuid::new_v4(),
            component_id,
            source_id,
            source_name: "kernel".to_string(),
            version: version.to_string(),
            url_template: "{base_url}/archive/{tag}.tar.gz".to_string(),
            template_vars: TemplateVars {
                base_url: "https://example.com".to_string(),
                tag: version.to_string(),
                version: version.to_string(),
                ..Default::default()
            },
            checksum: None,
            checksum_type: None,
        }
    }

    #[test]
    fn template_substitution_replaces_all_placeholders() {
        let vars = TemplateVars {
            base_url: "https://github.com/torvalds/linux".to_string(),
            tag: "v6.12".to_string(),
            ..Default::default()
        };
        let result = substitute_template("{base_url}/archive/refs/tags/{tag}.tar.gz", &vars);
        assert_eq!(result, "https://github.com/torvalds/linux/archive/refs/tags/v6.12.tar.gz");
    }

    #[test]
    fn mirror_rewrite_prefers_longest_prefix() {
        let mirrors = vec![
            MirrorConfig {
                id: Uuid::new_v4(),
                url_prefix: "https://github.com".to_string(),
                mirror_url: "https://mirror.example/gh".to_string(),
                priority: 0,
                enabled: true,
            },
            MirrorConfig {
                id: Uuid::new_v4(),
                url_prefix: "https://github.com/torvalds".to_string(),
                mirror_url: "https://mirror.example/torvalds".to_string(),
                priority: 0,
                enabled: true,
            },
        ];
        let rewritten = apply_mirror_rewrite("https://github.com/torvalds/linux/archive/v6.12.tar.gz", &mirrors);
        assert_eq!(rewritten, "https://mirror.example/torvalds/linux/archive/v6.12.tar.gz");
    }

    #[test]
    fn mirror_rewrite_ignores_disabled_mirrors() {
        let mirrors = vec![MirrorConfig {
            id: Uuid::new_v4(),
            url_prefix: "https://github.com".to_string(),
            mirror_url: "https://mirror.example".to_string(),
            priority: 0,
            enabled: false,
        }];
        let url = "https://github.com/torvalds/linux/archive/v6.12.tar.gz";
        assert_eq!(apply_mirror_rewrite(url, &mirrors), url);
    }

    #[test]
    fn dedup_merges_component_ids_for_same_source_and_version() {
        let source_id = Uuid::new_v4();
        let component_a = Uuid::new_v4();
        let component_b = Uuid::new_v4();
        let requests = vec![
            request(source_id, component_a, "6.12"),
            request(source_id, component_b, "6.12"),
        ];
        let jobs = create_jobs_for_distribution(&requests, &[], &[]);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].component_ids.len(), 2);
    }

    #[test]
    fn existing_job_is_returned_verbatim() {
        let source_id = Uuid::new_v4();
        let component_id = Uuid::new_v4();
        let requests = vec![request(source_id, component_id, "6.12")];

        let now = chrono::Utc::now();
        let existing_job = DownloadJob {
            id: Uuid::new_v4(),
            distribution_id: requests[0].distribution_id,
            component_id,
            source_id,
            source_name: "kernel".to_string(),
            component_ids: vec![component_id],
            version: "6.12".to_string(),
            url: "https://already-planned.example/kernel.tar.gz".to_string(),
            status: DownloadJobStatus::Downloading,
            progress_bytes: 100,
            total_bytes: 200,
            checksum: None,
            checksum_type: None,
            error_message: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        };

        let jobs = create_jobs_for_distribution(&requests, &[], std::slice::from_ref(&existing_job));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, existing_job.id);
        assert_eq!(jobs[0].url, "https://already-planned.example/kernel.tar.gz");
    }

    #[test]
    fn retry_job_rejects_non_retriable_states() {
        let mut job = sample_job(DownloadJobStatus::Downloading);
        assert!(retry_job(&mut job).is_err());
    }

    #[test]
    fn retry_job_resets_progress_and_bumps_attempts() {
        let mut job = sample_job(DownloadJobStatus::Failed);
        job.progress_bytes = 500;
        job.error_message = Some("checksum mismatch".to_string());
        job.attempts = 1;

        retry_job(&mut job).unwrap();
        assert_eq!(job.status, DownloadJobStatus::Pending);
        assert_eq!(job.progress_bytes, 0);
        assert!(job.error_message.is_none());
        assert_eq!(job.attempts, 2);
    }

    #[test]
    fn cancel_job_rejects_terminal_states() {
        let mut job = sample_job(DownloadJobStatus::Complete);
        assert!(cancel_job(&mut job).is_err());
    }

    #[test]
    fn cancel_job_transitions_from_downloading() {
        let mut job = sample_job(DownloadJobStatus::Downloading);
        cancel_job(&mut job).unwrap();
        assert_eq!(job.status, DownloadJobStatus::Cancelled);
    }

    fn sample_job(status: DownloadJobStatus) -> DownloadJob {
        let now = chrono::Utc::now();
        DownloadJob {
            id: Uuid::new_v4(),
            distribution_id: Uuid::new_v4(),
            component_id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            source_name: "kernel".to_string(),
            component_ids: vec![],
            version: "6.12".to_string(),
            url: "https://example.com/kernel.tar.gz".to_string(),
            status,
            progress_bytes: 0,
            total_bytes: 0,
            checksum: None,
            checksum_type: None,
            error_message: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
