//! Effective-source resolution and version-rule resolution.
//!
//! Mirrors `shipper_config::Config`'s layered merge (CLI overrides file
//! overrides defaults): here, a user's own source always outranks a system
//! source at equal priority, and within a group lower `priority` wins.
//!
//! # Example
//!
//! ```
//! use ldf_source::effective_source;
//! use ldf_types::UpstreamSource;
//! # use chrono::Utc;
//! # use uuid::Uuid;
//! # fn source(owner: Option<Uuid>, priority: i32) -> UpstreamSource {
//! #     UpstreamSource {
//! #         id: Uuid::new_v4(), name: "s".into(), url: "https://example.com".into(),
//! #         component_ids: vec![], retrieval_method: ldf_types::RetrievalMethod::Release,
//! #         url_template: None, priority, enabled: true, is_system: owner.is_none(),
//! #         owner_id: owner, forge_type: ldf_types::ForgeType::Generic,
//! #         version_filter: String::new(), created_at: Utc::now(), updated_at: Utc::now(),
//! #     }
//! # }
//! let user_id = Uuid::new_v4();
//! let sources = vec![source(None, 0), source(Some(user_id), 0)];
//! let winner = effective_source(&sources, user_id).unwrap();
//! assert_eq!(winner.owner_id, Some(user_id));
//! ```

use ldf_types::{RetrievalMethod, SourceVersion, UpstreamSource, VersionRule};
use ldf_version_cache::VersionCacheStore;
use uuid::Uuid;

/// Sort key: user sources outrank system sources at equal priority, lower
/// `priority` wins within a group. `is_system = false` sorts first.
fn precedence_key(source: &UpstreamSource) -> (bool, i32) {
    (source.is_system, source.priority)
}

/// Returns the highest-precedence enabled source owned by `user_id` or
/// shared as a system source, or `None` if none are enabled.
pub fn effective_source(sources: &[UpstreamSource], user_id: Uuid) -> Option<&UpstreamSource> {
    sources
        .iter()
        .filter(|s| s.enabled && (s.is_system || s.owner_id == Some(user_id)))
        .min_by_key(|s| precedence_key(s))
}

/// Returns every source visible to `user_id` (their own plus all system
/// sources), sorted ascending by `(is_system, priority)`.
pub fn merged_sources(sources: &[UpstreamSource], user_id: Uuid) -> Vec<&UpstreamSource> {
    let mut visible: Vec<&UpstreamSource> = sources
        .iter()
        .filter(|s| s.is_system || s.owner_id == Some(user_id))
        .collect();
    visible.sort_by_key(|s| precedence_key(s));
    visible
}

/// Resolves a component's configured [`VersionRule`] against its effective
/// source, looking up cached versions as needed.
pub async fn resolve_version(
    store: &VersionCacheStore,
    rule: VersionRule,
    pinned_version: Option<&str>,
    effective_source: Option<&UpstreamSource>,
    retrieval_method: RetrievalMethod,
) -> anyhow::Result<Option<SourceVersion>> {
    match rule {
        VersionRule::Pinned => Ok(pinned_version.map(|v| SourceVersion {
            source_id: effective_source.map(|s| s.id).unwrap_or_default(),
            source_type: retrieval_method,
            version: v.to_string(),
            version_type: ldf_types::SourceVersionType::Stable,
            release_date: None,
            download_url: String::new(),
            checksum: None,
            checksum_type: None,
            file_size: None,
            is_stable: true,
            discovered_at: chrono::Utc::now(),
        })),
        VersionRule::LatestStable => match effective_source {
            Some(source) => store.get_latest_stable(source.id, retrieval_method).await,
            None => Ok(None),
        },
        VersionRule::LatestLts => match effective_source {
            Some(source) => store.get_latest_longterm(source.id, retrieval_method).await,
            None => Ok(None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn source(owner: Option<Uuid>, priority: i32, enabled: bool) -> UpstreamSource {
        UpstreamSource {
            id: Uuid::new_v4(),
            name: "s".into(),
            url: "https://example.com".into(),
            component_ids: vec![],
            retrieval_method: RetrievalMethod::Release,
            url_template: None,
            priority,
            enabled,
            is_system: owner.is_none(),
            owner_id: owner,
            forge_type: ldf_types::ForgeType::Generic,
            version_filter: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn user_source_outranks_system_at_equal_priority() {
        let user_id = Uuid::new_v4();
        let sources = vec![source(None, 0, true), source(Some(user_id), 0, true)];
        let winner = effective_source(&sources, user_id).unwrap();
        assert_eq!(winner.owner_id, Some(user_id));
    }

    #[test]
    fn lower_priority_wins_within_group() {
        let sources = vec![source(None, 5, true), source(None, 1, true)];
        let winner = effective_source(&sources, Uuid::new_v4()).unwrap();
        assert_eq!(winner.priority, 1);
    }

    #[test]
    fn disabled_sources_are_never_selected() {
        let user_id = Uuid::new_v4();
        let sources = vec![source(Some(user_id), 0, false)];
        assert!(effective_source(&sources, user_id).is_none());
    }

    #[test]
    fn no_enabled_source_means_empty_result() {
        let sources: Vec<UpstreamSource> = vec![];
        assert!(effective_source(&sources, Uuid::new_v4()).is_none());
    }

    #[test]
    fn other_users_sources_are_invisible() {
        let owner = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let sources = vec![source(Some(owner), 0, true)];
        assert!(effective_source(&sources, viewer).is_none());
    }

    #[test]
    fn merged_sources_sorted_ascending_by_system_then_priority() {
        let user_id = Uuid::new_v4();
        let sources = vec![
            source(None, 5, true),
            source(Some(user_id), 0, true),
            source(None, 1, true),
        ];
        let merged = merged_sources(&sources, user_id);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].owner_id, Some(user_id));
        assert_eq!(merged[1].priority, 1);
        assert_eq!(merged[2].priority, 5);
    }
}
