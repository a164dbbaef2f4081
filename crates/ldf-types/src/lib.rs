//! # Types
//!
//! Core domain types for LDF, including the multi-tenant entity graph, the
//! status/phase enums for distributions, download jobs and sync jobs, and
//! the error taxonomy shared by every other crate in the workspace.
//!
//! This module defines the fundamental data structures used throughout LDF:
//! - [`Distribution`] / [`Component`] / [`UpstreamSource`] — the entities a
//!   tenant declares.
//! - [`SourceVersion`] / [`VersionSyncJob`] — what the forge discovery
//!   subsystem produces and tracks.
//! - [`DownloadJob`] — what the download manager plans and executes.
//! - [`ErrorKind`] — the categorized error taxonomy from which every
//!   HTTP-facing error response and retry decision is derived.
//!
//! ## Serialization
//!
//! All entities implement `Serialize`/`Deserialize` from `serde` for
//! persistence via `sqlx` and for the JSON wire format used by the HTTP API.
//! Timestamps are UTC `DateTime<Utc>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;
pub use error::{ErrorKind, LdfError};

/// Closed set of roles. Capability predicates are the single source of
/// truth for what a role may do; callers should never match on `Role`
/// directly outside this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Operator,
    Admin,
    Root,
}

impl Role {
    /// Can create/modify distributions, sources and components the caller owns.
    pub fn has_write(&self) -> bool {
        matches!(self, Role::Operator | Role::Admin | Role::Root)
    }

    /// Can act on entities owned by other users, manage settings, trigger syncs.
    pub fn has_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Root)
    }

    /// Can reveal sensitive settings and perform destructive maintenance.
    pub fn is_root(&self) -> bool {
        matches!(self, Role::Root)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Pending,
    Downloading,
    Validating,
    Ready,
    Failed,
    Deleted,
}

impl DistributionStatus {
    /// True if `self -> next` is a legal edge in the status DAG
    /// (`pending -> downloading -> validating -> ready`, with `failed`/`deleted`
    /// reachable as sinks from any non-terminal state).
    pub fn can_transition_to(&self, next: DistributionStatus) -> bool {
        use DistributionStatus::*;
        match (self, next) {
            (Pending, Downloading | Failed | Deleted) => true,
            (Downloading, Validating | Failed | Deleted) => true,
            (Validating, Ready | Failed | Deleted) => true,
            (Ready, Deleted) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub status: DistributionStatus,
    pub visibility: Visibility,
    pub config: serde_json::Value,
    pub source_url: Option<String>,
    pub checksum: Option<String>,
    pub size_bytes: i64,
    pub owner_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Distribution {
    pub fn is_readable_by(&self, caller: Option<(Uuid, Role)>) -> bool {
        if self.visibility == Visibility::Public {
            return true;
        }
        match caller {
            Some((id, role)) => Some(id) == self.owner_id || role.has_admin(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionRule {
    Pinned,
    LatestStable,
    LatestLts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub categories: Vec<String>,
    pub display_name: String,
    pub description: Option<String>,
    pub artifact_pattern: Option<String>,
    pub default_url_template: Option<String>,
    pub github_normalized_template: Option<String>,
    pub is_optional: bool,
    pub is_system: bool,
    pub owner_id: Option<Uuid>,
    pub default_version: Option<String>,
    pub default_version_rule: VersionRule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    Release,
    Git,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgeType {
    GitHub,
    GitLab,
    Gitea,
    Codeberg,
    Forgejo,
    Generic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSource {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub component_ids: Vec<Uuid>,
    pub retrieval_method: RetrievalMethod,
    pub url_template: Option<String>,
    /// Lower value = higher precedence.
    pub priority: i32,
    pub enabled: bool,
    pub is_system: bool,
    pub owner_id: Option<Uuid>,
    pub forge_type: ForgeType,
    pub version_filter: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceVersionType {
    Stable,
    Longterm,
    Mainline,
    LinuxNext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVersion {
    pub source_id: Uuid,
    pub source_type: RetrievalMethod,
    pub version: String,
    pub version_type: SourceVersionType,
    pub release_date: Option<DateTime<Utc>>,
    pub download_url: String,
    pub checksum: Option<String>,
    pub checksum_type: Option<String>,
    pub file_size: Option<i64>,
    pub is_stable: bool,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSyncJob {
    pub id: Uuid,
    pub source_id: Uuid,
    pub source_type: RetrievalMethod,
    pub status: SyncJobStatus,
    pub versions_found: i64,
    pub versions_new: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadJobStatus {
    Pending,
    Verifying,
    Downloading,
    Complete,
    Failed,
    Cancelled,
}

impl DownloadJobStatus {
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            DownloadJobStatus::Pending | DownloadJobStatus::Verifying | DownloadJobStatus::Downloading
        )
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, DownloadJobStatus::Failed | DownloadJobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadJob {
    pub id: Uuid,
    pub distribution_id: Uuid,
    pub component_id: Uuid,
    pub source_id: Uuid,
    pub source_name: String,
    /// Union of every component that requires this exact `(source_id, version)` artifact.
    pub component_ids: Vec<Uuid>,
    pub version: String,
    pub url: String,
    pub status: DownloadJobStatus,
    pub progress_bytes: i64,
    pub total_bytes: i64,
    pub checksum: Option<String>,
    pub checksum_type: Option<String>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DownloadJob {
    /// Percentage complete, 0 when `total_bytes` is unknown.
    pub fn progress_percent(&self) -> f64 {
        if self.total_bytes > 0 {
            100.0 * (self.progress_bytes as f64) / (self.total_bytes as f64)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub id: Uuid,
    pub url_prefix: String,
    pub mirror_url: String,
    pub priority: i32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    String,
    Int,
    Bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingMeta {
    pub key: &'static str,
    pub ty: SettingType,
    pub description: &'static str,
    pub reboot_required: bool,
    pub category: &'static str,
    pub sensitive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub string_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: String,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub resource: String,
    pub client_ip: Option<String>,
    pub detail: Option<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionLogEntry {
    pub id: Uuid,
    pub distribution_id: Uuid,
    pub level: LogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_dag_forward_only() {
        use DistributionStatus::*;
        assert!(Pending.can_transition_to(Downloading));
        assert!(Downloading.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Pending));
        assert!(!Downloading.can_transition_to(Pending));
    }

    #[test]
    fn status_dag_sinks_from_anywhere_non_terminal() {
        use DistributionStatus::*;
        assert!(Pending.can_transition_to(Failed));
        assert!(Downloading.can_transition_to(Deleted));
        assert!(Validating.can_transition_to(Failed));
        assert!(Ready.can_transition_to(Deleted));
        assert!(!Failed.can_transition_to(Ready));
        assert!(!Deleted.can_transition_to(Ready));
    }

    #[test]
    fn role_capabilities() {
        assert!(!Role::Viewer.has_write());
        assert!(Role::Operator.has_write());
        assert!(!Role::Operator.has_admin());
        assert!(Role::Admin.has_admin());
        assert!(!Role::Admin.is_root());
        assert!(Role::Root.is_root());
    }

    #[test]
    fn distribution_visibility() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut dist = Distribution {
            id: Uuid::new_v4(),
            name: "test".into(),
            version: "1.0".into(),
            status: DistributionStatus::Ready,
            visibility: Visibility::Private,
            config: serde_json::json!({}),
            source_url: None,
            checksum: None,
            size_bytes: 0,
            owner_id: Some(owner),
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(dist.is_readable_by(Some((owner, Role::Viewer))));
        assert!(!dist.is_readable_by(Some((other, Role::Viewer))));
        assert!(dist.is_readable_by(Some((other, Role::Admin))));
        assert!(!dist.is_readable_by(None));

        dist.visibility = Visibility::Public;
        assert!(dist.is_readable_by(None));
        assert!(dist.is_readable_by(Some((other, Role::Viewer))));
    }

    #[test]
    fn download_job_progress_percent() {
        let mut job = DownloadJob {
            id: Uuid::new_v4(),
            distribution_id: Uuid::new_v4(),
            component_id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            source_name: "linux".into(),
            component_ids: vec![],
            version: "6.12".into(),
            url: "https://example.com".into(),
            status: DownloadJobStatus::Downloading,
            progress_bytes: 0,
            total_bytes: 0,
            checksum: None,
            checksum_type: None,
            error_message: None,
            attempts: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(job.progress_percent(), 0.0);
        job.total_bytes = 200;
        job.progress_bytes = 50;
        assert_eq!(job.progress_percent(), 25.0);
    }

    #[test]
    fn download_job_status_predicates() {
        assert!(DownloadJobStatus::Pending.is_cancellable());
        assert!(DownloadJobStatus::Verifying.is_cancellable());
        assert!(DownloadJobStatus::Downloading.is_cancellable());
        assert!(!DownloadJobStatus::Complete.is_cancellable());
        assert!(DownloadJobStatus::Failed.is_retriable());
        assert!(DownloadJobStatus::Cancelled.is_retriable());
        assert!(!DownloadJobStatus::Pending.is_retriable());
    }
}
