//! Plain `sqlx` CRUD for the entities that have no dyn-safe trait boundary
//! of their own (distributions, components, upstream sources, mirrors,
//! users, settings) — unlike `JobRepo`/`AuditSink`, nothing lower in the
//! workspace needs to swap these out behind a trait object, so routes call
//! straight through to these functions against `AppState::pool`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ldf_types::{
    Component, Distribution, DistributionStatus, ForgeType, MirrorConfig, RetrievalMethod, Role,
    Setting, UpstreamSource, User, Visibility,
};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{role_from_str, role_str};

fn status_str(status: DistributionStatus) -> &'static str {
    match status {
        DistributionStatus::Pending => "pending",
        DistributionStatus::Downloading => "downloading",
        DistributionStatus::Validating => "validating",
        DistributionStatus::Ready => "ready",
        DistributionStatus::Failed => "failed",
        DistributionStatus::Deleted => "deleted",
    }
}

fn status_from_str(s: &str) -> Result<DistributionStatus> {
    Ok(match s {
        "pending" => DistributionStatus::Pending,
        "downloading" => DistributionStatus::Downloading,
        "validating" => DistributionStatus::Validating,
        "ready" => DistributionStatus::Ready,
        "failed" => DistributionStatus::Failed,
        "deleted" => DistributionStatus::Deleted,
        other => anyhow::bail!("unknown distribution status {other}"),
    })
}

fn visibility_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Public => "public",
        Visibility::Private => "private",
    }
}

fn visibility_from_str(s: &str) -> Result<Visibility> {
    Ok(match s {
        "public" => Visibility::Public,
        "private" => Visibility::Private,
        other => anyhow::bail!("unknown visibility {other}"),
    })
}

fn retrieval_method_str(m: RetrievalMethod) -> &'static str {
    match m {
        RetrievalMethod::Release => "release",
        RetrievalMethod::Git => "git",
        RetrievalMethod::Directory => "directory",
    }
}

fn retrieval_method_from_str(s: &str) -> Result<RetrievalMethod> {
    Ok(match s {
        "release" => RetrievalMethod::Release,
        "git" => RetrievalMethod::Git,
        "directory" => RetrievalMethod::Directory,
        other => anyhow::bail!("unknown retrieval method {other}"),
    })
}

fn forge_type_str(t: ForgeType) -> &'static str {
    match t {
        ForgeType::GitHub => "github",
        ForgeType::GitLab => "gitlab",
        ForgeType::Gitea => "gitea",
        ForgeType::Codeberg => "codeberg",
        ForgeType::Forgejo => "forgejo",
        ForgeType::Generic => "generic",
    }
}

fn forge_type_from_str(s: &str) -> Result<ForgeType> {
    Ok(match s {
        "github" => ForgeType::GitHub,
        "gitlab" => ForgeType::GitLab,
        "gitea" => ForgeType::Gitea,
        "codeberg" => ForgeType::Codeberg,
        "forgejo" => ForgeType::Forgejo,
        "generic" => ForgeType::Generic,
        other => anyhow::bail!("unknown forge type {other}"),
    })
}

fn version_rule_str(rule: ldf_types::VersionRule) -> &'static str {
    match rule {
        ldf_types::VersionRule::Pinned => "pinned",
        ldf_types::VersionRule::LatestStable => "latest-stable",
        ldf_types::VersionRule::LatestLts => "latest-lts",
    }
}

fn version_rule_from_str(s: &str) -> Result<ldf_types::VersionRule> {
    Ok(match s {
        "pinned" => ldf_types::VersionRule::Pinned,
        "latest-stable" => ldf_types::VersionRule::LatestStable,
        "latest-lts" => ldf_types::VersionRule::LatestLts,
        other => anyhow::bail!("unknown version rule {other}"),
    })
}

fn parse_uuid_list(raw: &str) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = serde_json::from_str(raw).context("parse uuid list json")?;
    ids.iter().map(|s| s.parse().context("parse uuid")).collect()
}

fn dump_uuid_list(ids: &[Uuid]) -> String {
    serde_json::to_string(&ids.iter().map(Uuid::to_string).collect::<Vec<_>>()).unwrap_or_default()
}

// ---- distributions ----

#[derive(sqlx::FromRow)]
struct DistributionRow {
    id: String,
    name: String,
    version: String,
    status: String,
    visibility: String,
    config: String,
    source_url: Option<String>,
    checksum: Option<String>,
    size_bytes: i64,
    owner_id: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DistributionRow> for Distribution {
    type Error = anyhow::Error;

    fn try_from(row: DistributionRow) -> Result<Self> {
        Ok(Distribution {
            id: row.id.parse().context("distributions.id")?,
            name: row.name,
            version: row.version,
            status: status_from_str(&row.status)?,
            visibility: visibility_from_str(&row.visibility)?,
            config: serde_json::from_str(&row.config).context("distributions.config")?,
            source_url: row.source_url,
            checksum: row.checksum,
            size_bytes: row.size_bytes,
            owner_id: row.owner_id.map(|s| s.parse()).transpose().context("distributions.owner_id")?,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn list_distributions(pool: &SqlitePool) -> Result<Vec<Distribution>> {
    let rows: Vec<DistributionRow> =
        sqlx::query_as("SELECT * FROM distributions WHERE status != 'deleted' ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
            .context("list distributions")?;
    rows.into_iter().map(TryFrom::try_from).collect()
}

pub async fn get_distribution(pool: &SqlitePool, id: Uuid) -> Result<Option<Distribution>> {
    let row: Option<DistributionRow> = sqlx::query_as("SELECT * FROM distributions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .context("get distribution")?;
    row.map(TryFrom::try_from).transpose()
}

pub async fn insert_distribution(pool: &SqlitePool, dist: &Distribution) -> Result<()> {
    sqlx::query(
        "INSERT INTO distributions
            (id, name, version, status, visibility, config, source_url, checksum, size_bytes,
             owner_id, error_message, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(dist.id.to_string())
    .bind(&dist.name)
    .bind(&dist.version)
    .bind(status_str(dist.status))
    .bind(visibility_str(dist.visibility))
    .bind(dist.config.to_string())
    .bind(&dist.source_url)
    .bind(&dist.checksum)
    .bind(dist.size_bytes)
    .bind(dist.owner_id.map(|id| id.to_string()))
    .bind(&dist.error_message)
    .bind(dist.created_at)
    .bind(dist.updated_at)
    .execute(pool)
    .await
    .context("insert distribution")?;
    Ok(())
}

pub async fn save_distribution(pool: &SqlitePool, dist: &Distribution) -> Result<()> {
    sqlx::query(
        "UPDATE distributions SET name = ?, version = ?, status = ?, visibility = ?, config = ?,
            source_url = ?, checksum = ?, size_bytes = ?, error_message = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&dist.name)
    .bind(&dist.version)
    .bind(status_str(dist.status))
    .bind(visibility_str(dist.visibility))
    .bind(dist.config.to_string())
    .bind(&dist.source_url)
    .bind(&dist.checksum)
    .bind(dist.size_bytes)
    .bind(&dist.error_message)
    .bind(dist.updated_at)
    .bind(dist.id.to_string())
    .execute(pool)
    .await
    .context("save distribution")?;
    Ok(())
}

// ---- components ----

#[derive(sqlx::FromRow)]
struct ComponentRow {
    id: String,
    name: String,
    category: String,
    categories: String,
    display_name: String,
    description: Option<String>,
    artifact_pattern: Option<String>,
    default_url_template: Option<String>,
    github_normalized_template: Option<String>,
    is_optional: bool,
    is_system: bool,
    owner_id: Option<String>,
    default_version: Option<String>,
    default_version_rule: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ComponentRow> for Component {
    type Error = anyhow::Error;

    fn try_from(row: ComponentRow) -> Result<Self> {
        Ok(Component {
            id: row.id.parse().context("components.id")?,
            name: row.name,
            category: row.category,
            categories: serde_json::from_str(&row.categories).context("components.categories")?,
            display_name: row.display_name,
            description: row.description,
            artifact_pattern: row.artifact_pattern,
            default_url_template: row.default_url_template,
            github_normalized_template: row.github_normalized_template,
            is_optional: row.is_optional,
            is_system: row.is_system,
            owner_id: row.owner_id.map(|s| s.parse()).transpose().context("components.owner_id")?,
            default_version: row.default_version,
            default_version_rule: version_rule_from_str(&row.default_version_rule)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn list_components(pool: &SqlitePool) -> Result<Vec<Component>> {
    let rows: Vec<ComponentRow> = sqlx::query_as("SELECT * FROM components ORDER BY name")
        .fetch_all(pool)
        .await
        .context("list components")?;
    rows.into_iter().map(TryFrom::try_from).collect()
}

pub async fn get_component(pool: &SqlitePool, id: Uuid) -> Result<Option<Component>> {
    let row: Option<ComponentRow> = sqlx::query_as("SELECT * FROM components WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .context("get component")?;
    row.map(TryFrom::try_from).transpose()
}

pub async fn insert_component(pool: &SqlitePool, c: &Component) -> Result<()> {
    sqlx::query(
        "INSERT INTO components
            (id, name, category, categories, display_name, description, artifact_pattern,
             default_url_template, github_normalized_template, is_optional, is_system, owner_id,
             default_version, default_version_rule, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(c.id.to_string())
    .bind(&c.name)
    .bind(&c.category)
    .bind(serde_json::to_string(&c.categories).unwrap_or_default())
    .bind(&c.display_name)
    .bind(&c.description)
    .bind(&c.artifact_pattern)
    .bind(&c.default_url_template)
    .bind(&c.github_normalized_template)
    .bind(c.is_optional)
    .bind(c.is_system)
    .bind(c.owner_id.map(|id| id.to_string()))
    .bind(&c.default_version)
    .bind(version_rule_str(c.default_version_rule))
    .bind(c.created_at)
    .bind(c.updated_at)
    .execute(pool)
    .await
    .context("insert component")?;
    Ok(())
}

pub async fn delete_component(pool: &SqlitePool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM components WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await
        .context("delete component")?;
    Ok(result.rows_affected())
}

// ---- upstream sources ----

#[derive(sqlx::FromRow)]
struct UpstreamSourceRow {
    id: String,
    name: String,
    url: String,
    component_ids: String,
    retrieval_method: String,
    url_template: Option<String>,
    priority: i32,
    enabled: bool,
    is_system: bool,
    owner_id: Option<String>,
    forge_type: String,
    version_filter: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UpstreamSourceRow> for UpstreamSource {
    type Error = anyhow::Error;

    fn try_from(row: UpstreamSourceRow) -> Result<Self> {
        Ok(UpstreamSource {
            id: row.id.parse().context("upstream_sources.id")?,
            name: row.name,
            url: row.url,
            component_ids: parse_uuid_list(&row.component_ids)?,
            retrieval_method: retrieval_method_from_str(&row.retrieval_method)?,
            url_template: row.url_template,
            priority: row.priority,
            enabled: row.enabled,
            is_system: row.is_system,
            owner_id: row.owner_id.map(|s| s.parse()).transpose().context("upstream_sources.owner_id")?,
            forge_type: forge_type_from_str(&row.forge_type)?,
            version_filter: row.version_filter,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn list_sources(pool: &SqlitePool) -> Result<Vec<UpstreamSource>> {
    let rows: Vec<UpstreamSourceRow> =
        sqlx::query_as("SELECT * FROM upstream_sources ORDER BY is_system, priority")
            .fetch_all(pool)
            .await
            .context("list upstream sources")?;
    rows.into_iter().map(TryFrom::try_from).collect()
}

pub async fn get_source(pool: &SqlitePool, id: Uuid) -> Result<Option<UpstreamSource>> {
    let row: Option<UpstreamSourceRow> = sqlx::query_as("SELECT * FROM upstream_sources WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .context("get upstream source")?;
    row.map(TryFrom::try_from).transpose()
}

pub async fn insert_source(pool: &SqlitePool, s: &UpstreamSource) -> Result<()> {
    sqlx::query(
        "INSERT INTO upstream_sources
            (id, name, url, component_ids, retrieval_method, url_template, priority, enabled,
             is_system, owner_id, forge_type, version_filter, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(s.id.to_string())
    .bind(&s.name)
    .bind(&s.url)
    .bind(dump_uuid_list(&s.component_ids))
    .bind(retrieval_method_str(s.retrieval_method))
    .bind(&s.url_template)
    .bind(s.priority)
    .bind(s.enabled)
    .bind(s.is_system)
    .bind(s.owner_id.map(|id| id.to_string()))
    .bind(forge_type_str(s.forge_type))
    .bind(&s.version_filter)
    .bind(s.created_at)
    .bind(s.updated_at)
    .execute(pool)
    .await
    .context("insert upstream source")?;
    Ok(())
}

pub async fn delete_source(pool: &SqlitePool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM upstream_sources WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await
        .context("delete upstream source")?;
    Ok(result.rows_affected())
}

// ---- mirror configs ----

#[derive(sqlx::FromRow)]
struct MirrorConfigRow {
    id: String,
    url_prefix: String,
    mirror_url: String,
    priority: i32,
    enabled: bool,
}

impl TryFrom<MirrorConfigRow> for MirrorConfig {
    type Error = anyhow::Error;

    fn try_from(row: MirrorConfigRow) -> Result<Self> {
        Ok(MirrorConfig {
            id: row.id.parse().context("mirror_configs.id")?,
            url_prefix: row.url_prefix,
            mirror_url: row.mirror_url,
            priority: row.priority,
            enabled: row.enabled,
        })
    }
}

pub async fn list_mirrors(pool: &SqlitePool) -> Result<Vec<MirrorConfig>> {
    let rows: Vec<MirrorConfigRow> = sqlx::query_as("SELECT * FROM mirror_configs ORDER BY priority DESC")
        .fetch_all(pool)
        .await
        .context("list mirror configs")?;
    rows.into_iter().map(TryFrom::try_from).collect()
}

pub async fn insert_mirror(pool: &SqlitePool, m: &MirrorConfig) -> Result<()> {
    sqlx::query(
        "INSERT INTO mirror_configs (id, url_prefix, mirror_url, priority, enabled) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(m.id.to_string())
    .bind(&m.url_prefix)
    .bind(&m.mirror_url)
    .bind(m.priority)
    .bind(m.enabled)
    .execute(pool)
    .await
    .context("insert mirror config")?;
    Ok(())
}

pub async fn delete_mirror(pool: &SqlitePool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM mirror_configs WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await
        .context("delete mirror config")?;
    Ok(result.rows_affected())
}

// ---- users ----

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id.parse().context("users.id")?,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: role_from_str(&row.role)?,
            created_at: row.created_at,
        })
    }
}

pub async fn get_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT id, name, email, password_hash, role, created_at FROM users WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .context("get user")?;
    row.map(TryFrom::try_from).transpose()
}

pub async fn insert_user(pool: &SqlitePool, user: &User, token: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, token, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id.to_string())
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(role_str(user.role))
    .bind(token)
    .bind(user.created_at)
    .execute(pool)
    .await
    .context("insert user")?;
    Ok(())
}

// ---- settings ----

pub async fn get_raw_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("get setting")?;
    Ok(row.map(|(v,)| v))
}

pub async fn list_raw_settings(pool: &SqlitePool) -> Result<Vec<Setting>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
        .fetch_all(pool)
        .await
        .context("list settings")?;
    Ok(rows.into_iter().map(|(key, string_value)| Setting { key, string_value }).collect())
}

pub async fn upsert_raw_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .context("upsert setting")?;
    Ok(())
}
