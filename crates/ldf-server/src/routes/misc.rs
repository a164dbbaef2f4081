//! Endpoints that don't fit one resource: health, identity, mirrors, filter
//! preview, and the destructive admin reset.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::routing::get;
use axum::{Json, Router};
use ldf_access::{require_root, require_write};
use ldf_filter::{FilteredVersion, VersionFilter};
use ldf_types::{LdfError, MirrorConfig};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities;
use crate::error::ApiResult;
use crate::middleware::require_claims;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/me", get(me))
        .route("/v1/mirrors", get(list_mirrors).post(create_mirror))
        .route("/v1/mirrors/{id}", axum::routing::delete(delete_mirror))
        .route("/v1/filters/preview", axum::routing::post(preview_filter))
        .route("/v1/admin/reset", axum::routing::post(admin_reset))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
    storage: bool,
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let storage = state.storage.ping().await.is_ok();
    let status = if database && storage { "ok" } else { "degraded" };
    Json(HealthResponse { status, database, storage })
}

#[derive(Serialize)]
struct MeResponse {
    user_id: Uuid,
    user_name: String,
    role: ldf_types::Role,
}

async fn me(request: Request) -> ApiResult<Json<MeResponse>> {
    let claims = require_claims(&request)?;
    Ok(Json(MeResponse {
        user_id: claims.user_id,
        user_name: claims.user_name,
        role: claims.role,
    }))
}

#[derive(Serialize)]
struct MirrorList {
    count: usize,
    mirrors: Vec<MirrorConfig>,
}

async fn list_mirrors(State(state): State<Arc<AppState>>) -> ApiResult<Json<MirrorList>> {
    let mirrors = entities::list_mirrors(&state.pool).await?;
    Ok(Json(MirrorList { count: mirrors.len(), mirrors }))
}

#[derive(Deserialize)]
struct CreateMirror {
    url_prefix: String,
    mirror_url: String,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_true")]
    enabled: bool,
}

fn default_true() -> bool {
    true
}

async fn create_mirror(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ApiResult<(axum::http::StatusCode, Json<MirrorConfig>)> {
    let claims = require_claims(&request)?;
    require_write(&claims)?;

    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| anyhow::anyhow!(err))?;
    let body: CreateMirror = serde_json::from_slice(&bytes)
        .map_err(|err| LdfError::validation(format!("invalid request body: {err}")))?;

    let mirror = MirrorConfig {
        id: Uuid::new_v4(),
        url_prefix: body.url_prefix,
        mirror_url: body.mirror_url,
        priority: body.priority,
        enabled: body.enabled,
    };

    entities::insert_mirror(&state.pool, &mirror).await?;
    Ok((axum::http::StatusCode::CREATED, Json(mirror)))
}

async fn delete_mirror(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<axum::http::StatusCode> {
    let claims = require_claims(&request)?;
    require_write(&claims)?;
    entities::delete_mirror(&state.pool, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct PreviewRequest {
    filter: String,
    versions: Vec<String>,
}

#[derive(Serialize)]
struct PreviewResponse {
    is_identity: bool,
    results: Vec<FilteredVersion>,
}

async fn preview_filter(request: Request) -> ApiResult<Json<PreviewResponse>> {
    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| anyhow::anyhow!(err))?;
    let body: PreviewRequest = serde_json::from_slice(&bytes)
        .map_err(|err| LdfError::validation(format!("invalid request body: {err}")))?;

    let filter = VersionFilter::parse(&body.filter);
    let results = filter.filter_with_reasons(&body.versions);

    Ok(Json(PreviewResponse {
        is_identity: filter.is_identity(),
        results,
    }))
}

#[derive(Deserialize)]
struct ResetRequest {
    confirm: String,
}

async fn admin_reset(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ApiResult<axum::http::StatusCode> {
    let claims = require_claims(&request)?;
    require_root(&claims)?;

    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| anyhow::anyhow!(err))?;
    let body: ResetRequest = serde_json::from_slice(&bytes)
        .map_err(|err| LdfError::validation(format!("invalid request body: {err}")))?;
    if body.confirm != "RESET_DATABASE" {
        return Err(LdfError::validation("confirm must equal \"RESET_DATABASE\"").into());
    }

    let mut tx = state.pool.begin().await.map_err(anyhow::Error::from)?;
    for table in [
        "distribution_logs",
        "download_jobs",
        "source_versions",
        "version_sync_jobs",
        "mirror_configs",
        "upstream_sources",
        "components",
        "distributions",
        "audit_events",
        "settings",
    ] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await
            .map_err(anyhow::Error::from)?;
    }
    tx.commit().await.map_err(anyhow::Error::from)?;

    Ok(axum::http::StatusCode::NO_CONTENT)
}
