//! `/v1/sources` — upstream source configuration and version discovery.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::routing::get;
use axum::{Json, Router};
use ldf_access::require_write;
use ldf_core::{run_sync, SyncOutcome};
use ldf_types::{ForgeType, LdfError, RetrievalMethod, SourceVersion, SourceVersionType, UpstreamSource};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities;
use crate::error::ApiResult;
use crate::middleware::require_claims;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/sources", get(list).post(create))
        .route("/v1/sources/{id}", get(get_one).delete(remove))
        .route("/v1/sources/{id}/sync", axum::routing::post(sync))
        .route("/v1/sources/{id}/versions", get(versions))
}

#[derive(Serialize)]
struct SourceList {
    count: usize,
    sources: Vec<UpstreamSource>,
}

async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<SourceList>> {
    let sources = entities::list_sources(&state.pool).await?;
    Ok(Json(SourceList {
        count: sources.len(),
        sources,
    }))
}

async fn get_one(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<UpstreamSource>> {
    let source = entities::get_source(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("source not found"))?;
    Ok(Json(source))
}

#[derive(Deserialize)]
struct CreateSource {
    name: String,
    url: String,
    #[serde(default)]
    component_ids: Vec<Uuid>,
    retrieval_method: RetrievalMethod,
    #[serde(default)]
    url_template: Option<String>,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    forge_type: Option<ForgeType>,
    #[serde(default)]
    version_filter: String,
}

fn default_true() -> bool {
    true
}

async fn create(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ApiResult<(axum::http::StatusCode, Json<UpstreamSource>)> {
    let claims = require_claims(&request)?;
    require_write(&claims)?;

    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| anyhow::anyhow!(err))?;
    let body: CreateSource = serde_json::from_slice(&bytes)
        .map_err(|err| LdfError::validation(format!("invalid request body: {err}")))?;

    if body.name.trim().is_empty() {
        return Err(LdfError::validation("name must not be empty").into());
    }

    let forge_type = match body.forge_type {
        Some(ft) => ft,
        None => state.forges.detect(&body.url).forge_type(),
    };

    let now = chrono::Utc::now();
    let source = UpstreamSource {
        id: Uuid::new_v4(),
        name: body.name,
        url: body.url,
        component_ids: body.component_ids,
        retrieval_method: body.retrieval_method,
        url_template: body.url_template,
        priority: body.priority,
        enabled: body.enabled,
        is_system: false,
        owner_id: Some(claims.user_id),
        forge_type,
        version_filter: body.version_filter,
        created_at: now,
        updated_at: now,
    };

    entities::insert_source(&state.pool, &source).await?;
    Ok((axum::http::StatusCode::CREATED, Json(source)))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<axum::http::StatusCode> {
    let claims = require_claims(&request)?;
    require_write(&claims)?;

    let source = entities::get_source(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("source not found"))?;
    if source.is_system {
        return Err(LdfError::forbidden("system sources cannot be deleted").into());
    }

    entities::delete_source(&state.pool, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SyncRequest {
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
struct SyncAccepted {
    job_id: Uuid,
    status: &'static str,
}

#[derive(Serialize)]
struct SyncSkipped {
    reason: String,
    running_job_id: Option<Uuid>,
}

async fn sync(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<axum::response::Response> {
    use axum::response::IntoResponse;

    let claims = require_claims(&request)?;
    require_write(&claims)?;

    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| anyhow::anyhow!(err))?;
    let body: SyncRequest = if bytes.is_empty() {
        SyncRequest { force: false }
    } else {
        serde_json::from_slice(&bytes).map_err(|err| LdfError::validation(format!("invalid request body: {err}")))?
    };

    let source = entities::get_source(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("source not found"))?;

    let cache_duration_minutes = entities::get_raw_setting(&state.pool, "sync.cache_duration")
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);

    let outcome = run_sync(&state.forges, &state.version_cache, &source, cache_duration_minutes, body.force).await?;

    let response = match outcome {
        SyncOutcome::Completed { .. } | SyncOutcome::Failed(_) => {
            // The job already reached a terminal state synchronously; report
            // its id by re-reading the most recent job for this source.
            let running = state
                .version_cache
                .get_running_sync_job(source.id, source.retrieval_method)
                .await?;
            (
                axum::http::StatusCode::ACCEPTED,
                Json(SyncAccepted {
                    job_id: running.map(|j| j.id).unwrap_or(source.id),
                    status: "completed",
                }),
            )
                .into_response()
        }
        SyncOutcome::Skipped(reason) => {
            let (reason_str, job_id) = match reason {
                ldf_version_cache::SyncSkipReason::AlreadyRunning(job) => ("already_running".to_string(), Some(job.id)),
                ldf_version_cache::SyncSkipReason::WithinCacheWindow => ("within_cache_window".to_string(), None),
            };
            (
                axum::http::StatusCode::CONFLICT,
                Json(SyncSkipped {
                    reason: reason_str,
                    running_job_id: job_id,
                }),
            )
                .into_response()
        }
    };

    Ok(response)
}

#[derive(Deserialize)]
struct VersionsQuery {
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
    #[serde(default)]
    version_type: Option<SourceVersionType>,
}

#[derive(Serialize)]
struct VersionsResponse {
    total: i64,
    versions: Vec<SourceVersion>,
}

async fn versions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<VersionsQuery>,
) -> ApiResult<Json<VersionsResponse>> {
    let source = entities::get_source(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("source not found"))?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);

    let (versions, total) = state
        .version_cache
        .list_paginated(source.id, source.retrieval_method, limit, offset, query.version_type)
        .await?;

    Ok(Json(VersionsResponse { total, versions }))
}
