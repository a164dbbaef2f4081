//! `/v1/distributions/:id/downloads` and `/v1/distributions/:id/artifacts`
//! — download job planning/lifecycle and object storage access.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, Request, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use ldf_access::{guard_write_distribution, require_write};
use ldf_core::plan_distribution_downloads;
use ldf_download::{cancel_job, retry_job, JobRepo};
use ldf_storage::distribution_key;
use ldf_types::{DownloadJob, LdfError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities;
use crate::error::ApiResult;
use crate::middleware::require_claims;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/v1/distributions/{id}/downloads",
            get(list).post(plan).delete(flush),
        )
        .route("/v1/downloads/{id}/cancel", post(cancel))
        .route("/v1/downloads/{id}/retry", post(retry))
        .route("/v1/distributions/{id}/artifacts", post(upload))
        .route("/v1/distributions/{id}/artifacts/presign", get(presign))
}

#[derive(Serialize)]
struct JobList {
    count: usize,
    jobs: Vec<DownloadJob>,
}

async fn list(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<JobList>> {
    let jobs = state.job_repo.list_by_distribution(id).await?;
    Ok(Json(JobList { count: jobs.len(), jobs }))
}

#[derive(Serialize)]
struct PlanResponse {
    created: usize,
    jobs: Vec<DownloadJob>,
    unresolved: Vec<UnresolvedComponentBody>,
}

#[derive(Serialize)]
struct UnresolvedComponentBody {
    component_id: Uuid,
    reason: String,
}

async fn plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<Json<PlanResponse>> {
    let claims = require_claims(&request)?;
    let distribution = entities::get_distribution(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("distribution not found"))?;
    guard_write_distribution(&distribution, &claims)?;

    // Holds the distribution's write lock for the read-diff-insert sequence
    // below so two concurrent plan calls can't both diff against the same
    // existing-jobs snapshot and double-insert.
    let lock = state.distribution_lock(id);
    let _guard = lock.lock().await;

    let all_components = entities::list_components(&state.pool).await?;
    let component_ids: Vec<Uuid> = distribution_component_ids(&distribution);
    let components: Vec<_> = all_components
        .into_iter()
        .filter(|c| component_ids.is_empty() || component_ids.contains(&c.id))
        .collect();

    let sources = entities::list_sources(&state.pool).await?;
    let mirrors = entities::list_mirrors(&state.pool).await?;
    let existing_jobs = state.job_repo.list_by_distribution(id).await?;

    let owner_id = distribution.owner_id.unwrap_or(claims.user_id);
    let result = plan_distribution_downloads(
        &state.version_cache,
        id,
        owner_id,
        &components,
        &sources,
        &mirrors,
        &existing_jobs,
    )
    .await?;

    let existing_ids: std::collections::HashSet<Uuid> = existing_jobs.iter().map(|j| j.id).collect();
    let mut created = 0usize;
    for job in &result.jobs {
        if !existing_ids.contains(&job.id) {
            state.job_repo.insert(job).await?;
            created += 1;
        }
    }

    Ok(Json(PlanResponse {
        created,
        jobs: result.jobs,
        unresolved: result
            .unresolved
            .into_iter()
            .map(|u| UnresolvedComponentBody {
                component_id: u.component_id,
                reason: u.reason,
            })
            .collect(),
    }))
}

/// The distribution's `config` JSON may carry a `component_ids` array
/// narrowing which components apply; an absent or malformed array means
/// "all components".
fn distribution_component_ids(distribution: &ldf_types::Distribution) -> Vec<Uuid> {
    distribution
        .config
        .get("component_ids")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| s.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct FlushRequest {
    confirm: String,
}

async fn flush(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<axum::http::StatusCode> {
    let claims = require_claims(&request)?;
    let distribution = entities::get_distribution(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("distribution not found"))?;
    guard_write_distribution(&distribution, &claims)?;

    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| anyhow::anyhow!(err))?;
    let body: FlushRequest = serde_json::from_slice(&bytes)
        .map_err(|err| LdfError::validation(format!("invalid request body: {err}")))?;
    if body.confirm != "FLUSH_DOWNLOADS" {
        return Err(LdfError::validation("confirm must equal \"FLUSH_DOWNLOADS\"").into());
    }

    let lock = state.distribution_lock(id);
    let _guard = lock.lock().await;
    state.job_repo.delete_by_distribution(id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<Json<DownloadJob>> {
    let claims = require_claims(&request)?;
    require_write(&claims)?;

    let mut job = state
        .job_repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| LdfError::not_found("download job not found"))?;

    cancel_job(&mut job).map_err(LdfError::conflict)?;
    state.cancellations.cancel(id);
    state.job_repo.save(&job).await?;
    Ok(Json(job))
}

async fn retry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<Json<DownloadJob>> {
    let claims = require_claims(&request)?;
    require_write(&claims)?;

    let mut job = state
        .job_repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| LdfError::not_found("download job not found"))?;

    retry_job(&mut job).map_err(LdfError::conflict)?;
    state.job_repo.save(&job).await?;
    Ok(Json(job))
}

#[derive(Serialize)]
struct UploadResponse {
    key: String,
    size_bytes: usize,
}

async fn upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let distribution = entities::get_distribution(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("distribution not found"))?;
    let owner_id = distribution
        .owner_id
        .ok_or_else(|| LdfError::validation("distribution has no owner"))?;

    let mut file_bytes: Option<bytes::Bytes> = None;
    let mut path = "artifact.bin".to_string();
    let mut content_type = "application/octet-stream".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| LdfError::validation(format!("invalid multipart body: {err}")))?
    {
        match field.name() {
            Some("path") => {
                path = field
                    .text()
                    .await
                    .map_err(|err| LdfError::validation(err.to_string()))?;
            }
            Some("file") => {
                if let Some(ct) = field.content_type() {
                    content_type = ct.to_string();
                }
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|err| LdfError::validation(err.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let data = file_bytes.ok_or_else(|| LdfError::validation("missing \"file\" part"))?;
    let key = distribution_key(&owner_id.to_string(), &id.to_string(), &path);
    let size_bytes = data.len();
    state.storage.upload_bytes(&key, data.to_vec(), &content_type).await?;

    Ok(Json(UploadResponse { key, size_bytes }))
}

#[derive(Deserialize)]
struct PresignQuery {
    path: String,
    #[serde(default = "default_expiry")]
    expiry: u64,
}

fn default_expiry() -> u64 {
    3600
}

#[derive(Serialize)]
struct PresignResponse {
    url: String,
    web_url: Option<String>,
    expires_at: chrono::DateTime<chrono::Utc>,
}

async fn presign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PresignQuery>,
) -> ApiResult<Json<PresignResponse>> {
    let distribution = entities::get_distribution(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("distribution not found"))?;
    let owner_id = distribution
        .owner_id
        .ok_or_else(|| LdfError::validation("distribution has no owner"))?;

    let key = distribution_key(&owner_id.to_string(), &id.to_string(), &query.path);
    let url = state.storage.get_presigned_url(&key, query.expiry).await?;
    let web_url = state.storage.get_web_url(&key);

    Ok(Json(PresignResponse {
        url,
        web_url,
        expires_at: chrono::Utc::now() + chrono::Duration::seconds(query.expiry as i64),
    }))
}
