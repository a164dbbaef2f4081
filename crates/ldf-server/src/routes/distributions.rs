//! `/v1/distributions` — the tenant's build targets.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::routing::get;
use axum::{Json, Router};
use ldf_access::{guard_read_distribution, guard_write_distribution, require_write};
use ldf_access::TokenClaims;
use ldf_audit::build_event;
use ldf_types::{Distribution, DistributionStatus, LdfError, Visibility};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities;
use crate::error::{ApiError, ApiResult};
use crate::middleware::require_claims;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/distributions", get(list).post(create))
        .route(
            "/v1/distributions/{id}",
            get(get_one).patch(update).delete(remove),
        )
        .route("/v1/distributions/{id}/logs", get(logs))
}

#[derive(Serialize)]
struct DistributionList {
    count: usize,
    distributions: Vec<Distribution>,
}

async fn list(State(state): State<Arc<AppState>>, request: Request) -> ApiResult<Json<DistributionList>> {
    let claims = request.extensions().get::<TokenClaims>().cloned();
    let all = entities::list_distributions(&state.pool).await?;
    let visible: Vec<Distribution> = all
        .into_iter()
        .filter(|d| d.is_readable_by(claims.as_ref().map(|c| (c.user_id, c.role))))
        .collect();
    Ok(Json(DistributionList {
        count: visible.len(),
        distributions: visible,
    }))
}

#[derive(Deserialize)]
struct CreateDistribution {
    name: String,
    version: String,
    #[serde(default)]
    visibility: Option<Visibility>,
    #[serde(default)]
    config: Option<serde_json::Value>,
}

async fn create(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ApiResult<(axum::http::StatusCode, Json<Distribution>)> {
    let claims = require_claims(&request)?;
    require_write(&claims)?;

    let body: CreateDistribution = extract_json(request).await?;
    if body.name.trim().is_empty() {
        return Err(LdfError::validation("name must not be empty").into());
    }

    let now = chrono::Utc::now();
    let distribution = Distribution {
        id: Uuid::new_v4(),
        name: body.name,
        version: body.version,
        status: DistributionStatus::Pending,
        visibility: body.visibility.unwrap_or(Visibility::Private),
        config: body.config.unwrap_or_else(|| serde_json::json!({})),
        source_url: None,
        checksum: None,
        size_bytes: 0,
        owner_id: Some(claims.user_id),
        error_message: None,
        created_at: now,
        updated_at: now,
    };

    entities::insert_distribution(&state.pool, &distribution).await?;

    ldf_audit::emit(
        state.audit.as_ref(),
        build_event(
            "create_distribution",
            Some(claims.user_id),
            Some(claims.user_name.clone()),
            format!("distribution:{}", distribution.id),
            None,
            None,
            true,
        ),
    )
    .await;

    Ok((axum::http::StatusCode::CREATED, Json(distribution)))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<Json<Distribution>> {
    let claims = request.extensions().get::<TokenClaims>().cloned();
    let distribution = entities::get_distribution(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("distribution not found"))?;
    guard_read_distribution(&distribution, claims.as_ref())?;
    Ok(Json(distribution))
}

#[derive(Deserialize)]
struct UpdateDistribution {
    name: Option<String>,
    version: Option<String>,
    visibility: Option<Visibility>,
    config: Option<serde_json::Value>,
    status: Option<DistributionStatus>,
}

async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<Json<Distribution>> {
    let claims = require_claims(&request)?;
    let mut distribution = entities::get_distribution(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("distribution not found"))?;
    guard_write_distribution(&distribution, &claims)?;

    let body: UpdateDistribution = extract_json(request).await?;

    if let Some(status) = body.status {
        if !distribution.status.can_transition_to(status) {
            return Err(LdfError::validation(format!(
                "cannot transition {:?} -> {status:?}",
                distribution.status
            ))
            .into());
        }
        distribution.status = status;
    }
    if let Some(name) = body.name {
        distribution.name = name;
    }
    if let Some(version) = body.version {
        distribution.version = version;
    }
    if let Some(visibility) = body.visibility {
        distribution.visibility = visibility;
    }
    if let Some(config) = body.config {
        distribution.config = config;
    }
    distribution.updated_at = chrono::Utc::now();

    entities::save_distribution(&state.pool, &distribution).await?;

    ldf_audit::emit(
        state.audit.as_ref(),
        build_event(
            "update_distribution",
            Some(claims.user_id),
            Some(claims.user_name.clone()),
            format!("distribution:{id}"),
            None,
            None,
            true,
        ),
    )
    .await;

    Ok(Json(distribution))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<axum::http::StatusCode> {
    let claims = require_claims(&request)?;
    let distribution = entities::get_distribution(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("distribution not found"))?;
    guard_write_distribution(&distribution, &claims)?;

    // Deletes the row outright so `ON DELETE CASCADE` clears logs and
    // download jobs, rather than soft-deleting to `Deleted` and leaving
    // orphaned children behind.
    sqlx::query("DELETE FROM distributions WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await
        .map_err(anyhow::Error::from)?;

    ldf_audit::emit(
        state.audit.as_ref(),
        build_event(
            "delete_distribution",
            Some(claims.user_id),
            Some(claims.user_name.clone()),
            format!("distribution:{id}"),
            None,
            None,
            true,
        ),
    )
    .await;

    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct LogList {
    count: usize,
    logs: Vec<ldf_types::DistributionLogEntry>,
}

async fn logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<Json<LogList>> {
    let claims = request.extensions().get::<TokenClaims>().cloned();
    let distribution = entities::get_distribution(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("distribution not found"))?;
    guard_read_distribution(&distribution, claims.as_ref())?;

    let rows: Vec<LogRow> = sqlx::query_as(
        "SELECT id, distribution_id, level, message, created_at FROM distribution_logs
         WHERE distribution_id = ? ORDER BY created_at DESC LIMIT 200",
    )
    .bind(id.to_string())
    .fetch_all(&state.pool)
    .await
    .map_err(anyhow::Error::from)?;

    let entries = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(LogList {
        count: entries.len(),
        logs: entries,
    }))
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: String,
    distribution_id: String,
    level: String,
    message: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<LogRow> for ldf_types::DistributionLogEntry {
    type Error = anyhow::Error;

    fn try_from(row: LogRow) -> anyhow::Result<Self> {
        use anyhow::Context;
        Ok(ldf_types::DistributionLogEntry {
            id: row.id.parse().context("log id")?,
            distribution_id: row.distribution_id.parse().context("log distribution_id")?,
            level: crate::db::log_level_from_str(&row.level)?,
            message: row.message,
            created_at: row.created_at,
        })
    }
}

async fn extract_json<T: serde::de::DeserializeOwned>(request: Request) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| ApiError::from(anyhow::anyhow!(err)))?;
    serde_json::from_slice(&bytes).map_err(|err| LdfError::validation(format!("invalid request body: {err}")).into())
}
