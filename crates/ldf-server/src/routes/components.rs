//! `/v1/components` — reusable build components attached to distributions.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::routing::get;
use axum::{Json, Router};
use ldf_access::require_write;
use ldf_types::{Component, LdfError, VersionRule};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities;
use crate::error::ApiResult;
use crate::middleware::require_claims;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/components", get(list).post(create))
        .route("/v1/components/{id}", get(get_one).delete(remove))
}

#[derive(Serialize)]
struct ComponentList {
    count: usize,
    components: Vec<Component>,
}

async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<ComponentList>> {
    let components = entities::list_components(&state.pool).await?;
    Ok(Json(ComponentList {
        count: components.len(),
        components,
    }))
}

async fn get_one(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<Component>> {
    let component = entities::get_component(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("component not found"))?;
    Ok(Json(component))
}

#[derive(Deserialize)]
struct CreateComponent {
    name: String,
    category: String,
    #[serde(default)]
    categories: Vec<String>,
    display_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    artifact_pattern: Option<String>,
    #[serde(default)]
    default_url_template: Option<String>,
    #[serde(default)]
    github_normalized_template: Option<String>,
    #[serde(default)]
    is_optional: bool,
    #[serde(default)]
    default_version: Option<String>,
    #[serde(default = "default_version_rule")]
    default_version_rule: VersionRule,
}

fn default_version_rule() -> VersionRule {
    VersionRule::LatestStable
}

async fn create(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ApiResult<(axum::http::StatusCode, Json<Component>)> {
    let claims = require_claims(&request)?;
    require_write(&claims)?;

    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| anyhow::anyhow!(err))?;
    let body: CreateComponent = serde_json::from_slice(&bytes)
        .map_err(|err| LdfError::validation(format!("invalid request body: {err}")))?;

    if body.name.trim().is_empty() {
        return Err(LdfError::validation("name must not be empty").into());
    }

    let now = chrono::Utc::now();
    let component = Component {
        id: Uuid::new_v4(),
        name: body.name,
        category: body.category,
        categories: body.categories,
        display_name: body.display_name,
        description: body.description,
        artifact_pattern: body.artifact_pattern,
        default_url_template: body.default_url_template,
        github_normalized_template: body.github_normalized_template,
        is_optional: body.is_optional,
        is_system: false,
        owner_id: Some(claims.user_id),
        default_version: body.default_version,
        default_version_rule: body.default_version_rule,
        created_at: now,
        updated_at: now,
    };

    entities::insert_component(&state.pool, &component).await?;
    Ok((axum::http::StatusCode::CREATED, Json(component)))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    request: Request,
) -> ApiResult<axum::http::StatusCode> {
    let claims = require_claims(&request)?;
    require_write(&claims)?;

    let component = entities::get_component(&state.pool, id)
        .await?
        .ok_or_else(|| LdfError::not_found("component not found"))?;
    if component.is_system {
        return Err(LdfError::forbidden("system components cannot be deleted").into());
    }

    entities::delete_component(&state.pool, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
