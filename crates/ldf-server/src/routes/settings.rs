//! `/v1/settings` — the typed settings registry, masked on read.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::routing::get;
use axum::{Json, Router};
use ldf_access::require_admin;
use ldf_types::LdfError;
use serde::{Deserialize, Serialize};

use crate::entities;
use crate::error::ApiResult;
use crate::middleware::require_claims;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/settings", get(list))
        .route("/v1/settings/{key}", get(get_one).put(put_one))
}

#[derive(Serialize)]
struct SettingView {
    key: String,
    value: String,
    description: &'static str,
    category: &'static str,
    reboot_required: bool,
    sensitive: bool,
}

#[derive(Serialize)]
struct SettingList {
    settings: Vec<SettingView>,
}

async fn list(State(state): State<Arc<AppState>>, request: Request) -> ApiResult<Json<SettingList>> {
    let claims = require_claims(&request)?;
    let persisted = entities::list_raw_settings(&state.pool).await?;

    let mut views = Vec::with_capacity(ldf_settings::STATIC_REGISTRY.len());
    for meta in ldf_settings::STATIC_REGISTRY {
        let stored = persisted.iter().find(|s| s.key == meta.key).map(|s| s.string_value.clone());
        let raw = match stored {
            Some(raw) if ldf_settings::ENCRYPTED_KEYS.contains(&meta.key) => {
                ldf_settings::decrypt_stored(&raw, &state.master_key)?
            }
            Some(raw) => raw,
            None => String::new(),
        };
        views.push(SettingView {
            key: meta.key.to_string(),
            value: ldf_settings::mask_for_read(meta, &raw, claims.role, false),
            description: meta.description,
            category: meta.category,
            reboot_required: meta.reboot_required,
            sensitive: meta.sensitive,
        });
    }

    Ok(Json(SettingList { settings: views }))
}

#[derive(Deserialize)]
struct RevealQuery {
    #[serde(default)]
    reveal: bool,
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<RevealQuery>,
    request: Request,
) -> ApiResult<Json<SettingView>> {
    let claims = require_claims(&request)?;
    let meta = ldf_settings::lookup(&key).ok_or_else(|| LdfError::not_found("unknown setting key"))?;

    if query.reveal {
        require_admin(&claims)?;
    }

    let stored = entities::get_raw_setting(&state.pool, &key).await?;
    let raw = match stored {
        Some(raw) if ldf_settings::ENCRYPTED_KEYS.contains(&meta.key) => {
            ldf_settings::decrypt_stored(&raw, &state.master_key)?
        }
        Some(raw) => raw,
        None => String::new(),
    };

    Ok(Json(SettingView {
        key: meta.key.to_string(),
        value: ldf_settings::mask_for_read(meta, &raw, claims.role, query.reveal),
        description: meta.description,
        category: meta.category,
        reboot_required: meta.reboot_required,
        sensitive: meta.sensitive,
    }))
}

#[derive(Deserialize)]
struct PutSetting {
    value: String,
}

#[derive(Serialize)]
struct PutSettingResponse {
    key: String,
    reboot_required: bool,
}

async fn put_one(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    request: Request,
) -> ApiResult<Json<PutSettingResponse>> {
    let claims = require_claims(&request)?;
    require_admin(&claims)?;

    let meta = ldf_settings::lookup(&key).ok_or_else(|| LdfError::not_found("unknown setting key"))?;

    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| anyhow::anyhow!(err))?;
    let body: PutSetting = serde_json::from_slice(&bytes)
        .map_err(|err| LdfError::validation(format!("invalid request body: {err}")))?;

    ldf_settings::validate_value(meta, &body.value)?;

    let to_store = ldf_settings::encrypt_if_sensitive(meta.key, &body.value, &state.master_key)?;
    entities::upsert_raw_setting(&state.pool, meta.key, &to_store).await?;

    Ok(Json(PutSettingResponse {
        key: meta.key.to_string(),
        reboot_required: meta.reboot_required,
    }))
}
