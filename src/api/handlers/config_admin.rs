/*
 * Responsibility
 * - GET /config: current IdP configuration
 * - POST /config: replace it (admin)
 * - DELETE /config: back to the built-in default (admin)
 *
 * A rejected document leaves the live configuration untouched.
 */
use axum::{Json, body::Bytes, extract::State};
use tracing::{info, warn};

use crate::api::extractors::admin::AdminGuard;
use crate::error::AppError;
use crate::services::idp_config::IdpConfig;
use crate::state::AppState;

pub async fn get_config(State(state): State<AppState>) -> Json<IdpConfig> {
    Json(IdpConfig::clone(&state.config_store.snapshot()))
}

pub async fn replace_config(
    _admin: AdminGuard,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IdpConfig>, AppError> {
    if body.is_empty() {
        return Err(AppError::bad_request("INVALID_CONFIG", "no config sent"));
    }

    let next: IdpConfig = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "rejected configuration document");
        AppError::bad_request("INVALID_CONFIG", e.to_string())
    })?;

    info!(
        auth = next.auth_action.name(),
        token = next.token_action.name(),
        userinfo = next.userinfo_action.name(),
        discovery = next.discovery_action.name(),
        alg = %next.id_token_config.algorithm,
        "configuration replaced"
    );
    state.config_store.replace(next.clone());
    Ok(Json(next))
}

pub async fn reset_config(
    _admin: AdminGuard,
    State(state): State<AppState>,
) -> Json<IdpConfig> {
    state.config_store.reset();
    info!("configuration reset to default");
    Json(IdpConfig::clone(&state.config_store.snapshot()))
}
