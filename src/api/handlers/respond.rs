/*
 * Responsibility
 * - Token, userinfo and discovery endpoints
 * - All three run a RespondAction: JSON body from parameters, error or block
 */
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::api::extractors::request_input::Input;
use crate::api::handlers::actions::{NO_STORE, block_response, error_response, log_action};
use crate::error::AppError;
use crate::services::idp_config::{IdpConfig, RespondAction};
use crate::services::request_input::RequestInput;
use crate::state::AppState;

async fn run_action(
    state: &AppState,
    endpoint: &'static str,
    select: fn(&IdpConfig) -> &RespondAction,
    input: &RequestInput,
) -> Result<Response, AppError> {
    let config = state.config_store.snapshot();
    let action = select(&config);
    log_action(endpoint, action.name(), input);

    match action {
        RespondAction::Respond { respond } => {
            let body = state
                .resolver
                .resolve_json_object(&respond.parameters, input, &config)?;
            Ok((NO_STORE, Json(Value::Object(body))).into_response())
        }
        RespondAction::Error { error } => Ok(error_response(error)),
        RespondAction::Block => Ok(block_response(state.block_duration).await),
    }
}

/// OAuth clients must POST here; GET is answered the same way.
pub async fn token(
    State(state): State<AppState>,
    Input(input): Input,
) -> Result<Response, AppError> {
    run_action(&state, "token", |c| &c.token_action, &input).await
}

pub async fn userinfo(
    State(state): State<AppState>,
    Input(input): Input,
) -> Result<Response, AppError> {
    run_action(&state, "userinfo", |c| &c.userinfo_action, &input).await
}

pub async fn discovery(
    State(state): State<AppState>,
    Input(input): Input,
) -> Result<Response, AppError> {
    run_action(&state, "discovery", |c| &c.discovery_action, &input).await
}
