/*
 * Responsibility
 * - GET /.well-known/jwks.json: public halves of the correct key set
 */
use axum::{Json, extract::State};
use serde_json::Value;

use crate::state::AppState;

pub async fn jwks(State(state): State<AppState>) -> Json<Value> {
    Json(state.keys.public_key_set())
}
