/*
 * Responsibility
 * - `error`: configured status code and body, as text
 * - `block`: hold the request, then 504
 * - `Cache-Control: no-store` / `Pragma: no-cache` on successful OIDC answers
 * - one access log line per configurable endpoint call
 */
use std::time::Duration;

use axum::{
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::api::extractors::request_input::request_id;
use crate::services::idp_config::ErrorResponse;
use crate::services::request_input::RequestInput;

/// Out-of-range status codes fall back to 500.
pub fn error_response(error: &ErrorResponse) -> Response {
    let status = StatusCode::from_u16(error.error_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        error.error_content.clone(),
    )
        .into_response()
}

/// Set on redirects and `respond` bodies only; `error` and `block` go out bare.
pub const NO_STORE: [(HeaderName, &str); 2] = [
    (header::CACHE_CONTROL, "no-store"),
    (header::PRAGMA, "no-cache"),
];

pub async fn block_response(duration: Duration) -> Response {
    tokio::time::sleep(duration).await;
    StatusCode::GATEWAY_TIMEOUT.into_response()
}

pub fn log_action(endpoint: &'static str, action: &'static str, input: &RequestInput) {
    info!(
        endpoint,
        action,
        method = %input.method,
        path = %input.path,
        request_id = %request_id(input),
        "endpoint action"
    );
}
