/*
 * Responsibility
 * - Build the engine's RequestInput from an axum request
 * - Query string, urlencoded form body, headers, Host as the IdP domain
 * - Attach the session when the request carries a known `code`
 *
 * An unknown code is not an error: the request goes on without a session and
 * templates see no `session` field.
 */
use axum::{
    body::to_bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, header, request::Parts},
};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::middleware::http::{BODY_LIMIT_BYTES, REQUEST_ID_HEADER};
use crate::services::request_input::{ParamMap, RequestInput, parse_urlencoded};
use crate::state::AppState;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone)]
pub struct Input(pub RequestInput);

/// Media type without parameters, lowercased.
pub(crate) fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
}

pub(crate) fn host(parts: &Parts) -> String {
    parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

fn header_params(headers: &HeaderMap) -> ParamMap {
    let mut params = ParamMap::new();
    for (name, value) in headers {
        params
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    params
}

/// `x-request-id` of the request, empty when the middleware did not run.
pub fn request_id(input: &RequestInput) -> &str {
    input
        .headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.first())
        .map(String::as_str)
        .unwrap_or("")
}

impl FromRequest<AppState> for Input {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        let form_params = if content_type(&parts.headers).as_deref() == Some(FORM_CONTENT_TYPE) {
            let bytes = to_bytes(body, BODY_LIMIT_BYTES)
                .await
                .map_err(|e| AppError::bad_request("INVALID_BODY", e.to_string()))?;
            parse_urlencoded(&bytes)
        } else {
            ParamMap::new()
        };

        let mut input = RequestInput::new(host(&parts));
        input.method = parts.method.to_string();
        input.path = parts.uri.path().to_string();
        input.proto = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        input.headers = header_params(&parts.headers);
        input.url_params = parts
            .uri
            .query()
            .map(|q| parse_urlencoded(q.as_bytes()))
            .unwrap_or_default();
        input.form_params = form_params;

        if let Some(code) = input.code().map(str::to_owned) {
            match state.sessions.lookup(&code) {
                Ok(session) => {
                    debug!(client_id = %session.client_id, "session attached to request");
                    input.session = Some(session);
                }
                Err(e) => warn!(
                    error = %e,
                    path = %input.path,
                    request_id = %request_id(&input),
                    "unexpected code"
                ),
            }
        }

        Ok(Input(input))
    }
}
