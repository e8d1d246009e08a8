/*
 * Responsibility
 * - Guard for configuration changes (POST / DELETE /config)
 * - CSRF checks: custom header, JSON content type, Origin matching Host
 * - HTTP basic auth against ADMIN_USERNAME / ADMIN_PASSWORD_HASH when configured
 *
 * CSRF failures are 400, credential failures 401 with a Basic challenge.
 */
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, Method, header, request::Parts},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::api::extractors::request_input::{content_type, host};
use crate::config::AdminCredentials;
use crate::error::AppError;
use crate::state::AppState;

pub const CSRF_HEADER: &str = "x-pseudo-idp-csrf-protection";

#[derive(Debug, Clone, Copy)]
pub struct AdminGuard;

fn invalid_request() -> AppError {
    AppError::bad_request("INVALID_REQUEST", "invalid request")
}

fn check_csrf(parts: &Parts) -> Result<(), AppError> {
    let marker = parts.headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    if marker != Some("1") {
        return Err(invalid_request());
    }

    if parts.method == Method::POST
        && content_type(&parts.headers).as_deref() != Some("application/json")
    {
        return Err(invalid_request());
    }

    let host = host(parts);
    if host.is_empty() {
        return Err(invalid_request());
    }

    let origin = parts
        .headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| url::Url::parse(v).ok())
        .ok_or_else(invalid_request)?;

    let origin_host = match (origin.host_str(), origin.port()) {
        (Some(h), Some(port)) => format!("{h}:{port}"),
        (Some(h), None) => h.to_string(),
        (None, _) => return Err(invalid_request()),
    };

    if origin_host != host {
        return Err(invalid_request());
    }
    Ok(())
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

async fn check_basic_auth(headers: &HeaderMap, admin: &AdminCredentials) -> Result<(), AppError> {
    let (user, password) = basic_credentials(headers).ok_or(AppError::Unauthorized)?;

    let user_ok: bool = user.as_bytes().ct_eq(admin.username.as_bytes()).into();
    if !user_ok {
        warn!("admin auth failed: unknown user");
        return Err(AppError::Unauthorized);
    }

    let hash = admin.password_hash.clone();
    let password_ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|_| AppError::Internal)?
        .unwrap_or(false);

    if !password_ok {
        warn!("admin auth failed: bad password");
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        check_csrf(parts)?;
        if let Some(admin) = &state.admin {
            check_basic_auth(&parts.headers, admin).await?;
        }
        Ok(AdminGuard)
    }
}
