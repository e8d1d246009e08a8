/*
 * Responsibility
 * - GET /oauth2/auth
 * - redirect: resolve the redirect parameters, pick the target, record the
 *   session, answer 302
 * - error / block as configured
 */
use std::borrow::Cow;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::api::extractors::request_input::Input;
use crate::api::handlers::actions::{NO_STORE, block_response, error_response, log_action};
use crate::error::AppError;
use crate::services::idp_config::{AuthAction, AuthRedirect, IdpConfig, RedirectTarget};
use crate::services::request_input::{ParamMap, RequestInput};
use crate::services::resolver::Resolver;
use crate::state::AppState;

pub async fn authorize(
    State(state): State<AppState>,
    Input(input): Input,
) -> Result<Response, AppError> {
    let config = state.config_store.snapshot();
    log_action("authorize", config.auth_action.name(), &input);

    match &config.auth_action {
        AuthAction::Redirect { redirect } => redirect_response(&state, redirect, &input, &config),
        AuthAction::Error { error } => Ok(error_response(error)),
        AuthAction::Block => Ok(block_response(state.block_duration).await),
    }
}

fn redirect_response(
    state: &AppState,
    redirect: &AuthRedirect,
    input: &RequestInput,
    config: &IdpConfig,
) -> Result<Response, AppError> {
    let params = state
        .resolver
        .resolve_redirect_params(redirect, input, config)?;
    let target = redirect_target(&state.resolver, &redirect.redirect_target, input, config)?;

    let separator = if redirect.use_hash_fragment { '#' } else { '?' };
    let location = format!("{target}{separator}{}", encode_params(&params));
    let location = HeaderValue::try_from(location).map_err(|_| {
        AppError::bad_request(
            "INVALID_REDIRECT_URI",
            "redirect target is not a valid header value",
        )
    })?;

    state.sessions.create(input, &params);
    debug!(params = params.len(), "authorization redirect");

    Ok((StatusCode::FOUND, NO_STORE, [(header::LOCATION, location)]).into_response())
}

/// Configured URL, then custom evaluator, then the request's `redirect_uri`.
fn redirect_target(
    resolver: &Resolver,
    target: &RedirectTarget,
    input: &RequestInput,
    config: &IdpConfig,
) -> Result<String, AppError> {
    let missing = |message: String| AppError::bad_request("MISSING_REDIRECT_URI", message);

    if target.use_custom_redirect_uri {
        if !target.target.is_empty() {
            return Ok(target.target.clone());
        }
        if !target.custom_key.is_empty() {
            let values = resolver
                .invoke_custom(&target.custom_key, input, config)
                .map_err(|e| missing(format!("no redirect_uri present: {e}")))?;
            return values
                .into_iter()
                .next()
                .ok_or_else(|| missing("custom function did not return any values".into()));
        }
        return Err(missing("missing custom redirect config".into()));
    }

    match input.url_param("redirect_uri") {
        "" => Err(missing("missing redirect_uri".into())),
        uri => Ok(query_unescape(uri).unwrap_or(Cow::Borrowed(uri)).into_owned()),
    }
}

/// One more round of query unescaping on an already decoded value, so a
/// doubly encoded `redirect_uri` ends up as a plain URL. `None` when the
/// value holds a malformed `%` escape or does not decode to UTF-8.
fn query_unescape(raw: &str) -> Option<Cow<'_, str>> {
    let bytes = raw.as_bytes();
    for (i, _) in raw.match_indices('%') {
        let escape = bytes.get(i + 1..i + 3)?;
        if !escape.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
    }

    if !raw.contains(['%', '+']) {
        return Some(Cow::Borrowed(raw));
    }
    let spaced = raw.replace('+', " ");
    let decoded = percent_decode_str(&spaced).decode_utf8().ok()?;
    Some(Cow::Owned(decoded.into_owned()))
}

/// Keys in order, repeated keys repeated, form encoding.
fn encode_params(params: &ParamMap) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, values) in params {
        for value in values {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_with_redirect(uri: &str) -> RequestInput {
        RequestInput::new("idp.test").with_url_param("redirect_uri", uri)
    }

    fn target_for(uri: &str) -> String {
        let resolver = Resolver::new(Default::default());
        redirect_target(
            &resolver,
            &RedirectTarget::default(),
            &input_with_redirect(uri),
            &IdpConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn redirect_uri_is_unescaped_once_more() {
        assert_eq!(
            target_for("https%3A%2F%2Fclient.test%2Fcb%3Fx%3D1"),
            "https://client.test/cb?x=1"
        );
        assert_eq!(target_for("https://client.test/a+b"), "https://client.test/a b");
        assert_eq!(target_for("https://client.test/cb"), "https://client.test/cb");
    }

    #[test]
    fn malformed_escapes_keep_the_raw_redirect_uri() {
        assert_eq!(
            target_for("https://client.test/cb?p=100%"),
            "https://client.test/cb?p=100%"
        );
        assert_eq!(
            target_for("https://client.test/%41%zz"),
            "https://client.test/%41%zz"
        );
        assert_eq!(target_for("https://client.test/%ff"), "https://client.test/%ff");
    }

    #[test]
    fn params_are_form_encoded_in_key_order() {
        let mut params = ParamMap::new();
        params.insert("state".into(), vec!["a b".into()]);
        params.insert("code".into(), vec!["x/y".into(), "z".into()]);
        assert_eq!(encode_params(&params), "code=x%2Fy&code=z&state=a+b");
    }
}
