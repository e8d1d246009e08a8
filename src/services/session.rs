/*
 * Responsibility
 * - Correlate the authorization call with the later token call, keyed by `code`
 * - Write once at the authorization redirect, read at the token endpoint
 *
 * Sessions never expire and are never removed.
 */
use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::services::error::{EngineError, EngineResult};
use crate::services::request_input::{ParamMap, RequestInput};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// OAuth code returned by the authorization endpoint.
    pub code: String,
    pub client_id: String,
    pub nonce: String,
    /// PKCE code challenge, if the client sent one.
    pub code_challenge: String,
    pub code_challenge_method: String,
    /// Redirect URI the client was (or will be) sent to.
    pub redirect_uri: String,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

fn first_value<'a>(params: &'a ParamMap, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.first())
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session for the `code` in `resolved`.
    ///
    /// Without a code there is nothing to correlate later (implicit-style
    /// response) and the store is left untouched.
    pub fn create(&self, input: &RequestInput, resolved: &ParamMap) {
        let Some(code) = first_value(resolved, "code") else {
            debug!("no code in authorization response, skipping session");
            return;
        };

        let redirect_uri = first_value(resolved, "redirect_uri")
            .unwrap_or_else(|| input.url_param("redirect_uri"));

        let session = Session {
            code: code.to_string(),
            client_id: input.url_param("client_id").to_string(),
            nonce: input.url_param("nonce").to_string(),
            code_challenge: input.url_param("code_challenge").to_string(),
            code_challenge_method: input.url_param("code_challenge_method").to_string(),
            redirect_uri: redirect_uri.to_string(),
        };

        debug!(client_id = %session.client_id, "storing authorization session");
        self.sessions.lock().insert(session.code.clone(), session);
    }

    pub fn lookup(&self, code: &str) -> EngineResult<Session> {
        self.sessions
            .lock()
            .get(code)
            .cloned()
            .ok_or(EngineError::SessionNotFound)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(pairs: &[(&str, &str)]) -> ParamMap {
        let mut params = ParamMap::new();
        for (k, v) in pairs {
            params.entry(k.to_string()).or_default().push(v.to_string());
        }
        params
    }

    fn auth_input() -> RequestInput {
        RequestInput::new("idp.test")
            .with_url_param("client_id", "client-1")
            .with_url_param("nonce", "n-0S6_WzA2Mj")
            .with_url_param("code_challenge", "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM")
            .with_url_param("code_challenge_method", "S256")
            .with_url_param("redirect_uri", "https://client.test/cb")
    }

    #[test]
    fn create_without_code_stores_nothing() {
        let store = SessionStore::new();
        store.create(&auth_input(), &resolved(&[("state", "xyz")]));

        assert!(store.is_empty());
        assert!(matches!(
            store.lookup("anything"),
            Err(EngineError::SessionNotFound)
        ));
    }

    #[test]
    fn create_captures_request_parameters() {
        let store = SessionStore::new();
        store.create(&auth_input(), &resolved(&[("code", "abc")]));

        let session = store.lookup("abc").unwrap();
        assert_eq!(session.code, "abc");
        assert_eq!(session.client_id, "client-1");
        assert_eq!(session.nonce, "n-0S6_WzA2Mj");
        assert_eq!(session.code_challenge_method, "S256");
        assert_eq!(session.redirect_uri, "https://client.test/cb");
    }

    #[test]
    fn resolved_redirect_uri_wins_over_request_value() {
        let store = SessionStore::new();
        store.create(
            &auth_input(),
            &resolved(&[("code", "abc"), ("redirect_uri", "https://evil.test/cb")]),
        );
        assert_eq!(
            store.lookup("abc").unwrap().redirect_uri,
            "https://evil.test/cb"
        );
    }

    #[test]
    fn lookup_unknown_code_fails() {
        let store = SessionStore::new();
        store.create(&auth_input(), &resolved(&[("code", "abc")]));
        assert!(matches!(store.lookup("abd"), Err(EngineError::SessionNotFound)));
    }
}
