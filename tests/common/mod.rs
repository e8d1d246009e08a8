#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use mock_oidc_idp::app::build_router;
use mock_oidc_idp::config::{AdminCredentials, Config};
use mock_oidc_idp::services::idp_config::IdpConfig;
use mock_oidc_idp::services::keys::KeyManager;
use mock_oidc_idp::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

pub const HOST: &str = "idp.test";

pub fn keys() -> Arc<KeyManager> {
    static KEYS: OnceLock<Arc<KeyManager>> = OnceLock::new();
    KEYS.get_or_init(|| Arc::new(KeyManager::generate().unwrap()))
        .clone()
}

pub fn test_config() -> Config {
    let mut config = Config::from_lookup(|_| None).unwrap();
    config.block_duration = Duration::from_millis(10);
    config
}

pub fn app() -> Router {
    app_with(test_config())
}

pub fn app_with(config: Config) -> Router {
    app_and_state(config).0
}

pub fn app_and_state(config: Config) -> (Router, AppState) {
    let state = AppState::new(&config, IdpConfig::default(), keys());
    (build_router(state.clone(), &config), state)
}

pub fn admin_config(username: &str, password: &str) -> Config {
    let mut config = test_config();
    config.admin = Some(AdminCredentials {
        username: username.to_string(),
        password_hash: bcrypt::hash(password, 4).unwrap(),
    });
    config
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }

    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .map(|v| v.to_str().unwrap())
            .unwrap_or("")
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", HOST)
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("host", HOST)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

/// Request passing the CSRF checks of the admin endpoints.
pub fn admin_request(method: &str, body: Option<&Value>) -> axum::http::request::Builder {
    let builder = Request::builder()
        .method(method)
        .uri("/config")
        .header("host", HOST)
        .header("origin", format!("http://{HOST}"))
        .header("x-pseudo-idp-csrf-protection", "1");
    match body {
        Some(_) => builder.header("content-type", "application/json"),
        None => builder,
    }
}

pub fn with_body(builder: axum::http::request::Builder, body: Option<&Value>) -> Request<Body> {
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    builder.body(body).unwrap()
}

pub async fn replace_config(app: &Router, config: &IdpConfig) -> TestResponse {
    let body = serde_json::to_value(config).unwrap();
    let request = with_body(admin_request("POST", Some(&body)), Some(&body));
    send(app, request).await
}
