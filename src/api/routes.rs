/*
 * Responsibility
 * - URL structure of the IdP
 */
use axum::{Router, routing::get};

use crate::api::handlers::{
    authorize::authorize,
    config_admin::{get_config, replace_config, reset_config},
    health::health,
    jwks::jwks,
    respond::{discovery, token, userinfo},
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let oidc = Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/oauth2/auth", get(authorize))
        .route("/oauth2/token", get(token).post(token))
        .route("/oauth2/userinfo", get(userinfo).post(userinfo));

    Router::new()
        .route("/health", get(health))
        .route("/.well-known/jwks.json", get(jwks))
        .route(
            "/config",
            get(get_config).post(replace_config).delete(reset_config),
        )
        .merge(oidc)
}
