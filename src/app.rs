/*
 * Responsibility
 * - tracing / panic hook setup
 * - Config → signing keys → AppState → Router
 * - axum::serve()
 *
 * Key generation happens before the listener is bound; a failure there ends
 * the process without ever serving a request.
 */
use std::path::Path;
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::services::idp_config::IdpConfig;
use crate::services::keys::KeyManager;
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set, e.g.
    // RUST_LOG=info,mock_oidc_idp=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash loudly. Production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    info!(
        "starting mock IdP in {:?} mode on {}",
        config.app_env, config.addr
    );
    if config.admin.is_none() {
        tracing::warn!("ADMIN_USERNAME/ADMIN_PASSWORD_HASH unset; /config changes are unauthenticated");
    }

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

pub async fn build_state(config: &Config) -> Result<AppState> {
    let initial = match &config.idp_config_file {
        Some(path) => load_idp_config(path)?,
        None => IdpConfig::default(),
    };

    let keys = tokio::task::spawn_blocking(KeyManager::generate)
        .await
        .context("key generation task failed")?
        .context("failed to generate signing keys")?;

    Ok(AppState::new(config, initial, Arc::new(keys)))
}

fn load_idp_config(path: &Path) -> Result<IdpConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let idp_config = IdpConfig::from_json(&raw)
        .with_context(|| format!("invalid IdP configuration in {}", path.display()))?;
    info!(path = %path.display(), "loaded initial IdP configuration");
    Ok(idp_config)
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes().with_state(state);
    middleware::http::apply(router, config.request_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn idp_config_file_is_loaded() {
        let mut expected = IdpConfig::default();
        expected.id_token_config.algorithm = "ES256".into();

        let path = std::env::temp_dir().join(format!("idp-config-{}.json", process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string(&expected).unwrap().as_bytes())
            .unwrap();

        let loaded = load_idp_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn missing_idp_config_file_fails() {
        let err = load_idp_config(Path::new("/nonexistent/idp.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
