/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Wires the engine pieces together once at startup
 * - Clone is cheap (everything behind Arc)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AdminCredentials, Config};
use crate::services::custom::CustomRegistry;
use crate::services::id_token::{IdTokenBuilder, SIGNED_TOKEN_KEY};
use crate::services::idp_config::{ConfigStore, IdpConfig};
use crate::services::keys::KeyManager;
use crate::services::resolver::Resolver;
use crate::services::session::SessionStore;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config_store: Arc<ConfigStore>,
    pub resolver: Arc<Resolver>,
    pub sessions: Arc<SessionStore>,
    pub keys: Arc<KeyManager>,
    pub admin: Option<Arc<AdminCredentials>>,
    pub block_duration: Duration,
}

impl AppState {
    /// `keys` must already be generated; nothing here can fail.
    pub fn new(config: &Config, initial: IdpConfig, keys: Arc<KeyManager>) -> Self {
        let config_store = Arc::new(ConfigStore::new(initial));

        let registry = Arc::new(CustomRegistry::new());
        registry.register(SIGNED_TOKEN_KEY, IdTokenBuilder::new(Arc::clone(&keys)));

        let resolver = Arc::new(Resolver::new(registry));

        Self {
            config_store,
            resolver,
            sessions: Arc::new(SessionStore::new()),
            keys,
            admin: config.admin.clone().map(Arc::new),
            block_duration: config.block_duration,
        }
    }
}
