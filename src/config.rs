/*
 * Responsibility
 * - Read process settings from the environment (.env honoured)
 * - Validate them; a bad value stops startup
 *
 * The IdP behaviour itself is not configured here. See services::idp_config.
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("APP_ENV").ok().as_deref())
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Basic-auth credentials guarding configuration changes.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    /// bcrypt hash, as printed by `hash-gen`.
    pub password_hash: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    /// `None` leaves configuration changes unauthenticated.
    pub admin: Option<AdminCredentials>,
    /// How long the `block` action holds a request.
    pub block_duration: Duration,
    pub request_timeout: Duration,
    /// Initial IdP configuration; the built-in default when unset.
    pub idp_config_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match var("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 8080,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV").as_deref());

        let admin = match (var("ADMIN_USERNAME"), var("ADMIN_PASSWORD_HASH")) {
            (None, None) => None,
            (Some(username), Some(password_hash)) => {
                if bcrypt::HashParts::from_str(&password_hash).is_err() {
                    return Err(ConfigError::Invalid("ADMIN_PASSWORD_HASH"));
                }
                Some(AdminCredentials {
                    username,
                    password_hash,
                })
            }
            (Some(_), None) => return Err(ConfigError::Missing("ADMIN_PASSWORD_HASH")),
            (None, Some(_)) => return Err(ConfigError::Missing("ADMIN_USERNAME")),
        };

        let block_seconds: u64 = match var("BLOCK_SECONDS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("BLOCK_SECONDS"))?,
            None => 600, // 10 min
        };

        let request_timeout_seconds: u64 = match var("REQUEST_TIMEOUT_SECONDS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"))?,
            None => 900,
        };
        if request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"));
        }

        let idp_config_file = var("IDP_CONFIG_FILE").map(PathBuf::from);

        Ok(Self {
            addr,
            app_env,
            admin,
            block_duration: Duration::from_secs(block_seconds),
            request_timeout: Duration::from_secs(request_timeout_seconds),
            idp_config_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn hash() -> String {
        bcrypt::hash("secret", 4).unwrap()
    }

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config(&[]).unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.app_env, AppEnv::Development);
        assert!(config.admin.is_none());
        assert_eq!(config.block_duration, Duration::from_secs(600));
        assert_eq!(config.request_timeout, Duration::from_secs(900));
        assert!(config.idp_config_file.is_none());
    }

    #[test]
    fn explicit_values_are_used() {
        let config = config(&[
            ("PORT", "9000"),
            ("APP_ENV", "PROD"),
            ("BLOCK_SECONDS", "1"),
            ("IDP_CONFIG_FILE", "/etc/idp.json"),
            ("ADMIN_USERNAME", "admin"),
            ("ADMIN_PASSWORD_HASH", hash().as_str()),
        ])
        .unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert!(config.app_env.is_production());
        assert_eq!(config.block_duration, Duration::from_secs(1));
        assert_eq!(config.idp_config_file, Some(PathBuf::from("/etc/idp.json")));
        assert_eq!(config.admin.unwrap().username, "admin");
    }

    #[test]
    fn half_configured_admin_is_rejected() {
        assert!(matches!(
            config(&[("ADMIN_USERNAME", "admin")]),
            Err(ConfigError::Missing("ADMIN_PASSWORD_HASH"))
        ));
        assert!(matches!(
            config(&[("ADMIN_PASSWORD_HASH", hash().as_str())]),
            Err(ConfigError::Missing("ADMIN_USERNAME"))
        ));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            config(&[("PORT", "http")]),
            Err(ConfigError::Invalid("PORT"))
        ));
        assert!(matches!(
            config(&[("BLOCK_SECONDS", "-1")]),
            Err(ConfigError::Invalid("BLOCK_SECONDS"))
        ));
        assert!(matches!(
            config(&[("ADMIN_USERNAME", "admin"), ("ADMIN_PASSWORD_HASH", "plaintext")]),
            Err(ConfigError::Invalid("ADMIN_PASSWORD_HASH"))
        ));
    }
}
