//! Configurable mock OpenID Connect identity provider.
//!
//! Every endpoint's response is driven by an [`IdpConfig`](services::idp_config::IdpConfig)
//! that can be replaced at runtime, which makes the IdP useful for testing how
//! relying parties cope with well-formed, malformed and hostile responses.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
