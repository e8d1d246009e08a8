/*
 * Responsibility
 * - The IdP engine: configuration model, value resolution, sessions, keys, tokens
 * - No HTTP types below this module
 */
pub mod custom;
pub mod error;
pub mod id_token;
pub mod idp_config;
pub mod jwt;
pub mod keys;
pub mod request_input;
pub mod resolver;
pub mod session;
pub mod template;
