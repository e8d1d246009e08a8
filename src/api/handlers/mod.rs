/*
 * Responsibility
 * - One module per endpoint group
 * - actions: the `error` / `block` behaviours shared by every configurable endpoint
 */
pub mod actions;
pub mod authorize;
pub mod config_admin;
pub mod health;
pub mod jwks;
pub mod respond;
