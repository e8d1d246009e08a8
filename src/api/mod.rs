/*
 * Responsibility
 * - HTTP surface of the IdP (routes(), handlers, extractors)
 * - Translate requests into RequestInput and engine results into responses
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
