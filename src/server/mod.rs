//! HTTP server exposing the tiered cache.
//!
//! - [`api`]: Request/response types, route handlers and router construction

pub mod api;
