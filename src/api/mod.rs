//! API Layer
//!
//! HTTP surface for the relayer: route handlers, request validation and
//! rate limiting middleware, and router assembly.

pub mod middleware;
pub mod routes;
pub mod server;

pub use middleware::{RateLimiter, RateLimitState, ValidationError};
pub use server::{build_router, serve, AppState, SharedAppState};
