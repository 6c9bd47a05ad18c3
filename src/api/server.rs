//! HTTP server assembly
//!
//! Builds the axum [`Router`] for the relayer API: routes, per-endpoint rate
//! limits, security headers, and structured request/response logging with a
//! correlation id threaded through both log lines.

use crate::api::middleware::{
    create_rate_limiter, rate_limit_middleware, security_headers_middleware, RateLimitState,
};
use crate::api::routes::{
    deposit_status_handler, health_handler, transfer_handler, tree_proof_handler, tree_root_handler,
    withdraw_handler,
};
use crate::chain::ChainClient;
use crate::config::RelayerConfig;
use crate::engine::Engine;
use crate::logging::{generate_correlation_id, log_api_request, log_api_response};
use crate::proof::ProofVerifier;
use crate::api::middleware::extract_client_ip;
use axum::extract::{MatchedPath, Request};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

/// Everything a request handler needs: the per-chain engines, the proof
/// verifier, and a version string surfaced on `/health`.
pub struct AppState<C: ChainClient> {
    pub engine: Arc<Engine<C>>,
    pub verifier: Arc<dyn ProofVerifier>,
    pub version: String,
}

pub type SharedAppState<C> = Arc<AppState<C>>;

async fn request_logging_middleware(headers: HeaderMap, req: Request, next: Next) -> Response {
    let correlation_id = generate_correlation_id();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let client_ip = extract_client_ip(&headers);

    log_api_request(&method, &path, client_ip.as_deref(), &correlation_id);
    let start = Instant::now();

    let response = next.run(req).await;

    log_api_response(&method, &path, response.status().as_u16(), start.elapsed().as_millis() as u64, &correlation_id);
    response
}

/// Builds the full router for one process's set of configured chains.
pub fn build_router<C: ChainClient + 'static>(state: SharedAppState<C>) -> Router {
    let default_limiter: RateLimitState = create_rate_limiter();
    let strict_limiter: RateLimitState = Arc::new(crate::api::middleware::RateLimiter::new(
        crate::api::middleware::RateLimitConfig::strict(),
    ));

    let read_routes = Router::new()
        .route("/api/v2/tree/root", get(tree_root_handler::<C>))
        .route("/api/v2/tree/proof/:leafIndex", get(tree_proof_handler::<C>))
        .route("/api/v2/deposit/status/:commitment", get(deposit_status_handler::<C>))
        .layer(middleware::from_fn_with_state(default_limiter, rate_limit_middleware));

    let write_routes = Router::new()
        .route("/api/v2/withdraw", post(withdraw_handler::<C>))
        .route("/api/v2/transfer", post(transfer_handler::<C>))
        .layer(middleware::from_fn_with_state(strict_limiter, rate_limit_middleware));

    Router::new()
        .route("/health", get(health_handler::<C>))
        .merge(read_routes)
        .merge(write_routes)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves the router until the process is interrupted.
pub async fn serve<C: ChainClient + 'static>(
    config: &RelayerConfig,
    state: SharedAppState<C>,
) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.api_bind_address, config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "relayer API listening");
    axum::serve(listener, app).await
}
