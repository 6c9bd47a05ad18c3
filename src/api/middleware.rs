//! API Middleware — Input Validation and Rate Limiting
//!
//! Security middleware for the relayer API: request validation helpers for
//! the EVM-shaped wire types (`bytes32`, `address`, decimal field strings),
//! per-IP rate limiting, and security headers.

use crate::logging::log_security_event;
use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

// ============================================================================
// Rate Limiting
// ============================================================================

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            burst: 20,
        }
    }
}

impl RateLimitConfig {
    /// Stricter config for the withdraw/transfer endpoints.
    pub fn strict() -> Self {
        Self { max_requests: 10, window: Duration::from_secs(60), burst: 5 }
    }

    /// Lenient config for read-only endpoints (root, proof, status).
    pub fn lenient() -> Self {
        Self { max_requests: 500, window: Duration::from_secs(60), burst: 100 }
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
    burst_tokens: u32,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    entries: RwLock<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, entries: RwLock::new(HashMap::new()) }
    }

    pub async fn check(&self, client_id: &str) -> Result<(), RateLimitError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let entry = entries.entry(client_id.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
            burst_tokens: self.config.burst,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
            entry.burst_tokens = self.config.burst.min(entry.burst_tokens + 5);
        }

        if entry.count < self.config.max_requests {
            entry.count += 1;
            Ok(())
        } else if entry.burst_tokens > 0 {
            entry.burst_tokens -= 1;
            entry.count += 1;
            Ok(())
        } else {
            let retry_after =
                self.config.window.as_secs() - now.duration_since(entry.window_start).as_secs();
            Err(RateLimitError::Exceeded { retry_after })
        }
    }

    pub async fn cleanup(&self) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let expiry = self.config.window * 2;
        entries.retain(|_, entry| now.duration_since(entry.window_start) < expiry);
    }
}

#[derive(Debug)]
pub enum RateLimitError {
    Exceeded { retry_after: u64 },
}

// ============================================================================
// Input Validation
// ============================================================================

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, errors: vec![] }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self { is_valid: false, errors: vec![msg.into()] }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self
    }
}

/// Validate a `0x`-prefixed, 64-hex-char bytes32 value.
pub fn validate_bytes32(input: &str, field_name: &str) -> ValidationResult {
    let Some(hex_part) = input.strip_prefix("0x") else {
        return ValidationResult::error(format!("{} must be 0x-prefixed", field_name));
    };
    if hex_part.len() != 64 {
        return ValidationResult::error(format!("{} must be exactly 64 hex characters", field_name));
    }
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return ValidationResult::error(format!("{} must be valid hex", field_name));
    }
    ValidationResult::ok()
}

/// Validate a `0x`-prefixed, 40-hex-char EVM address (checksum not enforced).
pub fn validate_address(input: &str, field_name: &str) -> ValidationResult {
    let Some(hex_part) = input.strip_prefix("0x") else {
        return ValidationResult::error(format!("{} must be 0x-prefixed", field_name));
    };
    if hex_part.len() != 40 {
        return ValidationResult::error(format!("{} must be exactly 40 hex characters", field_name));
    }
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return ValidationResult::error(format!("{} must be valid hex", field_name));
    }
    ValidationResult::ok()
}

/// Validate a non-negative leaf index given as a path parameter string.
pub fn validate_leaf_index(input: &str) -> Result<u64, ValidationResult> {
    input
        .parse::<u64>()
        .map_err(|_| ValidationResult::error("leafIndex must be a non-negative integer"))
}

/// Validate a decimal field-element string (`< p`).
pub fn validate_field_decimal(input: &str, field_name: &str) -> ValidationResult {
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return ValidationResult::error(format!("{} must be a decimal integer string", field_name));
    }
    match crate::field::Field::from_decimal(input) {
        Ok(_) => ValidationResult::ok(),
        Err(_) => ValidationResult::error(format!("{} is not a canonical field element", field_name)),
    }
}

// ============================================================================
// Middleware Types
// ============================================================================

pub type RateLimitState = Arc<RateLimiter>;

pub fn create_rate_limiter() -> RateLimitState {
    Arc::new(RateLimiter::new(RateLimitConfig::default()))
}

pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            return Some(value.split(',').next()?.trim().to_string());
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return Some(value.to_string());
        }
    }
    None
}

#[derive(Serialize)]
pub struct ValidationError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let status = if self.code.as_deref() == Some("RATE_LIMITED") {
            StatusCode::TOO_MANY_REQUESTS
        } else if self.code.as_deref() == Some("VALIDATION_ERROR") {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self)).into_response()
    }
}

pub async fn rate_limit_middleware(
    headers: HeaderMap,
    rate_limiter: RateLimitState,
    request: Request,
    next: Next,
) -> Result<Response, ValidationError> {
    let client_id = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    let path = request.uri().path().to_string();

    match rate_limiter.check(&client_id).await {
        Ok(()) => {
            log_security_event(
                "rateLimitCheck",
                true,
                serde_json::json!({ "client_id": client_id, "path": path }),
                None,
            );
            Ok(next.run(request).await)
        }
        Err(RateLimitError::Exceeded { retry_after }) => {
            log_security_event(
                "rateLimitCheck",
                false,
                serde_json::json!({ "client_id": client_id, "path": path, "retry_after": retry_after }),
                None,
            );
            Err(ValidationError {
                error: "Rate limit exceeded".to_string(),
                code: Some("RATE_LIMITED".to_string()),
                details: vec![],
                retry_after: Some(retry_after),
            })
        }
    }
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("X-XSS-Protection", "1; mode=block".parse().unwrap());
    headers.insert(
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains".parse().unwrap(),
    );
    headers.insert("Content-Security-Policy", "default-src 'self'".parse().unwrap());

    response
}

// ============================================================================
// Tests
// ============================================================================
