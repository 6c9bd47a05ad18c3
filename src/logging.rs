//! Structured Logging for the Relayer
//!
//! Production-ready structured logging: JSON output for log aggregation,
//! correlation IDs for request tracing, and category-tagged events for the
//! indexer/publisher/withdrawal/security/system concerns.
//!
//! # Usage
//!
//! ```no_run
//! use shielded_relayer::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true).unwrap(); // JSON mode for production
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// API request/response events
    Api,
    /// Event indexer sync events
    Indexer,
    /// Root publisher events
    Publisher,
    /// Withdrawal/transfer submission events
    Withdrawal,
    /// Security events (validation failures, rate limiting)
    Security,
    /// System events (startup, shutdown, checkpoint I/O)
    System,
}

/// Structured log event.
#[derive(Debug, Serialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: format!("{:?}", level).to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails { code: code.into(), message: message.into() });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!("{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}", self.message))
    }
}

// ============================================================================
// Domain Event Logging
// ============================================================================

pub fn log_security_event(
    event_type: &str,
    success: bool,
    details: serde_json::Value,
    correlation_id: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let event = LogEvent::new(level, EventCategory::Security, event_type)
        .with_data(serde_json::json!({ "success": success, "details": details }));
    let event = if let Some(id) = correlation_id { event.with_correlation_id(id) } else { event };

    if success {
        tracing::info!(target: "relayer::security", "{}", event.to_json());
    } else {
        tracing::warn!(target: "relayer::security", "{}", event.to_json());
    }
}

pub fn log_api_request(method: &str, path: &str, client_ip: Option<&str>, correlation_id: &str) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::Api, format!("{} {}", method, path))
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({ "method": method, "path": path, "client_ip": client_ip }));

    tracing::info!(target: "relayer::api", "{}", event.to_json());
}

pub fn log_api_response(method: &str, path: &str, status: u16, duration_ms: u64, correlation_id: &str) {
    let level = if status >= 500 {
        LogLevel::Error
    } else if status >= 400 {
        LogLevel::Warn
    } else {
        LogLevel::Info
    };

    let event = LogEvent::new(level, EventCategory::Api, format!("{} {} -> {}", method, path, status))
        .with_correlation_id(correlation_id)
        .with_duration(duration_ms)
        .with_data(serde_json::json!({ "method": method, "path": path, "status": status }));

    match level {
        LogLevel::Error => tracing::error!(target: "relayer::api", "{}", event.to_json()),
        LogLevel::Warn => tracing::warn!(target: "relayer::api", "{}", event.to_json()),
        _ => tracing::info!(target: "relayer::api", "{}", event.to_json()),
    }
}

/// Log a sync batch completed by the indexer for a chain.
pub fn log_indexer_event(
    event_type: &str,
    chain_id: u64,
    from_block: u64,
    to_block: u64,
    leaves_inserted: u64,
    error: Option<&str>,
) {
    let success = error.is_none();
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Indexer, event_type)
        .with_correlation_id(format!("chain-{}", chain_id))
        .with_data(serde_json::json!({
            "chain_id": chain_id,
            "from_block": from_block,
            "to_block": to_block,
            "leaves_inserted": leaves_inserted,
        }));

    if let Some(err) = error {
        event = event.with_error("INDEXER_ERROR", err);
    }

    if success {
        tracing::info!(target: "relayer::indexer", "{}", event.to_json());
    } else {
        tracing::error!(target: "relayer::indexer", "{}", event.to_json());
    }
}

/// Log a root publication attempt.
pub fn log_publisher_event(chain_id: u64, root: &str, success: bool, tx_hash: Option<&str>, error: Option<&str>) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Publisher, "postRootIfNeeded")
        .with_correlation_id(format!("chain-{}", chain_id))
        .with_data(serde_json::json!({
            "chain_id": chain_id,
            "root": root,
            "tx_hash": tx_hash,
            "success": success,
        }));

    if let Some(err) = error {
        event = event.with_error("PUBLISH_FAILED", err);
    }

    if success {
        tracing::info!(target: "relayer::publisher", "{}", event.to_json());
    } else {
        tracing::error!(target: "relayer::publisher", "{}", event.to_json());
    }
}

/// Log a withdrawal or transfer submission.
pub fn log_withdrawal_event(
    event_type: &str,
    request_id: &str,
    chain_id: u64,
    success: bool,
    tx_hash: Option<&str>,
    error: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Withdrawal, event_type)
        .with_correlation_id(request_id)
        .with_data(serde_json::json!({
            "request_id": request_id,
            "chain_id": chain_id,
            "tx_hash": tx_hash,
            "success": success,
        }));

    if let Some(err) = error {
        event = event.with_error("WITHDRAWAL_ERROR", err);
    }

    if success {
        tracing::info!(target: "relayer::withdrawal", "{}", event.to_json());
    } else {
        tracing::error!(target: "relayer::withdrawal", "{}", event.to_json());
    }
}

// ============================================================================
// Initialization
// ============================================================================

pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let level_str = format!("{:?}", level).to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("relayer={},tower_http={},axum={}", level_str, level_str, level_str))
    });

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );
        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );
        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

pub fn init_from_config(config: &crate::config::RelayerConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    // JSON everywhere except when RELAYER_LOG_PRETTY=1 is set for local dev.
    let json_format = std::env::var("RELAYER_LOG_PRETTY").as_deref() != Ok("1");
    init_logging(level, json_format)
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

// ============================================================================
// Request ID Generation
// ============================================================================

/// Generate a unique correlation ID for request tracing.
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_event_serialization() {
        let event = LogEvent::new(LogLevel::Info, EventCategory::Api, "Test event")
            .with_correlation_id("test-123")
            .with_data(serde_json::json!({"key": "value"}))
            .with_duration(42);

        let json = event.to_json();
        assert!(json.contains("Test event"));
        assert!(json.contains("test-123"));
        assert!(json.contains("42"));
    }

    #[test]
    fn log_level_parsing() {
        assert_eq!(LogLevel::from("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
    }

    #[test]
    fn correlation_ids_are_unique() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }
}
