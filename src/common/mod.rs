//! Common Infrastructure Module
//!
//! Shared utilities for the relayer: error taxonomy, plus re-exports of the
//! top-level config/logging modules so callers can `use common::Result`
//! alongside them.

pub mod error;

pub use crate::config::{self, ChainConfig, ConfigError, RelayerConfig};
pub use crate::logging::{self, EventCategory, LogEvent, LogLevel, LoggingError};
pub use error::{RelayerError, Result};
