//! Common utilities shared by the document store client crates.
//!
//! This crate provides:
//! - Unified error taxonomy with store status-code classification
//! - Connection configuration with aggregated validation
//! - Shared constants and tracing bootstrap

pub mod config;
pub mod constants;
pub mod error;
pub mod telemetry;

pub use config::{ConnectionConfig, ConnectionMode};
pub use error::{AppError, AppResult};
