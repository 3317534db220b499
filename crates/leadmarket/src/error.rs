use thiserror::Error;

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;

/// Failures that take the whole process down, as opposed to the
/// per-request errors each router maps to status codes itself.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
}
