//! Dashboard Error Types

use crate::dashboard::DashboardState;
use obd_protocol::ObdError;
use thiserror::Error;

/// Errors surfaced by the dashboard
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The telemetry source could not be opened
    #[error("Failed to connect to telemetry source: {0}")]
    Connect(#[source] ObdError),

    /// The telemetry source failed after connecting
    #[error("Telemetry source error: {0}")]
    Telemetry(#[from] ObdError),

    /// Lifecycle call made from the wrong state
    #[error("Cannot {action} a dashboard that is {state:?}")]
    InvalidState {
        action: &'static str,
        state: DashboardState,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// `protocol` is not an ELM327 `ATSP` number
    #[error("Unknown OBD protocol number {0} (expected 0-9)")]
    UnknownProtocol(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
