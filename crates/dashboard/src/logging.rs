//! Logging setup
//!
//! The terminal belongs to the UI, so log lines go to a file.

use crate::error::DashboardError;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging to `path`, appending
///
/// Unknown `level` names fall back to `info`.
pub fn init_logging(path: &Path, level: &str) -> Result<(), DashboardError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let level = level.parse::<Level>().unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| DashboardError::Logging(e.to_string()))
}
