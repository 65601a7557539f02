//! SIGTERM/SIGINT handling for the UI loop
//!
//! Uses the `signal-hook` crate for safe signal registration. The UI loop
//! polls the flag each iteration rather than blocking on signals.

use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Shutdown flag shared between the signal handler and the UI loop
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a new handler and register OS signal hooks.
    ///
    /// Registration is best-effort; failures are logged but not fatal.
    pub fn new() -> Self {
        let handler = Self::unregistered();

        for signal in [SIGTERM, SIGINT] {
            let flag = Arc::clone(&handler.shutdown_flag);
            if let Err(e) = signal_hook::flag::register(signal, flag) {
                warn!("Failed to register handler for signal {}: {}", signal, e);
            }
        }
        handler
    }

    /// A handler that only reacts to [`SignalHandler::request_shutdown`]
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check whether a shutdown has been requested.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shutdown() {
        let handler = SignalHandler::unregistered();
        let clone = handler.clone();
        assert!(!handler.should_shutdown());
        clone.request_shutdown();
        assert!(handler.should_shutdown());
    }
}
