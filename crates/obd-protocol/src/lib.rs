//! OBD-II Protocol Implementation
//!
//! This crate provides async serial communication with ELM327-compatible
//! OBD-II adapters and decodes Mode 01 responses into [`Reading`]s.

mod client;
pub mod elm327;
mod error;
mod pid;
mod protocol;

pub use client::{ObdClient, DEFAULT_BAUD_RATE};
pub use error::ObdError;
pub use pid::{Pid, Reading, SupportedPids, Unit};
pub use protocol::ObdProtocol;

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Positive response offset added to the request mode
    pub const RESPONSE_OFFSET: u8 = 0x40;
}
