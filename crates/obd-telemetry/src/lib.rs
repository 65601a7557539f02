//! OBD-II Telemetry Source
//!
//! Polls the PIDs a consumer watches on a background task and hands every
//! decoded [`obd_protocol::Reading`] to the callbacks registered for it.

mod scheduler;
mod source;

pub use scheduler::{PidScheduler, ScheduledPid, SchedulerConfig};
pub use source::{ObdTelemetry, ReadingCallback, TelemetryConfig, TelemetrySource};
