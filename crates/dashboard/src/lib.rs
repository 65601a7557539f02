//! OBD-II Terminal Dashboard
//!
//! Live gauges fed by an [`obd_telemetry::TelemetrySource`]. Readings arrive on
//! the polling task, are posted to the UI thread through [`Dashboard::pump`],
//! land in an [`ObservableField`] and re-render every [`Gauge`] bound to it.

mod cli;
mod dashboard;
mod error;
mod field;
mod gauge;
mod logging;
mod settings;
mod signals;
pub mod ui;

pub use cli::Cli;
pub use dashboard::{Dashboard, DashboardState, FieldUpdate, GaugeSpec};
pub use error::DashboardError;
pub use field::{ObservableField, SubscriptionId};
pub use gauge::{zero_pad, Gauge, GaugeFace, RenderMode};
pub use logging::init_logging;
pub use settings::{DashConfig, GaugeConfig};
pub use signals::SignalHandler;
