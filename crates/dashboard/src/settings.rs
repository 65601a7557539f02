//! Dashboard configuration
//!
//! Loaded from an optional `obd-dash.toml` in the working directory, then
//! overridden by `OBD_*` environment variables (`OBD_PORT=/dev/ttyUSB0`).

use crate::dashboard::GaugeSpec;
use crate::error::DashboardError;
use config::{Config, Environment, File};
use obd_protocol::{ObdProtocol, Pid, DEFAULT_BAUD_RATE};
use obd_telemetry::{SchedulerConfig, TelemetryConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up next to the process
pub const CONFIG_FILE: &str = "obd-dash.toml";

/// Prefix of the environment overrides
pub const ENV_PREFIX: &str = "OBD";

/// One gauge entry of the `gauges` list
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GaugeConfig {
    pub pid: Pid,
    pub label: String,
    /// Digit count for digit gauges
    #[serde(default)]
    pub padding: Option<usize>,
    /// Render as a percentage bar instead of digits
    #[serde(default)]
    pub bar: bool,
}

impl GaugeConfig {
    fn digits(pid: Pid, label: &str, padding: usize) -> Self {
        Self {
            pid,
            label: label.to_string(),
            padding: Some(padding),
            bar: false,
        }
    }

    fn bar(pid: Pid, label: &str) -> Self {
        Self {
            pid,
            label: label.to_string(),
            padding: None,
            bar: true,
        }
    }

    pub fn to_spec(&self) -> GaugeSpec {
        if self.bar {
            GaugeSpec::bar(self.pid, self.label.clone())
        } else {
            GaugeSpec::digits(self.pid, self.label.clone(), self.padding.unwrap_or(1))
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    /// Serial device of the adapter; unset means auto-detect
    pub port: Option<String>,
    pub baud_rate: u32,
    /// ELM327 `ATSP` protocol number, 0 = automatic
    pub protocol: u8,
    pub fast_rate_hz: f64,
    pub slow_rate_hz: f64,
    pub max_retries: u8,
    pub query_timeout_ms: u64,
    /// UI loop wake-up interval
    pub tick_ms: u64,
    pub log_file: PathBuf,
    pub log_level: String,
    /// Use the simulated vehicle instead of a real adapter
    pub demo: bool,
    pub gauges: Vec<GaugeConfig>,
}

impl Default for DashConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            protocol: 0,
            fast_rate_hz: scheduler.fast_rate_hz,
            slow_rate_hz: scheduler.slow_rate_hz,
            max_retries: scheduler.max_retries,
            query_timeout_ms: 2000,
            tick_ms: 50,
            log_file: PathBuf::from("obd-dash.log"),
            log_level: "info".to_string(),
            demo: false,
            gauges: vec![
                GaugeConfig::digits(Pid::Speed, "Speed (km/h)", 3),
                GaugeConfig::digits(Pid::Rpm, "RPM", 4),
                GaugeConfig::digits(Pid::CoolantTemp, "Coolant (°C)", 3),
                GaugeConfig::digits(Pid::OilTemp, "Oil (°C)", 3),
                GaugeConfig::bar(Pid::ThrottlePosition, "Throttle (%)"),
            ],
        }
    }
}

impl DashConfig {
    /// Load a config file (if present) and the process environment
    pub fn load_file(path: &Path) -> Result<Self, DashboardError> {
        Self::load_from(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(path: &Path, environment: Environment) -> Result<Self, DashboardError> {
        let mut config: Self = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;

        // OBD_PORT= (empty) means auto-detect
        if config.port.as_deref().is_some_and(|p| p.trim().is_empty()) {
            config.port = None;
        }
        Ok(config)
    }

    /// Settings handed to the telemetry source
    pub fn telemetry(&self) -> Result<TelemetryConfig, DashboardError> {
        let protocol = ObdProtocol::from_elm_number(self.protocol)
            .ok_or(DashboardError::UnknownProtocol(self.protocol))?;

        Ok(TelemetryConfig {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            protocol,
            query_timeout: Duration::from_millis(self.query_timeout_ms),
            scheduler: SchedulerConfig {
                fast_rate_hz: self.fast_rate_hz,
                slow_rate_hz: self.slow_rate_hz,
                max_retries: self.max_retries,
                ..SchedulerConfig::default()
            },
        })
    }

    pub fn layout(&self) -> Vec<GaugeSpec> {
        self.gauges.iter().map(GaugeConfig::to_spec).collect()
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}
