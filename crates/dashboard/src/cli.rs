//! Command-line flags layered over the loaded configuration

use crate::error::DashboardError;
use crate::settings::{DashConfig, CONFIG_FILE};
use clap::Parser;
use std::path::PathBuf;

/// Live OBD-II gauges in the terminal
#[derive(Debug, Parser)]
#[command(name = "obd-dash", author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to read instead of ./obd-dash.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Serial device of the adapter, overriding the config file
    #[arg(long, value_name = "DEVICE")]
    pub port: Option<String>,
    /// Drive the gauges from a simulated vehicle
    #[arg(long)]
    pub demo: bool,
}

impl Cli {
    /// Load the configuration this invocation points at, then apply the flags
    pub fn load_config(&self) -> Result<DashConfig, DashboardError> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        let mut config = DashConfig::load_file(&path)?;
        self.apply(&mut config);
        Ok(config)
    }

    /// Flags win over file and environment settings
    pub fn apply(&self, config: &mut DashConfig) {
        if let Some(port) = &self.port {
            config.port = Some(port.clone());
        }
        if self.demo {
            config.demo = true;
        }
    }
}
