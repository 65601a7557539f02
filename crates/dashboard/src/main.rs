//! OBD-II Terminal Dashboard - Main Entry Point

use anyhow::Context;
use clap::Parser;
use dashboard::{init_logging, ui, Cli, Dashboard, SignalHandler};
use obd_protocol::ObdClient;
use obd_telemetry::ObdTelemetry;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("loading configuration")?;
    init_logging(&config.log_file, &config.log_level)?;

    info!("=== OBD Dashboard v{} ===", env!("CARGO_PKG_VERSION"));

    // Declared first so it outlives the dashboard and its polling task
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let signals = SignalHandler::new();
    let telemetry = config.telemetry()?;

    let mut dashboard = Dashboard::new(&config.layout());
    let handle = runtime.handle().clone();
    let demo = config.demo;
    dashboard
        .start(move || {
            if demo {
                info!("Demo mode: using simulated vehicle");
                Ok(ObdTelemetry::from_client(ObdClient::mock(), &telemetry, handle))
            } else {
                ObdTelemetry::connect(&telemetry, handle)
            }
        })
        .context("connecting to the vehicle")?;

    let result = ui::run(&mut dashboard, config.tick(), &signals);
    dashboard.stop();

    if let Err(e) = &result {
        error!("Terminal UI failed: {}", e);
    }
    result.context("terminal UI failed")
}
