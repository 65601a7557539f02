//! Telemetry source: connection handle plus background polling worker

use crate::scheduler::{PidScheduler, SchedulerConfig};
use obd_protocol::{
    ObdClient, ObdError, ObdProtocol, Pid, Reading, SupportedPids, DEFAULT_BAUD_RATE,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Callback invoked with every fresh reading of a watched PID
///
/// Runs on the polling task, not on the consumer's thread.
pub type ReadingCallback = Box<dyn Fn(&Reading) + Send + Sync + 'static>;

/// The four operations a dashboard needs from a vehicle data source
pub trait TelemetrySource {
    /// Register a callback for `pid`. Only valid before [`TelemetrySource::start`].
    fn watch(&mut self, pid: Pid, callback: ReadingCallback);

    /// Begin polling every watched PID in the background
    fn start(&mut self) -> Result<(), ObdError>;

    /// Stop polling and close the connection. Safe to call more than once.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Connection settings for [`ObdTelemetry`]
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Serial device; `None` probes candidate ports
    pub port: Option<String>,
    pub baud_rate: u32,
    pub protocol: ObdProtocol,
    /// Per-command timeout once connected
    pub query_timeout: Duration,
    pub scheduler: SchedulerConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            protocol: ObdProtocol::Auto,
            query_timeout: Duration::from_millis(2000),
            scheduler: SchedulerConfig::default(),
        }
    }
}

struct Worker {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// [`TelemetrySource`] backed by an [`ObdClient`] and a tokio polling task
///
/// `connect` and `stop` block on the runtime behind `runtime`, so they belong
/// on a thread outside any runtime. Stopping or dropping from inside a runtime
/// does not block: the polling task is aborted but not joined, so a callback
/// already running may still finish after `stop` returns.
pub struct ObdTelemetry {
    runtime: Handle,
    client: Arc<Mutex<ObdClient>>,
    supported: SupportedPids,
    watches: BTreeMap<Pid, Vec<ReadingCallback>>,
    scheduler_config: SchedulerConfig,
    worker: Option<Worker>,
    closed: bool,
}

impl ObdTelemetry {
    /// Open the adapter connection. Fails if no adapter answers.
    pub fn connect(config: &TelemetryConfig, runtime: Handle) -> Result<Self, ObdError> {
        let mut client = runtime.block_on(ObdClient::connect(
            config.port.as_deref(),
            config.baud_rate,
            config.protocol,
        ))?;
        client.set_timeout(config.query_timeout);
        Ok(Self::from_client(client, config, runtime))
    }

    /// Wrap an already-connected client, e.g. [`ObdClient::mock`]
    pub fn from_client(client: ObdClient, config: &TelemetryConfig, runtime: Handle) -> Self {
        info!(
            "Telemetry source ready on {} ({:?})",
            client.device(),
            client.protocol()
        );
        Self {
            runtime,
            supported: client.supported(),
            client: Arc::new(Mutex::new(client)),
            watches: BTreeMap::new(),
            scheduler_config: config.scheduler.clone(),
            worker: None,
            closed: false,
        }
    }

    /// Number of PIDs with at least one callback
    pub fn watched_count(&self) -> usize {
        self.watches.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl TelemetrySource for ObdTelemetry {
    fn watch(&mut self, pid: Pid, callback: ReadingCallback) {
        if self.worker.is_some() || self.closed {
            warn!("Cannot watch {} while the source is running or closed", pid);
            return;
        }
        if !self.supported.contains(pid) {
            warn!("{} is not supported by this vehicle, not watching", pid);
            return;
        }
        debug!("Watching {}", pid);
        self.watches.entry(pid).or_default().push(callback);
    }

    fn start(&mut self) -> Result<(), ObdError> {
        if self.closed {
            return Err(ObdError::Disconnected);
        }
        if self.worker.is_some() {
            debug!("Telemetry source already running");
            return Ok(());
        }

        let watches = Arc::new(std::mem::take(&mut self.watches));
        let scheduler = PidScheduler::new(self.scheduler_config.clone(), watches.keys().copied());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = self.runtime.spawn(poll_loop(
            Arc::clone(&self.client),
            watches,
            scheduler,
            shutdown_rx,
        ));

        info!("Telemetry source started");
        self.worker = Some(Worker { shutdown, task });
        Ok(())
    }

    fn stop(&mut self) {
        if self.closed {
            debug!("Telemetry source already stopped");
            return;
        }
        self.closed = true;

        let in_runtime = Handle::try_current().is_ok();
        if let Some(worker) = self.worker.take() {
            let _ = worker.shutdown.send(true);
            // In-flight queries are dropped, not awaited
            worker.task.abort();
            if in_runtime {
                debug!("Stopped from inside a runtime, not joining the polling task");
            } else if let Err(e) = self.runtime.block_on(worker.task) {
                if !e.is_cancelled() {
                    warn!("Polling task ended abnormally: {}", e);
                }
            }
        }

        if !in_runtime {
            self.client.blocking_lock().disconnect();
        } else if let Ok(mut client) = self.client.try_lock() {
            client.disconnect();
        } else {
            let client = Arc::clone(&self.client);
            self.runtime.spawn(async move {
                client.lock().await.disconnect();
            });
        }
        info!("Telemetry source stopped");
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for ObdTelemetry {
    fn drop(&mut self) {
        if !self.closed {
            self.stop();
        }
    }
}

async fn poll_loop(
    client: Arc<Mutex<ObdClient>>,
    watches: Arc<BTreeMap<Pid, Vec<ReadingCallback>>>,
    mut scheduler: PidScheduler,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Polling {} PIDs", scheduler.pid_count());

    while let Some(scheduled) = scheduler.next() {
        let pid = scheduled.pid;
        let due = scheduled.next_query;

        let outcome = tokio::select! {
            _ = shutdown.changed() => break,
            outcome = async {
                tokio::time::sleep_until(due).await;
                client.lock().await.query(pid).await
            } => outcome,
        };

        match outcome {
            Ok(reading) => {
                debug!("{} = {} {}", pid, reading.magnitude, reading.unit);
                if let Some(callbacks) = watches.get(&pid) {
                    for callback in callbacks {
                        callback(&reading);
                    }
                }
                scheduler.complete(scheduled, true);
            }
            Err(ObdError::Disconnected) => {
                warn!("Adapter connection closed, polling stops");
                break;
            }
            Err(e) => {
                warn!("{} query failed: {}", pid, e);
                scheduler.complete(scheduled, false);
            }
        }
    }

    info!("Polling loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    fn mock_source(rt: &tokio::runtime::Runtime) -> ObdTelemetry {
        let config = TelemetryConfig {
            scheduler: SchedulerConfig {
                fast_rate_hz: 50.0,
                slow_rate_hz: 50.0,
                ..SchedulerConfig::default()
            },
            ..TelemetryConfig::default()
        };
        ObdTelemetry::from_client(ObdClient::mock(), &config, rt.handle().clone())
    }

    #[test]
    fn test_watched_callback_receives_readings() {
        let rt = runtime();
        let mut source = mock_source(&rt);
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);

        source.watch(
            Pid::Speed,
            Box::new(move |reading: &Reading| {
                let _ = tx.lock().unwrap().send(reading.clone());
            }),
        );
        assert_eq!(source.watched_count(), 1);

        source.start().unwrap();
        assert!(source.is_running());

        let reading = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(reading.pid, Pid::Speed);
        assert_eq!(reading.unit.as_str(), "km/h");

        source.stop();
        assert!(!source.is_running());
    }

    #[test]
    fn test_no_callbacks_after_stop() {
        let rt = runtime();
        let mut source = mock_source(&rt);
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);

        source.watch(
            Pid::Rpm,
            Box::new(move |_| {
                let _ = tx.lock().unwrap().send(());
            }),
        );
        source.start().unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();

        source.stop();
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(100));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_twice_and_no_restart() {
        let rt = runtime();
        let mut source = mock_source(&rt);
        source.start().unwrap();

        source.stop();
        source.stop();
        assert!(source.is_closed());
        assert!(matches!(source.start(), Err(ObdError::Disconnected)));
    }

    #[test]
    fn test_watch_after_start_is_ignored() {
        let rt = runtime();
        let mut source = mock_source(&rt);
        source.start().unwrap();
        source.watch(Pid::OilTemp, Box::new(|_| {}));
        assert_eq!(source.watched_count(), 0);
        source.stop();
    }

    #[test]
    fn test_connect_without_adapter_fails() {
        let rt = runtime();
        let config = TelemetryConfig {
            port: Some("/dev/obd-dash-does-not-exist".to_string()),
            ..TelemetryConfig::default()
        };
        let result = ObdTelemetry::connect(&config, rt.handle().clone());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stop_inside_runtime_does_not_block() {
        let config = TelemetryConfig::default();
        let mut source = ObdTelemetry::from_client(ObdClient::mock(), &config, Handle::current());
        let client = Arc::clone(&source.client);
        source.watch(Pid::Speed, Box::new(|_| {}));
        source.start().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        source.stop();
        assert!(source.is_closed());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!client.lock().await.is_connected());
    }

    #[tokio::test]
    async fn test_drop_inside_runtime_closes_client() {
        let config = TelemetryConfig::default();
        let source = ObdTelemetry::from_client(ObdClient::mock(), &config, Handle::current());
        let client = Arc::clone(&source.client);

        drop(source);
        assert!(!client.lock().await.is_connected());
    }
}
