//! Dashboard wiring: fields, gauges and the telemetry source lifecycle

use crate::error::DashboardError;
use crate::field::ObservableField;
use crate::gauge::{Gauge, RenderMode};
use obd_protocol::{ObdError, Pid, Reading};
use obd_telemetry::TelemetrySource;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One gauge of the layout
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeSpec {
    pub pid: Pid,
    pub label: String,
    pub mode: RenderMode,
}

impl GaugeSpec {
    pub fn digits(pid: Pid, label: impl Into<String>, padding: usize) -> Self {
        Self {
            pid,
            label: label.into(),
            mode: RenderMode::Digits { padding },
        }
    }

    pub fn bar(pid: Pid, label: impl Into<String>) -> Self {
        Self {
            pid,
            label: label.into(),
            mode: RenderMode::Bar,
        }
    }
}

/// Lifecycle of a [`Dashboard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardState {
    Uninitialized,
    Running,
    /// Terminal
    Stopped,
}

/// A value posted from the telemetry task to the UI thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldUpdate {
    pub pid: Pid,
    pub value: f64,
}

/// Owns every field, every gauge and the telemetry source handle
pub struct Dashboard<S: TelemetrySource> {
    fields: BTreeMap<Pid, ObservableField>,
    gauges: Vec<Gauge>,
    updates_tx: mpsc::UnboundedSender<FieldUpdate>,
    updates_rx: mpsc::UnboundedReceiver<FieldUpdate>,
    source: Option<S>,
    state: DashboardState,
}

impl<S: TelemetrySource> Dashboard<S> {
    /// Build fields (one per distinct PID, default 0) and bind a gauge per spec
    pub fn new(layout: &[GaugeSpec]) -> Self {
        let mut fields = BTreeMap::new();
        let mut gauges = Vec::with_capacity(layout.len());

        for spec in layout {
            let field = fields
                .entry(spec.pid)
                .or_insert_with(|| ObservableField::new(spec.pid.name()));
            gauges.push(Gauge::bind(spec.label.clone(), spec.mode, field));
        }

        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        info!(
            "Dashboard created with {} gauges over {} fields",
            gauges.len(),
            fields.len()
        );

        Self {
            fields,
            gauges,
            updates_tx,
            updates_rx,
            source: None,
            state: DashboardState::Uninitialized,
        }
    }

    /// Open the source, watch every monitored PID and start polling
    ///
    /// A connection failure is returned as-is and leaves the dashboard
    /// `Uninitialized`.
    pub fn start<F>(&mut self, connect: F) -> Result<(), DashboardError>
    where
        F: FnOnce() -> Result<S, ObdError>,
    {
        if self.state != DashboardState::Uninitialized {
            return Err(DashboardError::InvalidState {
                action: "start",
                state: self.state,
            });
        }

        let mut source = connect().map_err(DashboardError::Connect)?;

        for &pid in self.fields.keys() {
            let updates = self.updates_tx.clone();
            source.watch(
                pid,
                Box::new(move |reading: &Reading| {
                    // The receiver only disappears with the dashboard itself
                    let _ = updates.send(FieldUpdate {
                        pid,
                        value: reading.magnitude,
                    });
                }),
            );
        }

        if let Err(e) = source.start() {
            source.stop();
            return Err(e.into());
        }

        info!("Dashboard running, monitoring {} PIDs", self.fields.len());
        self.source = Some(source);
        self.state = DashboardState::Running;
        Ok(())
    }

    /// Apply every posted update to its field. Call from the UI thread.
    ///
    /// Returns the number of updates applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates_rx.try_recv() {
            if let Some(field) = self.fields.get_mut(&update.pid) {
                field.set(update.value);
                applied += 1;
            }
        }
        applied
    }

    /// Close the telemetry source. Later calls do nothing.
    pub fn stop(&mut self) {
        match self.state {
            DashboardState::Running => {
                if let Some(mut source) = self.source.take() {
                    source.stop();
                }
                info!("Dashboard stopped");
            }
            DashboardState::Uninitialized => debug!("Dashboard stopped before it started"),
            DashboardState::Stopped => {
                debug!("Dashboard already stopped");
                return;
            }
        }
        self.state = DashboardState::Stopped;
    }

    pub fn state(&self) -> DashboardState {
        self.state
    }

    pub fn gauges(&self) -> &[Gauge] {
        &self.gauges
    }

    pub fn field(&self, pid: Pid) -> Option<&ObservableField> {
        self.fields.get(&pid)
    }

    /// PIDs with a field, in code order
    pub fn monitored(&self) -> impl Iterator<Item = Pid> + '_ {
        self.fields.keys().copied()
    }
}

impl<S: TelemetrySource> Drop for Dashboard<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_telemetry::ReadingCallback;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Shared view into a [`FakeSource`] the test keeps after handing it over
    #[derive(Clone, Default)]
    struct Probe {
        callbacks: Arc<Mutex<Vec<(Pid, ReadingCallback)>>>,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl Probe {
        /// Invoke the callbacks for `pid` the way a polling task would
        fn fire(&self, pid: Pid, magnitude: f64) {
            let reading = Reading {
                pid,
                magnitude,
                unit: pid.unit(),
                timestamp_ms: 0,
            };
            for (watched, callback) in self.callbacks.lock().unwrap().iter() {
                if *watched == pid {
                    callback(&reading);
                }
            }
        }

        fn watched(&self) -> Vec<Pid> {
            self.callbacks.lock().unwrap().iter().map(|(pid, _)| *pid).collect()
        }
    }

    struct FakeSource {
        probe: Probe,
        running: bool,
    }

    impl FakeSource {
        fn new(probe: Probe) -> Self {
            Self {
                probe,
                running: false,
            }
        }
    }

    impl TelemetrySource for FakeSource {
        fn watch(&mut self, pid: Pid, callback: ReadingCallback) {
            self.probe.callbacks.lock().unwrap().push((pid, callback));
        }

        fn start(&mut self) -> Result<(), ObdError> {
            self.probe.starts.fetch_add(1, Ordering::SeqCst);
            self.running = true;
            Ok(())
        }

        fn stop(&mut self) {
            self.probe.stops.fetch_add(1, Ordering::SeqCst);
            self.running = false;
        }

        fn is_running(&self) -> bool {
            self.running
        }
    }

    fn layout() -> Vec<GaugeSpec> {
        vec![
            GaugeSpec::digits(Pid::Speed, "Speed (km/h)", 3),
            GaugeSpec::digits(Pid::Rpm, "RPM", 4),
            GaugeSpec::digits(Pid::CoolantTemp, "Coolant (°C)", 3),
            GaugeSpec::digits(Pid::OilTemp, "Oil (°C)", 3),
            GaugeSpec::bar(Pid::ThrottlePosition, "Throttle (%)"),
        ]
    }

    fn started(probe: &Probe) -> Dashboard<FakeSource> {
        let mut dashboard = Dashboard::new(&layout());
        let probe = probe.clone();
        dashboard.start(move || Ok(FakeSource::new(probe))).unwrap();
        dashboard
    }

    #[test]
    fn test_fields_start_at_zero() {
        let dashboard: Dashboard<FakeSource> = Dashboard::new(&layout());
        assert_eq!(dashboard.state(), DashboardState::Uninitialized);
        assert_eq!(dashboard.field(Pid::Speed).map(|f| f.get()), Some(0.0));
        assert_eq!(dashboard.gauges()[0].text(), "000");
    }

    #[test]
    fn test_start_watches_each_pid_once() {
        let probe = Probe::default();
        let dashboard = started(&probe);

        assert_eq!(dashboard.state(), DashboardState::Running);
        assert_eq!(probe.starts.load(Ordering::SeqCst), 1);
        let mut watched = probe.watched();
        watched.sort();
        assert_eq!(
            watched,
            vec![
                Pid::CoolantTemp,
                Pid::Rpm,
                Pid::Speed,
                Pid::ThrottlePosition,
                Pid::OilTemp,
            ]
        );
    }

    #[test]
    fn test_updates_apply_only_on_pump() {
        let probe = Probe::default();
        let mut dashboard = started(&probe);

        probe.fire(Pid::Speed, 42.0);
        assert_eq!(dashboard.gauges()[0].text(), "000");

        assert_eq!(dashboard.pump(), 1);
        assert_eq!(dashboard.gauges()[0].text(), "042");

        probe.fire(Pid::Speed, 100.0);
        dashboard.pump();
        assert_eq!(dashboard.gauges()[0].text(), "100");
    }

    #[test]
    fn test_rpm_and_speed_in_succession() {
        let probe = Probe::default();
        let mut dashboard = started(&probe);

        probe.fire(Pid::Rpm, 2750.0);
        probe.fire(Pid::Speed, 63.0);
        assert_eq!(dashboard.pump(), 2);

        assert_eq!(dashboard.gauges()[0].text(), "063");
        assert_eq!(dashboard.gauges()[1].text(), "2750");
    }

    #[test]
    fn test_every_update_renders_in_order() {
        let probe = Probe::default();
        let mut dashboard = started(&probe);
        let speed = &dashboard.gauges()[0];
        let before = speed.render_count();

        for value in [10.0, 20.0, 20.0, 5.0] {
            probe.fire(Pid::Speed, value);
        }
        dashboard.pump();

        let speed = &dashboard.gauges()[0];
        assert_eq!(speed.render_count(), before + 4);
        assert_eq!(speed.text(), "005");
    }

    #[test]
    fn test_oil_and_coolant_stay_separate() {
        let probe = Probe::default();
        let mut dashboard = started(&probe);

        probe.fire(Pid::OilTemp, 104.0);
        probe.fire(Pid::CoolantTemp, 88.0);
        dashboard.pump();

        assert_eq!(dashboard.field(Pid::OilTemp).map(|f| f.get()), Some(104.0));
        assert_eq!(
            dashboard.field(Pid::CoolantTemp).map(|f| f.get()),
            Some(88.0)
        );
        assert_eq!(dashboard.gauges()[2].text(), "088");
        assert_eq!(dashboard.gauges()[3].text(), "104");
    }

    #[test]
    fn test_throttle_bar() {
        let probe = Probe::default();
        let mut dashboard = started(&probe);

        probe.fire(Pid::ThrottlePosition, 37.0);
        dashboard.pump();
        assert_eq!(dashboard.gauges()[4].percent(), 37.0);

        probe.fire(Pid::ThrottlePosition, 120.0);
        dashboard.pump();
        assert_eq!(dashboard.gauges()[4].percent(), 120.0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let probe = Probe::default();
        let mut dashboard = started(&probe);

        dashboard.stop();
        dashboard.stop();
        drop(dashboard);

        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_stops_running_dashboard() {
        let probe = Probe::default();
        drop(started(&probe));
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_restart_after_stop() {
        let probe = Probe::default();
        let mut dashboard = started(&probe);
        dashboard.stop();

        let again = probe.clone();
        let result = dashboard.start(move || Ok(FakeSource::new(again)));
        assert!(matches!(
            result,
            Err(DashboardError::InvalidState {
                state: DashboardState::Stopped,
                ..
            })
        ));
        assert_eq!(probe.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_connect_failure_never_runs() {
        let mut dashboard: Dashboard<FakeSource> = Dashboard::new(&layout());
        let result = dashboard.start(|| Err(ObdError::AdapterNotFound));

        assert!(matches!(
            result,
            Err(DashboardError::Connect(ObdError::AdapterNotFound))
        ));
        assert_eq!(dashboard.state(), DashboardState::Uninitialized);
    }

    #[test]
    fn test_shared_field_feeds_two_gauges() {
        let probe = Probe::default();
        let mut dashboard = Dashboard::new(&[
            GaugeSpec::digits(Pid::ThrottlePosition, "Throttle", 3),
            GaugeSpec::bar(Pid::ThrottlePosition, "Throttle bar"),
        ]);
        let source_probe = probe.clone();
        dashboard
            .start(move || Ok(FakeSource::new(source_probe)))
            .unwrap();

        assert_eq!(probe.watched(), vec![Pid::ThrottlePosition]);
        probe.fire(Pid::ThrottlePosition, 55.7);
        dashboard.pump();
        assert_eq!(dashboard.gauges()[0].text(), "055");
        assert_eq!(dashboard.gauges()[1].percent(), 55.7);
    }
}
