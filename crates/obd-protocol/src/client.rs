//! OBD-II Client for ELM327 Adapters
//!
//! Provides async serial communication with OBD-II adapters.

use crate::elm327::{self, INIT_COMMANDS, PROMPT};
use crate::error::ObdError;
use crate::pid::{Pid, Reading, SupportedPids};
use crate::protocol::ObdProtocol;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Default timeout for OBD commands
const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// ELM327 adapters ship configured for 38400 baud
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Port name prefixes tried during auto-detection, in order
const CANDIDATE_PREFIXES: [&str; 5] = [
    "/dev/ttyUSB",
    "/dev/ttyACM",
    "/dev/rfcomm",
    "/dev/tty.",
    "COM",
];

/// Underlying transport of a client
enum Link {
    Serial(SerialStream),
    Mock(MockVehicle),
    Closed,
}

/// OBD-II client for communicating with ELM327-compatible adapters
pub struct ObdClient {
    /// Serial port device path (e.g., "/dev/ttyUSB0" or "COM3")
    device: String,
    /// OBD protocol to use
    protocol: ObdProtocol,
    /// Command timeout
    timeout: Duration,
    /// Transport, `Closed` after disconnect
    link: Link,
    /// PIDs the vehicle advertised during initialization
    supported: SupportedPids,
    /// A timed-out command's reply may still arrive and must be discarded
    resync: bool,
}

impl ObdClient {
    /// Connect to an adapter and initialize it
    ///
    /// # Arguments
    /// * `address` - Serial port device path, or `None` to probe candidate ports
    /// * `baud_rate` - Baud rate for serial communication
    /// * `protocol` - OBD protocol passed to `ATSP`
    pub async fn connect(
        address: Option<&str>,
        baud_rate: u32,
        protocol: ObdProtocol,
    ) -> Result<Self, ObdError> {
        if let Some(device) = address {
            return Self::open(device, baud_rate, protocol).await;
        }

        let candidates = scan_ports();
        if candidates.is_empty() {
            warn!("No candidate serial ports found for auto-detection");
            return Err(ObdError::AdapterNotFound);
        }

        for device in candidates {
            match Self::open(&device, baud_rate, protocol).await {
                Ok(client) => return Ok(client),
                Err(e) => warn!("No usable adapter on {}: {}", device, e),
            }
        }

        Err(ObdError::AdapterNotFound)
    }

    async fn open(device: &str, baud_rate: u32, protocol: ObdProtocol) -> Result<Self, ObdError> {
        info!("Opening OBD adapter on {} at {} baud", device, baud_rate);
        let timeout = Duration::from_millis(DEFAULT_TIMEOUT_MS);
        let stream = tokio_serial::new(device, baud_rate)
            .timeout(timeout)
            .open_native_async()?;

        Self::attach(device, stream, protocol, timeout).await
    }

    /// Initialize an adapter on an already-open serial stream
    async fn attach(
        device: &str,
        stream: SerialStream,
        protocol: ObdProtocol,
        timeout: Duration,
    ) -> Result<Self, ObdError> {
        let mut client = Self {
            device: device.to_string(),
            protocol,
            timeout,
            link: Link::Serial(stream),
            supported: SupportedPids::default(),
            resync: false,
        };
        client.initialize().await?;
        Ok(client)
    }

    /// Create a mock OBD client for testing (no hardware required)
    pub fn mock() -> Self {
        info!("Creating mock OBD client");
        Self {
            device: "mock".to_string(),
            protocol: ObdProtocol::Iso15765_4Can11bit500,
            timeout: Duration::from_millis(100),
            link: Link::Mock(MockVehicle::default()),
            supported: SupportedPids::all(),
            resync: false,
        }
    }

    /// Initialize the ELM327 adapter and discover supported PIDs
    async fn initialize(&mut self) -> Result<(), ObdError> {
        info!("Initializing OBD adapter on {}", self.device);

        let banner = match self.send_command("ATZ").await {
            Ok(reply) => reply,
            Err(ObdError::Timeout(ms)) => {
                warn!("No answer to ATZ on {} within {}ms", self.device, ms);
                return Err(ObdError::AdapterNotResponding);
            }
            Err(e) => return Err(e),
        };
        info!(
            "Adapter identified as {:?}",
            banner.trim().trim_end_matches('>').trim()
        );

        for command in &INIT_COMMANDS[1..] {
            self.send_command(command).await?;
        }
        let select_protocol = self.protocol.to_elm_command();
        self.send_command(select_protocol).await?;

        // 0100 doubles as the "is the vehicle talking" probe
        let mut base = 0x00;
        loop {
            let bytes = match self.query_raw(base).await {
                Ok(bytes) => bytes,
                Err(e) if base == 0x00 => return Err(e),
                Err(e) => {
                    debug!("Support bitmap 0x{:02X} unavailable: {}", base, e);
                    break;
                }
            };
            let bitmap: [u8; 4] = bytes
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| {
                    ObdError::InvalidResponse(format!("short support bitmap for 0x{base:02X}"))
                })?;
            self.supported.add_bitmap(base, bitmap);

            if base >= 0x40 || !self.supported.has_next_range(base) {
                break;
            }
            base += 0x20;
        }

        info!("OBD adapter initialized successfully");
        Ok(())
    }

    /// Send one command and collect the reply up to the `>` prompt
    ///
    /// After a timeout the adapter's late reply is swallowed before anything
    /// new is written, so replies never drift one command behind.
    async fn send_command(&mut self, command: &str) -> Result<String, ObdError> {
        let timeout = self.timeout;
        let timed_out = ObdError::Timeout(timeout.as_millis() as u64);
        let stream = match &mut self.link {
            Link::Serial(stream) => stream,
            Link::Mock(_) => return Ok(">".to_string()),
            Link::Closed => return Err(ObdError::Disconnected),
        };

        if self.resync {
            match tokio::time::timeout(timeout, read_reply(stream)).await {
                Ok(stale) => {
                    let stale = stale?;
                    debug!("Discarded late reply {:?}", stale);
                }
                Err(_) => {
                    warn!("Adapter still busy, not sending {}", command);
                    return Err(timed_out);
                }
            }
            tokio_serial::SerialPort::clear(&*stream, ClearBuffer::Input)?;
            self.resync = false;
        }

        debug!("-> {}", command);
        stream.write_all(format!("{command}\r").as_bytes()).await?;
        stream.flush().await?;

        match tokio::time::timeout(timeout, read_reply(stream)).await {
            Ok(reply) => {
                let reply = reply?;
                debug!("<- {:?}", reply);
                Ok(reply)
            }
            Err(_) => {
                self.resync = true;
                Err(timed_out)
            }
        }
    }

    /// Query a Mode 01 code and return the data bytes
    async fn query_raw(&mut self, code: u8) -> Result<Vec<u8>, ObdError> {
        let reply = self.send_command(&elm327::format_query(code)).await?;
        elm327::parse_response(code, &reply)
    }

    /// Query a PID and return the decoded reading
    pub async fn query(&mut self, pid: Pid) -> Result<Reading, ObdError> {
        let timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let bytes = if let Link::Mock(vehicle) = &mut self.link {
            vehicle.respond(pid)
        } else {
            if !self.supports(pid) {
                return Err(ObdError::PidNotSupported(pid.code()));
            }
            debug!("Querying PID {:02X}", pid.code());
            self.query_raw(pid.code()).await?
        };

        Reading::decode(pid, &bytes, timestamp_ms)
    }

    /// Whether the vehicle advertised support for `pid`
    pub fn supports(&self, pid: Pid) -> bool {
        self.supported.contains(pid)
    }

    pub fn supported(&self) -> SupportedPids {
        self.supported
    }

    /// Set command timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Check if client is connected
    pub fn is_connected(&self) -> bool {
        !matches!(self.link, Link::Closed)
    }

    /// Get current protocol
    pub fn protocol(&self) -> ObdProtocol {
        self.protocol
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Disconnect from the OBD adapter, releasing the serial port
    ///
    /// Returns `false` if the client was already disconnected.
    pub fn disconnect(&mut self) -> bool {
        if matches!(self.link, Link::Closed) {
            return false;
        }
        info!("Disconnecting OBD client from {}", self.device);
        self.link = Link::Closed;
        true
    }
}

/// Read from the adapter until the `>` prompt
async fn read_reply(stream: &mut SerialStream) -> Result<String, ObdError> {
    let mut response = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(ObdError::Disconnected);
        }
        response.extend_from_slice(&buf[..n]);
        if buf[..n].contains(&PROMPT) {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&response).into_owned())
}

/// Serial ports that look like OBD adapters, in probing order
fn scan_ports() -> Vec<String> {
    let ports = match tokio_serial::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            warn!("Failed to enumerate serial ports: {}", e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
    names.retain(|name| CANDIDATE_PREFIXES.iter().any(|prefix| name.starts_with(prefix)));
    names.sort_by_key(|name| {
        CANDIDATE_PREFIXES
            .iter()
            .position(|prefix| name.starts_with(prefix))
            .unwrap_or(CANDIDATE_PREFIXES.len())
    });
    names
}

/// Simulated vehicle used by [`ObdClient::mock`]
///
/// Values sweep up and down with each query so gauges visibly move.
#[derive(Debug, Default)]
struct MockVehicle {
    tick: u64,
}

impl MockVehicle {
    /// Triangle wave over `0..=span`
    fn sweep(&self, span: u64) -> u64 {
        let period = span * 2;
        let phase = self.tick % period.max(1);
        if phase > span {
            period - phase
        } else {
            phase
        }
    }

    fn respond(&mut self, pid: Pid) -> Vec<u8> {
        self.tick += 1;
        match pid {
            // RPM: 800-3500 RPM range
            Pid::Rpm => {
                let rpm = 800 + (self.sweep(90) * 30) as u16;
                let encoded = rpm * 4;
                vec![(encoded >> 8) as u8, (encoded & 0xFF) as u8]
            }
            // Speed: 0-120 km/h
            Pid::Speed => vec![self.sweep(120) as u8],
            // Coolant / oil temp: 70-105°C (stored as value + 40)
            Pid::CoolantTemp | Pid::OilTemp => vec![(110 + self.sweep(35)) as u8],
            Pid::IntakeAirTemp => vec![(60 + self.sweep(20)) as u8],
            // Load / throttle: 0-100%
            Pid::EngineLoad | Pid::ThrottlePosition => vec![(self.sweep(51) * 5) as u8],
            Pid::IntakeManifoldPressure => vec![(30 + self.sweep(70)) as u8],
            // MAF: 5-50 g/s
            Pid::Maf => {
                let maf = 500 + (self.sweep(45) * 100) as u16;
                vec![(maf >> 8) as u8, (maf & 0xFF) as u8]
            }
        }
    }
}
