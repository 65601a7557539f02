//! OBD-II PID Definitions and Response Parsing
//!
//! Defines the standard OBD-II Parameter IDs (PIDs) and their decoding formulas.

use crate::error::ObdError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard OBD-II PIDs for Mode 01 (current data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Pid {
    /// Calculated engine load (0x04)
    EngineLoad = 0x04,
    /// Engine coolant temperature (0x05)
    CoolantTemp = 0x05,
    /// Intake manifold absolute pressure (0x0B)
    IntakeManifoldPressure = 0x0B,
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D)
    Speed = 0x0D,
    /// Intake air temperature (0x0F)
    IntakeAirTemp = 0x0F,
    /// Mass air flow rate (0x10)
    Maf = 0x10,
    /// Throttle position (0x11)
    ThrottlePosition = 0x11,
    /// Engine oil temperature (0x5C)
    OilTemp = 0x5C,
}

impl Pid {
    /// Every PID this crate knows how to decode
    pub const ALL: [Pid; 9] = [
        Pid::EngineLoad,
        Pid::CoolantTemp,
        Pid::IntakeManifoldPressure,
        Pid::Rpm,
        Pid::Speed,
        Pid::IntakeAirTemp,
        Pid::Maf,
        Pid::ThrottlePosition,
        Pid::OilTemp,
    ];

    /// Get the PID hex value
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Look up a PID by its hex value
    pub fn from_code(code: u8) -> Option<Pid> {
        Self::ALL.iter().copied().find(|pid| pid.code() == code)
    }

    /// Stable snake_case name, matching the serde representation
    pub fn name(&self) -> &'static str {
        match self {
            Pid::EngineLoad => "engine_load",
            Pid::CoolantTemp => "coolant_temp",
            Pid::IntakeManifoldPressure => "intake_manifold_pressure",
            Pid::Rpm => "rpm",
            Pid::Speed => "speed",
            Pid::IntakeAirTemp => "intake_air_temp",
            Pid::Maf => "maf",
            Pid::ThrottlePosition => "throttle_position",
            Pid::OilTemp => "oil_temp",
        }
    }

    /// Get the number of response bytes for this PID
    pub fn response_bytes(&self) -> usize {
        match self {
            Pid::Rpm | Pid::Maf => 2,
            _ => 1,
        }
    }

    /// Physical unit of the decoded value
    pub fn unit(&self) -> Unit {
        match self {
            Pid::Speed => Unit::KilometersPerHour,
            Pid::Rpm => Unit::Rpm,
            Pid::CoolantTemp | Pid::IntakeAirTemp | Pid::OilTemp => Unit::Celsius,
            Pid::EngineLoad | Pid::ThrottlePosition => Unit::Percent,
            Pid::IntakeManifoldPressure => Unit::Kilopascal,
            Pid::Maf => Unit::GramsPerSecond,
        }
    }

    /// Get the sampling priority (higher = more frequent)
    pub fn sampling_priority(&self) -> u8 {
        match self {
            Pid::Rpm | Pid::Speed | Pid::ThrottlePosition | Pid::EngineLoad => 10,
            Pid::Maf | Pid::IntakeManifoldPressure => 5,
            // Temperatures drift slowly
            _ => 2,
        }
    }

    /// Whether this PID belongs to the fast polling class
    pub fn is_fast(&self) -> bool {
        self.sampling_priority() >= 10
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}

/// Physical unit attached to a [`Reading`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    KilometersPerHour,
    Rpm,
    Celsius,
    Percent,
    Kilopascal,
    GramsPerSecond,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::KilometersPerHour => "km/h",
            Unit::Rpm => "rpm",
            Unit::Celsius => "°C",
            Unit::Percent => "%",
            Unit::Kilopascal => "kPa",
            Unit::GramsPerSecond => "g/s",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded sample of a PID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// The PID that was queried
    pub pid: Pid,
    /// Decoded value in `unit`
    pub magnitude: f64,
    /// Physical unit of `magnitude`
    pub unit: Unit,
    /// Timestamp when the response was received (Unix ms)
    pub timestamp_ms: u64,
}

impl Reading {
    /// Decode the data bytes of a Mode 01 response (the bytes after `41 XX`)
    pub fn decode(pid: Pid, bytes: &[u8], timestamp_ms: u64) -> Result<Self, ObdError> {
        if bytes.len() < pid.response_bytes() {
            return Err(ObdError::InvalidResponse(format!(
                "PID {:02X} needs {} data bytes, got {}",
                pid.code(),
                pid.response_bytes(),
                bytes.len()
            )));
        }

        let a = bytes[0] as f64;
        let magnitude = match pid {
            // Speed: A (km/h)
            Pid::Speed => a,
            // RPM: ((A*256)+B)/4
            Pid::Rpm => ((a * 256.0) + bytes[1] as f64) / 4.0,
            // Temperatures: A - 40 (°C)
            Pid::CoolantTemp | Pid::IntakeAirTemp | Pid::OilTemp => a - 40.0,
            // Load / throttle: A * 100 / 255 (%)
            Pid::EngineLoad | Pid::ThrottlePosition => a * 100.0 / 255.0,
            // Intake manifold pressure: A (kPa)
            Pid::IntakeManifoldPressure => a,
            // MAF: ((A*256)+B) / 100 (g/s)
            Pid::Maf => ((a * 256.0) + bytes[1] as f64) / 100.0,
        };

        Ok(Self {
            pid,
            magnitude,
            unit: pid.unit(),
            timestamp_ms,
        })
    }
}

/// Set of PIDs the vehicle reports as supported
///
/// Built from the Mode 01 "PIDs supported" bitmaps (0x00, 0x20, 0x40, ...),
/// each covering the 32 PIDs that follow its base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportedPids {
    bits: u128,
}

impl SupportedPids {
    /// A set that claims support for every PID (used by mock clients)
    pub fn all() -> Self {
        Self { bits: u128::MAX }
    }

    /// Merge a 4-byte support bitmap answered for `base` (0x00, 0x20, 0x40, 0x60)
    pub fn add_bitmap(&mut self, base: u8, bitmap: [u8; 4]) {
        let word = u32::from_be_bytes(bitmap);
        for offset in 0..32u32 {
            if word & (1 << (31 - offset)) != 0 {
                let code = base as u32 + offset + 1;
                if code < 128 {
                    self.bits |= 1u128 << code;
                }
            }
        }
    }

    /// Whether the bitmap for `base` advertises the next range (`base + 0x20`)
    pub fn has_next_range(&self, base: u8) -> bool {
        self.contains_code(base.saturating_add(0x20))
    }

    pub fn contains_code(&self, code: u8) -> bool {
        code < 128 && self.bits & (1u128 << code) != 0
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.contains_code(pid.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpm_decode() {
        // 1A 2B => ((0x1A * 256) + 0x2B) / 4 = (26*256 + 43) / 4 = 6699/4 = 1674.75
        let reading = Reading::decode(Pid::Rpm, &[0x1A, 0x2B], 0).unwrap();
        assert!((reading.magnitude - 1674.75).abs() < 0.01);
        assert_eq!(reading.unit, Unit::Rpm);
    }

    #[test]
    fn test_coolant_temp_decode() {
        // 0x73 = 115, so temp = 115 - 40 = 75°C
        let reading = Reading::decode(Pid::CoolantTemp, &[0x73], 0).unwrap();
        assert!((reading.magnitude - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_oil_temp_below_zero() {
        let reading = Reading::decode(Pid::OilTemp, &[0x1E], 0).unwrap();
        assert!((reading.magnitude + 10.0).abs() < 0.01);
        assert_eq!(reading.unit.as_str(), "°C");
    }

    #[test]
    fn test_speed_decode() {
        // 0x55 = 85 km/h
        let reading = Reading::decode(Pid::Speed, &[0x55], 0).unwrap();
        assert!((reading.magnitude - 85.0).abs() < 0.01);
    }

    #[test]
    fn test_throttle_decode() {
        let reading = Reading::decode(Pid::ThrottlePosition, &[0xFF], 0).unwrap();
        assert!((reading.magnitude - 100.0).abs() < 0.01);
        let reading = Reading::decode(Pid::ThrottlePosition, &[0x00], 0).unwrap();
        assert_eq!(reading.magnitude, 0.0);
    }

    #[test]
    fn test_short_response_rejected() {
        let err = Reading::decode(Pid::Rpm, &[0x1A], 0).unwrap_err();
        assert!(matches!(err, ObdError::InvalidResponse(_)));
    }

    #[test]
    fn test_pid_lookup_and_names() {
        assert_eq!(Pid::from_code(0x5C), Some(Pid::OilTemp));
        assert_eq!(Pid::from_code(0x01), None);
        assert_eq!(Pid::ThrottlePosition.name(), "throttle_position");
    }

    #[test]
    fn test_supported_bitmap() {
        // Typical 0100 answer: BE 3E B8 13
        let mut supported = SupportedPids::default();
        supported.add_bitmap(0x00, [0xBE, 0x3E, 0xB8, 0x13]);

        assert!(supported.contains_code(0x01));
        assert!(!supported.contains_code(0x02));
        assert!(supported.contains(Pid::EngineLoad));
        assert!(supported.contains(Pid::CoolantTemp));
        assert!(supported.contains(Pid::Rpm));
        assert!(supported.contains(Pid::Speed));
        assert!(supported.contains(Pid::ThrottlePosition));
        assert!(!supported.contains(Pid::OilTemp));
        assert!(supported.has_next_range(0x00));
    }

    #[test]
    fn test_supported_upper_range() {
        let mut supported = SupportedPids::default();
        // 0x5C is offset 28 in the 0x40 range => bit (31 - 27)
        supported.add_bitmap(0x40, [0x00, 0x00, 0x00, 0x10]);
        assert!(supported.contains(Pid::OilTemp));
        assert!(!supported.has_next_range(0x40));
    }
}
