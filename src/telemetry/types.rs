//! Telemetry field groups delivered by the sensor transport, and the stored
//! sample that combines them.

use serde::{Deserialize, Serialize};

/// Packet header as stamped by the sensor device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketInfo {
    /// Packet date, usually `yyyy-MM-dd`
    pub date: Option<String>,
    /// Packet time of day, usually `HH:mm:ss.SSS`
    pub time: Option<String>,
}

impl PacketInfo {
    /// Create packet info from date and time strings.
    pub fn new(date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            time: Some(time.into()),
        }
    }

    /// Date and time joined with a single space, when both are present.
    pub fn combined(&self) -> Option<String> {
        match (&self.date, &self.time) {
            (Some(date), Some(time)) => Some(format!("{} {}", date.trim(), time.trim())),
            _ => None,
        }
    }
}

/// GPS fix fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsFields {
    /// GPS timestamp string (format varies between firmware versions)
    pub timestamp: Option<String>,
    /// Latitude in degrees
    pub latitude: Option<f64>,
    /// Longitude in degrees
    pub longitude: Option<f64>,
    /// Altitude in meters
    pub altitude: Option<f64>,
    /// Ground speed (unit set by `GpsSpeedUnit`)
    pub speed: Option<f64>,
    /// Heading in degrees
    pub direction: Option<f64>,
    /// Satellites used in the fix
    pub fix_satellites: Option<i32>,
    /// Fix quality indicator
    pub fix_quality: Option<i32>,
}

impl GpsFields {
    /// Drop non-finite readings so they are stored as NULL.
    pub fn sanitized(&self) -> Self {
        Self {
            timestamp: self.timestamp.clone(),
            latitude: finite(self.latitude),
            longitude: finite(self.longitude),
            altitude: finite(self.altitude),
            speed: finite(self.speed),
            direction: finite(self.direction),
            fix_satellites: self.fix_satellites,
            fix_quality: self.fix_quality,
        }
    }

    /// Latitude and longitude, when both are present.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Crank power meter fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrankFields {
    /// Instantaneous power in watts
    pub power: Option<f64>,
    /// Cadence in RPM
    pub cadence: Option<f64>,
    /// Cumulative energy in joules
    pub joules: Option<f64>,
    /// Cumulative calories
    pub calories: Option<f64>,
    /// Crank-derived speed in m/s
    pub speed_ms: Option<f64>,
    /// Crank-derived speed in km/h
    pub speed: Option<f64>,
    /// Cumulative distance in meters
    pub distance: Option<f64>,
}

impl CrankFields {
    /// Crank fields with every reading set to zero.
    pub fn zeroed() -> Self {
        Self {
            power: Some(0.0),
            cadence: Some(0.0),
            joules: Some(0.0),
            calories: Some(0.0),
            speed_ms: Some(0.0),
            speed: Some(0.0),
            distance: Some(0.0),
        }
    }

    /// Drop non-finite readings so they are stored as NULL.
    pub fn sanitized(&self) -> Self {
        Self {
            power: finite(self.power),
            cadence: finite(self.cadence),
            joules: finite(self.joules),
            calories: finite(self.calories),
            speed_ms: finite(self.speed_ms),
            speed: finite(self.speed),
            distance: finite(self.distance),
        }
    }
}

/// One stored telemetry point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Local insertion sequence, authoritative for ordering
    pub sequence: i64,
    /// Owning ride
    pub ride_id: i64,
    /// Packet header
    pub info: PacketInfo,
    /// GPS fields
    pub gps: GpsFields,
    /// Crank fields (all `None` when the packet carried none)
    pub crank: CrankFields,
}

impl Sample {
    /// Create an empty sample for a ride.
    pub fn new(ride_id: i64, sequence: i64) -> Self {
        Self {
            sequence,
            ride_id,
            ..Default::default()
        }
    }
}

/// One packet as delivered by the transport (JSON lines ingestion format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPacket {
    /// Device-assigned ride id
    pub ride_id: i64,
    /// Packet header
    #[serde(default)]
    pub info: PacketInfo,
    /// GPS fields
    #[serde(default)]
    pub gps: GpsFields,
    /// Crank fields, absent when no power meter is paired
    #[serde(default)]
    pub crank: Option<CrankFields>,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
