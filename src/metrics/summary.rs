//! Ride-level summary statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregates derived from a ride's full sample sequence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RideSummary {
    /// First successfully parsed sample instant
    pub start_time: Option<DateTime<Utc>>,
    /// Last successfully parsed sample instant
    pub end_time: Option<DateTime<Utc>>,
    /// Total distance in kilometers
    pub total_distance_km: f64,
    /// Calories (reported or estimated)
    pub calories: f64,
    /// Average moving speed in km/h
    pub avg_velocity_kmh: f64,
    /// Maximum speed in km/h
    pub max_velocity_kmh: f64,
    /// Average pedalling power in watts
    pub avg_power: f64,
    /// Maximum power in watts
    pub max_power: f64,
    /// Average pedalling cadence in RPM
    pub avg_cadence: f64,
    /// Maximum cadence in RPM
    pub max_cadence: f64,
    /// Average altitude in meters
    pub avg_altitude: f64,
    /// Maximum altitude in meters
    pub max_altitude: f64,
}

impl RideSummary {
    /// Signed elapsed seconds between start and end, if both are known.
    pub fn raw_duration_seconds(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }

    /// Elapsed seconds, 0 when unknown or inverted.
    pub fn duration_seconds(&self) -> f64 {
        self.raw_duration_seconds().map_or(0.0, |s| s.max(0.0))
    }

    /// Elapsed hours, 0 when unknown or inverted.
    pub fn duration_hours(&self) -> f64 {
        self.duration_seconds() / 3600.0
    }

    /// True when the last parsed timestamp precedes the first one.
    pub fn is_inverted(&self) -> bool {
        self.raw_duration_seconds().is_some_and(|s| s < 0.0)
    }
}
