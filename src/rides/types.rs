//! Ride records, presentation projections and lifecycle errors.

use crate::metrics::summary::RideSummary;
use crate::storage::database::DatabaseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cached summary state of a ride row.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "summary", rename_all = "snake_case")]
pub enum SummaryState {
    /// Never computed
    #[default]
    Unset,
    /// Computed from the current sample set
    Computed(RideSummary),
    /// Computed, but samples were added since
    Stale(RideSummary),
}

impl SummaryState {
    /// Storage label for the state column.
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryState::Unset => "unset",
            SummaryState::Computed(_) => "computed",
            SummaryState::Stale(_) => "stale",
        }
    }

    /// Last stored summary, current or stale.
    pub fn summary(&self) -> Option<&RideSummary> {
        match self {
            SummaryState::Unset => None,
            SummaryState::Computed(summary) | SummaryState::Stale(summary) => Some(summary),
        }
    }

    /// True when the stored summary reflects every stored sample.
    pub fn is_computed(&self) -> bool {
        matches!(self, SummaryState::Computed(_))
    }
}

/// A stored ride row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRecord {
    /// Device-assigned ride id
    pub ride_id: i64,
    /// Registered or computed start time
    pub start_time: Option<DateTime<Utc>>,
    /// Computed end time
    pub end_time: Option<DateTime<Utc>>,
    /// Cached summary
    pub summary: SummaryState,
}

/// When a stored summary may be served without recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Serve the cache only when the summary state is `computed`
    #[default]
    Tracked,
    /// Serve any stored summary with a non-zero distance.
    ///
    /// Zero-distance rides are recomputed on every read, and samples added
    /// after a computation are ignored until the cache is forced.
    LegacyDistance,
}

impl CachePolicy {
    /// Whether the record's cached summary can be served as-is.
    pub fn is_authoritative(self, record: &RideRecord) -> bool {
        match self {
            CachePolicy::Tracked => record.summary.is_computed(),
            CachePolicy::LegacyDistance => record
                .summary
                .summary()
                .is_some_and(|s| s.total_distance_km != 0.0),
        }
    }
}

/// How crank columns are stored for packets without crank data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCrankPolicy {
    /// Store NULL
    #[default]
    Null,
    /// Store zeros
    Zero,
}

/// Chart-ready projection of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Sample sequence number
    pub sequence: i64,
    /// Sample instant in epoch milliseconds, if it could be parsed
    pub timestamp_ms: Option<i64>,
    /// Speed in km/h
    pub speed_kmh: f64,
    /// Cadence in RPM
    pub cadence: f64,
    /// Power in watts
    pub power: f64,
    /// Altitude in meters
    pub altitude: f64,
}

/// One GPS track point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    /// Sample sequence number
    pub sequence: i64,
    /// GPS instant in epoch milliseconds
    pub timestamp_ms: i64,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// Activity list entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOverview {
    /// Device-assigned ride id
    pub ride_id: i64,
    /// Start time
    pub start_time: Option<DateTime<Utc>>,
    /// End time
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed seconds (0 when unknown or inverted)
    pub duration_seconds: f64,
    /// Summary, `None` for rides without samples
    pub summary: Option<RideSummary>,
}

/// Errors from the ride lifecycle API.
#[derive(Debug, Error)]
pub enum RideError {
    /// Invalid caller input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No ride row with this id
    #[error("Ride {0} not found")]
    NotFound(i64),

    /// Ride exists but has no samples
    #[error("Ride {0} has no telemetry samples")]
    NoData(i64),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    /// No samples to export
    #[error("Ride has no data to export")]
    NoData,

    /// Failed to write export data
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reject non-positive ride ids before touching storage.
pub fn validate_ride_id(ride_id: i64) -> Result<(), RideError> {
    if ride_id <= 0 {
        return Err(RideError::InvalidArgument(format!(
            "ride id must be positive, got {}",
            ride_id
        )));
    }
    Ok(())
}
