//! Ride statistics.

pub mod calculator;
pub mod summary;

pub use calculator::{GpsSpeedUnit, RideStatisticsCalculator, StatisticsError, StatisticsSettings};
pub use summary::RideSummary;
