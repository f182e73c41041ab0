//! RideStat - ride telemetry storage and statistics
//!
//! Persists per-ride telemetry samples delivered by a bike computer (GPS fix
//! plus crank power meter readings), derives ride summaries from them and
//! caches those summaries alongside each ride.

pub mod metrics;
pub mod rides;
pub mod storage;
pub mod telemetry;

// Re-export commonly used types
pub use metrics::calculator::RideStatisticsCalculator;
pub use metrics::summary::RideSummary;
pub use rides::service::RideService;
pub use storage::config::AppConfig;
pub use telemetry::timestamp::TimestampNormalizer;
