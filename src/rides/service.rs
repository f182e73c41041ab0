//! Ride lifecycle API.
//!
//! `RideService` is the surface used by both the ingestion side (transport
//! packets) and the presentation side (activity lists, charts, summaries).
//! Clones share one database handle; every call holds the lock for its whole
//! duration, so sequence numbers never interleave and a summary write-back
//! always matches the samples it was computed from.

use crate::metrics::calculator::RideStatisticsCalculator;
use crate::metrics::summary::RideSummary;
use crate::rides::cache::SummaryCache;
use crate::rides::types::{
    validate_ride_id, ActivityOverview, ChartPoint, LocationPoint, MissingCrankPolicy,
    RideError, RideRecord,
};
use crate::storage::config::AppConfig;
use crate::storage::database::{Database, DatabaseError};
use crate::telemetry::timestamp::TimestampNormalizer;
use crate::telemetry::types::{CrankFields, GpsFields, PacketInfo, Sample, TelemetryPacket};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

/// Ride storage and statistics front end.
#[derive(Clone)]
pub struct RideService {
    database: Arc<Mutex<Database>>,
    cache: SummaryCache,
    normalizer: TimestampNormalizer,
    missing_crank: MissingCrankPolicy,
}

impl RideService {
    /// Create a service over a shared database handle.
    pub fn with_database(database: Arc<Mutex<Database>>, config: &AppConfig) -> Self {
        let normalizer = TimestampNormalizer::default();
        let calculator =
            RideStatisticsCalculator::with_normalizer(config.statistics.clone(), normalizer.clone());

        Self {
            database,
            cache: SummaryCache::new(config.cache.policy, calculator),
            normalizer,
            missing_crank: config.ingest.missing_crank,
        }
    }

    /// Create a service that owns the given database.
    pub fn new(database: Database, config: &AppConfig) -> Self {
        Self::with_database(Arc::new(Mutex::new(database)), config)
    }

    /// Open the database named by the configuration.
    pub fn open(config: &AppConfig) -> Result<Self, RideError> {
        let database = Database::open(&config.database_path())?;
        Ok(Self::new(database, config))
    }

    /// In-memory service with default settings (for testing).
    pub fn in_memory() -> Result<Self, RideError> {
        Ok(Self::new(Database::open_in_memory()?, &AppConfig::default()))
    }

    /// Shared database handle.
    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.database)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, RideError> {
        self.database
            .lock()
            .map_err(|e| RideError::Storage(DatabaseError::LockPoisoned(e.to_string())))
    }

    // ========== Ingestion ==========

    /// Create the ride row unless it already exists.
    ///
    /// Returns `true` once the ride is present, whether it was created by
    /// this call or earlier. An existing row is never modified. A missing or
    /// unreadable start time is replaced by the current time.
    pub fn ensure_ride_exists(
        &self,
        ride_id: i64,
        start_time: Option<&str>,
    ) -> Result<bool, RideError> {
        validate_ride_id(ride_id)?;

        let db = self.lock()?;
        if db.ride_exists(ride_id)? {
            return Ok(true);
        }

        let start = start_time
            .and_then(|s| self.resolve_start_time(ride_id, s))
            .unwrap_or_else(Utc::now);

        if db.insert_ride_if_absent(ride_id, start)? {
            tracing::info!("Registered ride {}", ride_id);
        }
        Ok(true)
    }

    /// Check whether a ride row exists.
    pub fn ride_exists(&self, ride_id: i64) -> Result<bool, RideError> {
        Ok(self.lock()?.ride_exists(ride_id)?)
    }

    /// Append one telemetry sample and return its sequence number.
    pub fn insert_sample(
        &self,
        ride_id: i64,
        info: &PacketInfo,
        gps: &GpsFields,
        crank: Option<&CrankFields>,
    ) -> Result<i64, RideError> {
        validate_ride_id(ride_id)?;

        let gps = gps.sanitized();
        let crank = match (crank, self.missing_crank) {
            (Some(crank), _) => crank.sanitized(),
            (None, MissingCrankPolicy::Null) => CrankFields::default(),
            (None, MissingCrankPolicy::Zero) => CrankFields::zeroed(),
        };

        let mut db = self.lock()?;
        if !db.ride_exists(ride_id)? {
            return Err(RideError::NotFound(ride_id));
        }

        let sequence = db.insert_sample(ride_id, info, &gps, &crank)?;
        tracing::debug!("Stored sample {} for ride {}", sequence, ride_id);
        Ok(sequence)
    }

    /// Register the packet's ride if needed, then store the packet.
    pub fn ingest_packet(&self, packet: &TelemetryPacket) -> Result<i64, RideError> {
        let start = packet
            .gps
            .timestamp
            .clone()
            .or_else(|| packet.info.combined());
        self.ensure_ride_exists(packet.ride_id, start.as_deref())?;
        self.insert_sample(packet.ride_id, &packet.info, &packet.gps, packet.crank.as_ref())
    }

    // ========== Queries ==========

    /// Get the stored ride row.
    pub fn get_ride(&self, ride_id: i64) -> Result<RideRecord, RideError> {
        self.lock()?
            .get_ride(ride_id)?
            .ok_or(RideError::NotFound(ride_id))
    }

    /// Get a ride's summary, computing it on first access.
    pub fn get_ride_summary(&self, ride_id: i64) -> Result<RideSummary, RideError> {
        let db = self.lock()?;
        self.cache.get_summary(&db, ride_id, false)
    }

    /// Recompute and store a ride's summary regardless of the cache.
    pub fn recompute_ride_summary(&self, ride_id: i64) -> Result<RideSummary, RideError> {
        let db = self.lock()?;
        self.cache.get_summary(&db, ride_id, true)
    }

    /// All samples of a ride in sequence order (empty for unknown rides).
    pub fn get_raw_series(&self, ride_id: i64) -> Result<Vec<Sample>, RideError> {
        Ok(self.lock()?.get_samples(ride_id)?)
    }

    /// Chart projection of a ride's samples.
    pub fn get_chart_series(&self, ride_id: i64) -> Result<Vec<ChartPoint>, RideError> {
        let samples = self.get_raw_series(ride_id)?;
        let calculator = self.cache.calculator();

        Ok(samples
            .iter()
            .map(|sample| ChartPoint {
                sequence: sample.sequence,
                timestamp_ms: self.normalizer.sample_instant(sample).ok().map(|ts| ts.millis),
                speed_kmh: calculator.current_speed_kmh(sample),
                cadence: sample.crank.cadence.unwrap_or(0.0),
                power: sample.crank.power.unwrap_or(0.0),
                altitude: sample.gps.altitude.unwrap_or(0.0),
            })
            .collect())
    }

    /// GPS track of a ride.
    ///
    /// Only samples with a GPS timestamp and both coordinates are included.
    /// Unreadable timestamps are replaced by `fallback_ms`.
    pub fn get_ride_locations(
        &self,
        ride_id: i64,
        fallback_ms: i64,
    ) -> Result<Vec<LocationPoint>, RideError> {
        let samples = self.get_raw_series(ride_id)?;

        Ok(samples
            .iter()
            .filter_map(|sample| {
                let timestamp = sample.gps.timestamp.as_deref()?;
                let (latitude, longitude) = sample.gps.position()?;
                Some(LocationPoint {
                    sequence: sample.sequence,
                    timestamp_ms: self.normalizer.parse_or(timestamp, fallback_ms),
                    latitude,
                    longitude,
                })
            })
            .collect())
    }

    /// Ride ids, most recent start first.
    pub fn list_ride_ids(&self) -> Result<Vec<i64>, RideError> {
        Ok(self.lock()?.list_ride_ids()?)
    }

    /// Activity list with summaries, most recent first.
    ///
    /// Rides without samples are listed with no summary.
    pub fn list_activities(&self) -> Result<Vec<ActivityOverview>, RideError> {
        let db = self.lock()?;
        let mut activities = Vec::new();

        for ride_id in db.list_ride_ids()? {
            let summary = match self.cache.get_summary(&db, ride_id, false) {
                Ok(summary) => Some(summary),
                Err(RideError::NoData(_)) => None,
                Err(e) => return Err(e),
            };

            let (start_time, end_time) = match &summary {
                Some(s) => (s.start_time, s.end_time),
                None => {
                    let record = db.get_ride(ride_id)?.ok_or(RideError::NotFound(ride_id))?;
                    (record.start_time, record.end_time)
                }
            };

            activities.push(ActivityOverview {
                ride_id,
                start_time,
                end_time,
                duration_seconds: summary.as_ref().map_or(0.0, RideSummary::duration_seconds),
                summary,
            });
        }

        Ok(activities)
    }

    // ========== Deletion ==========

    /// Delete a ride and all of its samples.
    pub fn delete_ride(&self, ride_id: i64) -> Result<(), RideError> {
        validate_ride_id(ride_id)?;

        match self.lock()?.delete_ride(ride_id) {
            Ok(()) => {
                tracing::info!("Deleted ride {}", ride_id);
                Ok(())
            }
            Err(DatabaseError::NotFound(_)) => Err(RideError::NotFound(ride_id)),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_start_time(&self, ride_id: i64, value: &str) -> Option<DateTime<Utc>> {
        match self.normalizer.parse(value) {
            Ok(ts) => ts.to_datetime(),
            Err(_) => {
                tracing::warn!(
                    "Ride {} start time {:?} not understood, using now",
                    ride_id,
                    value
                );
                None
            }
        }
    }
}
