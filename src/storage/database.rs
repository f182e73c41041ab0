//! Database operations using rusqlite.
//!
//! Rides are keyed by the device-assigned id. Samples are keyed by a local
//! autoincrement sequence, which is the only ordering the engine trusts.

use crate::metrics::summary::RideSummary;
use crate::rides::types::{RideRecord, SummaryState};
use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use crate::telemetry::timestamp::{format_millis, TimestampNormalizer};
use crate::telemetry::types::{CrankFields, GpsFields, PacketInfo, Sample};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, Result as SqliteResult};
use std::path::Path;
use thiserror::Error;

const SAMPLE_COLUMNS: &str = "sequence, ride_id, packet_date, packet_time, gps_timestamp,
     latitude, longitude, altitude, gps_speed, direction, fix_satellites, fix_quality,
     power, cadence, joules, crank_calories, crank_speed_ms, crank_speed, crank_distance";

const RIDE_COLUMNS: &str = "ride_id, start_time, end_time, summary_state,
     total_distance_km, calories, avg_velocity_kmh, max_velocity_kmh, avg_power, max_power,
     avg_cadence, max_cadence, avg_altitude, max_altitude";

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::IoError(e.to_string()))?;
            }
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        tracing::debug!("Opened ride database at {}", path.display());
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), DatabaseError> {
        // Cascading sample deletion depends on this pragma, which is per connection.
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        let current_version = self.get_schema_version()?;

        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32, DatabaseError> {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), DatabaseError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                    [CURRENT_VERSION],
                )
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        }

        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ========== Ride Operations ==========

    /// Insert a ride row unless one already exists.
    ///
    /// Returns `true` when a new row was created.
    pub fn insert_ride_if_absent(
        &self,
        ride_id: i64,
        start_time: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let rows_affected = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO rides (ride_id, start_time, summary_state)
                 VALUES (?1, ?2, 'unset')",
                params![ride_id, encode_time(start_time)],
            )
            .map_err(map_write_error)?;

        Ok(rows_affected > 0)
    }

    /// Check whether a ride row exists.
    pub fn ride_exists(&self, ride_id: i64) -> Result<bool, DatabaseError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM rides WHERE ride_id = ?1",
                params![ride_id],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(count > 0)
    }

    /// Get a ride by ID.
    pub fn get_ride(&self, ride_id: i64) -> Result<Option<RideRecord>, DatabaseError> {
        let sql = format!("SELECT {} FROM rides WHERE ride_id = ?1", RIDE_COLUMNS);
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = stmt.query_row(params![ride_id], |row| {
            Ok(RideRow {
                ride_id: row.get(0)?,
                start_time: row.get(1)?,
                end_time: row.get(2)?,
                summary_state: row.get(3)?,
                total_distance_km: row.get(4)?,
                calories: row.get(5)?,
                avg_velocity_kmh: row.get(6)?,
                max_velocity_kmh: row.get(7)?,
                avg_power: row.get(8)?,
                max_power: row.get(9)?,
                avg_cadence: row.get(10)?,
                max_cadence: row.get(11)?,
                avg_altitude: row.get(12)?,
                max_altitude: row.get(13)?,
            })
        });

        match result {
            Ok(row) => Ok(Some(row.into_record()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// List ride ids, most recent start first.
    pub fn list_ride_ids(&self) -> Result<Vec<i64>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT ride_id FROM rides ORDER BY start_time DESC, ride_id DESC")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?);
        }

        Ok(ids)
    }

    /// Overwrite the cached summary and mark it computed.
    ///
    /// All summary columns change in one statement. The start time keeps its
    /// registered value when the summary has none.
    pub fn write_summary(&self, ride_id: i64, summary: &RideSummary) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE rides SET
                 start_time = COALESCE(?2, start_time), end_time = ?3, summary_state = 'computed',
                 total_distance_km = ?4, calories = ?5, avg_velocity_kmh = ?6,
                 max_velocity_kmh = ?7, avg_power = ?8, max_power = ?9, avg_cadence = ?10,
                 max_cadence = ?11, avg_altitude = ?12, max_altitude = ?13
                 WHERE ride_id = ?1",
                params![
                    ride_id,
                    summary.start_time.map(encode_time),
                    summary.end_time.map(encode_time),
                    summary.total_distance_km,
                    summary.calories,
                    summary.avg_velocity_kmh,
                    summary.max_velocity_kmh,
                    summary.avg_power,
                    summary.max_power,
                    summary.avg_cadence,
                    summary.max_cadence,
                    summary.avg_altitude,
                    summary.max_altitude,
                ],
            )
            .map_err(map_write_error)?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Ride {}", ride_id)));
        }

        Ok(())
    }

    /// Delete a ride by ID (cascades to samples).
    pub fn delete_ride(&self, ride_id: i64) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM rides WHERE ride_id = ?1", params![ride_id])
            .map_err(map_write_error)?;

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound(format!("Ride {}", ride_id)));
        }

        Ok(())
    }

    // ========== Sample Operations ==========

    /// Append a sample and return its sequence number.
    ///
    /// A computed summary of the owning ride is marked stale in the same
    /// transaction.
    pub fn insert_sample(
        &mut self,
        ride_id: i64,
        info: &PacketInfo,
        gps: &GpsFields,
        crank: &CrankFields,
    ) -> Result<i64, DatabaseError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tx.execute(
            "INSERT INTO telemetry_samples (ride_id, packet_date, packet_time, gps_timestamp,
             latitude, longitude, altitude, gps_speed, direction, fix_satellites, fix_quality,
             power, cadence, joules, crank_calories, crank_speed_ms, crank_speed, crank_distance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                ride_id,
                info.date,
                info.time,
                gps.timestamp,
                gps.latitude,
                gps.longitude,
                gps.altitude,
                gps.speed,
                gps.direction,
                gps.fix_satellites,
                gps.fix_quality,
                crank.power,
                crank.cadence,
                crank.joules,
                crank.calories,
                crank.speed_ms,
                crank.speed,
                crank.distance,
            ],
        )
        .map_err(map_write_error)?;

        let sequence = tx.last_insert_rowid();

        tx.execute(
            "UPDATE rides SET summary_state = 'stale'
             WHERE ride_id = ?1 AND summary_state = 'computed'",
            params![ride_id],
        )
        .map_err(map_write_error)?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        Ok(sequence)
    }

    /// Get a ride's samples ordered by sequence.
    pub fn get_samples(&self, ride_id: i64) -> Result<Vec<Sample>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM telemetry_samples WHERE ride_id = ?1 ORDER BY sequence ASC",
            SAMPLE_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![ride_id], |row| {
                Ok(Sample {
                    sequence: row.get(0)?,
                    ride_id: row.get(1)?,
                    info: PacketInfo {
                        date: row.get(2)?,
                        time: row.get(3)?,
                    },
                    gps: GpsFields {
                        timestamp: row.get(4)?,
                        latitude: row.get(5)?,
                        longitude: row.get(6)?,
                        altitude: row.get(7)?,
                        speed: row.get(8)?,
                        direction: row.get(9)?,
                        fix_satellites: row.get(10)?,
                        fix_quality: row.get(11)?,
                    },
                    crank: CrankFields {
                        power: row.get(12)?,
                        cadence: row.get(13)?,
                        joules: row.get(14)?,
                        calories: row.get(15)?,
                        speed_ms: row.get(16)?,
                        speed: row.get(17)?,
                        distance: row.get(18)?,
                    },
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut samples = Vec::new();
        for row in rows {
            samples.push(row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?);
        }

        Ok(samples)
    }

    /// Count samples for a ride.
    pub fn count_samples(&self, ride_id: i64) -> Result<usize, DatabaseError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM telemetry_samples WHERE ride_id = ?1",
                params![ride_id],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(count as usize)
    }
}

/// Internal row struct for ride queries.
struct RideRow {
    ride_id: i64,
    start_time: Option<String>,
    end_time: Option<String>,
    summary_state: String,
    total_distance_km: Option<f64>,
    calories: Option<f64>,
    avg_velocity_kmh: Option<f64>,
    max_velocity_kmh: Option<f64>,
    avg_power: Option<f64>,
    max_power: Option<f64>,
    avg_cadence: Option<f64>,
    max_cadence: Option<f64>,
    avg_altitude: Option<f64>,
    max_altitude: Option<f64>,
}

impl RideRow {
    fn into_record(self) -> Result<RideRecord, DatabaseError> {
        let start_time = decode_time(self.start_time.as_deref());
        let end_time = decode_time(self.end_time.as_deref());
        let stored = self.summary(start_time, end_time);

        let summary = match (self.summary_state.as_str(), stored) {
            ("unset", _) => SummaryState::Unset,
            ("computed", Some(summary)) => SummaryState::Computed(summary),
            ("stale", Some(summary)) => SummaryState::Stale(summary),
            ("computed" | "stale", None) => {
                tracing::warn!(
                    "Ride {} is marked {} but its summary is incomplete, treating as unset",
                    self.ride_id,
                    self.summary_state
                );
                SummaryState::Unset
            }
            (other, _) => {
                return Err(DatabaseError::DeserializationError(format!(
                    "Invalid summary_state for ride {}: {}",
                    self.ride_id, other
                )))
            }
        };

        Ok(RideRecord {
            ride_id: self.ride_id,
            start_time,
            end_time,
            summary,
        })
    }

    /// The stored summary, if every column is set.
    fn summary(
        &self,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Option<RideSummary> {
        Some(RideSummary {
            start_time,
            end_time,
            total_distance_km: self.total_distance_km?,
            calories: self.calories?,
            avg_velocity_kmh: self.avg_velocity_kmh?,
            max_velocity_kmh: self.max_velocity_kmh?,
            avg_power: self.avg_power?,
            max_power: self.max_power?,
            avg_cadence: self.avg_cadence?,
            max_cadence: self.max_cadence?,
            avg_altitude: self.avg_altitude?,
            max_altitude: self.max_altitude?,
        })
    }
}

fn encode_time(time: DateTime<Utc>) -> String {
    format_millis(time.timestamp_millis()).unwrap_or_else(|| time.to_rfc3339())
}

fn decode_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;
    let parsed = TimestampNormalizer::default()
        .parse(value)
        .ok()
        .and_then(|ts| ts.to_datetime())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        });

    if parsed.is_none() {
        tracing::warn!("Ignoring unreadable stored time {:?}", value);
    }
    parsed
}

fn map_write_error(e: rusqlite::Error) -> DatabaseError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => DatabaseError::ConstraintViolation(e.to_string()),
        _ => DatabaseError::QueryFailed(e.to_string()),
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Database lock poisoned: {0}")]
    LockPoisoned(String),
}
