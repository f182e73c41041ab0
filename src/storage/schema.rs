//! Database schema definitions.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Rides table (one row per device-assigned ride id, holds the cached summary)
CREATE TABLE IF NOT EXISTS rides (
    ride_id INTEGER PRIMARY KEY,
    start_time TEXT,
    end_time TEXT,
    summary_state TEXT NOT NULL DEFAULT 'unset'
        CHECK (summary_state IN ('unset', 'computed', 'stale')),
    total_distance_km REAL,
    calories REAL,
    avg_velocity_kmh REAL,
    max_velocity_kmh REAL,
    avg_power REAL,
    max_power REAL,
    avg_cadence REAL,
    max_cadence REAL,
    avg_altitude REAL,
    max_altitude REAL
);

CREATE INDEX IF NOT EXISTS idx_rides_start_time ON rides(start_time);

-- Telemetry samples table (sequence is the authoritative ordering)
CREATE TABLE IF NOT EXISTS telemetry_samples (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    ride_id INTEGER NOT NULL REFERENCES rides(ride_id) ON DELETE CASCADE,
    packet_date TEXT,
    packet_time TEXT,
    gps_timestamp TEXT,
    latitude REAL,
    longitude REAL,
    altitude REAL,
    gps_speed REAL,
    direction REAL,
    fix_satellites INTEGER,
    fix_quality INTEGER,
    power REAL,
    cadence REAL,
    joules REAL,
    crank_calories REAL,
    crank_speed_ms REAL,
    crank_speed REAL,
    crank_distance REAL
);

CREATE INDEX IF NOT EXISTS idx_telemetry_samples_ride_id ON telemetry_samples(ride_id, sequence);
"#;

/// SQL for creating the schema version table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;
