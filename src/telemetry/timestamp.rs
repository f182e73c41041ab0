//! Timestamp normalization across the encodings the device firmware has used.
//!
//! Every candidate format is tried in order and the first match wins. Device
//! timestamps carry no zone and are read as UTC.

use crate::telemetry::types::Sample;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage encoding for instants written by this crate.
const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Known timestamp encodings, in default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// `2024-11-30T08:01:15.123456`
    IsoMicros,
    /// `2024-11-30T08:01:15.123`
    IsoMillis,
    /// `2024-11-30T08:01:15`
    IsoSeconds,
    /// `2024-11-30 08:01:15.123`
    SpaceMillis,
    /// `2024-11-30 08:01:15`
    SpaceSeconds,
    /// `2024/11/30 08:01:15.123`
    SlashMillis,
    /// `2024/11/30 08:01:15`
    SlashSeconds,
    /// `2024/11/30 08:01:15.123456`
    SlashMicros,
}

impl TimestampFormat {
    /// All formats in default priority order.
    pub const ALL: [TimestampFormat; 8] = [
        TimestampFormat::IsoMicros,
        TimestampFormat::IsoMillis,
        TimestampFormat::IsoSeconds,
        TimestampFormat::SpaceMillis,
        TimestampFormat::SpaceSeconds,
        TimestampFormat::SlashMillis,
        TimestampFormat::SlashSeconds,
        TimestampFormat::SlashMicros,
    ];

    /// chrono pattern for this format.
    pub fn pattern(self) -> &'static str {
        match self {
            TimestampFormat::IsoMicros | TimestampFormat::IsoMillis => "%Y-%m-%dT%H:%M:%S%.f",
            TimestampFormat::IsoSeconds => "%Y-%m-%dT%H:%M:%S",
            TimestampFormat::SpaceMillis => "%Y-%m-%d %H:%M:%S%.f",
            TimestampFormat::SpaceSeconds => "%Y-%m-%d %H:%M:%S",
            TimestampFormat::SlashMillis | TimestampFormat::SlashMicros => "%Y/%m/%d %H:%M:%S%.f",
            TimestampFormat::SlashSeconds => "%Y/%m/%d %H:%M:%S",
        }
    }

    /// Exact number of fractional-second digits this format carries.
    pub fn fraction_digits(self) -> usize {
        match self {
            TimestampFormat::IsoMicros | TimestampFormat::SlashMicros => 6,
            TimestampFormat::IsoMillis
            | TimestampFormat::SpaceMillis
            | TimestampFormat::SlashMillis => 3,
            TimestampFormat::IsoSeconds
            | TimestampFormat::SpaceSeconds
            | TimestampFormat::SlashSeconds => 0,
        }
    }

    fn parse(self, input: &str) -> Option<NaiveDateTime> {
        if fraction_digits(input) != self.fraction_digits() {
            return None;
        }
        NaiveDateTime::parse_from_str(input, self.pattern()).ok()
    }
}

/// A successfully normalized instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTimestamp {
    /// Milliseconds since the Unix epoch
    pub millis: i64,
    /// Format that matched
    pub format: TimestampFormat,
}

impl ParsedTimestamp {
    /// The instant as a UTC datetime.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.millis)
    }
}

/// Timestamp normalization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// No known format matched
    #[error("Unrecognized timestamp: {0:?}")]
    ParseFailed(String),
}

/// Converts heterogeneous timestamp strings into epoch milliseconds.
#[derive(Debug, Clone)]
pub struct TimestampNormalizer {
    formats: Vec<TimestampFormat>,
}

impl Default for TimestampNormalizer {
    fn default() -> Self {
        Self {
            formats: TimestampFormat::ALL.to_vec(),
        }
    }
}

impl TimestampNormalizer {
    /// Create a normalizer with a custom priority list.
    pub fn with_formats(formats: Vec<TimestampFormat>) -> Self {
        Self { formats }
    }

    /// Candidate formats in priority order.
    pub fn formats(&self) -> &[TimestampFormat] {
        &self.formats
    }

    /// Parse a timestamp, trying each format in order.
    pub fn parse(&self, input: &str) -> Result<ParsedTimestamp, TimestampError> {
        let trimmed = input.trim();
        if !trimmed.is_empty() {
            for &format in &self.formats {
                if let Some(naive) = format.parse(trimmed) {
                    return Ok(ParsedTimestamp {
                        millis: naive.and_utc().timestamp_millis(),
                        format,
                    });
                }
            }
        }
        Err(TimestampError::ParseFailed(input.to_string()))
    }

    /// Parse a timestamp, falling back to `fallback_ms` on failure.
    pub fn parse_or(&self, input: &str, fallback_ms: i64) -> i64 {
        self.parse(input).map_or(fallback_ms, |ts| ts.millis)
    }

    /// Resolve the instant of a sample.
    ///
    /// The GPS timestamp is preferred, then the packet date and time joined,
    /// then the packet date alone.
    pub fn sample_instant(&self, sample: &Sample) -> Result<ParsedTimestamp, TimestampError> {
        let candidates = [
            sample.gps.timestamp.clone(),
            sample.info.combined(),
            sample.info.date.clone(),
        ];

        let mut last_error = None;
        for candidate in candidates.iter().flatten() {
            match self.parse(candidate) {
                Ok(ts) => return Ok(ts),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| TimestampError::ParseFailed(String::new())))
    }
}

/// Render epoch milliseconds in the storage encoding (`yyyy-MM-dd HH:mm:ss.SSS`).
pub fn format_millis(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.format(STORAGE_FORMAT).to_string())
}

/// Number of digits after the fractional-second dot, 0 when there is none.
fn fraction_digits(input: &str) -> usize {
    match input.rsplit_once('.') {
        Some((_, fraction)) => fraction.chars().take_while(char::is_ascii_digit).count(),
        None => 0,
    }
}
