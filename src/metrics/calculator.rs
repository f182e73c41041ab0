//! Ride statistics calculator.
//!
//! Distance and calories are cumulative sensor counters and are summarized by
//! their maximum observed value. Speed, power, cadence and altitude are
//! instantaneous readings summarized by maximum and by an average over
//! "active" samples only, so stopped or freewheeling time does not drag the
//! averages down.

use crate::metrics::summary::RideSummary;
use crate::telemetry::timestamp::TimestampNormalizer;
use crate::telemetry::types::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unit the GPS receiver reports ground speed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpsSpeedUnit {
    /// Meters per second
    #[default]
    MetersPerSecond,
    /// Kilometers per hour
    KilometersPerHour,
}

impl GpsSpeedUnit {
    /// Convert a reading in this unit to km/h.
    pub fn to_kmh(self, value: f64) -> f64 {
        match self {
            GpsSpeedUnit::MetersPerSecond => value * 3.6,
            GpsSpeedUnit::KilometersPerHour => value,
        }
    }
}

/// Thresholds and conversions used when summarizing a ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsSettings {
    /// Samples above this speed count as moving (km/h)
    pub active_speed_kmh: f64,
    /// Samples above this power count as pedalling (watts)
    pub active_power_watts: f64,
    /// Samples above this cadence count as pedalling (RPM)
    pub active_cadence_rpm: f64,
    /// GPS speed unit
    pub gps_speed_unit: GpsSpeedUnit,
    /// Multiplier for `avg_power * hours` when the device reports no calories
    pub calorie_estimate_factor: f64,
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            active_speed_kmh: 1.0,
            active_power_watts: 1.0,
            active_cadence_rpm: 0.0,
            gps_speed_unit: GpsSpeedUnit::MetersPerSecond,
            calorie_estimate_factor: 3.6,
        }
    }
}

/// Statistics errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatisticsError {
    /// The sample sequence was empty
    #[error("No samples to summarize")]
    NoData,
}

/// Mean over the values that pass a threshold.
#[derive(Debug, Default)]
struct ActiveMean {
    sum: f64,
    count: u32,
}

impl ActiveMean {
    fn push_above(&mut self, value: f64, threshold: f64) {
        if value > threshold {
            self.sum += value;
            self.count += 1;
        }
    }

    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / f64::from(self.count)
        }
    }
}

/// Derives a [`RideSummary`] from an ordered sample sequence.
#[derive(Debug, Clone, Default)]
pub struct RideStatisticsCalculator {
    settings: StatisticsSettings,
    normalizer: TimestampNormalizer,
}

impl RideStatisticsCalculator {
    /// Create a calculator with the given settings.
    pub fn new(settings: StatisticsSettings) -> Self {
        Self {
            settings,
            normalizer: TimestampNormalizer::default(),
        }
    }

    /// Create a calculator with a custom timestamp normalizer.
    pub fn with_normalizer(settings: StatisticsSettings, normalizer: TimestampNormalizer) -> Self {
        Self {
            settings,
            normalizer,
        }
    }

    /// Active settings.
    pub fn settings(&self) -> &StatisticsSettings {
        &self.settings
    }

    /// Timestamp normalizer used for the time span.
    pub fn normalizer(&self) -> &TimestampNormalizer {
        &self.normalizer
    }

    /// Speed of a sample in km/h.
    ///
    /// The crank sensor wins over GPS: it stays accurate at low speed and
    /// under tree cover.
    pub fn current_speed_kmh(&self, sample: &Sample) -> f64 {
        if let Some(speed) = sample.crank.speed {
            return speed;
        }
        if let Some(speed_ms) = sample.crank.speed_ms {
            return speed_ms * 3.6;
        }
        sample
            .gps
            .speed
            .map_or(0.0, |speed| self.settings.gps_speed_unit.to_kmh(speed))
    }

    /// Summarize samples ordered by sequence number.
    pub fn calculate(&self, samples: &[Sample]) -> Result<RideSummary, StatisticsError> {
        if samples.is_empty() {
            return Err(StatisticsError::NoData);
        }

        let mut start_time: Option<DateTime<Utc>> = None;
        let mut end_time: Option<DateTime<Utc>> = None;

        let mut max_distance_m = 0.0_f64;
        let mut max_calories = 0.0_f64;

        let mut max_speed = 0.0_f64;
        let mut max_power = 0.0_f64;
        let mut max_cadence = 0.0_f64;
        let mut max_altitude: Option<f64> = None;

        let mut speeds = ActiveMean::default();
        let mut powers = ActiveMean::default();
        let mut cadences = ActiveMean::default();
        let mut altitudes = ActiveMean::default();

        for sample in samples {
            match self.normalizer.sample_instant(sample) {
                Ok(ts) => {
                    if let Some(instant) = ts.to_datetime() {
                        start_time.get_or_insert(instant);
                        end_time = Some(instant);
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        "Sample {} of ride {} has no usable timestamp: {}",
                        sample.sequence,
                        sample.ride_id,
                        e
                    );
                }
            }

            if let Some(distance) = sample.crank.distance {
                max_distance_m = max_distance_m.max(distance);
            }
            if let Some(calories) = sample.crank.calories {
                max_calories = max_calories.max(calories);
            }

            // Exactly 0 m is what the receiver reports before it has a fix.
            if let Some(altitude) = sample.gps.altitude.filter(|a| *a != 0.0) {
                altitudes.push(altitude);
                max_altitude = Some(max_altitude.map_or(altitude, |m| m.max(altitude)));
            }

            let speed = self.current_speed_kmh(sample);
            max_speed = max_speed.max(speed);
            speeds.push_above(speed, self.settings.active_speed_kmh);

            let power = sample.crank.power.unwrap_or(0.0);
            max_power = max_power.max(power);
            powers.push_above(power, self.settings.active_power_watts);

            let cadence = sample.crank.cadence.unwrap_or(0.0);
            max_cadence = max_cadence.max(cadence);
            cadences.push_above(cadence, self.settings.active_cadence_rpm);
        }

        let mut summary = RideSummary {
            start_time,
            end_time,
            total_distance_km: max_distance_m / 1000.0,
            calories: max_calories,
            avg_velocity_kmh: speeds.mean(),
            max_velocity_kmh: max_speed,
            avg_power: powers.mean(),
            max_power,
            avg_cadence: cadences.mean(),
            max_cadence,
            avg_altitude: altitudes.mean(),
            max_altitude: max_altitude.unwrap_or(0.0),
        };

        if summary.is_inverted() {
            tracing::warn!(
                "Ride {} ends before it starts ({:?} < {:?})",
                samples[0].ride_id,
                summary.end_time,
                summary.start_time
            );
        }

        if summary.calories == 0.0 {
            summary.calories =
                summary.avg_power * summary.duration_hours() * self.settings.calorie_estimate_factor;
        }

        Ok(summary)
    }
}
