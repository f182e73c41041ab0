//! Demo ride used to populate an empty database.

use crate::rides::service::RideService;
use crate::rides::types::RideError;
use crate::telemetry::timestamp::format_millis;
use crate::telemetry::types::{CrankFields, GpsFields, PacketInfo};

/// Ride id of the demo ride.
pub const DEMO_RIDE_ID: i64 = 777;

/// 2024-11-30 08:00:00 UTC
const BASE_TIME_MS: i64 = 1_732_953_600_000;

/// Spacing between demo samples.
const INTERVAL_MS: i64 = 75_000;

/// (latitude, longitude, altitude m, speed km/h, power W, cadence RPM, distance km, calories)
const POINTS: [(f64, f64, f64, f64, f64, f64, f64, f64); 5] = [
    (-25.4290, -49.2721, 880.0, 17.5, 165.0, 88.0, 0.3, 12.4),
    (-25.4270, -49.2700, 885.0, 18.2, 172.0, 92.0, 0.8, 25.3),
    (-25.4310, -49.2680, 890.0, 16.8, 158.0, 85.0, 1.1, 37.1),
    (-25.4300, -49.2660, 895.0, 19.1, 185.0, 95.0, 1.4, 51.0),
    (-25.4250, -49.2640, 900.0, 17.9, 175.0, 89.0, 1.7, 64.1),
];

/// Insert the demo ride unless it already exists.
///
/// Returns `true` when the ride was created.
pub fn seed_demo_ride(service: &RideService) -> Result<bool, RideError> {
    if service.ride_exists(DEMO_RIDE_ID)? {
        tracing::info!("Demo ride {} already present", DEMO_RIDE_ID);
        return Ok(false);
    }

    let start = format_millis(BASE_TIME_MS);
    service.ensure_ride_exists(DEMO_RIDE_ID, start.as_deref())?;

    for (i, &(lat, lon, alt, speed, power, cadence, distance_km, calories)) in
        POINTS.iter().enumerate()
    {
        let timestamp = format_millis(BASE_TIME_MS + i as i64 * INTERVAL_MS);
        let (date, time) = timestamp
            .as_deref()
            .and_then(|t| t.split_once(' '))
            .map_or((None, None), |(d, t)| (Some(d.to_string()), Some(t.to_string())));

        let info = PacketInfo { date, time };
        let gps = GpsFields {
            timestamp: timestamp.clone(),
            latitude: Some(lat),
            longitude: Some(lon),
            altitude: Some(alt),
            speed: Some(speed / 3.6),
            direction: Some(90.0),
            fix_satellites: Some(9),
            fix_quality: Some(1),
        };
        let crank = CrankFields {
            power: Some(power),
            cadence: Some(cadence),
            joules: Some(0.0),
            calories: Some(calories),
            speed_ms: Some(speed / 3.6),
            speed: Some(speed),
            distance: Some(distance_km * 1000.0),
        };

        service.insert_sample(DEMO_RIDE_ID, &info, &gps, Some(&crank))?;
    }

    tracing::info!("Seeded demo ride {} with {} samples", DEMO_RIDE_ID, POINTS.len());
    Ok(true)
}
