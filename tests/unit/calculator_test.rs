//! Unit tests for ride summary statistics.

use ridestat::metrics::{RideStatisticsCalculator, StatisticsSettings};
use ridestat::telemetry::{CrankFields, Sample};

fn timed_sample(sequence: i64, timestamp: &str, crank: CrankFields) -> Sample {
    let mut sample = Sample::new(1, sequence);
    sample.gps.timestamp = Some(timestamp.to_string());
    sample.crank = crank;
    sample
}

fn speed_sample(sequence: i64, speed: f64) -> Sample {
    timed_sample(
        sequence,
        "2024-11-30 08:00:00",
        CrankFields {
            speed: Some(speed),
            ..Default::default()
        },
    )
}

#[test]
fn test_average_speed_ignores_stopped_samples() {
    let calc = RideStatisticsCalculator::default();
    let samples: Vec<_> = [0.0, 0.5, 10.0, 12.0]
        .iter()
        .enumerate()
        .map(|(i, v)| speed_sample(i as i64, *v))
        .collect();

    let summary = calc.calculate(&samples).unwrap();
    assert_eq!(summary.avg_velocity_kmh, 11.0);
    assert_eq!(summary.max_velocity_kmh, 12.0);
}

#[test]
fn test_no_active_samples_average_is_zero() {
    let calc = RideStatisticsCalculator::default();
    let summary = calc
        .calculate(&[speed_sample(1, 0.0), speed_sample(2, 0.3)])
        .unwrap();
    assert_eq!(summary.avg_velocity_kmh, 0.0);
    assert_eq!(summary.max_velocity_kmh, 0.3);
    assert_eq!(summary.avg_power, 0.0);
    assert_eq!(summary.avg_cadence, 0.0);
}

#[test]
fn test_power_and_cadence_averages_skip_coasting() {
    let calc = RideStatisticsCalculator::default();
    let crank = |power, cadence| CrankFields {
        power: Some(power),
        cadence: Some(cadence),
        ..Default::default()
    };
    let samples = vec![
        timed_sample(1, "2024-11-30 08:00:00", crank(0.0, 0.0)),
        timed_sample(2, "2024-11-30 08:00:01", crank(200.0, 80.0)),
        timed_sample(3, "2024-11-30 08:00:02", crank(1.0, 0.0)),
        timed_sample(4, "2024-11-30 08:00:03", crank(300.0, 100.0)),
    ];

    let summary = calc.calculate(&samples).unwrap();
    assert_eq!(summary.avg_power, 250.0);
    assert_eq!(summary.max_power, 300.0);
    assert_eq!(summary.avg_cadence, 90.0);
    assert_eq!(summary.max_cadence, 100.0);
}

#[test]
fn test_zero_altitude_is_excluded() {
    let calc = RideStatisticsCalculator::default();
    let mut a = Sample::new(1, 1);
    a.gps.altitude = Some(0.0);
    let mut b = Sample::new(1, 2);
    b.gps.altitude = Some(900.0);
    let mut c = Sample::new(1, 3);
    c.gps.altitude = Some(880.0);

    let summary = calc.calculate(&[a, b, c]).unwrap();
    assert_eq!(summary.avg_altitude, 890.0);
    assert_eq!(summary.max_altitude, 900.0);
}

#[test]
fn test_unparseable_timestamps_still_contribute_readings() {
    let calc = RideStatisticsCalculator::default();
    let samples = vec![
        timed_sample(
            1,
            "2024-11-30 08:00:00",
            CrankFields {
                distance: Some(100.0),
                ..Default::default()
            },
        ),
        timed_sample(
            2,
            "garbage",
            CrankFields {
                distance: Some(2500.0),
                power: Some(400.0),
                ..Default::default()
            },
        ),
        timed_sample(
            3,
            "2024-11-30 08:10:00",
            CrankFields {
                distance: Some(2000.0),
                ..Default::default()
            },
        ),
    ];

    let summary = calc.calculate(&samples).unwrap();
    assert_eq!(summary.total_distance_km, 2.5);
    assert_eq!(summary.max_power, 400.0);
    assert_eq!(summary.duration_seconds(), 600.0);
}

#[test]
fn test_no_parseable_timestamps_gives_zero_duration() {
    let calc = RideStatisticsCalculator::default();
    let summary = calc
        .calculate(&[Sample::new(1, 1), Sample::new(1, 2)])
        .unwrap();
    assert!(summary.start_time.is_none());
    assert!(summary.end_time.is_none());
    assert_eq!(summary.duration_seconds(), 0.0);
    assert_eq!(summary.calories, 0.0);
}

#[test]
fn test_calorie_estimate_when_device_reports_none() {
    let calc = RideStatisticsCalculator::default();
    let crank = CrankFields {
        power: Some(200.0),
        ..Default::default()
    };
    let samples = vec![
        timed_sample(1, "2024-11-30 08:00:00", crank.clone()),
        timed_sample(2, "2024-11-30 09:00:00", crank),
    ];

    let summary = calc.calculate(&samples).unwrap();
    assert!((summary.calories - 720.0).abs() < 1e-9);
}

#[test]
fn test_reported_calories_win_over_estimate() {
    let calc = RideStatisticsCalculator::default();
    let crank = |calories| CrankFields {
        power: Some(200.0),
        calories: Some(calories),
        ..Default::default()
    };
    let samples = vec![
        timed_sample(1, "2024-11-30 08:00:00", crank(10.0)),
        timed_sample(2, "2024-11-30 09:00:00", crank(55.5)),
    ];

    assert_eq!(calc.calculate(&samples).unwrap().calories, 55.5);
}

#[test]
fn test_inverted_timing_is_flagged_not_corrected() {
    let calc = RideStatisticsCalculator::default();
    let crank = CrankFields {
        power: Some(200.0),
        ..Default::default()
    };
    let samples = vec![
        timed_sample(1, "2024-11-30 09:00:00", crank.clone()),
        timed_sample(2, "2024-11-30 08:00:00", crank),
    ];

    let summary = calc.calculate(&samples).unwrap();
    assert!(summary.is_inverted());
    assert!(summary.start_time > summary.end_time);
    assert_eq!(summary.duration_seconds(), 0.0);
    assert_eq!(summary.calories, 0.0);
}

#[test]
fn test_custom_thresholds() {
    let calc = RideStatisticsCalculator::new(StatisticsSettings {
        active_speed_kmh: 5.0,
        ..Default::default()
    });
    let samples: Vec<_> = [4.0, 6.0, 8.0]
        .iter()
        .enumerate()
        .map(|(i, v)| speed_sample(i as i64, *v))
        .collect();

    assert_eq!(calc.calculate(&samples).unwrap().avg_velocity_kmh, 7.0);
}
