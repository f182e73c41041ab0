//! Integration tests for the ride lifecycle: registration, ingestion,
//! cached summaries, projections and deletion.

use ridestat::rides::{seed, CachePolicy, RideError, RideService, SummaryState};
use ridestat::storage::{AppConfig, Database};
use ridestat::telemetry::{CrankFields, GpsFields, PacketInfo, TelemetryPacket};

const RIDE: i64 = 777;

/// Service over a database file in a temporary directory.
fn file_service(dir: &tempfile::TempDir) -> RideService {
    let mut config = AppConfig::default();
    config.data_dir = dir.path().to_path_buf();
    RideService::open(&config).unwrap()
}

fn insert_point(service: &RideService, ride_id: i64, second: u32, distance_km: f64, calories: f64) {
    let gps = GpsFields {
        timestamp: Some(format!("2024-11-30 08:{:02}:{:02}.000", second / 60, second % 60)),
        latitude: Some(-25.43),
        longitude: Some(-49.27),
        altitude: Some(880.0),
        speed: Some(5.0),
        ..Default::default()
    };
    let crank = CrankFields {
        power: Some(170.0),
        cadence: Some(90.0),
        calories: Some(calories),
        speed: Some(18.0),
        distance: Some(distance_km * 1000.0),
        ..Default::default()
    };
    service
        .insert_sample(ride_id, &PacketInfo::default(), &gps, Some(&crank))
        .unwrap();
}

#[test]
fn test_ride_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_service(&dir);

    assert!(service
        .ensure_ride_exists(RIDE, Some("2024-11-30 08:00:00.000"))
        .unwrap());

    let points = [(0.3, 12.4), (0.8, 25.3), (1.1, 37.1), (1.4, 51.0), (1.7, 64.1)];
    for (i, (distance, calories)) in points.iter().enumerate() {
        insert_point(&service, RIDE, i as u32 * 75, *distance, *calories);
    }

    let summary = service.get_ride_summary(RIDE).unwrap();
    assert!((summary.total_distance_km - 1.7).abs() < 1e-9);
    assert_eq!(summary.calories, 64.1);
    assert_eq!(summary.duration_seconds(), 300.0);

    // A second read is served from the cache and is identical.
    assert_eq!(service.get_ride_summary(RIDE).unwrap(), summary);
    assert!(service.get_ride(RIDE).unwrap().summary.is_computed());

    // The summary survives reopening the database.
    drop(service);
    let reopened = file_service(&dir);
    assert_eq!(reopened.get_ride_summary(RIDE).unwrap(), summary);
    assert_eq!(reopened.get_raw_series(RIDE).unwrap().len(), 5);
}

#[test]
fn test_seeded_demo_ride() {
    let service = RideService::in_memory().unwrap();
    assert!(seed::seed_demo_ride(&service).unwrap());

    let summary = service.get_ride_summary(seed::DEMO_RIDE_ID).unwrap();
    assert!((summary.total_distance_km - 1.7).abs() < 1e-9);
    assert_eq!(summary.calories, 64.1);

    let track = service.get_ride_locations(seed::DEMO_RIDE_ID, 0).unwrap();
    assert_eq!(track.len(), 5);
    assert!(track.windows(2).all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
    assert_eq!(track[0].latitude, -25.4290);
}

#[test]
fn test_insert_after_compute_marks_summary_stale() {
    let service = RideService::in_memory().unwrap();
    service.ensure_ride_exists(5, None).unwrap();
    insert_point(&service, 5, 0, 0.5, 10.0);

    let first = service.get_ride_summary(5).unwrap();
    assert_eq!(first.total_distance_km, 0.5);

    insert_point(&service, 5, 60, 0.9, 20.0);
    assert!(matches!(
        service.get_ride(5).unwrap().summary,
        SummaryState::Stale(_)
    ));

    let second = service.get_ride_summary(5).unwrap();
    assert_eq!(second.total_distance_km, 0.9);
    assert_eq!(second.duration_seconds(), 60.0);
}

#[test]
fn test_legacy_policy_ignores_new_samples_until_forced() {
    let mut config = AppConfig::default();
    config.cache.policy = CachePolicy::LegacyDistance;
    let service = RideService::new(Database::open_in_memory().unwrap(), &config);

    service.ensure_ride_exists(6, None).unwrap();
    insert_point(&service, 6, 0, 0.5, 10.0);
    assert_eq!(service.get_ride_summary(6).unwrap().total_distance_km, 0.5);

    insert_point(&service, 6, 60, 0.9, 20.0);
    assert_eq!(service.get_ride_summary(6).unwrap().total_distance_km, 0.5);
    assert_eq!(service.recompute_ride_summary(6).unwrap().total_distance_km, 0.9);
}

#[test]
fn test_ensure_ride_is_idempotent() {
    let service = RideService::in_memory().unwrap();
    assert!(service.ensure_ride_exists(8, Some("2024-11-30 08:00:00")).unwrap());
    insert_point(&service, 8, 0, 0.1, 1.0);

    // A repeat registration reports success and keeps the original row.
    assert!(service.ensure_ride_exists(8, Some("2025-01-01 00:00:00")).unwrap());
    assert!(service.ensure_ride_exists(8, None).unwrap());
    assert_eq!(service.get_raw_series(8).unwrap().len(), 1);
    assert_eq!(
        service.get_ride(8).unwrap().start_time.map(|t| t.to_rfc3339()),
        Some("2024-11-30T08:00:00+00:00".to_string())
    );
}

#[test]
fn test_list_orders_by_start_time() {
    let service = RideService::in_memory().unwrap();
    service.ensure_ride_exists(1, Some("2024-11-28 08:00:00")).unwrap();
    service.ensure_ride_exists(2, Some("2024-11-30 08:00:00")).unwrap();
    service.ensure_ride_exists(3, Some("2024-11-29 08:00:00")).unwrap();

    assert_eq!(service.list_ride_ids().unwrap(), vec![2, 3, 1]);
}

#[test]
fn test_delete_cascades_to_samples() {
    let service = RideService::in_memory().unwrap();
    service.ensure_ride_exists(9, None).unwrap();
    insert_point(&service, 9, 0, 0.1, 1.0);
    insert_point(&service, 9, 1, 0.2, 2.0);
    service.get_ride_summary(9).unwrap();

    service.delete_ride(9).unwrap();

    assert!(service.get_raw_series(9).unwrap().is_empty());
    assert!(matches!(service.get_ride(9), Err(RideError::NotFound(9))));
    assert!(matches!(service.get_ride_summary(9), Err(RideError::NotFound(9))));
    assert!(matches!(service.delete_ride(9), Err(RideError::NotFound(9))));
    assert!(service.list_ride_ids().unwrap().is_empty());

    let db = service.database();
    let count = db.lock().unwrap().count_samples(9).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_error_cases() {
    let service = RideService::in_memory().unwrap();

    assert!(matches!(
        service.ensure_ride_exists(-3, None),
        Err(RideError::InvalidArgument(_))
    ));
    assert!(matches!(service.get_ride_summary(42), Err(RideError::NotFound(42))));

    service.ensure_ride_exists(42, None).unwrap();
    assert!(matches!(service.get_ride_summary(42), Err(RideError::NoData(42))));
    assert!(service.get_raw_series(1234).unwrap().is_empty());
    assert!(service.get_chart_series(1234).unwrap().is_empty());
}

#[test]
fn test_ingest_packets_from_json() {
    let service = RideService::in_memory().unwrap();
    let lines = [
        r#"{"ride_id": 15, "info": {"date": "2024-11-30", "time": "08:00:00.000"}, "gps": {"speed": 5.0}}"#,
        r#"{"ride_id": 15, "info": {"date": "2024-11-30", "time": "08:00:10.000"}, "gps": {"speed": 6.0}, "crank": {"power": 210.0, "distance": 55.0}}"#,
    ];

    for line in lines {
        let packet: TelemetryPacket = serde_json::from_str(line).unwrap();
        service.ingest_packet(&packet).unwrap();
    }

    let summary = service.get_ride_summary(15).unwrap();
    assert_eq!(summary.duration_seconds(), 10.0);
    assert_eq!(summary.total_distance_km, 0.055);
    assert_eq!(summary.max_power, 210.0);

    let chart = service.get_chart_series(15).unwrap();
    assert_eq!(chart.len(), 2);
    assert!((chart[0].speed_kmh - 18.0).abs() < 1e-9);
    assert!(chart[0].timestamp_ms.unwrap() < chart[1].timestamp_ms.unwrap());
}
