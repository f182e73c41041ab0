//! Unit tests for timestamp normalization across firmware encodings.

use chrono::{TimeZone, Utc};
use ridestat::telemetry::{format_millis, Sample, TimestampFormat, TimestampNormalizer};

fn expected_ms(h: u32, m: u32, s: u32, ms: i64) -> i64 {
    Utc.with_ymd_and_hms(2024, 11, 30, h, m, s)
        .unwrap()
        .timestamp_millis()
        + ms
}

#[test]
fn test_all_encodings_agree_on_the_instant() {
    let normalizer = TimestampNormalizer::default();
    let inputs = [
        "2024-11-30T08:01:15.250000",
        "2024-11-30T08:01:15.250",
        "2024-11-30 08:01:15.250",
        "2024/11/30 08:01:15.250",
        "2024/11/30 08:01:15.250000",
    ];

    for input in inputs {
        assert_eq!(
            normalizer.parse(input).unwrap().millis,
            expected_ms(8, 1, 15, 250),
            "input {input}"
        );
    }

    for input in ["2024-11-30T08:01:15", "2024-11-30 08:01:15", "2024/11/30 08:01:15"] {
        assert_eq!(normalizer.parse(input).unwrap().millis, expected_ms(8, 1, 15, 0));
    }
}

#[test]
fn test_surrounding_whitespace_is_ignored() {
    let normalizer = TimestampNormalizer::default();
    let parsed = normalizer.parse("  2024-11-30 08:01:15.000\n").unwrap();
    assert_eq!(parsed.format, TimestampFormat::SpaceMillis);
}

#[test]
fn test_unknown_encodings_fail() {
    let normalizer = TimestampNormalizer::default();
    for input in [
        "30/11/2024 08:01:15",
        "2024-11-30T08:01:15Z",
        "2024-11-30T08:01:15.12",
        "08:01:15",
        "   ",
    ] {
        assert!(normalizer.parse(input).is_err(), "input {input:?}");
    }
}

#[test]
fn test_fallback_chain_for_samples() {
    let normalizer = TimestampNormalizer::default();

    let mut sample = Sample::new(1, 1);
    sample.gps.timestamp = Some("not a time".to_string());
    sample.info.date = Some("2024-11-30".to_string());
    sample.info.time = Some("garbage".to_string());
    assert!(normalizer.sample_instant(&sample).is_err());

    sample.info.time = Some("08:01:15".to_string());
    assert_eq!(
        normalizer.sample_instant(&sample).unwrap().millis,
        expected_ms(8, 1, 15, 0)
    );

    sample.gps.timestamp = Some("2024-11-30T07:00:00.000".to_string());
    assert_eq!(
        normalizer.sample_instant(&sample).unwrap().millis,
        expected_ms(7, 0, 0, 0)
    );
}

#[test]
fn test_storage_encoding() {
    assert_eq!(
        format_millis(expected_ms(8, 0, 0, 5)).as_deref(),
        Some("2024-11-30 08:00:00.005")
    );
}
