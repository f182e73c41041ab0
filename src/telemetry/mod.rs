//! Telemetry sample types and timestamp handling.

pub mod timestamp;
pub mod types;

pub use timestamp::{format_millis, ParsedTimestamp, TimestampError, TimestampFormat, TimestampNormalizer};
pub use types::{CrankFields, GpsFields, PacketInfo, Sample, TelemetryPacket};
