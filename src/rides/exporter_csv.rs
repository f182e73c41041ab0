//! CSV export of raw samples and ride summaries.

use crate::metrics::summary::RideSummary;
use crate::rides::types::ExportError;
use crate::telemetry::types::Sample;
use std::io::Write;

fn opt(value: Option<f64>) -> String {
    value.map_or(String::new(), |v| v.to_string())
}

/// Device-supplied text as a CSV field, quoted when it carries a separator,
/// quote or line break.
fn text(value: Option<&str>) -> String {
    let value = value.unwrap_or_default();
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Export ride samples to CSV format, one row per sample in sequence order.
pub fn export_csv(samples: &[Sample]) -> Result<String, ExportError> {
    if samples.is_empty() {
        return Err(ExportError::NoData);
    }

    let mut output = Vec::new();

    writeln!(
        output,
        "sequence,ride_id,packet_date,packet_time,gps_timestamp,latitude,longitude,altitude,gps_speed,direction,fix_satellites,fix_quality,power,cadence,joules,calories,speed_ms,speed_kmh,distance_m"
    )
    .map_err(|e| ExportError::WriteFailed(e.to_string()))?;

    for sample in samples {
        let gps = &sample.gps;
        let crank = &sample.crank;
        writeln!(
            output,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            sample.sequence,
            sample.ride_id,
            text(sample.info.date.as_deref()),
            text(sample.info.time.as_deref()),
            text(gps.timestamp.as_deref()),
            opt(gps.latitude),
            opt(gps.longitude),
            opt(gps.altitude),
            opt(gps.speed),
            opt(gps.direction),
            gps.fix_satellites.map_or(String::new(), |v| v.to_string()),
            gps.fix_quality.map_or(String::new(), |v| v.to_string()),
            opt(crank.power),
            opt(crank.cadence),
            opt(crank.joules),
            opt(crank.calories),
            opt(crank.speed_ms),
            opt(crank.speed),
            opt(crank.distance),
        )
        .map_err(|e| ExportError::WriteFailed(e.to_string()))?;
    }

    String::from_utf8(output).map_err(|e| ExportError::WriteFailed(e.to_string()))
}

/// Export a ride summary to CSV format.
pub fn export_summary_csv(ride_id: i64, summary: &RideSummary) -> Result<String, ExportError> {
    let mut output = Vec::new();

    writeln!(
        output,
        "ride_id,start_time,end_time,duration_seconds,distance_km,calories,avg_speed_kmh,max_speed_kmh,avg_power,max_power,avg_cadence,max_cadence,avg_altitude,max_altitude"
    )
    .map_err(|e| ExportError::WriteFailed(e.to_string()))?;

    writeln!(
        output,
        "{},{},{},{:.0},{:.3},{:.1},{:.2},{:.2},{:.1},{:.1},{:.1},{:.1},{:.1},{:.1}",
        ride_id,
        summary.start_time.map_or(String::new(), |dt| dt.to_rfc3339()),
        summary.end_time.map_or(String::new(), |dt| dt.to_rfc3339()),
        summary.duration_seconds(),
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
    )
    .map_err(|e| ExportError::WriteFailed(e.to_string()))?;

    String::from_utf8(output).map_err(|e| ExportError::WriteFailed(e.to_string()))
}

/// Export samples to CSV and write to a file.
pub fn export_csv_to_file(samples: &[Sample], path: &std::path::Path) -> Result<(), ExportError> {
    let content = export_csv(samples)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default filename for a ride CSV export.
pub fn generate_csv_filename(ride_id: i64, summary: Option<&RideSummary>) -> String {
    match summary.and_then(|s| s.start_time) {
        Some(start) => format!("ride_{}_{}.csv", ride_id, start.format("%Y%m%d_%H%M%S")),
        None => format!("ride_{}.csv", ride_id),
    }
}
