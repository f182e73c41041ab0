//! Ride lifecycle: registration, ingestion, cached summaries and projections.

pub mod cache;
pub mod exporter_csv;
pub mod seed;
pub mod service;
pub mod types;

pub use cache::SummaryCache;
pub use exporter_csv::{export_csv, export_csv_to_file, export_summary_csv, generate_csv_filename};
pub use seed::{seed_demo_ride, DEMO_RIDE_ID};
pub use service::RideService;
pub use types::{
    ActivityOverview, CachePolicy, ChartPoint, ExportError, LocationPoint, MissingCrankPolicy,
    RideError, RideRecord, SummaryState,
};
