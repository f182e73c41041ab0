//! Summary cache: serves stored ride summaries or recomputes and stores them.

use crate::metrics::calculator::{RideStatisticsCalculator, StatisticsError};
use crate::metrics::summary::RideSummary;
use crate::rides::types::{CachePolicy, RideError};
use crate::storage::database::{Database, DatabaseError};

/// Decides between the stored summary and a fresh computation.
#[derive(Debug, Clone, Default)]
pub struct SummaryCache {
    policy: CachePolicy,
    calculator: RideStatisticsCalculator,
}

impl SummaryCache {
    /// Create a cache with the given policy and calculator.
    pub fn new(policy: CachePolicy, calculator: RideStatisticsCalculator) -> Self {
        Self { policy, calculator }
    }

    /// Active cache policy.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Calculator used on cache misses.
    pub fn calculator(&self) -> &RideStatisticsCalculator {
        &self.calculator
    }

    /// Get a ride summary, computing and storing it when the cache cannot be used.
    pub fn get_summary(
        &self,
        db: &Database,
        ride_id: i64,
        force: bool,
    ) -> Result<RideSummary, RideError> {
        let record = db.get_ride(ride_id)?.ok_or(RideError::NotFound(ride_id))?;

        if !force && self.policy.is_authoritative(&record) {
            if let Some(summary) = record.summary.summary() {
                tracing::debug!("Serving cached summary for ride {}", ride_id);
                return Ok(*summary);
            }
        }

        self.recompute(db, ride_id)
    }

    /// Compute a ride's summary from its samples and store it.
    ///
    /// The returned summary is read back from storage so it is identical to
    /// what later cache hits return.
    fn recompute(&self, db: &Database, ride_id: i64) -> Result<RideSummary, RideError> {
        let samples = db.get_samples(ride_id)?;

        let summary = self
            .calculator
            .calculate(&samples)
            .map_err(|e| match e {
                StatisticsError::NoData => RideError::NoData(ride_id),
            })?;

        db.write_summary(ride_id, &summary)?;

        tracing::info!(
            "Computed summary for ride {} from {} samples ({:.3} km)",
            ride_id,
            samples.len(),
            summary.total_distance_km
        );

        let record = db.get_ride(ride_id)?.ok_or(RideError::NotFound(ride_id))?;
        match record.summary.summary() {
            Some(stored) => Ok(*stored),
            None => Err(RideError::Storage(DatabaseError::DeserializationError(
                format!("summary for ride {} was not stored", ride_id),
            ))),
        }
    }
}
