use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};

use crate::air_quality::{DEFAULT_WINDOW_SIZE, Machine, Reading};

/// Filter shared by every per-machine query of a dashboard pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryScope {
    pub tag: String,

    pub location_id: Option<String>,

    pub received_since: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("reading query failed")]
    Database(#[from] sqlx::Error),

    #[error("invalid row for machine {machine_id}: {reason}")]
    InvalidRow { machine_id: String, reason: String },
}

/// The data platform the dashboard reads from.
pub trait ReadingSource {
    /// Raw readings of `machine` within `scope`, in no particular order.
    fn readings(
        &self,
        machine: &Machine,
        scope: &QueryScope,
    ) -> impl Future<Output = Result<Vec<Reading>, QueryError>>;

    /// Mean PM2.5 of `machine` within `scope` computed by the platform, or
    /// `None` when it has nothing to average.
    fn server_average(
        &self,
        machine: &Machine,
        scope: &QueryScope,
    ) -> impl Future<Output = Result<Option<f64>, QueryError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStrategy {
    TrailingWindow { window_size: NonZeroUsize },
    ServerAverage,
}

impl Default for AggregationStrategy {
    fn default() -> Self {
        AggregationStrategy::TrailingWindow {
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}
