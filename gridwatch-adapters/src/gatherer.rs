//! The gatherer abstraction every backend implements.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gridwatch_types::{MetricSeries, Query};

use crate::AdapterError;

/// Retrieves metric series from a backend.
///
/// Implementations must be safe to share between widgets: every call takes
/// `&self` and no gatherer mutates shared state after construction.
#[async_trait]
pub trait Gatherer: Send + Sync + std::fmt::Debug {
    /// Gather the value of `query` at instant `at`.
    async fn gather_single(
        &self,
        query: &Query,
        at: DateTime<Utc>,
    ) -> Result<Vec<MetricSeries>, AdapterError>;

    /// Gather the values of `query` between `start` and `end` every `step`.
    async fn gather_range(
        &self,
        query: &Query,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<MetricSeries>, AdapterError>;
}

/// Reduce a range result to the latest point of its only series.
///
/// Used by backends without a native instant query.
#[cfg_attr(not(any(feature = "graphite", feature = "influxdb")), allow(dead_code))]
pub(crate) fn single_latest(
    mut series: Vec<MetricSeries>,
) -> Result<Vec<MetricSeries>, AdapterError> {
    match series.len() {
        0 => {
            return Err(AdapterError::EmptyResult(
                "server didn't return any metric series".to_string(),
            ))
        }
        1 => {}
        n => {
            return Err(AdapterError::EmptyResult(format!(
                "server returned more than one metric series, got {n}"
            )))
        }
    }

    for s in series.iter_mut() {
        if s.metrics.is_empty() {
            return Err(AdapterError::EmptyResult(format!(
                "series {} has no metrics",
                s.id
            )));
        }
        s.truncate_to_latest();
    }
    Ok(series)
}
