//! Synthetic gatherer.
//!
//! Produces deterministic data derived from timestamps so dashboards can be
//! developed without a running backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};

use gridwatch_types::{Metric, MetricSeries, Query};

use crate::{AdapterError, Gatherer};

const RANGE_SERIES: usize = 3;
const SERIES_OFFSET: i64 = 11;

/// Gatherer returning generated series.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeGatherer;

impl FakeGatherer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Gatherer for FakeGatherer {
    async fn gather_single(
        &self,
        _query: &Query,
        at: DateTime<Utc>,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        Ok(vec![MetricSeries::builder("fake")
            .label("faked", "true")
            .label("gatherer", "fake")
            .label("kind", "fixed")
            .metric(at, at.second() as f64)
            .build()])
    }

    async fn gather_range(
        &self,
        _query: &Query,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        let step = chrono::Duration::from_std(step)
            .map_err(|e| AdapterError::Config(format!("invalid step: {e}")))?;
        if step <= chrono::Duration::zero() {
            return Err(AdapterError::Config("step must be positive".to_string()));
        }

        let series = (0..RANGE_SERIES)
            .map(|i| {
                let id = format!("fake-{i}");
                MetricSeries::builder(id.clone())
                    .label("fake", "true")
                    .label("name", id)
                    .metrics(generate(i as i64 * SERIES_OFFSET, start, end, step))
                    .build()
            })
            .collect();
        Ok(series)
    }
}

// One point per step starting at `start + step`, the last one past `end`.
fn generate(
    offset: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: chrono::Duration,
) -> Vec<Metric> {
    let mut metrics = Vec::new();
    let mut ts = start;
    loop {
        ts += step;
        let sec = ts.second() as i64;
        let noise = sec % 3;
        let val = if noise % 2 == 0 {
            offset + sec + noise
        } else {
            offset + sec - noise
        };
        metrics.push(Metric::new((val + offset) as f64, ts));

        if ts > end {
            break;
        }
    }
    metrics
}
