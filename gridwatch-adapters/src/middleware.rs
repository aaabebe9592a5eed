//! Gatherer middleware.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gridwatch_types::{MetricSeries, Query};

use crate::{AdapterError, Gatherer};

/// Logs every gather call with its duration at `debug` level.
#[derive(Debug, Clone)]
pub struct GatherLogger {
    next: Arc<dyn Gatherer>,
}

impl GatherLogger {
    pub fn new(next: Arc<dyn Gatherer>) -> Self {
        Self { next }
    }

    /// Wrap `next` and return it as a shareable gatherer.
    pub fn wrap(next: Arc<dyn Gatherer>) -> Arc<dyn Gatherer> {
        Arc::new(Self::new(next))
    }
}

#[async_trait]
impl Gatherer for GatherLogger {
    async fn gather_single(
        &self,
        query: &Query,
        at: DateTime<Utc>,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        let started = Instant::now();
        let res = self.next.gather_single(query, at).await;
        tracing::debug!(
            elapsed = ?started.elapsed(),
            datasource = %query.datasource_id,
            expr = %query.expr,
            ok = res.is_ok(),
            "gathering single metric"
        );
        res
    }

    async fn gather_range(
        &self,
        query: &Query,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        let started = Instant::now();
        let res = self.next.gather_range(query, start, end, step).await;
        tracing::debug!(
            elapsed = ?started.elapsed(),
            datasource = %query.datasource_id,
            expr = %query.expr,
            %start,
            %end,
            ?step,
            ok = res.is_ok(),
            "gathering range metrics"
        );
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeGatherer;

    #[tokio::test]
    async fn test_passes_results_through() {
        let gatherer = GatherLogger::wrap(Arc::new(FakeGatherer::new()));
        let res = gatherer
            .gather_single(&Query::new("x", "fake"), Utc::now())
            .await
            .unwrap();
        assert_eq!(res[0].id, "fake");

        let now = Utc::now();
        let res = gatherer
            .gather_range(
                &Query::new("x", "fake"),
                now - chrono::Duration::minutes(1),
                now,
                Duration::from_secs(10),
            )
            .await
            .unwrap();
        assert_eq!(res.len(), 3);
    }
}
