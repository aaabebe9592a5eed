//! Validation between the widgets and the datasource router.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use gridwatch_adapters::Gatherer;
use gridwatch_types::{Metric, MetricSeries, Query};

/// Fetches metrics for widgets and checks the shape of the results.
#[derive(Debug, Clone)]
pub struct Controller {
    gatherer: Arc<dyn Gatherer>,
}

impl Controller {
    pub fn new(gatherer: Arc<dyn Gatherer>) -> Self {
        Self { gatherer }
    }

    /// Value of `query` at `at`. The backend must return exactly one series
    /// with exactly one metric.
    pub async fn single_metric(&self, query: &Query, at: DateTime<Utc>) -> Result<Metric> {
        let series = self.gatherer.gather_single(query, at).await?;
        let [only] = series.as_slice() else {
            bail!(
                "wrong number of series returned, 1 expected, got: {}",
                series.len()
            );
        };
        let [metric] = only.metrics.as_slice() else {
            bail!(
                "wrong number of metrics in series returned, 1 expected, got: {}",
                only.metrics.len()
            );
        };
        Ok(*metric)
    }

    /// Value of `query` now.
    pub async fn single_instant_metric(&self, query: &Query) -> Result<Metric> {
        self.single_metric(query, Utc::now()).await
    }

    /// Series of `query` between `start` and `end`.
    pub async fn range_metrics(
        &self,
        query: &Query,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<MetricSeries>> {
        if step.is_zero() {
            bail!("step must be positive");
        }
        if start >= end {
            bail!("start timestamp must be before end timestamp");
        }
        Ok(self.gatherer.gather_range(query, start, end, step).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use gridwatch_adapters::AdapterError;

    #[derive(Debug)]
    struct Canned(Vec<MetricSeries>);

    #[async_trait]
    impl Gatherer for Canned {
        async fn gather_single(
            &self,
            _query: &Query,
            _at: DateTime<Utc>,
        ) -> Result<Vec<MetricSeries>, AdapterError> {
            Ok(self.0.clone())
        }

        async fn gather_range(
            &self,
            _query: &Query,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _step: Duration,
        ) -> Result<Vec<MetricSeries>, AdapterError> {
            Ok(self.0.clone())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn controller(series: Vec<MetricSeries>) -> Controller {
        Controller::new(Arc::new(Canned(series)))
    }

    #[tokio::test]
    async fn test_single_metric() {
        let c = controller(vec![MetricSeries::builder("a").metric(t0(), 17.9).build()]);
        let m = c.single_metric(&Query::new("x", "ds"), t0()).await.unwrap();
        assert_eq!(m.value, 17.9);
    }

    #[tokio::test]
    async fn test_single_metric_shape_errors() {
        let two_metrics = controller(vec![MetricSeries::builder("a")
            .metric(t0(), 1.0)
            .metric(t0(), 2.0)
            .build()]);
        assert!(two_metrics
            .single_instant_metric(&Query::default())
            .await
            .is_err());

        let two_series = controller(vec![MetricSeries::new("a"), MetricSeries::new("b")]);
        let err = two_series
            .single_instant_metric(&Query::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("got: 2"));

        assert!(controller(vec![])
            .single_instant_metric(&Query::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_range_validation() {
        let c = controller(vec![MetricSeries::new("a")]);
        let q = Query::default();
        let later = t0() + chrono::Duration::minutes(1);

        assert!(c.range_metrics(&q, t0(), later, Duration::ZERO).await.is_err());
        assert!(c
            .range_metrics(&q, later, t0(), Duration::from_secs(1))
            .await
            .is_err());
        assert!(c
            .range_metrics(&q, t0(), t0(), Duration::from_secs(1))
            .await
            .is_err());

        let series = c
            .range_metrics(&q, t0(), later, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(series.len(), 1);
    }
}
