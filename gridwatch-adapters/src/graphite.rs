//! Graphite gatherer using the render API.
//!
//! Queries `GET /render?target=<expr>&from=<unix>&until=<unix>&format=json`.
//! Graphite has no instant query, so single queries read the last five
//! minutes and keep the latest point of the only returned series.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use gridwatch_types::{Metric, MetricSeries, Query};

use crate::gatherer::single_latest;
use crate::{AdapterError, Gatherer};

const INSTANT_RANGE_SECS: i64 = 5 * 60;
const TARGET_LABEL: &str = "target";

/// Graphite gatherer.
#[derive(Debug, Clone)]
pub struct GraphiteGatherer {
    client: Client,
    address: String,
}

impl GraphiteGatherer {
    /// Create a new builder for configuring the gatherer.
    pub fn builder() -> GraphiteGathererBuilder {
        GraphiteGathererBuilder::default()
    }

    async fn render(
        &self,
        target: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        let url = format!("{}/render", self.address);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("target", target.to_string()),
                ("from", from.timestamp().to_string()),
                ("until", until.timestamp().to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Http(format!(
                "API returned status {}",
                response.status()
            )));
        }

        let body: Vec<RenderSeries> = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(to_series(body))
    }
}

#[async_trait]
impl Gatherer for GraphiteGatherer {
    async fn gather_single(
        &self,
        query: &Query,
        at: DateTime<Utc>,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        let from = at - chrono::Duration::seconds(INSTANT_RANGE_SECS);
        let series = self.render(&query.expr, from, at).await?;
        single_latest(series)
    }

    async fn gather_range(
        &self,
        query: &Query,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _step: Duration,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        self.render(&query.expr, start, end).await
    }
}

/// Builder for GraphiteGatherer.
#[derive(Debug, Default)]
pub struct GraphiteGathererBuilder {
    address: Option<String>,
    timeout: Option<Duration>,
}

impl GraphiteGathererBuilder {
    /// Set the Graphite web address (e.g., "http://localhost:8080").
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the gatherer.
    pub fn build(self) -> Result<GraphiteGatherer, AdapterError> {
        let address = self
            .address
            .filter(|a| !a.is_empty())
            .ok_or_else(|| AdapterError::Config("graphite address is required".to_string()))?;
        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(10)))
            .build()
            .map_err(|e| AdapterError::Config(e.to_string()))?;

        Ok(GraphiteGatherer {
            client,
            address: address.trim_end_matches('/').to_string(),
        })
    }
}

fn to_series(body: Vec<RenderSeries>) -> Vec<MetricSeries> {
    body.into_iter()
        .filter(|s| !s.datapoints.is_empty())
        .map(|s| {
            let metrics: Vec<Metric> = s
                .datapoints
                .iter()
                .filter_map(|&(value, ts)| {
                    let value = value?;
                    let ts = DateTime::from_timestamp(ts, 0)?;
                    Some(Metric::new(value, ts))
                })
                .collect();
            MetricSeries::builder(s.target.clone())
                .label(TARGET_LABEL, s.target)
                .metrics(metrics)
                .build()
        })
        .collect()
}

/// One entry of the render API JSON output.
#[derive(Debug, Deserialize)]
struct RenderSeries {
    target: String,
    /// `[value | null, unix seconds]`
    #[serde(default)]
    datapoints: Vec<(Option<f64>, i64)>,
}
