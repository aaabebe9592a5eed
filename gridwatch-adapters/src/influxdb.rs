//! InfluxDB 1.x gatherer using the HTTP query API.
//!
//! Queries `GET /query?db=<database>&q=<expr>&epoch=ms`. InfluxQL carries its
//! own time bounds, so the expression is sent verbatim and usually templates
//! them from `{{ .__start }}` / `{{ .__end }}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use gridwatch_types::{Metric, MetricSeries, Query};

use crate::gatherer::single_latest;
use crate::{AdapterError, Gatherer};

/// InfluxDB gatherer.
#[derive(Debug, Clone)]
pub struct InfluxDbGatherer {
    client: Client,
    address: String,
    database: String,
}

impl InfluxDbGatherer {
    /// Create a new builder for configuring the gatherer.
    pub fn builder() -> InfluxDbGathererBuilder {
        InfluxDbGathererBuilder::default()
    }

    async fn query(&self, expr: &str) -> Result<Vec<MetricSeries>, AdapterError> {
        let url = format!("{}/query", self.address);
        let response = self
            .client
            .get(&url)
            .query(&[("db", self.database.as_str()), ("q", expr), ("epoch", "ms")])
            .send()
            .await?;

        let status = response.status();
        let body: QueryResponse = response.json().await.map_err(|e| {
            if status.is_success() {
                AdapterError::Parse(e.to_string())
            } else {
                AdapterError::Http(format!("API returned status {status}"))
            }
        })?;

        decode_response(body)
    }
}

#[async_trait]
impl Gatherer for InfluxDbGatherer {
    async fn gather_single(
        &self,
        query: &Query,
        _at: DateTime<Utc>,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        let series = self.query(&query.expr).await?;
        single_latest(series)
    }

    async fn gather_range(
        &self,
        query: &Query,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _step: Duration,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        self.query(&query.expr).await
    }
}

/// Builder for InfluxDbGatherer.
#[derive(Debug, Default)]
pub struct InfluxDbGathererBuilder {
    address: Option<String>,
    database: Option<String>,
    timeout: Option<Duration>,
}

impl InfluxDbGathererBuilder {
    /// Set the server address (e.g., "http://localhost:8086").
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set the database to query. Required.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the gatherer.
    pub fn build(self) -> Result<InfluxDbGatherer, AdapterError> {
        let database = self
            .database
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AdapterError::Config("no influxdb database given".to_string()))?;
        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(10)))
            .build()
            .map_err(|e| AdapterError::Config(e.to_string()))?;
        let address = self
            .address
            .unwrap_or_else(|| "http://localhost:8086".to_string());

        Ok(InfluxDbGatherer {
            client,
            address: address.trim_end_matches('/').to_string(),
            database,
        })
    }
}

fn decode_response(body: QueryResponse) -> Result<Vec<MetricSeries>, AdapterError> {
    if let Some(err) = body.error {
        return Err(AdapterError::Http(err));
    }

    let mut res = Vec::new();
    for result in body.results {
        if let Some(err) = result.error {
            return Err(AdapterError::Http(err));
        }
        for series in result.series {
            let mut metrics = Vec::with_capacity(series.values.len());
            for row in &series.values {
                let (Some(ts), Some(value)) = (row.first(), row.get(1)) else {
                    return Err(AdapterError::Parse(format!(
                        "row of series {} has less than two columns",
                        series.name
                    )));
                };
                // Null values are missing points, not errors.
                let Some(value) = value.as_f64() else {
                    if value.is_null() {
                        continue;
                    }
                    return Err(AdapterError::Parse(format!("invalid value {value}")));
                };
                metrics.push(Metric::new(value, parse_time(ts)?));
            }
            res.push(MetricSeries::builder(series.name).metrics(metrics).build());
        }
    }
    Ok(res)
}

fn parse_time(ts: &Value) -> Result<DateTime<Utc>, AdapterError> {
    match ts {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| AdapterError::Parse(format!("invalid timestamp {n}"))),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AdapterError::Parse(format!("invalid timestamp {s:?}: {e}"))),
        other => Err(AdapterError::Parse(format!("invalid timestamp {other}"))),
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<InfluxSeries>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxSeries {
    #[serde(default)]
    name: String,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}
