//! Prometheus gatherer using the HTTP query API.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/query?query=<expr>&time=<unix>` for instant queries
//! - `GET /api/v1/query_range?query=<expr>&start=<unix>&end=<unix>&step=<secs>`
//!
//! `scalar`, `vector` and `matrix` results are supported. Each series is
//! identified by its label set rendered the Prometheus way
//! (`name{a="1", b="2"}`).
//!
//! ## Example
//!
//! ```rust,no_run
//! use gridwatch_adapters::prometheus::PrometheusGatherer;
//! use gridwatch_adapters::Gatherer;
//! use gridwatch_types::Query;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gatherer = PrometheusGatherer::builder()
//!         .address("http://localhost:9090")
//!         .filter_special_labels(true)
//!         .build()?;
//!
//!     let series = gatherer
//!         .gather_single(&Query::new("up", "prometheus"), chrono::Utc::now())
//!         .await?;
//!     println!("{} series", series.len());
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use gridwatch_types::{Metric, MetricSeries, Query};

use crate::{AdapterError, Gatherer};

const METRIC_NAME_LABEL: &str = "__name__";

/// Prometheus gatherer.
#[derive(Debug, Clone)]
pub struct PrometheusGatherer {
    client: Client,
    address: String,
    filter_special_labels: bool,
}

impl PrometheusGatherer {
    /// Create a new builder for configuring the gatherer.
    pub fn builder() -> PrometheusGathererBuilder {
        PrometheusGathererBuilder::default()
    }

    async fn query(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<MetricSeries>, AdapterError> {
        let url = format!("{}{}", self.address, path);
        let response = self.client.get(&url).query(params).send().await?;

        // Prometheus reports query errors with 4xx/5xx and a JSON body.
        let status = response.status();
        let body = response.text().await?;
        let decoded: ApiResponse = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                AdapterError::Parse(e.to_string())
            } else {
                AdapterError::Http(format!("API returned status {status}"))
            }
        })?;

        decode_response(decoded, self.filter_special_labels)
    }
}

#[async_trait]
impl Gatherer for PrometheusGatherer {
    async fn gather_single(
        &self,
        query: &Query,
        at: DateTime<Utc>,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        self.query(
            "/api/v1/query",
            &[("query", query.expr.clone()), ("time", unix_secs(at))],
        )
        .await
    }

    async fn gather_range(
        &self,
        query: &Query,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        self.query(
            "/api/v1/query_range",
            &[
                ("query", query.expr.clone()),
                ("start", unix_secs(start)),
                ("end", unix_secs(end)),
                ("step", format!("{:.3}", step.as_secs_f64())),
            ],
        )
        .await
    }
}

/// Builder for PrometheusGatherer.
#[derive(Debug, Default)]
pub struct PrometheusGathererBuilder {
    address: Option<String>,
    filter_special_labels: bool,
    timeout: Option<Duration>,
}

impl PrometheusGathererBuilder {
    /// Set the server address (e.g., "http://localhost:9090").
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Drop labels starting with `__` from returned series.
    pub fn filter_special_labels(mut self, filter: bool) -> Self {
        self.filter_special_labels = filter;
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the gatherer.
    pub fn build(self) -> Result<PrometheusGatherer, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Config(e.to_string()))?;

        let address = self
            .address
            .unwrap_or_else(|| "http://localhost:9090".to_string());

        Ok(PrometheusGatherer {
            client,
            address: address.trim_end_matches('/').to_string(),
            filter_special_labels: self.filter_special_labels,
        })
    }
}

fn unix_secs(ts: DateTime<Utc>) -> String {
    format!("{:.3}", ts.timestamp_millis() as f64 / 1000.0)
}

fn decode_response(
    response: ApiResponse,
    filter_special_labels: bool,
) -> Result<Vec<MetricSeries>, AdapterError> {
    if response.status != "success" {
        return Err(AdapterError::Http(format!(
            "{}: {}",
            response.error_type.unwrap_or_else(|| "error".to_string()),
            response.error.unwrap_or_default()
        )));
    }
    let data = response
        .data
        .ok_or_else(|| AdapterError::Parse("missing data".to_string()))?;

    match data.result_type.as_str() {
        "scalar" => {
            let sample: Sample = serde_json::from_value(data.result)?;
            Ok(vec![MetricSeries {
                metrics: vec![sample.to_metric()?],
                ..Default::default()
            }])
        }
        "vector" => {
            let vector: Vec<VectorSample> = serde_json::from_value(data.result)?;
            vector
                .into_iter()
                .map(|s| {
                    Ok(MetricSeries {
                        id: label_set_string(&s.metric),
                        labels: sanitize_labels(s.metric, filter_special_labels),
                        metrics: vec![s.value.to_metric()?],
                    })
                })
                .collect()
        }
        "matrix" => {
            let matrix: Vec<MatrixStream> = serde_json::from_value(data.result)?;
            matrix
                .into_iter()
                .map(|s| {
                    let metrics = s
                        .values
                        .iter()
                        .map(Sample::to_metric)
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(MetricSeries {
                        id: label_set_string(&s.metric),
                        labels: sanitize_labels(s.metric, filter_special_labels),
                        metrics,
                    })
                })
                .collect()
        }
        other => Err(AdapterError::Unsupported(format!(
            "prometheus value type {other}"
        ))),
    }
}

/// Render a label set as `name{a="1", b="2"}`.
fn label_set_string(labels: &BTreeMap<String, String>) -> String {
    let name = labels.get(METRIC_NAME_LABEL).map(String::as_str);
    let pairs: Vec<String> = labels
        .iter()
        .filter(|(k, _)| k.as_str() != METRIC_NAME_LABEL)
        .map(|(k, v)| format!("{k}={v:?}"))
        .collect();

    match (name, pairs.is_empty()) {
        (Some(name), true) => name.to_string(),
        (None, true) => "{}".to_string(),
        (name, false) => format!("{}{{{}}}", name.unwrap_or_default(), pairs.join(", ")),
    }
}

fn sanitize_labels(labels: BTreeMap<String, String>, filter: bool) -> BTreeMap<String, String> {
    if !filter {
        return labels;
    }
    labels
        .into_iter()
        .filter(|(k, _)| !k.starts_with("__"))
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    data: Option<ApiData>,
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiData {
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: Sample,
}

#[derive(Debug, Deserialize)]
struct MatrixStream {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<Sample>,
}

/// `[<unix seconds>, "<value>"]`
#[derive(Debug, Deserialize)]
struct Sample(f64, String);

impl Sample {
    fn to_metric(&self) -> Result<Metric, AdapterError> {
        let value = self
            .1
            .parse::<f64>()
            .map_err(|e| AdapterError::Parse(format!("invalid sample value {:?}: {e}", self.1)))?;
        let ts = DateTime::from_timestamp_millis((self.0 * 1000.0).round() as i64)
            .ok_or_else(|| AdapterError::Parse(format!("invalid timestamp {}", self.0)))?;
        Ok(Metric::new(value, ts))
    }
}
