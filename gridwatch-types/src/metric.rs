//! Metric samples and series returned by gatherers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A single measured value at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metric {
    /// The sampled value.
    pub value: f64,
    /// When the value was sampled.
    pub ts: DateTime<Utc>,
}

impl Metric {
    /// Create a new metric sample.
    pub fn new(value: f64, ts: DateTime<Utc>) -> Self {
        Self { value, ts }
    }
}

/// A group of metrics identified by an ID and a set of labels.
///
/// For range queries the metrics are ordered by timestamp, oldest first.
/// Instant queries return series with a single metric.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricSeries {
    /// Backend-specific identifier of the series.
    pub id: String,
    /// Labels describing the series (unique keys).
    #[cfg_attr(feature = "serde", serde(default))]
    pub labels: BTreeMap<String, String>,
    /// Time-ordered samples.
    #[cfg_attr(feature = "serde", serde(default))]
    pub metrics: Vec<Metric>,
}

impl MetricSeries {
    /// Create an empty series with the given ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Create a builder for a series.
    pub fn builder(id: impl Into<String>) -> MetricSeriesBuilder {
        MetricSeriesBuilder::new(id)
    }

    /// Returns the most recent metric, if any.
    pub fn latest(&self) -> Option<&Metric> {
        self.metrics.last()
    }

    /// Keep only the most recent metric.
    pub fn truncate_to_latest(&mut self) {
        if self.metrics.len() > 1 {
            let keep_from = self.metrics.len() - 1;
            self.metrics.drain(..keep_from);
        }
    }
}

/// Builder for `MetricSeries`.
#[derive(Debug, Default)]
pub struct MetricSeriesBuilder {
    id: String,
    labels: BTreeMap<String, String>,
    metrics: Vec<Metric>,
}

impl MetricSeriesBuilder {
    /// Create a new builder.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Add a label.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Append a sample.
    pub fn metric(mut self, ts: DateTime<Utc>, value: f64) -> Self {
        self.metrics.push(Metric::new(value, ts));
        self
    }

    /// Append several samples.
    pub fn metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    /// Build the series.
    pub fn build(self) -> MetricSeries {
        MetricSeries {
            id: self.id,
            labels: self.labels,
            metrics: self.metrics,
        }
    }
}
