//! Datasource declarations.
//!
//! A datasource is where a query is sent. Dashboards declare the datasources
//! their queries reference; users can declare their own to override or alias
//! the dashboard ones.

/// A declared datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct Datasource {
    /// Unique identifier referenced by `Query::datasource_id`.
    pub id: String,
    /// Backend kind and its parameters.
    pub kind: DatasourceKind,
}

impl Datasource {
    /// Create a new datasource.
    pub fn new(id: impl Into<String>, kind: DatasourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Shorthand for a synthetic datasource.
    pub fn fake(id: impl Into<String>) -> Self {
        Self::new(id, DatasourceKind::Fake(FakeSource {}))
    }

    /// Shorthand for a Prometheus datasource.
    pub fn prometheus(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self::new(
            id,
            DatasourceKind::Prometheus(PrometheusSource {
                address: address.into(),
            }),
        )
    }
}

/// The backend of a datasource.
///
/// Serialized in the externally tagged form used by dashboard files:
/// `{"prometheus": {"address": "http://127.0.0.1:9090"}}`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DatasourceKind {
    /// Synthetic data generator.
    Fake(FakeSource),
    /// Prometheus HTTP API.
    Prometheus(PrometheusSource),
    /// Graphite render API.
    Graphite(GraphiteSource),
    /// InfluxDB 1.x query API.
    #[cfg_attr(feature = "serde", serde(rename = "influxdb"))]
    InfluxDb(InfluxDbSource),
}

impl DatasourceKind {
    /// Short name of the backend kind.
    pub fn name(&self) -> &'static str {
        match self {
            DatasourceKind::Fake(_) => "fake",
            DatasourceKind::Prometheus(_) => "prometheus",
            DatasourceKind::Graphite(_) => "graphite",
            DatasourceKind::InfluxDb(_) => "influxdb",
        }
    }
}

/// Parameters of the synthetic datasource (none).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FakeSource {}

/// Parameters of a Prometheus datasource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrometheusSource {
    /// Base address, e.g. `http://127.0.0.1:9090`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub address: String,
}

/// Parameters of a Graphite datasource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphiteSource {
    /// Base address of the Graphite web API.
    #[cfg_attr(feature = "serde", serde(default))]
    pub address: String,
}

/// Parameters of an InfluxDB datasource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InfluxDbSource {
    /// Base address of the InfluxDB HTTP API.
    #[cfg_attr(feature = "serde", serde(default))]
    pub address: String,
    /// Database queried.
    #[cfg_attr(feature = "serde", serde(default))]
    pub database: String,
}
