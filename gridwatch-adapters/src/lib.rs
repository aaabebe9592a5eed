//! # gridwatch-adapters
//!
//! Metric gatherers for the backends gridwatch dashboards query, and the
//! router that sends each query to the gatherer of its datasource.
//!
//! ## Supported Backends
//!
//! - **Fake** (always available) - deterministic generated series
//! - **Prometheus** (`prometheus` feature) - HTTP query API, instant and range
//! - **Graphite** (`graphite` feature) - render API
//! - **InfluxDB** (`influxdb` feature) - 1.x HTTP query API
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use gridwatch_adapters::{DatasourceRouter, Gatherer};
//! use gridwatch_types::{Datasource, Query};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = DatasourceRouter::new(
//!         &[Datasource::prometheus("prom", "http://localhost:9090")],
//!         &[],
//!         &HashMap::new(),
//!     )?;
//!
//!     let series = router
//!         .gather_single(&Query::new("up", "prom"), chrono::Utc::now())
//!         .await?;
//!     println!("Gathered {} series", series.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fake;
mod gatherer;
pub mod middleware;
pub mod router;

#[cfg(feature = "prometheus")]
pub mod prometheus;

#[cfg(feature = "graphite")]
pub mod graphite;

#[cfg(feature = "influxdb")]
pub mod influxdb;

pub use error::AdapterError;
pub use fake::FakeGatherer;
pub use gatherer::Gatherer;
pub use middleware::GatherLogger;
pub use router::{DatasourceRouter, DefaultGathererFactory, GathererFactory};

// Re-export types for convenience
pub use gridwatch_types::{Datasource, DatasourceKind, Metric, MetricSeries, Query};
