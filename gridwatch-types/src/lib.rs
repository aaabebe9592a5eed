//! # gridwatch-types
//!
//! Core domain types for gridwatch. This crate defines the dashboard model
//! (widgets, queries, thresholds, variables), the datasource declarations
//! queries are routed to, and the metric series gatherers return.
//!
//! ## Design Goals
//!
//! - **Minimal dependencies**: only `chrono` for timestamps
//! - **Optional serialization**: enable the `serde` feature to read dashboard files
//! - **Backend agnostic**: series look the same whatever datasource produced them
//! - **Versioned schema**: dashboard files declare the schema version they use
//!
//! ## Features
//!
//! - `serde`: JSON serialization of the dashboard model via serde
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use gridwatch_types::{GaugeSource, GridPos, MetricSeries, Query, Widget, WidgetKind};
//!
//! let widget = Widget::new(
//!     "Error rate",
//!     GridPos::width(25),
//!     WidgetKind::Gauge(GaugeSource {
//!         query: Query::new("sum(rate(errors[1m]))", "prometheus"),
//!         percent_value: true,
//!         max: 100.0,
//!         ..Default::default()
//!     }),
//! );
//! assert_eq!(widget.kind.name(), "gauge");
//!
//! let series = MetricSeries::builder("errors")
//!     .label("job", "api")
//!     .metric(Utc::now(), 4.2)
//!     .build();
//! assert_eq!(series.metrics.len(), 1);
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1** (`"version": "v1"` in dashboard files).

mod dashboard;
mod datasource;
mod metric;
mod version;

pub use dashboard::*;
pub use datasource::*;
pub use metric::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the dashboard format.
pub const SCHEMA_VERSION: u32 = 1;
