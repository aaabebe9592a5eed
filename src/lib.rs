//! # gridwatch
//!
//! Terminal dashboards for time-series metrics.
//!
//! A dashboard file declares datasources (Prometheus, Graphite, InfluxDB or a
//! synthetic generator) and widgets (gauges, single values and line graphs)
//! placed on a percentage grid. On every refresh tick each widget renders its
//! query templates, fetches fresh data through the datasource router and
//! pushes the result to its terminal panel.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                              App (tick)                           │
//! │  variables ──▶ TemplateData ──▶ WidgetDataMiddleware ──▶ syncer   │
//! │                                                          │        │
//! │                 ┌───────────── Controller ◀──────────────┤        │
//! │                 ▼                                        ▼        │
//! │        DatasourceRouter ──▶ Gatherer        rebucket ──▶ View     │
//! │        (gridwatch-adapters)  (prom, graphite,   (graphs)  │       │
//! │                               influxdb, fake)             ▼       │
//! │                                                  ui::TuiRenderer   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`app`]**: the sync loop, one tick per refresh interval
//! - **[`widget`]**: gauge, singlestat and graph syncers with the
//!   template data middleware
//! - **[`controller`]**: checks the shape of the gathered metrics
//! - **[`data`]**: templates, rebucketing, colors, units and durations
//! - **[`grid`]**: percentage layout of the widgets
//! - **[`render`]**: the interface between syncers and panels
//! - **[`ui`]**: ratatui panels and theme
//! - **[`config`]**: dashboard files, user datasources and settings
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Run a dashboard with the last 6 hours of data
//! gridwatch --cfg dashboard.json --relative-duration 6h
//!
//! # Point the dashboard "prom" datasource to a local user datasource
//! gridwatch --cfg dashboard.json --ds-alias prom=local-prom
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use gridwatch::app::{App, AppConfig};
//! use gridwatch::config::Configuration;
//! use gridwatch::controller::Controller;
//! use gridwatch::ui::{Theme, TuiRenderer};
//! use gridwatch_adapters::DatasourceRouter;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cfg = Configuration::from_json(
//!     r#"{
//!         "version": "v1",
//!         "datasources": { "ds": { "fake": {} } },
//!         "dashboard": { "widgets": [{
//!             "title": "Load",
//!             "gridPos": { "w": 100 },
//!             "graph": { "queries": [{ "expr": "load", "datasourceID": "ds" }] }
//!         }] }
//!     }"#,
//! )?;
//! let router = DatasourceRouter::new(&cfg.datasources, &[], &HashMap::new())?;
//! let renderer = Arc::new(TuiRenderer::new(Theme::dark()));
//! let app = App::new(AppConfig::default(), Controller::new(Arc::new(router)), renderer);
//!
//! # tokio_test::block_on(async {
//! let (_stop, shutdown) = tokio::sync::watch::channel(false);
//! app.run(&cfg.dashboard, shutdown).await?;
//! # Ok::<_, anyhow::Error>(())
//! # })?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod controller;
pub mod data;
pub mod events;
pub mod grid;
pub mod render;
pub mod ui;
pub mod variable;
pub mod widget;

// Re-export main types for convenience
pub use app::{App, AppConfig, AppError};
pub use config::{Configuration, Settings};
pub use controller::Controller;
pub use grid::Grid;
pub use render::{RenderSeries, RenderWidget, Renderer};
