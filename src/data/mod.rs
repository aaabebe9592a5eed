//! Data processing shared by the widgets.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "10s", "1h30m") and the interval ladder
//! - [`template`]: Layered template data and `{{ .key }}` rendering
//! - [`rebucket`]: Projection of raw series onto the evenly spaced graph index
//! - [`color`]: Threshold colors and the default series palette
//! - [`unit`]: Unit formatting of single values
//!
//! ## Data Flow (graph widget)
//!
//! ```text
//! MetricSeries (raw, from the gatherer)
//!        │
//!        ▼
//! SyncWindow::index()  ──▶  rebucket()  ──▶  Vec<Option<f64>>
//!        │                      ▲
//!        ▼                      │
//!   x labels            SeriesOverrides::find(legend) -> NullPointMode
//! ```

pub mod color;
pub mod duration;
pub mod rebucket;
pub mod template;
pub mod unit;

pub use color::{ColorManager, Palette};
pub use rebucket::{rebucket, SeriesOverrides, SyncWindow};
pub use template::TemplateData;
