//! The rendering interface the sync loop drives.
//!
//! A [`Renderer`] turns the grid into on-screen panels and hands back one
//! view handle per widget. Widget syncers only talk to these handles, so any
//! output target (the terminal UI, a test recorder) can sit behind them.

use std::sync::Arc;

use anyhow::Result;
use gridwatch_types::Widget;

use crate::grid::Grid;

/// Loads a dashboard into some output target.
pub trait Renderer: Send + Sync {
    /// Create one panel per grid widget, in row order.
    fn load_dashboard(&self, grid: &Grid) -> Result<Vec<RenderWidget>>;
}

/// A gauge panel.
pub trait GaugeView: Send + Sync {
    fn widget_cfg(&self) -> &Widget;
    fn sync(&self, is_percent: bool, value: f64) -> Result<()>;
    fn set_color(&self, hex_color: &str) -> Result<()>;
}

/// A panel displaying a single line of text.
pub trait SinglestatView: Send + Sync {
    fn widget_cfg(&self) -> &Widget;
    fn sync(&self, text: &str) -> Result<()>;
    fn set_color(&self, hex_color: &str) -> Result<()>;
}

/// A line graph panel.
pub trait GraphView: Send + Sync {
    fn widget_cfg(&self) -> &Widget;
    /// Number of points the graph can draw horizontally.
    fn graph_point_quantity(&self) -> usize;
    fn sync(&self, series: Vec<RenderSeries>) -> Result<()>;
}

/// A view handle returned by [`Renderer::load_dashboard`].
#[derive(Clone)]
pub enum RenderWidget {
    Gauge(Arc<dyn GaugeView>),
    Singlestat(Arc<dyn SinglestatView>),
    Graph(Arc<dyn GraphView>),
}

impl RenderWidget {
    pub fn widget_cfg(&self) -> &Widget {
        match self {
            RenderWidget::Gauge(v) => v.widget_cfg(),
            RenderWidget::Singlestat(v) => v.widget_cfg(),
            RenderWidget::Graph(v) => v.widget_cfg(),
        }
    }
}

impl std::fmt::Debug for RenderWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            RenderWidget::Gauge(_) => "Gauge",
            RenderWidget::Singlestat(_) => "Singlestat",
            RenderWidget::Graph(_) => "Graph",
        };
        f.debug_tuple(kind).field(&self.widget_cfg().title).finish()
    }
}

/// One line of a graph, already rebucketed onto the graph index.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSeries {
    pub label: String,
    pub color: String,
    pub x_labels: Vec<String>,
    pub values: Vec<Option<f64>>,
}
