//! Dashboard model: widgets, queries, thresholds, variables and grid settings.
//!
//! ```text
//! Dashboard
//!  ├── grid       (adaptive or fixed, max width)
//!  ├── variables  name -> constant | interval
//!  └── widgets[]  title + gridPos + gauge | singlestat | graph
//!                                     │
//!                                     └── Query { expr, legend, datasourceID }
//! ```

use std::collections::BTreeMap;

/// A query sent to a datasource.
///
/// `expr` and `legend` may contain `{{ .name }}` placeholders that are
/// rendered against the template data of each sync.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Query {
    /// Backend-specific expression.
    #[cfg_attr(feature = "serde", serde(default))]
    pub expr: String,
    /// Legend template for the returned series. Empty means "use the series ID".
    #[cfg_attr(feature = "serde", serde(default))]
    pub legend: String,
    /// ID of the datasource the query is sent to.
    #[cfg_attr(feature = "serde", serde(default, rename = "datasourceID"))]
    pub datasource_id: String,
}

impl Query {
    /// Create a query without legend.
    pub fn new(expr: impl Into<String>, datasource_id: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            legend: String::new(),
            datasource_id: datasource_id.into(),
        }
    }

    /// Set the legend template.
    pub fn with_legend(mut self, legend: impl Into<String>) -> Self {
        self.legend = legend.into();
        self
    }
}

/// A color applied from `start_value` upwards.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Threshold {
    #[cfg_attr(feature = "serde", serde(default))]
    pub start_value: f64,
    pub color: String,
}

impl Threshold {
    pub fn new(start_value: f64, color: impl Into<String>) -> Self {
        Self {
            start_value,
            color: color.into(),
        }
    }
}

/// Position and width of a widget on the grid.
///
/// `x` and `y` are only meaningful on fixed grids; `w` is always required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridPos {
    #[cfg_attr(feature = "serde", serde(default))]
    pub x: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub y: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub w: u32,
}

impl GridPos {
    /// A position for adaptive grids (width only).
    pub fn width(w: u32) -> Self {
        Self {
            x: None,
            y: None,
            w,
        }
    }

    /// A position for fixed grids.
    pub fn at(x: u32, y: u32, w: u32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            w,
        }
    }
}

/// A widget declared on the dashboard.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Widget {
    #[cfg_attr(feature = "serde", serde(default))]
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub grid_pos: GridPos,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: WidgetKind,
}

impl Widget {
    pub fn new(title: impl Into<String>, grid_pos: GridPos, kind: WidgetKind) -> Self {
        Self {
            title: title.into(),
            grid_pos,
            kind,
        }
    }
}

/// The kind of a widget and its kind-specific settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WidgetKind {
    Gauge(GaugeSource),
    Singlestat(SinglestatSource),
    Graph(GraphSource),
}

impl WidgetKind {
    /// Short name of the widget kind.
    pub fn name(&self) -> &'static str {
        match self {
            WidgetKind::Gauge(_) => "gauge",
            WidgetKind::Singlestat(_) => "singlestat",
            WidgetKind::Graph(_) => "graph",
        }
    }
}

/// A gauge showing a single value, optionally as a percentage of `[min, max]`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct GaugeSource {
    pub query: Query,
    pub percent_value: bool,
    pub min: f64,
    pub max: f64,
    pub thresholds: Vec<Threshold>,
}

/// A single value rendered as text.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct SinglestatSource {
    pub query: Query,
    /// Unit used to format the value (`short`, `bytes`, `s`...).
    pub unit: String,
    /// Decimals of the formatted value.
    pub decimals: i32,
    /// Template of the displayed text; the value is available as `value`.
    pub value_text: String,
    pub thresholds: Vec<Threshold>,
}

/// A line graph of one or more range queries.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct GraphSource {
    pub queries: Vec<Query>,
    pub visualization: GraphVisualization,
}

/// Visual settings of a graph.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct GraphVisualization {
    pub legend: Legend,
    pub series_override: Vec<SeriesOverride>,
    pub y_axis: YAxis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Legend {
    pub disable: bool,
    pub right_side: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct YAxis {
    pub unit: String,
    pub decimals: i32,
}

/// Per-series visual override selected by matching `regex` against the
/// rendered legend. The first matching override wins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SeriesOverride {
    pub regex: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub color: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub null_point_mode: NullPointMode,
}

/// How empty slots of a graph are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NullPointMode {
    /// Leave the slot without value.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "null"))]
    AsNull,
    /// Set the slot to zero.
    #[cfg_attr(feature = "serde", serde(rename = "zero"))]
    AsZero,
    /// Copy the next observed value backwards into the slot.
    #[cfg_attr(feature = "serde", serde(rename = "connected"))]
    Connected,
}

/// A dashboard variable available to every templated string.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VariableKind {
    /// A fixed value.
    Constant(ConstantVariable),
    /// An interval derived from the dashboard time range.
    Interval(IntervalVariable),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstantVariable {
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalVariable {
    /// Desired number of steps across the time range; 0 selects the default.
    #[cfg_attr(feature = "serde", serde(default))]
    pub steps: u32,
}

/// Grid placement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct GridConfig {
    /// Place widgets at their declared `x`/`y` instead of wrapping them.
    pub fixed_widgets: bool,
    /// Width units a full row spans.
    pub max_width: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            fixed_widgets: false,
            max_width: 100,
        }
    }
}

/// A dashboard: grid settings, variables and widgets.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Dashboard {
    pub grid: GridConfig,
    pub variables: BTreeMap<String, VariableKind>,
    pub widgets: Vec<Widget>,
}

impl Dashboard {
    /// Variables as a list ordered by name.
    pub fn variable_list(&self) -> Vec<Variable> {
        self.variables
            .iter()
            .map(|(name, kind)| Variable {
                name: name.clone(),
                kind: kind.clone(),
            })
            .collect()
    }
}
