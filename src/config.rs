//! Configuration loading: dashboard files, user datasource files and the
//! application settings.
//!
//! Dashboard and datasource files are versioned JSON, or YAML when the file
//! ends in `.yaml`/`.yml`:
//!
//! ```json
//! {
//!   "version": "v1",
//!   "datasources": { "prom": { "prometheus": { "address": "http://127.0.0.1:9090" } } },
//!   "dashboard": { "grid": { "maxWidth": 100 }, "variables": {}, "widgets": [] }
//! }
//! ```
//!
//! Application settings come from an optional `settings.toml` and
//! `GRIDWATCH_*` environment variables, through the `config` crate. Command
//! line flags take precedence over both.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use gridwatch_types::{
    Dashboard, Datasource, DatasourceKind, Query, SchemaVersion, Threshold, VariableKind,
    WidgetKind,
};

/// Prefix of the environment variables read into [`Settings`].
pub const ENV_PREFIX: &str = "GRIDWATCH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error unmarshalling json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("error unmarshalling yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0:?} is not a valid configuration version")]
    Version(String),
    #[error("error validating the loaded configuration: {0}")]
    Invalid(String),
    #[error("error loading settings: {0}")]
    Settings(#[from] config::ConfigError),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

#[derive(Deserialize)]
struct RawConfiguration {
    #[serde(default)]
    version: String,
    #[serde(default)]
    datasources: BTreeMap<String, DatasourceKind>,
    #[serde(default)]
    dashboard: Dashboard,
}

/// A loaded and validated dashboard file.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub version: SchemaVersion,
    pub datasources: Vec<Datasource>,
    pub dashboard: Dashboard,
}

impl Configuration {
    /// Read and validate the file at `path`. The format follows the file
    /// extension, JSON unless it is `yaml` or `yml`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        if yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Self::from_raw(serde_json::from_str(content)?)
    }

    /// Parse and validate a YAML configuration document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Self::from_raw(serde_yaml::from_str(content)?)
    }

    fn from_raw(raw: RawConfiguration) -> Result<Self, ConfigError> {

        let version = SchemaVersion::parse(&raw.version)
            .filter(SchemaVersion::is_compatible)
            .ok_or_else(|| ConfigError::Version(raw.version.clone()))?;

        let datasources = raw
            .datasources
            .into_iter()
            .map(|(id, kind)| Datasource::new(id, kind))
            .collect();

        let mut cfg = Self {
            version,
            datasources,
            dashboard: raw.dashboard,
        };
        if cfg.dashboard.grid.max_width == 0 {
            cfg.dashboard.grid.max_width = 100;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for ds in &self.datasources {
            validate_datasource(ds)?;
        }
        validate_dashboard(&self.dashboard)
    }
}

/// Load the datasources of a user datasource file. A missing file is not an
/// error: there are just no user datasources.
pub fn load_user_datasources(path: &Path) -> Result<Vec<Datasource>, ConfigError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "user datasources file not found, ignoring");
        return Ok(Vec::new());
    }
    Ok(Configuration::load(path)?.datasources)
}

fn validate_datasource(ds: &Datasource) -> Result<(), ConfigError> {
    if ds.id.is_empty() {
        return Err(invalid("datasource ID can't be empty"));
    }
    let address = match &ds.kind {
        DatasourceKind::Fake(_) => return Ok(()),
        DatasourceKind::Prometheus(p) => &p.address,
        DatasourceKind::Graphite(g) => &g.address,
        DatasourceKind::InfluxDb(i) => &i.address,
    };
    if address.is_empty() {
        return Err(invalid(format!(
            "{} datasource {} needs an address",
            ds.kind.name(),
            ds.id
        )));
    }
    Ok(())
}

fn validate_dashboard(dashboard: &Dashboard) -> Result<(), ConfigError> {
    for (name, kind) in &dashboard.variables {
        if name.is_empty() {
            return Err(invalid("variables should have a name"));
        }
        match kind {
            VariableKind::Constant(c) if c.value.is_empty() => {
                return Err(invalid(format!("constant variable {name} needs a value")));
            }
            VariableKind::Interval(i) if i.steps == 0 => {
                return Err(invalid(format!("interval variable {name} needs steps > 0")));
            }
            _ => {}
        }
    }

    for widget in &dashboard.widgets {
        let title = &widget.title;
        if widget.grid_pos.w == 0 {
            return Err(invalid(format!("widget {title:?} needs a width")));
        }
        if dashboard.grid.fixed_widgets && (widget.grid_pos.x.is_none() || widget.grid_pos.y.is_none()) {
            return Err(invalid(format!(
                "widget {title:?} needs x and y positions on a fixed grid"
            )));
        }

        match &widget.kind {
            WidgetKind::Gauge(g) => {
                validate_query(title, &g.query)?;
                if g.percent_value && g.max <= g.min {
                    return Err(invalid(format!(
                        "gauge {title:?} max value should be greater than min value"
                    )));
                }
                validate_thresholds(title, &g.thresholds)?;
            }
            WidgetKind::Singlestat(s) => {
                validate_query(title, &s.query)?;
                validate_thresholds(title, &s.thresholds)?;
            }
            WidgetKind::Graph(g) => {
                if g.queries.is_empty() {
                    return Err(invalid(format!("graph {title:?} needs at least one query")));
                }
                for q in &g.queries {
                    validate_query(title, q)?;
                }
                let mut regexes = HashSet::new();
                for o in &g.visualization.series_override {
                    if o.regex.is_empty() {
                        return Err(invalid(format!(
                            "graph {title:?} series override needs a regex"
                        )));
                    }
                    Regex::new(&o.regex).map_err(|e| {
                        invalid(format!("graph {title:?} series override regex: {e}"))
                    })?;
                    if !regexes.insert(o.regex.as_str()) {
                        return Err(invalid(format!(
                            "graph {title:?} has more than one series override for {:?}",
                            o.regex
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_query(title: &str, query: &Query) -> Result<(), ConfigError> {
    if query.expr.is_empty() {
        return Err(invalid(format!("widget {title:?} query needs an expression")));
    }
    if query.datasource_id.is_empty() {
        return Err(invalid(format!("widget {title:?} query needs a datasource ID")));
    }
    Ok(())
}

fn validate_thresholds(title: &str, thresholds: &[Threshold]) -> Result<(), ConfigError> {
    let mut seen: Vec<f64> = Vec::with_capacity(thresholds.len());
    for t in thresholds {
        if seen.contains(&t.start_value) {
            return Err(invalid(format!(
                "widget {title:?} has more than one threshold starting at {}",
                t.start_value
            )));
        }
        seen.push(t.start_value);
    }
    Ok(())
}

/// Defaults for the command line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub refresh_interval: Option<String>,
    pub relative_duration: Option<String>,
    pub log_path: Option<PathBuf>,
    pub user_datasources: Option<PathBuf>,
}

impl Settings {
    /// Load the settings file at `path` (if given and present) overlaid with
    /// the `GRIDWATCH_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// `$XDG_CONFIG_HOME/gridwatch/settings.toml`, falling back to
    /// `$HOME/.config`.
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|h| h.join(".config")))?;
        Some(base.join("gridwatch").join("settings.toml"))
    }
}

/// `$HOME/gridwatch/datasources.json`.
pub fn default_user_datasources_path() -> Option<PathBuf> {
    home_dir().map(|h| h.join("gridwatch").join("datasources.json"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
