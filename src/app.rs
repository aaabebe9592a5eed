//! The sync scheduler: loads the dashboard into the renderer and refreshes
//! every widget on a fixed tick.
//!
//! ```text
//!  run() ──▶ variablers ──▶ Grid ──▶ renderer.load_dashboard()
//!                                          │
//!                         WidgetSyncer + WidgetDataMiddleware per handle
//!                                          │
//!   tick (immediately, then every refresh_interval)
//!     └─▶ SyncRequest { window, __start/__end } ──▶ tokio::spawn per widget
//! ```
//!
//! Widgets sync independently. A slow widget never delays the others, and
//! a widget still busy from the previous tick skips the new one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use gridwatch_types::Dashboard;

use crate::controller::Controller;
use crate::data::duration::format_duration;
use crate::data::{Palette, TemplateData};
use crate::grid::{Grid, LayoutError};
use crate::render::Renderer;
use crate::variable::{self, Scope, Variabler};
use crate::widget::{SyncRequest, WidgetDataMiddleware, WidgetSyncer};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_RELATIVE_DURATION: Duration = Duration::from_secs(3_600);

/// Global options of a dashboard run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub refresh_interval: Duration,
    /// Fixed window start; relative to the end when unset.
    pub start: Option<DateTime<Utc>>,
    /// Fixed window end; now when unset.
    pub end: Option<DateTime<Utc>>,
    pub relative_duration: Duration,
    /// Variables set by the user. They win over every other variable.
    pub override_vars: BTreeMap<String, String>,
    /// Default series colors of the graphs.
    pub palette: Palette,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            start: None,
            end: None,
            relative_duration: DEFAULT_RELATIVE_DURATION,
            override_vars: BTreeMap::new(),
            palette: Palette::default(),
        }
    }
}

impl AppConfig {
    /// Replace zero durations with the defaults.
    fn with_defaults(mut self) -> Self {
        if self.refresh_interval.is_zero() {
            self.refresh_interval = DEFAULT_REFRESH_INTERVAL;
        }
        if self.relative_duration.is_zero() {
            self.relative_duration = DEFAULT_RELATIVE_DURATION;
        }
        self
    }

    /// The window of a tick happening at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.end.unwrap_or(now);
        let relative = chrono::Duration::from_std(self.relative_duration)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let start = self.start.unwrap_or(end - relative);
        (start, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    NotStarted,
    Active,
    Stopped,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("already running")]
    AlreadyRunning,
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("error loading dashboard in the renderer: {0:#}")]
    Render(anyhow::Error),
    #[error("error creating widget: {0:#}")]
    Widget(anyhow::Error),
}

/// Runs a dashboard. An app runs once.
pub struct App {
    cfg: AppConfig,
    controller: Controller,
    renderer: Arc<dyn Renderer>,
    state: Mutex<AppState>,
}

impl App {
    pub fn new(cfg: AppConfig, controller: Controller, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            cfg: cfg.with_defaults(),
            controller,
            renderer,
            state: Mutex::new(AppState::NotStarted),
        }
    }

    pub fn state(&self) -> AppState {
        *self.state.lock()
    }

    /// Load `dashboard` and sync it until `shutdown` turns true or its
    /// sender is dropped.
    pub async fn run(
        &self,
        dashboard: &Dashboard,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), AppError> {
        {
            let mut state = self.state.lock();
            if *state != AppState::NotStarted {
                return Err(AppError::AlreadyRunning);
            }
            *state = AppState::Active;
        }

        let result = self.run_active(dashboard, shutdown).await;
        *self.state.lock() = AppState::Stopped;
        result
    }

    async fn run_active(
        &self,
        dashboard: &Dashboard,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), AppError> {
        let variablers = variable::variablers(dashboard, self.cfg.relative_duration);

        let grid = Grid::new(&dashboard.grid, &dashboard.widgets)?;
        let handles = self
            .renderer
            .load_dashboard(&grid)
            .map_err(AppError::Render)?;

        let static_data = self.dashboard_data(&variablers);
        let override_data: TemplateData = self.cfg.override_vars.iter().collect();
        let widgets = handles
            .into_iter()
            .map(|handle| {
                let syncer =
                    WidgetSyncer::new(self.controller.clone(), handle, self.cfg.palette.clone())
                        .map_err(AppError::Widget)?;
                Ok(WidgetDataMiddleware::wrap(
                    static_data.clone(),
                    override_data.clone(),
                    syncer,
                ))
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        tracing::info!(
            widgets = widgets.len(),
            rows = grid.rows.len(),
            refresh = %format_duration(self.cfg.refresh_interval),
            "dashboard loaded"
        );

        // The first tick completes immediately.
        let mut ticker = tokio::time::interval(self.cfg.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => self.sync_widgets(&widgets, &variablers),
            }
        }

        tracing::debug!("sync loop stopped");
        Ok(())
    }

    fn sync_widgets(&self, widgets: &[Arc<WidgetDataMiddleware>], variablers: &[Variabler]) {
        let req = Arc::new(self.sync_request(Utc::now(), variablers));
        for widget in widgets {
            let widget = Arc::clone(widget);
            let req = Arc::clone(&req);
            tokio::spawn(async move {
                if let Err(e) = widget.sync(&req).await {
                    tracing::error!(widget = %widget.title(), "error syncing widget: {e:#}");
                }
            });
        }
    }

    fn sync_request(&self, now: DateTime<Utc>, variablers: &[Variabler]) -> SyncRequest {
        let (start, end) = self.cfg.window(now);
        let data = variable::scope_data(variablers, Scope::Sync)
            .set("__start", start.to_rfc3339())
            .set("__end", end.to_rfc3339());
        SyncRequest { start, end, data }
    }

    fn dashboard_data(&self, variablers: &[Variabler]) -> TemplateData {
        TemplateData::new()
            .set("__range", format_duration(self.cfg.relative_duration))
            .set("__refreshInterval", format_duration(self.cfg.refresh_interval))
            .with(&variable::scope_data(variablers, Scope::Dashboard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gridwatch_types::{
        ConstantVariable, GaugeSource, GridConfig, GridPos, MetricSeries, Query, VariableKind,
        Widget, WidgetKind,
    };

    use crate::render::RenderWidget;
    use crate::widget::testing::{RecordingGatherer, RecordingView};

    struct RecordingRenderer {
        views: Mutex<Vec<Arc<RecordingView>>>,
    }

    impl Renderer for RecordingRenderer {
        fn load_dashboard(&self, grid: &Grid) -> anyhow::Result<Vec<RenderWidget>> {
            let mut views = self.views.lock();
            Ok(grid
                .widgets()
                .map(|w| {
                    let view = Arc::new(RecordingView::new(w.clone()));
                    views.push(view.clone());
                    RenderWidget::Gauge(view)
                })
                .collect())
        }
    }

    fn dashboard() -> Dashboard {
        let mut dashboard = Dashboard {
            grid: GridConfig::default(),
            widgets: vec![Widget::new(
                "g",
                GridPos::width(50),
                WidgetKind::Gauge(GaugeSource {
                    query: Query::new("{{ .__range }} {{ .env }} {{ .region }}", "ds"),
                    ..Default::default()
                }),
            )],
            ..Default::default()
        };
        for (name, value) in [("env", "dev"), ("region", "eu")] {
            dashboard.variables.insert(
                name.into(),
                VariableKind::Constant(ConstantVariable {
                    value: value.into(),
                }),
            );
        }
        dashboard
    }

    fn app(gatherer: Arc<RecordingGatherer>) -> (Arc<App>, Arc<RecordingRenderer>) {
        let renderer = Arc::new(RecordingRenderer {
            views: Mutex::new(Vec::new()),
        });
        let cfg = AppConfig {
            refresh_interval: Duration::from_secs(3_600),
            override_vars: BTreeMap::from([("env".to_string(), "prod".to_string())]),
            ..Default::default()
        };
        let app = Arc::new(App::new(cfg, Controller::new(gatherer), renderer.clone()));
        (app, renderer)
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_first_tick_is_immediate() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let gatherer = Arc::new(RecordingGatherer::returning(vec![MetricSeries::builder("s")
            .metric(t0, 7.0)
            .build()]));
        let (app, renderer) = app(gatherer.clone());
        let (tx, rx) = watch::channel(false);

        let runner = {
            let app = app.clone();
            tokio::spawn(async move { app.run(&dashboard(), rx).await })
        };

        wait_for(|| gatherer.calls() == 1).await;
        assert_eq!(app.state(), AppState::Active);
        // Override > dashboard variables; __range comes from the static data.
        assert_eq!(*gatherer.exprs.lock(), vec!["1h prod eu"]);
        let view = renderer.views.lock()[0].clone();
        wait_for(|| !view.gauge.lock().is_empty()).await;

        tx.send(true).unwrap();
        runner.await.unwrap().unwrap();
        assert_eq!(app.state(), AppState::Stopped);
    }

    #[tokio::test]
    async fn test_already_running() {
        let (app, _) = app(Arc::new(RecordingGatherer::default()));
        let (tx, rx) = watch::channel(false);

        let runner = {
            let app = app.clone();
            tokio::spawn(async move { app.run(&dashboard(), rx).await })
        };
        wait_for(|| app.state() == AppState::Active).await;

        let second = app.run(&dashboard(), tx.subscribe()).await;
        assert!(matches!(second, Err(AppError::AlreadyRunning)));

        drop(tx);
        runner.await.unwrap().unwrap();
        let third = app.run(&dashboard(), watch::channel(false).1).await;
        assert!(matches!(third, Err(AppError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_layout_error_is_fatal() {
        let (app, _) = app(Arc::new(RecordingGatherer::default()));
        let mut dashboard = dashboard();
        dashboard.grid.max_width = 0;
        let res = app.run(&dashboard, watch::channel(false).1).await;
        assert!(matches!(res, Err(AppError::Layout(LayoutError::ZeroMaxWidth))));
    }

    #[test]
    fn test_window() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let relative = AppConfig::default();
        assert_eq!(
            relative.window(now),
            (now - chrono::Duration::hours(1), now)
        );

        let start = now - chrono::Duration::days(1);
        let fixed = AppConfig {
            start: Some(start),
            end: Some(now - chrono::Duration::hours(2)),
            ..Default::default()
        };
        assert_eq!(
            fixed.window(now),
            (start, now - chrono::Duration::hours(2))
        );

        let only_end = AppConfig {
            end: Some(start),
            relative_duration: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(
            only_end.window(now),
            (start - chrono::Duration::minutes(1), start)
        );
    }

    #[test]
    fn test_sync_request_data() {
        let (app, _) = app(Arc::new(RecordingGatherer::default()));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let req = app.sync_request(now, &[]);
        assert_eq!(req.data.get("__end"), Some("2024-01-01T12:00:00+00:00"));
        assert_eq!(req.data.get("__start"), Some("2024-01-01T11:00:00+00:00"));

        let static_data = app.dashboard_data(&[]);
        assert_eq!(static_data.get("__range"), Some("1h"));
        assert_eq!(static_data.get("__refreshInterval"), Some("1h"));
    }
}
