//! Widget syncers: the per-widget half of the refresh pipeline.
//!
//! Every render handle returned by the renderer is paired with a syncer of
//! the same kind. On each tick the scheduler calls [`WidgetDataMiddleware::sync`],
//! which layers the template data and forwards to the syncer:
//!
//! ```text
//! SyncRequest (window + sync data)
//!        │
//!        ▼
//! WidgetDataMiddleware   static ─with─▶ sync ─with─▶ override
//!        │
//!        ▼
//! WidgetSyncer::{Gauge, Singlestat, Graph}
//!        │  busy? ──▶ Ok(()) (skipped)
//!        ▼
//! Controller ──▶ view.sync(..)
//! ```

mod gauge;
mod graph;
mod singlestat;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use gridwatch_types::Threshold;

use crate::controller::Controller;
use crate::data::color::{sort_thresholds, threshold_color};
use crate::data::{Palette, TemplateData};
use crate::render::RenderWidget;

pub use gauge::GaugeSyncer;
pub use graph::GraphSyncer;
pub use singlestat::SinglestatSyncer;

/// What a widget needs to know about one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub data: TemplateData,
}

/// Busy flag guaranteeing at most one sync in flight per widget.
#[derive(Debug, Default)]
pub struct SyncFlag(AtomicBool);

impl SyncFlag {
    /// Mark the widget as syncing. Returns `None` if a sync is already in
    /// flight; the flag is released when the guard is dropped.
    pub fn try_acquire(&self) -> Option<SyncGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard(&self.0))
    }

    pub fn is_syncing(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Threshold coloring shared by gauges and singlestats. Remembers the last
/// applied color so the view is only touched when it changes.
#[derive(Debug, Default)]
struct ThresholdPainter {
    thresholds: Vec<Threshold>,
    current: Mutex<String>,
}

impl ThresholdPainter {
    fn new(mut thresholds: Vec<Threshold>) -> Self {
        sort_thresholds(&mut thresholds);
        Self {
            thresholds,
            current: Mutex::new(String::new()),
        }
    }

    fn paint<F>(&self, value: f64, set_color: F) -> Result<()>
    where
        F: FnOnce(&str) -> Result<()>,
    {
        let Some(color) = threshold_color(&self.thresholds, value) else {
            return Ok(());
        };

        let mut current = self.current.lock();
        if *current == color {
            return Ok(());
        }
        set_color(color).context("error setting color on view widget")?;
        *current = color.to_string();
        Ok(())
    }
}

/// A syncer for each kind of render widget.
#[derive(Debug)]
pub enum WidgetSyncer {
    Gauge(GaugeSyncer),
    Singlestat(SinglestatSyncer),
    Graph(GraphSyncer),
}

impl WidgetSyncer {
    /// Pair `widget` with the syncer of its kind. Graphs pick their series
    /// colors from `palette`.
    pub fn new(controller: Controller, widget: RenderWidget, palette: Palette) -> Result<Self> {
        let syncer = match widget {
            RenderWidget::Gauge(view) => WidgetSyncer::Gauge(GaugeSyncer::new(controller, view)?),
            RenderWidget::Singlestat(view) => {
                WidgetSyncer::Singlestat(SinglestatSyncer::new(controller, view)?)
            }
            RenderWidget::Graph(view) => {
                WidgetSyncer::Graph(GraphSyncer::new(controller, view, palette)?)
            }
        };
        Ok(syncer)
    }

    pub fn title(&self) -> &str {
        match self {
            WidgetSyncer::Gauge(w) => w.title(),
            WidgetSyncer::Singlestat(w) => w.title(),
            WidgetSyncer::Graph(w) => w.title(),
        }
    }

    /// Refresh the widget. Returns immediately when a previous sync of this
    /// widget is still running.
    pub async fn sync(&self, req: &SyncRequest) -> Result<()> {
        match self {
            WidgetSyncer::Gauge(w) => w.sync(req).await,
            WidgetSyncer::Singlestat(w) => w.sync(req).await,
            WidgetSyncer::Graph(w) => w.sync(req).await,
        }
    }
}

/// Injects the dashboard-level and user override template data into every
/// sync of the wrapped widget.
///
/// Priority, highest first: override data, sync data, static data.
#[derive(Debug)]
pub struct WidgetDataMiddleware {
    static_data: TemplateData,
    override_data: TemplateData,
    next: WidgetSyncer,
}

impl WidgetDataMiddleware {
    pub fn new(static_data: TemplateData, override_data: TemplateData, next: WidgetSyncer) -> Self {
        Self {
            static_data,
            override_data,
            next,
        }
    }

    pub fn wrap(
        static_data: TemplateData,
        override_data: TemplateData,
        next: WidgetSyncer,
    ) -> Arc<Self> {
        Arc::new(Self::new(static_data, override_data, next))
    }

    pub fn title(&self) -> &str {
        self.next.title()
    }

    pub async fn sync(&self, req: &SyncRequest) -> Result<()> {
        let data = self
            .static_data
            .with(&req.data)
            .with(&self.override_data);
        let req = SyncRequest {
            data,
            ..req.clone()
        };
        self.next.sync(&req).await
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use gridwatch_types::{GaugeSource, GridPos, MetricSeries, Query, Widget, WidgetKind};

    use super::testing::*;
    use super::*;

    #[test]
    fn test_sync_flag() {
        let flag = SyncFlag::default();
        let guard = flag.try_acquire();
        assert!(guard.is_some());
        assert!(flag.is_syncing());
        assert!(flag.try_acquire().is_none());
        drop(guard);
        assert!(!flag.is_syncing());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn test_threshold_painter_only_on_change() {
        let painter = ThresholdPainter::new(vec![
            Threshold::new(50.0, "red"),
            Threshold::new(0.0, "green"),
        ]);
        let mut applied = Vec::new();
        for value in [10.0, 20.0, 60.0, 70.0, 5.0] {
            painter
                .paint(value, |c| {
                    applied.push(c.to_string());
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(applied, vec!["green", "red", "green"]);

        let none = ThresholdPainter::new(vec![]);
        none.paint(1.0, |_| panic!("no thresholds, no color")).unwrap();
    }

    fn gauge_widget(expr: &str) -> Widget {
        Widget::new(
            "gauge",
            GridPos::width(10),
            WidgetKind::Gauge(GaugeSource {
                query: Query::new(expr, "ds"),
                ..Default::default()
            }),
        )
    }

    fn gauge_setup(
        expr: &str,
        delay: Duration,
    ) -> (Arc<RecordingGatherer>, Arc<RecordingView>, WidgetSyncer) {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let gatherer = Arc::new(RecordingGatherer {
            delay,
            ..RecordingGatherer::returning(vec![MetricSeries::builder("s")
                .metric(t0, 42.0)
                .build()])
        });
        let view = Arc::new(RecordingView::new(gauge_widget(expr)));
        let syncer = WidgetSyncer::new(
            Controller::new(gatherer.clone()),
            RenderWidget::Gauge(view.clone()),
            Palette::default(),
        )
        .unwrap();
        (gatherer, view, syncer)
    }

    #[tokio::test]
    async fn test_overlapping_syncs_hit_backend_once() {
        let (gatherer, view, syncer) = gauge_setup("up", Duration::from_millis(50));
        let now = Utc::now();
        let req = request(now - chrono::Duration::hours(1), now);

        let (a, b) = tokio::join!(syncer.sync(&req), syncer.sync(&req));
        a.unwrap();
        b.unwrap();
        assert_eq!(gatherer.calls(), 1);
        assert_eq!(view.gauge.lock().len(), 1);

        // The flag is released once the sync is done.
        syncer.sync(&req).await.unwrap();
        assert_eq!(gatherer.calls(), 2);
    }

    #[tokio::test]
    async fn test_data_middleware_priority() {
        let (gatherer, _view, syncer) =
            gauge_setup("{{ .a }}/{{ .b }}/{{ .c }}", Duration::ZERO);
        let middleware = WidgetDataMiddleware::new(
            TemplateData::from([("a", "static"), ("b", "static"), ("c", "static")]),
            TemplateData::from([("c", "override")]),
            syncer,
        );
        let now = Utc::now();
        let req = SyncRequest {
            data: TemplateData::from([("b", "sync"), ("c", "sync")]),
            ..request(now - chrono::Duration::hours(1), now)
        };

        middleware.sync(&req).await.unwrap();
        assert_eq!(*gatherer.exprs.lock(), vec!["static/sync/override"]);
        assert_eq!(middleware.title(), "gauge");
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_an_error() {
        let view = Arc::new(RecordingView::new(gauge_widget("up")));
        let res = WidgetSyncer::new(
            Controller::new(Arc::new(RecordingGatherer::default())),
            RenderWidget::Graph(view),
            Palette::default(),
        );
        assert!(res.is_err());
    }
}
