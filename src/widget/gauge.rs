use std::sync::Arc;

use anyhow::{bail, Context, Result};

use gridwatch_types::{GaugeSource, WidgetKind};

use super::{SyncFlag, SyncRequest, ThresholdPainter};
use crate::controller::Controller;
use crate::render::GaugeView;

/// Syncs a gauge with the instant value of its query.
pub struct GaugeSyncer {
    controller: Controller,
    view: Arc<dyn GaugeView>,
    source: GaugeSource,
    painter: ThresholdPainter,
    flag: SyncFlag,
}

impl GaugeSyncer {
    pub fn new(controller: Controller, view: Arc<dyn GaugeView>) -> Result<Self> {
        let cfg = view.widget_cfg();
        let WidgetKind::Gauge(source) = &cfg.kind else {
            bail!("widget {:?} is a {}, not a gauge", cfg.title, cfg.kind.name());
        };
        let source = source.clone();
        let painter = ThresholdPainter::new(source.thresholds.clone());

        Ok(Self {
            controller,
            view,
            source,
            painter,
            flag: SyncFlag::default(),
        })
    }

    pub fn title(&self) -> &str {
        &self.view.widget_cfg().title
    }

    pub async fn sync(&self, req: &SyncRequest) -> Result<()> {
        let Some(_syncing) = self.flag.try_acquire() else {
            return Ok(());
        };

        let mut query = self.source.query.clone();
        query.expr = req
            .data
            .render(&query.expr)
            .context("error rendering query")?;
        let metric = self
            .controller
            .single_instant_metric(&query)
            .await
            .context("error getting single instant metric")?;

        let value = if self.source.percent_value {
            percent_value(metric.value, self.source.min, self.source.max)
        } else {
            metric.value
        };

        self.painter
            .paint(value, |color| self.view.set_color(color))?;
        self.view
            .sync(self.source.percent_value, value)
            .context("error setting value on render view widget")
    }
}

impl std::fmt::Debug for GaugeSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeSyncer")
            .field("title", &self.title())
            .field("syncing", &self.flag.is_syncing())
            .finish_non_exhaustive()
    }
}

/// Map `value` from `[min, max]` to `[0, 100]`. Without a max the value is
/// taken as a percentage already. The result is clamped.
fn percent_value(value: f64, min: f64, max: f64) -> f64 {
    let value = if max != 0.0 {
        (value - min) / (max - min) * 100.0
    } else {
        value
    };
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::testing::*;
    use chrono::{TimeZone, Utc};
    use gridwatch_types::{GridPos, MetricSeries, Query, Threshold, Widget};

    #[test]
    fn test_percent_value() {
        assert_eq!(percent_value(50.0, 0.0, 200.0), 25.0);
        assert_eq!(percent_value(15.0, 10.0, 20.0), 50.0);
        assert_eq!(percent_value(42.0, 0.0, 0.0), 42.0);
        assert_eq!(percent_value(500.0, 0.0, 200.0), 100.0);
        assert_eq!(percent_value(-3.0, 0.0, 0.0), 0.0);
    }

    #[tokio::test]
    async fn test_gauge_sync() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let gatherer = Arc::new(RecordingGatherer::returning(vec![MetricSeries::builder(
            "s",
        )
        .metric(t0, 150.0)
        .build()]));
        let view = Arc::new(RecordingView::new(Widget::new(
            "disk",
            GridPos::width(20),
            WidgetKind::Gauge(GaugeSource {
                query: Query::new("disk{env=\"{{ .env }}\"}", "ds"),
                percent_value: true,
                min: 100.0,
                max: 200.0,
                thresholds: vec![Threshold::new(80.0, "#ff0000"), Threshold::new(0.0, "#00ff00")],
            }),
        )));
        let syncer = GaugeSyncer::new(Controller::new(gatherer.clone()), view.clone()).unwrap();

        let mut req = request(t0 - chrono::Duration::hours(1), t0);
        req.data = req.data.set("env", "prod");
        syncer.sync(&req).await.unwrap();
        syncer.sync(&req).await.unwrap();

        assert_eq!(*gatherer.exprs.lock(), vec!["disk{env=\"prod\"}"; 2]);
        assert_eq!(*view.gauge.lock(), vec![(true, 50.0), (true, 50.0)]);
        // Same color on both syncs, set once.
        assert_eq!(*view.colors.lock(), vec!["#00ff00"]);
    }
}
