use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use gridwatch_types::{GraphSource, MetricSeries, Query, WidgetKind};

use super::{SyncFlag, SyncRequest};
use crate::controller::Controller;
use crate::data::{rebucket, ColorManager, Palette, SeriesOverrides, SyncWindow, TemplateData};
use crate::render::{GraphView, RenderSeries};

/// Attempts at reading the graph capacity before giving up for this tick.
const CAPACITY_RETRIES: usize = 5;
const CAPACITY_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Syncs a graph with the range values of its queries.
pub struct GraphSyncer {
    controller: Controller,
    view: Arc<dyn GraphView>,
    source: GraphSource,
    overrides: SeriesOverrides,
    palette: Palette,
    flag: SyncFlag,
}

impl GraphSyncer {
    pub fn new(controller: Controller, view: Arc<dyn GraphView>, palette: Palette) -> Result<Self> {
        let cfg = view.widget_cfg();
        let WidgetKind::Graph(source) = &cfg.kind else {
            bail!("widget {:?} is a {}, not a graph", cfg.title, cfg.kind.name());
        };
        let source = source.clone();
        let overrides = SeriesOverrides::compile(&source.visualization.series_override)?;

        Ok(Self {
            controller,
            view,
            source,
            overrides,
            palette,
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

        // A graph that has not been drawn yet has no capacity: skip the tick.
        let capacity = self.window_capacity().await;
        if capacity == 0 {
            return Ok(());
        }
        let Some(window) = SyncWindow::new(req.start, req.end, capacity) else {
            bail!(
                "invalid sync window {} - {} for {capacity} points",
                req.start,
                req.end
            );
        };

        let mut all = Vec::new();
        for query in &self.source.queries {
            let mut templated = query.clone();
            templated.expr = req
                .data
                .render(&query.expr)
                .context("error rendering query")?;
            let series = self
                .controller
                .range_metrics(&templated, window.start, window.end, window.step)
                .await
                .with_context(|| format!("error getting range metrics of {:?}", templated.expr))?;
            all.extend(series.into_iter().map(|s| (query, s)));
        }
        all.sort_by(|(_, a), (_, b)| a.id.cmp(&b.id));

        let series = self.to_renderable(&req.data, &window, &all)?;
        self.view
            .sync(series)
            .context("error setting series on render view widget")
    }

    /// The graph capacity, retried a few times since views only know their
    /// size after the first draw.
    async fn window_capacity(&self) -> usize {
        for attempt in 0..CAPACITY_RETRIES {
            let capacity = self.view.graph_point_quantity();
            if capacity > 0 {
                return capacity;
            }
            if attempt + 1 < CAPACITY_RETRIES {
                tokio::time::sleep(CAPACITY_RETRY_DELAY).await;
            }
        }
        0
    }

    fn to_renderable(
        &self,
        data: &TemplateData,
        window: &SyncWindow,
        all: &[(&Query, MetricSeries)],
    ) -> Result<Vec<RenderSeries>> {
        let index = window.index();
        let x_labels = window.x_labels(&index);
        let mut colors = ColorManager::new(self.palette.clone());

        all.iter()
            .map(|(query, series)| {
                let legend = if query.legend.is_empty() {
                    series.id.clone()
                } else {
                    let labels: TemplateData = series.labels.iter().collect();
                    data.with(&labels)
                        .render(&query.legend)
                        .context("error rendering legend")?
                };

                let series_override = self.overrides.find(&legend);
                let mode = series_override
                    .map(|o| o.null_point_mode)
                    .unwrap_or_default();
                let color = colors.color_for(series_override.and_then(|o| o.color.as_deref()));

                Ok(RenderSeries {
                    values: rebucket(&series.metrics, &index, mode),
                    label: legend,
                    color,
                    x_labels: x_labels.clone(),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for GraphSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSyncer")
            .field("title", &self.title())
            .field("queries", &self.source.queries.len())
            .field("syncing", &self.flag.is_syncing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::testing::*;
    use chrono::{DateTime, TimeZone, Utc};
    use gridwatch_types::{GraphVisualization, GridPos, NullPointMode, SeriesOverride, Widget};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn at(minutes: i64, value: f64) -> (DateTime<Utc>, f64) {
        (t0() + chrono::Duration::minutes(minutes), value)
    }

    fn series(id: &str, points: &[(DateTime<Utc>, f64)]) -> MetricSeries {
        points
            .iter()
            .fold(MetricSeries::builder(id).label("job", id), |b, (ts, v)| {
                b.metric(*ts, *v)
            })
            .build()
    }

    fn graph(queries: Vec<Query>, overrides: Vec<SeriesOverride>) -> Widget {
        Widget::new(
            "graph",
            GridPos::width(100),
            WidgetKind::Graph(GraphSource {
                queries,
                visualization: GraphVisualization {
                    series_override: overrides,
                    ..Default::default()
                },
            }),
        )
    }

    #[tokio::test]
    async fn test_graph_sync() {
        let gatherer = Arc::new(RecordingGatherer::returning(vec![
            series("b", &[at(0, 1.0), at(4, 3.0)]),
            series("a", &[at(2, 5.0)]),
        ]));
        let widget = graph(
            vec![Query::new("rate({{ .env }})", "ds").with_legend("{{ .job }}-{{ .env }}")],
            vec![SeriesOverride {
                regex: "^b-".into(),
                color: Some("#123456".into()),
                null_point_mode: NullPointMode::AsZero,
            }],
        );
        let view = Arc::new(RecordingView::new(widget).with_capacity(5));
        let syncer = GraphSyncer::new(
            Controller::new(gatherer.clone()),
            view.clone(),
            Palette::new(["#aaaaaa", "#bbbbbb"]),
        )
        .unwrap();

        let mut req = request(t0(), t0() + chrono::Duration::minutes(5));
        req.data = req.data.set("env", "prod");
        syncer.sync(&req).await.unwrap();

        assert_eq!(*gatherer.exprs.lock(), vec!["rate(prod)"]);
        let synced = view.series.lock();
        let rendered = &synced[0];
        assert_eq!(rendered.len(), 2);

        // Sorted by series ID.
        assert_eq!(rendered[0].label, "a-prod");
        assert_eq!(rendered[0].color, "#aaaaaa");
        assert_eq!(rendered[0].values, vec![None, Some(5.0), None, None, None]);
        assert_eq!(rendered[0].x_labels.len(), 5);

        assert_eq!(rendered[1].label, "b-prod");
        assert_eq!(rendered[1].color, "#123456");
        assert_eq!(
            rendered[1].values,
            vec![Some(1.0), Some(0.0), Some(0.0), Some(3.0), None]
        );
    }

    #[tokio::test]
    async fn test_legend_defaults_to_series_id() {
        let gatherer = Arc::new(RecordingGatherer::returning(vec![series("up{job=\"x\"}", &[])]));
        let view = Arc::new(RecordingView::new(graph(vec![Query::new("up", "ds")], vec![])).with_capacity(3));
        let syncer = GraphSyncer::new(Controller::new(gatherer), view.clone(), Palette::default()).unwrap();

        syncer
            .sync(&request(t0(), t0() + chrono::Duration::minutes(3)))
            .await
            .unwrap();
        let synced = view.series.lock();
        assert_eq!(synced[0][0].label, "up{job=\"x\"}");
        assert_eq!(synced[0][0].color, "#7EB26D");
    }

    #[tokio::test]
    async fn test_no_capacity_is_a_noop() {
        let gatherer = Arc::new(RecordingGatherer::default());
        let view = Arc::new(RecordingView::new(graph(vec![Query::new("up", "ds")], vec![])));
        let syncer = GraphSyncer::new(Controller::new(gatherer.clone()), view.clone(), Palette::default()).unwrap();

        let started = std::time::Instant::now();
        syncer
            .sync(&request(t0(), t0() + chrono::Duration::minutes(3)))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(gatherer.calls(), 0);
        assert!(view.series.lock().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_override_regex() {
        let widget = graph(
            vec![Query::new("up", "ds")],
            vec![SeriesOverride {
                regex: "[".into(),
                ..Default::default()
            }],
        );
        let view = Arc::new(RecordingView::new(widget));
        let res = GraphSyncer::new(
            Controller::new(Arc::new(RecordingGatherer::default())),
            view,
            Palette::default(),
        );
        assert!(res.is_err());
    }
}
