use std::sync::Arc;

use anyhow::{bail, Context, Result};

use gridwatch_types::{SinglestatSource, WidgetKind};

use super::{SyncFlag, SyncRequest, ThresholdPainter};
use crate::controller::Controller;
use crate::data::{unit, TemplateData};
use crate::render::SinglestatView;

/// Key of the value in the value text template.
const VALUE_KEY: &str = "value";
const DEFAULT_VALUE_TEXT: &str = "{{.value}}";

/// Syncs a singlestat with the instant value of its query, rendered as text.
pub struct SinglestatSyncer {
    controller: Controller,
    view: Arc<dyn SinglestatView>,
    source: SinglestatSource,
    painter: ThresholdPainter,
    flag: SyncFlag,
}

impl SinglestatSyncer {
    pub fn new(controller: Controller, view: Arc<dyn SinglestatView>) -> Result<Self> {
        let cfg = view.widget_cfg();
        let WidgetKind::Singlestat(source) = &cfg.kind else {
            bail!("widget {:?} is a {}, not a singlestat", cfg.title, cfg.kind.name());
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

        self.painter
            .paint(metric.value, |color| self.view.set_color(color))?;

        let text = self
            .value_text(&req.data, metric.value)
            .context("error rendering value")?;
        self.view
            .sync(&text)
            .context("error setting value on render view widget")
    }

    /// Render the value text. The value is unit formatted when a unit is
    /// set, or when neither a unit nor a value text is. Otherwise it stays a
    /// number the template can compare and format.
    fn value_text(&self, data: &TemplateData, value: f64) -> Result<String> {
        let src = &self.source;
        let data = if !src.unit.is_empty() || src.value_text.is_empty() {
            let formatted = unit::formatter(&src.unit)?.format(value, src.decimals);
            data.clone().set(VALUE_KEY, formatted)
        } else {
            data.clone().set(VALUE_KEY, value)
        };

        let template = if src.value_text.is_empty() {
            DEFAULT_VALUE_TEXT
        } else {
            src.value_text.as_str()
        };
        Ok(data.render(template)?)
    }
}

impl std::fmt::Debug for SinglestatSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinglestatSyncer")
            .field("title", &self.title())
            .field("syncing", &self.flag.is_syncing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::testing::*;
    use chrono::{TimeZone, Utc};
    use gridwatch_types::{GridPos, MetricSeries, Query, Threshold, Widget};

    fn setup(source: SinglestatSource, value: f64) -> (SinglestatSyncer, Arc<RecordingView>) {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let gatherer = Arc::new(RecordingGatherer::returning(vec![MetricSeries::builder(
            "s",
        )
        .metric(t0, value)
        .build()]));
        let view = Arc::new(RecordingView::new(Widget::new(
            "stat",
            GridPos::width(10),
            WidgetKind::Singlestat(SinglestatSource {
                query: Query::new("q", "ds"),
                ..source
            }),
        )));
        let syncer = SinglestatSyncer::new(Controller::new(gatherer), view.clone()).unwrap();
        (syncer, view)
    }

    async fn text_of(source: SinglestatSource, value: f64) -> String {
        let (syncer, view) = setup(source, value);
        let now = Utc::now();
        let mut req = request(now - chrono::Duration::hours(1), now);
        req.data = req.data.set("env", "prod");
        syncer.sync(&req).await.unwrap();
        let text = view.texts.lock()[0].clone();
        text
    }

    #[tokio::test]
    async fn test_value_text() {
        // Default: short unit, default template.
        assert_eq!(text_of(SinglestatSource::default(), 2050.0).await, "2 K");

        let unit = SinglestatSource {
            unit: "percent".into(),
            decimals: 1,
            value_text: "{{ .env }}: {{ .value }}".into(),
            ..Default::default()
        };
        assert_eq!(text_of(unit, 12.345).await, "prod: 12.3%");

        let raw = SinglestatSource {
            value_text: "v={{.value}}".into(),
            ..Default::default()
        };
        assert_eq!(text_of(raw, 17.5).await, "v=17.5");
    }

    #[tokio::test]
    async fn test_value_text_conditional() {
        let source = || SinglestatSource {
            value_text: "{{ if (lt .value 1.0) }}DOWN{{else}}UP{{end}}".into(),
            ..Default::default()
        };
        assert_eq!(text_of(source(), 0.5).await, "DOWN");
        assert_eq!(text_of(source(), 3.0).await, "UP");
    }

    #[tokio::test]
    async fn test_value_text_printf() {
        let source = SinglestatSource {
            value_text: r#"this is a test with {{printf "%.1f" .value}} value"#.into(),
            ..Default::default()
        };
        assert_eq!(text_of(source, 19.14).await, "this is a test with 19.1 value");
    }

    #[tokio::test]
    async fn test_invalid_value_text_fails_sync() {
        let (syncer, view) = setup(
            SinglestatSource {
                value_text: "{{ if .value }}never closed".into(),
                ..Default::default()
            },
            1.0,
        );
        let now = Utc::now();
        let err = syncer
            .sync(&request(now - chrono::Duration::hours(1), now))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("error rendering value"));
        assert!(view.texts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_unit_fails_sync() {
        let (syncer, view) = setup(
            SinglestatSource {
                unit: "parsecs".into(),
                ..Default::default()
            },
            1.0,
        );
        let now = Utc::now();
        let err = syncer
            .sync(&request(now - chrono::Duration::hours(1), now))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("parsecs is not a valid unit"));
        assert!(view.texts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_color() {
        let (syncer, view) = setup(
            SinglestatSource {
                thresholds: vec![Threshold::new(10.0, "red"), Threshold::new(0.0, "green")],
                ..Default::default()
            },
            12.0,
        );
        let now = Utc::now();
        syncer
            .sync(&request(now - chrono::Duration::hours(1), now))
            .await
            .unwrap();
        assert_eq!(*view.colors.lock(), vec!["red"]);
    }
}
