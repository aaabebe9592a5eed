//! Datasource routing.
//!
//! The router resolves the datasource ID of each query to a gatherer:
//!
//! ```text
//!   priority 0   dashboard datasources    id -> gatherer
//!   priority 1   user datasources         replace dashboard entries with the same id
//!   priority 2   aliases dashboard->user  replace/insert with the user entry
//! ```
//!
//! It is immutable once built and implements [`Gatherer`] itself, so it can
//! be shared behind an `Arc` by every widget.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gridwatch_types::{Datasource, DatasourceKind, MetricSeries, Query};

use crate::fake::FakeGatherer;
use crate::{AdapterError, Gatherer};

/// Builds the gatherer of a datasource declaration.
pub trait GathererFactory: Send + Sync {
    fn create(&self, datasource: &Datasource) -> Result<Arc<dyn Gatherer>, AdapterError>;
}

/// Factory mapping each datasource kind to its built-in gatherer.
///
/// Backends whose cargo feature is disabled fail with
/// [`AdapterError::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGathererFactory {
    /// Drop `__`-prefixed labels from Prometheus series.
    pub filter_special_labels: bool,
}

impl GathererFactory for DefaultGathererFactory {
    fn create(&self, datasource: &Datasource) -> Result<Arc<dyn Gatherer>, AdapterError> {
        match &datasource.kind {
            DatasourceKind::Fake(_) => Ok(Arc::new(FakeGatherer::new())),
            #[cfg(feature = "prometheus")]
            DatasourceKind::Prometheus(ds) => Ok(Arc::new(
                crate::prometheus::PrometheusGatherer::builder()
                    .address(&ds.address)
                    .filter_special_labels(self.filter_special_labels)
                    .build()?,
            )),
            #[cfg(feature = "graphite")]
            DatasourceKind::Graphite(ds) => Ok(Arc::new(
                crate::graphite::GraphiteGatherer::builder()
                    .address(&ds.address)
                    .build()?,
            )),
            #[cfg(feature = "influxdb")]
            DatasourceKind::InfluxDb(ds) => Ok(Arc::new(
                crate::influxdb::InfluxDbGatherer::builder()
                    .address(&ds.address)
                    .database(&ds.database)
                    .build()?,
            )),
            #[allow(unreachable_patterns)]
            other => Err(AdapterError::Unsupported(other.name().to_string())),
        }
    }
}

/// Gatherer dispatching each query to the gatherer of its datasource.
#[derive(Debug, Clone, Default)]
pub struct DatasourceRouter {
    gatherers: HashMap<String, Arc<dyn Gatherer>>,
}

impl DatasourceRouter {
    /// Build a router with the default factory.
    pub fn new(
        dashboard: &[Datasource],
        user: &[Datasource],
        aliases: &HashMap<String, String>,
    ) -> Result<Self, AdapterError> {
        Self::with_factory(&DefaultGathererFactory::default(), dashboard, user, aliases)
    }

    /// Build a router creating gatherers with `factory`.
    pub fn with_factory(
        factory: &dyn GathererFactory,
        dashboard: &[Datasource],
        user: &[Datasource],
        aliases: &HashMap<String, String>,
    ) -> Result<Self, AdapterError> {
        let mut gatherers = HashMap::with_capacity(dashboard.len());
        for ds in dashboard {
            gatherers.insert(ds.id.clone(), factory.create(ds)?);
        }

        let mut user_gatherers = HashMap::with_capacity(user.len());
        for ds in user {
            user_gatherers.insert(ds.id.clone(), factory.create(ds)?);
        }

        for (id, gatherer) in gatherers.iter_mut() {
            if let Some(user_gatherer) = user_gatherers.get(id) {
                *gatherer = Arc::clone(user_gatherer);
            }
        }

        for (id, alias) in aliases {
            let user_gatherer =
                user_gatherers
                    .get(alias)
                    .ok_or_else(|| AdapterError::AliasNotFound {
                        id: id.clone(),
                        alias: alias.clone(),
                    })?;
            gatherers.insert(id.clone(), Arc::clone(user_gatherer));
        }

        Ok(Self { gatherers })
    }

    /// Wrap every routed gatherer with `wrap` (e.g. logging middleware).
    pub fn map_gatherers<F>(mut self, wrap: F) -> Self
    where
        F: Fn(&str, Arc<dyn Gatherer>) -> Arc<dyn Gatherer>,
    {
        self.gatherers = self
            .gatherers
            .into_iter()
            .map(|(id, g)| {
                let wrapped = wrap(&id, g);
                (id, wrapped)
            })
            .collect();
        self
    }

    /// IDs a query can be routed to.
    pub fn datasource_ids(&self) -> impl Iterator<Item = &str> {
        self.gatherers.keys().map(String::as_str)
    }

    fn gatherer(&self, id: &str) -> Result<&Arc<dyn Gatherer>, AdapterError> {
        self.gatherers
            .get(id)
            .ok_or_else(|| AdapterError::DatasourceNotFound(id.to_string()))
    }
}

#[async_trait]
impl Gatherer for DatasourceRouter {
    async fn gather_single(
        &self,
        query: &Query,
        at: DateTime<Utc>,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        self.gatherer(&query.datasource_id)?
            .gather_single(query, at)
            .await
    }

    async fn gather_range(
        &self,
        query: &Query,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<MetricSeries>, AdapterError> {
        self.gatherer(&query.datasource_id)?
            .gather_range(query, start, end, step)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gatherer answering with a series named after where it was built.
    #[derive(Debug)]
    struct TaggedGatherer(String);

    #[async_trait]
    impl Gatherer for TaggedGatherer {
        async fn gather_single(
            &self,
            _query: &Query,
            at: DateTime<Utc>,
        ) -> Result<Vec<MetricSeries>, AdapterError> {
            Ok(vec![MetricSeries::builder(self.0.clone()).metric(at, 1.0).build()])
        }

        async fn gather_range(
            &self,
            _query: &Query,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _step: Duration,
        ) -> Result<Vec<MetricSeries>, AdapterError> {
            Ok(vec![MetricSeries::new(self.0.clone())])
        }
    }

    /// Tags each gatherer with the datasource's address so tests can tell
    /// dashboard and user declarations apart.
    struct TaggingFactory;

    impl GathererFactory for TaggingFactory {
        fn create(&self, ds: &Datasource) -> Result<Arc<dyn Gatherer>, AdapterError> {
            let tag = match &ds.kind {
                DatasourceKind::Prometheus(p) => p.address.clone(),
                other => other.name().to_string(),
            };
            Ok(Arc::new(TaggedGatherer(tag)))
        }
    }

    fn router(
        dashboard: &[Datasource],
        user: &[Datasource],
        aliases: &[(&str, &str)],
    ) -> Result<DatasourceRouter, AdapterError> {
        let aliases = aliases
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DatasourceRouter::with_factory(&TaggingFactory, dashboard, user, &aliases)
    }

    async fn served_by(router: &DatasourceRouter, id: &str) -> Result<String, AdapterError> {
        let res = router
            .gather_single(&Query::new("up", id), Utc::now())
            .await?;
        Ok(res[0].id.clone())
    }

    #[tokio::test]
    async fn test_dashboard_datasources() {
        let r = router(&[Datasource::prometheus("prom", "dash-prom")], &[], &[]).unwrap();
        assert_eq!(served_by(&r, "prom").await.unwrap(), "dash-prom");
    }

    #[tokio::test]
    async fn test_user_datasource_overrides_dashboard() {
        let r = router(
            &[
                Datasource::prometheus("prom", "dash-prom"),
                Datasource::prometheus("other", "dash-other"),
            ],
            &[Datasource::prometheus("prom", "user-prom")],
            &[],
        )
        .unwrap();

        assert_eq!(served_by(&r, "prom").await.unwrap(), "user-prom");
        assert_eq!(served_by(&r, "other").await.unwrap(), "dash-other");
    }

    #[tokio::test]
    async fn test_alias_wins_over_everything() {
        let r = router(
            &[Datasource::prometheus("prom", "dash-prom")],
            &[
                Datasource::prometheus("prom", "user-prom"),
                Datasource::prometheus("mine", "user-mine"),
            ],
            &[("prom", "mine"), ("missing-in-dashboard", "mine")],
        )
        .unwrap();

        assert_eq!(served_by(&r, "prom").await.unwrap(), "user-mine");
        assert_eq!(served_by(&r, "missing-in-dashboard").await.unwrap(), "user-mine");
    }

    #[tokio::test]
    async fn test_user_only_datasource_not_routed() {
        let r = router(&[], &[Datasource::prometheus("mine", "user-mine")], &[]).unwrap();
        assert!(matches!(
            served_by(&r, "mine").await,
            Err(AdapterError::DatasourceNotFound(id)) if id == "mine"
        ));
    }

    #[tokio::test]
    async fn test_unknown_datasource() {
        let r = router(&[Datasource::fake("fake")], &[], &[]).unwrap();
        let err = r
            .gather_range(
                &Query::new("x", "nope"),
                Utc::now(),
                Utc::now(),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "datasource nope does not exist");
    }

    #[test]
    fn test_alias_target_must_exist() {
        let err = router(
            &[Datasource::prometheus("prom", "dash-prom")],
            &[],
            &[("prom", "ghost")],
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::AliasNotFound { .. }));

        // Aliases only resolve against user datasources.
        let err = router(
            &[
                Datasource::prometheus("prom", "a"),
                Datasource::prometheus("other", "b"),
            ],
            &[],
            &[("prom", "other")],
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::AliasNotFound { .. }));
    }

    #[tokio::test]
    async fn test_default_factory_fake() {
        let r = DatasourceRouter::new(&[Datasource::fake("f")], &[], &HashMap::new()).unwrap();
        assert_eq!(served_by(&r, "f").await.unwrap(), "fake");
        assert_eq!(r.datasource_ids().collect::<Vec<_>>(), vec!["f"]);
    }

    #[test]
    fn test_default_factory_influxdb_requires_database() {
        let ds = Datasource::new(
            "influx",
            DatasourceKind::InfluxDb(gridwatch_types::InfluxDbSource {
                address: "http://localhost:8086".into(),
                database: String::new(),
            }),
        );
        let res = DefaultGathererFactory::default().create(&ds);
        assert!(matches!(
            res,
            Err(AdapterError::Config(_)) | Err(AdapterError::Unsupported(_))
        ));
    }
}
