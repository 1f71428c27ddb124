//! Data views: histogram and formula aggregations over the features on
//! screen, or delegated to an aggregation service for the whole dataset.

mod formula;
mod histogram;
mod remote;

pub use formula::*;
pub use histogram::*;
pub use remote::*;

use std::fmt;
use std::sync::Arc;

use layers::{LayerEvent, ViewportFeatures};
use runtime::EventBus;
use scene::components::Properties;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::DataViewError;

pub const DEFAULT_CLUSTER_COUNT_PROPERTY: &str = "_cdb_feature_count";

/// Missing and null are `None`; anything but a number is an error.
pub(crate) fn read_numeric(props: &Properties, column: &str) -> Result<Option<f64>, DataViewError> {
    match props.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(DataViewError::NonNumeric {
            column: column.to_string(),
            found: other.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataViewKind {
    Histogram(HistogramOptions),
    Formula(FormulaOptions),
}

impl DataViewKind {
    fn required_properties(&self) -> Vec<String> {
        match self {
            DataViewKind::Histogram(o) => o.required_properties(),
            DataViewKind::Formula(o) => o.required_properties(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataViewData {
    Histogram(HistogramResult),
    Formula(FormulaResult),
}

pub enum DataViewMode {
    /// Aggregate the features currently on screen.
    Local(Arc<dyn ViewportFeatures>),
    /// Ask the aggregation service about the whole dataset.
    Remote {
        service: Arc<dyn AggregationService>,
        dataset: String,
    },
}

impl DataViewMode {
    fn name(&self) -> &'static str {
        match self {
            DataViewMode::Local(_) => "local",
            DataViewMode::Remote { .. } => "remote",
        }
    }
}

impl fmt::Debug for DataViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataViewMode::Local(_) => f.write_str("Local(..)"),
            DataViewMode::Remote { dataset, .. } => {
                f.debug_struct("Remote").field("dataset", dataset).finish_non_exhaustive()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataViewEvent {
    DataUpdate(DataViewData),
    Error(String),
}

#[derive(Debug)]
pub struct DataView {
    mode: DataViewMode,
    kind: DataViewKind,
    events: EventBus<DataViewEvent>,
}

impl DataView {
    pub fn new(mode: DataViewMode, kind: DataViewKind) -> Self {
        Self {
            mode,
            kind,
            events: EventBus::new(),
        }
    }

    pub fn kind(&self) -> &DataViewKind {
        &self.kind
    }

    pub fn events(&self) -> &EventBus<DataViewEvent> {
        &self.events
    }

    pub async fn get_local_data(&self) -> Result<DataViewData, DataViewError> {
        let DataViewMode::Local(source) = &self.mode else {
            return Err(self.mode_mismatch("local"));
        };
        let features = source
            .viewport_features(&self.kind.required_properties())
            .await?;
        match &self.kind {
            DataViewKind::Histogram(o) => histogram(&features, o).map(DataViewData::Histogram),
            DataViewKind::Formula(o) => formula(&features, o).map(DataViewData::Formula),
        }
    }

    pub async fn get_remote_data(&self) -> Result<DataViewData, DataViewError> {
        let DataViewMode::Remote { service, dataset } = &self.mode else {
            return Err(self.mode_mismatch("remote"));
        };
        match &self.kind {
            DataViewKind::Histogram(o) => {
                let remote = service.histogram(dataset, o).await?;
                Ok(DataViewData::Histogram(reshape_histogram(remote, o)))
            }
            DataViewKind::Formula(o) => {
                let remote = service.formula(dataset, o).await?;
                Ok(DataViewData::Formula(reshape_formula(remote)))
            }
        }
    }

    pub async fn get_data(&self) -> Result<DataViewData, DataViewError> {
        match self.mode {
            DataViewMode::Local(_) => self.get_local_data().await,
            DataViewMode::Remote { .. } => self.get_remote_data().await,
        }
    }

    /// Recomputes the view and announces the outcome to subscribers.
    pub async fn refresh(&self) -> Result<DataViewData, DataViewError> {
        let result = self.get_data().await;
        match &result {
            Ok(data) => {
                self.events.emit(DataViewEvent::DataUpdate(data.clone()));
            }
            Err(err) => {
                warn!("data view refresh failed: {err}");
                self.events.emit(DataViewEvent::Error(err.to_string()));
            }
        }
        result
    }

    /// Refreshes on every settled viewport until the layer's event bus closes.
    pub fn watch(self: Arc<Self>, mut layer_events: broadcast::Receiver<LayerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match layer_events.recv().await {
                    Ok(LayerEvent::ViewportLoad) => {
                        let _ = self.refresh().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("data view skipped {skipped} layer events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn mode_mismatch(&self, requested: &'static str) -> DataViewError {
        DataViewError::ModeMismatch {
            requested,
            actual: self.mode.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AggregationService, DataView, DataViewData, DataViewEvent, DataViewKind, DataViewMode,
        FormulaOptions, HistogramOptions, Operation, RemoteFormula, RemoteHistogram,
    };
    use crate::error::DataViewError;
    use async_trait::async_trait;
    use layers::{FeatureSource, Renderer, SourceOptions, ViewportFeatureSource};
    use pretty_assertions::assert_eq;
    use scene::components::Geometry;
    use scene::{Feature, Viewport, WebMercatorViewport};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct OneViewport(Arc<dyn Viewport>);

    impl Renderer for OneViewport {
        fn viewports(&self) -> Vec<Arc<dyn Viewport>> {
            vec![self.0.clone()]
        }
    }

    fn viewport() -> Arc<dyn Viewport> {
        Arc::new(WebMercatorViewport::new([0.0, 0.0], 3.0, 512.0, 512.0))
    }

    fn local_source(pops: &[i64]) -> Arc<ViewportFeatureSource> {
        let features = pops
            .iter()
            .enumerate()
            .map(|(i, pop)| {
                Feature::new(
                    Geometry::point(0.0, 0.0),
                    json!({ "cartodb_id": i, "pop": pop }).as_object().cloned().unwrap(),
                )
            })
            .collect();
        let source = ViewportFeatureSource::new(SourceOptions::default());
        source.set_renderer(Arc::new(OneViewport(viewport())));
        source.set_layer(FeatureSource::untiled(features));
        Arc::new(source)
    }

    struct StubService;

    #[async_trait]
    impl AggregationService for StubService {
        async fn histogram(&self, dataset: &str, _: &HistogramOptions) -> Result<RemoteHistogram, DataViewError> {
            assert_eq!(dataset, "populated_places");
            Ok(serde_json::from_value(json!({
                "bins": [{ "bin": 1, "freq": 7 }],
                "nulls": 0,
                "totalAmount": 7,
                "bins_start": 0,
                "bin_width": 5
            }))
            .unwrap())
        }

        async fn formula(&self, _: &str, _: &FormulaOptions) -> Result<RemoteFormula, DataViewError> {
            Err(DataViewError::Remote("503".into()))
        }
    }

    fn remote(kind: DataViewKind) -> DataView {
        DataView::new(
            DataViewMode::Remote {
                service: Arc::new(StubService),
                dataset: "populated_places".into(),
            },
            kind,
        )
    }

    #[tokio::test]
    async fn local_formula_over_viewport() {
        let view = DataView::new(
            DataViewMode::Local(local_source(&[10, 20, 30])),
            DataViewKind::Formula(FormulaOptions::new("pop", Operation::Sum)),
        );
        let DataViewData::Formula(result) = view.get_data().await.unwrap() else {
            panic!("expected formula data");
        };
        assert_eq!(result.result, Some(60.0));
    }

    #[tokio::test]
    async fn remote_histogram_is_reshaped() {
        let view = remote(DataViewKind::Histogram(HistogramOptions::new("pop", 3)));
        let DataViewData::Histogram(result) = view.get_remote_data().await.unwrap() else {
            panic!("expected histogram data");
        };
        let values: Vec<f64> = result.bins.iter().map(|b| b.value).collect();
        assert_eq!(values, vec![0.0, 7.0, 0.0]);
        assert_eq!(result.bins[2].start, 10.0);
    }

    #[tokio::test]
    async fn mode_mismatch_is_reported() {
        let view = remote(DataViewKind::Formula(FormulaOptions::new("pop", Operation::Avg)));
        assert_eq!(
            view.get_local_data().await.unwrap_err(),
            DataViewError::ModeMismatch {
                requested: "local",
                actual: "remote"
            }
        );
    }

    #[tokio::test]
    async fn refresh_emits_updates_and_errors() {
        let view = remote(DataViewKind::Formula(FormulaOptions::new("pop", Operation::Avg)));
        let mut rx = view.events().subscribe();
        assert!(view.refresh().await.is_err());
        assert_eq!(
            rx.try_recv().unwrap(),
            DataViewEvent::Error("aggregation service failed: 503".into())
        );

        let view = DataView::new(
            DataViewMode::Local(local_source(&[1, 2])),
            DataViewKind::Formula(FormulaOptions::new("pop", Operation::Count)),
        );
        let mut rx = view.events().subscribe();
        view.refresh().await.unwrap();
        let DataViewEvent::DataUpdate(DataViewData::Formula(r)) = rx.try_recv().unwrap() else {
            panic!("expected a formula update");
        };
        assert_eq!(r.result, Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_refreshes_on_viewport_load() {
        let source = local_source(&[5, 15]);
        let view = Arc::new(DataView::new(
            DataViewMode::Local(source.clone()),
            DataViewKind::Formula(FormulaOptions::new("pop", Operation::Max)),
        ));
        let mut updates = view.events().subscribe();
        let task = view.clone().watch(source.events().subscribe());

        source.set_viewport(viewport());
        tokio::time::sleep(Duration::from_millis(500)).await;

        let DataViewEvent::DataUpdate(DataViewData::Formula(r)) = updates.recv().await.unwrap() else {
            panic!("expected a formula update");
        };
        assert_eq!(r.result, Some(15.0));

        // Non-load events do not trigger a refresh.
        source.notify_tiles_loaded();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(updates.try_recv().is_err());
        task.abort();
    }
}
