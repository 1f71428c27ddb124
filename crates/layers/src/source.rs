//! Coalescing front door for viewport feature queries.
//!
//! Concurrent callers share one extraction: whoever finds the request queue
//! empty runs the generator, everyone else waits for the broadcast. A viewport
//! or layer change cancels the in-flight cycle so stale results are never
//! delivered.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use runtime::{Debouncer, EventBus, RequestQueue};
use scene::components::{Properties, pick_properties};
use scene::{Feature, Viewport};
use serde::Deserialize;
use tracing::debug;

use crate::error::LayerError;
use crate::generator::{GeneratorOptions, ViewportFeaturesGenerator};
use crate::layer::{FeatureSource, Renderer};

/// Feature queries scoped to what is currently on screen.
#[async_trait]
pub trait ViewportFeatures: Send + Sync {
    async fn viewport_features(&self, properties: &[String]) -> Result<Vec<Properties>, LayerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerEvent {
    /// Camera moved; emitted immediately.
    ViewportChanged,
    /// Camera settled; emitted once per burst of changes after the debounce delay.
    ViewportLoad,
    /// The host reported all selected tiles loaded.
    TilesLoaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    #[serde(flatten)]
    pub generator: GeneratorOptions,
    pub viewport_load_debounce_ms: u64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            generator: GeneratorOptions::default(),
            viewport_load_debounce_ms: 100,
        }
    }
}

type SharedResult = Result<Arc<Vec<Feature>>, LayerError>;

#[derive(Debug, Default)]
struct QueueState {
    queue: RequestQueue<SharedResult>,
    // Bumped on every invalidation; a computation only settles its own cycle.
    cycle: u64,
}

impl QueueState {
    fn invalidate(&mut self) -> usize {
        self.cycle = self.cycle.wrapping_add(1);
        self.queue.clear_queue()
    }
}

#[derive(Debug)]
pub struct ViewportFeatureSource {
    generator: Mutex<ViewportFeaturesGenerator>,
    state: Mutex<QueueState>,
    events: EventBus<LayerEvent>,
    debouncer: Mutex<Debouncer>,
}

impl ViewportFeatureSource {
    pub fn new(options: SourceOptions) -> Self {
        let delay = Duration::from_millis(options.viewport_load_debounce_ms);
        Self {
            generator: Mutex::new(ViewportFeaturesGenerator::new(options.generator)),
            state: Mutex::new(QueueState::default()),
            events: EventBus::new(),
            debouncer: Mutex::new(Debouncer::new(delay)),
        }
    }

    pub fn events(&self) -> &EventBus<LayerEvent> {
        &self.events
    }

    pub fn is_ready(&self) -> bool {
        self.generator.lock().is_ready()
    }

    pub fn set_renderer(&self, renderer: Arc<dyn Renderer>) {
        self.generator.lock().set_renderer(renderer);
        self.invalidate();
    }

    pub fn set_layer(&self, layer: FeatureSource) {
        self.generator.lock().set_layer(layer);
        self.invalidate();
    }

    pub fn set_options(&self, options: SourceOptions) {
        self.generator.lock().set_options(options.generator);
        self.debouncer
            .lock()
            .set_delay(Duration::from_millis(options.viewport_load_debounce_ms));
        self.invalidate();
    }

    /// Records a camera change: cancels in-flight queries, then announces the
    /// change now and a debounced `ViewportLoad` once the camera settles.
    pub fn set_viewport(&self, viewport: Arc<dyn Viewport>) {
        self.generator.lock().set_viewport(viewport);
        self.invalidate();
        self.events.emit(LayerEvent::ViewportChanged);

        let events = self.events.clone();
        self.debouncer.lock().schedule(async move {
            events.emit(LayerEvent::ViewportLoad);
        });
    }

    pub fn notify_tiles_loaded(&self) {
        self.events.emit(LayerEvent::TilesLoaded);
    }

    fn invalidate(&self) {
        let rejected = self.state.lock().invalidate();
        if rejected > 0 {
            debug!("cancelled {rejected} stale viewport feature requests");
        }
    }

    /// Visible features reduced to `properties`, shared with concurrent callers.
    ///
    /// A cancelled cycle resolves to an empty list.
    pub async fn viewport_features(
        &self,
        properties: &[String],
    ) -> Result<Vec<Properties>, LayerError> {
        if !self.is_ready() {
            return Err(LayerError::NotAddedToMap);
        }

        let (pending, leader_cycle) = {
            let mut state = self.state.lock();
            let leader = state.queue.is_queue_empty();
            let pending = state.queue.enqueue();
            (pending, leader.then_some(state.cycle))
        };

        match leader_cycle {
            Some(cycle) => {
                let generator = self.generator.lock().clone();
                let guard = CycleGuard {
                    state: &self.state,
                    cycle,
                    settled: false,
                };
                let result = generator.visible_features().await.map(Arc::new);
                guard.settle(result);
            }
            None => debug!("joining in-flight viewport features request"),
        }

        match pending.await {
            Ok(Ok(features)) => Ok(features
                .iter()
                .map(|f| pick_properties(&f.properties, properties))
                .collect()),
            Ok(Err(err)) => Err(err),
            Err(cancelled) => {
                debug!("viewport features request dropped: {cancelled}");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl ViewportFeatures for ViewportFeatureSource {
    async fn viewport_features(&self, properties: &[String]) -> Result<Vec<Properties>, LayerError> {
        Self::viewport_features(self, properties).await
    }
}

/// Settles the leader's cycle; if the leader is dropped mid-computation the
/// waiters are cancelled instead of hanging.
struct CycleGuard<'a> {
    state: &'a Mutex<QueueState>,
    cycle: u64,
    settled: bool,
}

impl CycleGuard<'_> {
    fn settle(mut self, result: SharedResult) {
        self.settled = true;
        let mut state = self.state.lock();
        if state.cycle == self.cycle {
            state.queue.resolve_queue(result);
        } else {
            debug!("discarding viewport features computed for a stale cycle");
        }
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.state.lock();
        if state.cycle == self.cycle {
            state.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerEvent, SourceOptions, ViewportFeatureSource, ViewportFeatures};
    use crate::error::LayerError;
    use crate::layer::{FeatureSource, Renderer, SelectedTiles};
    use crate::tile::{Tile, TileIndex};
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
        Arc::new(WebMercatorViewport::new([-90.0, 45.0], 2.0, 512.0, 512.0))
    }

    fn point(x: f64, y: f64, id: i64) -> Feature {
        Feature::new(
            Geometry::point(x, y),
            json!({ "cartodb_id": id, "pop": id * 10 })
                .as_object()
                .cloned()
                .unwrap(),
        )
    }

    fn bound_source(layer: FeatureSource) -> ViewportFeatureSource {
        let source = ViewportFeatureSource::new(SourceOptions::default());
        source.set_renderer(Arc::new(OneViewport(viewport())));
        source.set_layer(layer);
        source
    }

    #[tokio::test]
    async fn unbound_source_reports_not_added() {
        let source = ViewportFeatureSource::new(SourceOptions::default());
        assert_eq!(
            source.viewport_features(&[]).await.unwrap_err(),
            LayerError::NotAddedToMap
        );
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_computation() {
        let (tile, loader) = Tile::pending(TileIndex::new(0, 0, 1));
        let tiles = Arc::new(SelectedTiles::new(vec![tile]));
        let source = Arc::new(bound_source(FeatureSource::Tiled(tiles)));

        let mut tasks = Vec::new();
        for props in [vec!["pop".to_string()], vec!["cartodb_id".to_string()], vec![]] {
            let source = source.clone();
            tasks.push(tokio::spawn(async move {
                source.viewport_features(&props).await
            }));
        }
        // Let every caller enqueue before the tile arrives.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(source.state.lock().queue.len(), 3);

        loader.finish(vec![point(0.5, 0.5, 1), point(0.55, 0.55, 2)]);

        let mut results = Vec::new();
        for t in tasks {
            results.push(t.await.unwrap().unwrap());
        }
        assert_eq!(results[0].len(), 2);
        assert_eq!(results[0][1]["pop"], json!(20));
        assert_eq!(results[1][0]["cartodb_id"], json!(1));
        assert!(results[2].iter().all(|p| p.is_empty()));
        assert!(source.state.lock().queue.is_queue_empty());
    }

    #[tokio::test]
    async fn viewport_change_cancels_in_flight_cycle() {
        let (tile, loader) = Tile::pending(TileIndex::new(0, 0, 1));
        let tiles = Arc::new(SelectedTiles::new(vec![tile]));
        let source = Arc::new(bound_source(FeatureSource::Tiled(tiles)));

        let s = source.clone();
        let stale = tokio::spawn(async move { s.viewport_features(&["pop".into()]).await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        source.set_viewport(viewport());
        loader.finish(vec![point(0.5, 0.5, 1)]);

        // Stale waiters see "no data", never the stale result.
        assert_eq!(stale.await.unwrap().unwrap(), Vec::new());

        // A fresh cycle computes again.
        let fresh = source.viewport_features(&["pop".into()]).await.unwrap();
        assert_eq!(fresh.len(), 1);
    }

    #[tokio::test]
    async fn errors_reach_every_waiter() {
        let (tile, loader) = Tile::pending(TileIndex::new(0, 0, 1));
        let tiles = Arc::new(SelectedTiles::new(vec![tile]));
        let source = Arc::new(bound_source(FeatureSource::Tiled(tiles)));

        let a = {
            let s = source.clone();
            tokio::spawn(async move { s.viewport_features(&[]).await })
        };
        let b = {
            let s = source.clone();
            tokio::spawn(async move { s.viewport_features(&[]).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let mut bad = point(0.5, 0.5, 0);
        bad.properties.insert("cartodb_id".into(), json!(false));
        loader.finish(vec![bad]);

        assert!(matches!(a.await.unwrap(), Err(LayerError::InvalidFeatureId { .. })));
        assert!(matches!(b.await.unwrap(), Err(LayerError::InvalidFeatureId { .. })));
    }

    #[tokio::test]
    async fn trait_object_delegates() {
        let source = bound_source(FeatureSource::untiled(vec![point(-90.0, 45.0, 3)]));
        let dynamic: &dyn ViewportFeatures = &source;
        let got = dynamic.viewport_features(&["pop".into()]).await.unwrap();
        assert_eq!(got[0]["pop"], json!(30));
    }

    #[tokio::test(start_paused = true)]
    async fn viewport_load_is_debounced() {
        let source = bound_source(FeatureSource::untiled(Vec::new()));
        let mut rx = source.events().subscribe();

        source.set_viewport(viewport());
        source.set_viewport(viewport());
        tokio::time::sleep(Duration::from_millis(500)).await;
        source.notify_tiles_loaded();

        let mut seen = Vec::new();
        while let Ok(e) = rx.try_recv() {
            seen.push(e);
        }
        assert_eq!(
            seen,
            vec![
                LayerEvent::ViewportChanged,
                LayerEvent::ViewportChanged,
                LayerEvent::ViewportLoad,
                LayerEvent::TilesLoaded
            ]
        );
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: SourceOptions = serde_json::from_value(json!({ "unique_id_property": "gid" })).unwrap();
        assert_eq!(opts.generator.unique_id_property, "gid");
        assert_eq!(opts.viewport_load_debounce_ms, 100);
    }
}
