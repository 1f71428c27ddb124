//! Viewport feature extraction.
//!
//! Answers "which features are on screen right now" for the bound render layer,
//! testing every feature against the current viewport frustum in common space.
//! Tiled layers are deduplicated across tile overlaps by feature identity.

use std::collections::HashSet;
use std::sync::Arc;

use scene::components::{Properties, pick_properties};
use scene::visibility::{CommonSpace, Frustum, geometry_intersects_frustum};
use scene::{Feature, Viewport};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::LayerError;
use crate::layer::{FeatureSource, Renderer, TileSet};
use crate::query::{DEFAULT_UNIQUE_ID_PROPERTY, feature_identity};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Property holding the row identity used to dedupe tiled features.
    pub unique_id_property: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            unique_id_property: DEFAULT_UNIQUE_ID_PROPERTY.to_owned(),
        }
    }
}

/// Bindings to the render engine plus the extraction logic.
///
/// Cheap to clone: bindings are shared handles, so a snapshot can be taken and
/// awaited without holding any lock on the owner.
#[derive(Debug, Clone, Default)]
pub struct ViewportFeaturesGenerator {
    renderer: Option<Arc<dyn Renderer>>,
    layer: Option<FeatureSource>,
    viewport: Option<Arc<dyn Viewport>>,
    options: GeneratorOptions,
}

impl ViewportFeaturesGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn set_renderer(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderer = Some(renderer);
    }

    pub fn set_layer(&mut self, layer: FeatureSource) {
        self.layer = Some(layer);
    }

    /// Pins the viewport queries run against. Without one, the renderer's first
    /// viewport is used.
    pub fn set_viewport(&mut self, viewport: Arc<dyn Viewport>) {
        self.viewport = Some(viewport);
    }

    pub fn set_options(&mut self, options: GeneratorOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn is_ready(&self) -> bool {
        self.renderer.is_some() && self.layer.is_some()
    }

    /// Property bags of the visible features, reduced to `properties`.
    ///
    /// Selection is explicit: an empty slice yields empty bags, one per feature.
    pub async fn get_features(&self, properties: &[String]) -> Result<Vec<Properties>, LayerError> {
        let features = self.visible_features().await?;
        Ok(features
            .iter()
            .map(|f| pick_properties(&f.properties, properties))
            .collect())
    }

    /// Visible features with geometry and all properties.
    pub async fn visible_features(&self) -> Result<Vec<Feature>, LayerError> {
        let (Some(renderer), Some(layer)) = (&self.renderer, &self.layer) else {
            return Err(LayerError::NotAddedToMap);
        };

        let viewport = self
            .viewport
            .clone()
            .or_else(|| renderer.viewports().into_iter().next());
        let Some(planes) = viewport.as_ref().and_then(|vp| vp.frustum_planes()) else {
            warn!("viewport not ready yet; returning no viewport features");
            return Ok(Vec::new());
        };
        let frustum = Frustum::new(planes);

        match layer {
            FeatureSource::Tiled(tiles) => self.tiled_features(tiles.as_ref(), &frustum).await,
            FeatureSource::Untiled(features) => {
                let Some(viewport) = viewport else {
                    return Ok(Vec::new());
                };
                Ok(untiled_features(features, viewport.as_ref(), &frustum))
            }
        }
    }

    async fn tiled_features(
        &self,
        tileset: &dyn TileSet,
        frustum: &Frustum,
    ) -> Result<Vec<Feature>, LayerError> {
        let tiles = tileset.selected_tiles();

        let pending = tiles.iter().filter(|t| !t.is_loaded()).count();
        if pending > 0 {
            debug!("waiting for {pending} of {} selected tiles to load", tiles.len());
        }

        let mut loaded = Vec::with_capacity(tiles.len());
        for tile in &tiles {
            match tile.wait_loaded().await {
                Ok(content) => loaded.push((tile.transform(), content)),
                Err(err) => warn!("skipping tile: {err}"),
            }
        }

        // First seen wins: tile order, then feature order within a tile.
        let unique_id_property = &self.options.unique_id_property;
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for (transform, content) in &loaded {
            let space = CommonSpace::Tile(transform);
            for feature in content.iter() {
                let id = feature_identity(feature, unique_id_property)?;
                if seen.contains(&id) {
                    continue;
                }
                if geometry_intersects_frustum(&feature.geometry, &space, frustum) {
                    seen.insert(id);
                    out.push(feature.clone());
                }
            }
        }

        Ok(out)
    }
}

fn untiled_features(features: &[Feature], viewport: &dyn Viewport, frustum: &Frustum) -> Vec<Feature> {
    let space = CommonSpace::Viewport(viewport);
    features
        .iter()
        .filter(|f| geometry_intersects_frustum(&f.geometry, &space, frustum))
        .cloned()
        .collect()
}
