use std::sync::Arc;

use parking_lot::Mutex;
use scene::{Feature, Viewport};

use crate::tile::Tile;

/// Render surface; the first viewport is the one queries run against.
pub trait Renderer: Send + Sync + std::fmt::Debug {
    fn viewports(&self) -> Vec<Arc<dyn Viewport>>;
}

/// Tile cache of a tiled render layer.
pub trait TileSet: Send + Sync + std::fmt::Debug {
    /// Tiles the renderer currently selected for display, in draw order.
    fn selected_tiles(&self) -> Vec<Tile>;
}

/// Where a render layer's features come from, fixed when the layer is bound.
#[derive(Debug, Clone)]
pub enum FeatureSource {
    /// Tiles with their own local transforms; features may repeat across tiles.
    Tiled(Arc<dyn TileSet>),
    /// A single in-memory feature array in geographic coordinates.
    Untiled(Arc<Vec<Feature>>),
}

impl FeatureSource {
    pub fn untiled(features: Vec<Feature>) -> Self {
        FeatureSource::Untiled(Arc::new(features))
    }

    pub fn is_tiled(&self) -> bool {
        matches!(self, FeatureSource::Tiled(_))
    }
}

/// Tile selection updated by the host as the renderer streams tiles in and out.
#[derive(Debug, Default)]
pub struct SelectedTiles {
    tiles: Mutex<Vec<Tile>>,
}

impl SelectedTiles {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self {
            tiles: Mutex::new(tiles),
        }
    }

    pub fn replace(&self, tiles: Vec<Tile>) {
        *self.tiles.lock() = tiles;
    }
}

impl TileSet for SelectedTiles {
    fn selected_tiles(&self) -> Vec<Tile> {
        self.tiles.lock().clone()
    }
}
