use std::sync::Arc;

use foundation::bounds::Aabb2;
use foundation::math::{Mat4, Vec3, lng_lat_to_common};
use scene::Feature;
use tokio::sync::watch;

use crate::error::LayerError;

/// Tile coordinate in ZXY scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileIndex {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileIndex {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Geographic bounds as `[west, south]..[east, north]`.
    pub fn bounds_lng_lat(&self) -> Aabb2 {
        let n = tiles_per_side(self.z);
        let x = f64::from(self.x);
        let west = (x / n) * 360.0 - 180.0;
        let east = ((x + 1.0) / n) * 360.0 - 180.0;

        // Web Mercator Y flip
        let y = f64::from(self.y);
        let north = tile_y_to_lat(y, self.z);
        let south = tile_y_to_lat(y + 1.0, self.z);

        Aabb2::new([west, south], [east, north])
    }
}

// Float math so deep zooms and edge indices never overflow.
fn tiles_per_side(z: u8) -> f64 {
    2f64.powi(i32::from(z))
}

fn tile_y_to_lat(y: f64, z: u8) -> f64 {
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / tiles_per_side(z);
    n.sinh().atan().to_degrees()
}

/// Maps tile-local `[0, 1]²` coordinates (origin north-west) into common space.
pub fn tile_transform(bbox: &Aabb2) -> Mat4 {
    let north_west = lng_lat_to_common([bbox.min[0], bbox.max[1]]);
    let south_east = lng_lat_to_common([bbox.max[0], bbox.min[1]]);
    let size = south_east - north_west;

    Mat4::translate(north_west).mul(&Mat4::scale(Vec3::new(size.x, size.y, 1.0)))
}

type Content = Option<Arc<Vec<Feature>>>;

/// A unit of fetched vector data.
///
/// Cheap to clone; clones observe the same load state.
#[derive(Debug, Clone)]
pub struct Tile {
    index: TileIndex,
    bbox: Aabb2,
    content: watch::Receiver<Content>,
}

/// Producer side of a pending tile, held by whoever fetches and decodes it.
#[derive(Debug)]
pub struct TileLoader {
    tx: watch::Sender<Content>,
}

impl TileLoader {
    pub fn finish(self, features: Vec<Feature>) {
        self.tx.send_replace(Some(Arc::new(features)));
    }
}

impl Tile {
    pub fn loaded(index: TileIndex, features: Vec<Feature>) -> Self {
        let (tx, content) = watch::channel(Some(Arc::new(features)));
        drop(tx);
        Self {
            index,
            bbox: index.bounds_lng_lat(),
            content,
        }
    }

    pub fn pending(index: TileIndex) -> (Self, TileLoader) {
        let (tx, content) = watch::channel(None);
        let tile = Self {
            index,
            bbox: index.bounds_lng_lat(),
            content,
        };
        (tile, TileLoader { tx })
    }

    pub fn index(&self) -> TileIndex {
        self.index
    }

    pub fn bbox(&self) -> &Aabb2 {
        &self.bbox
    }

    pub fn is_loaded(&self) -> bool {
        self.content.borrow().is_some()
    }

    pub fn content(&self) -> Option<Arc<Vec<Feature>>> {
        self.content.borrow().clone()
    }

    pub fn transform(&self) -> Mat4 {
        tile_transform(&self.bbox)
    }

    /// Waits until the tile content is available.
    pub async fn wait_loaded(&self) -> Result<Arc<Vec<Feature>>, LayerError> {
        let mut rx = self.content.clone();
        let content = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| LayerError::TileLoadAborted(self.index))?;
        content
            .clone()
            .ok_or(LayerError::TileLoadAborted(self.index))
    }
}
