use foundation::math::{Vec3, common_to_lng_lat, lng_lat_to_common};

use crate::visibility::Plane;

/// Camera/projection state reported by the render surface.
///
/// Recreated on every camera change; consumers hold it by reference and never
/// mutate it.
pub trait Viewport: Send + Sync + std::fmt::Debug {
    fn width(&self) -> f64;
    fn height(&self) -> f64;

    /// `[lng, lat]` to screen pixels.
    fn project(&self, lng_lat: [f64; 2]) -> [f64; 2];

    /// Screen pixels to `[lng, lat]`.
    fn unproject(&self, xy: [f64; 2]) -> [f64; 2];

    /// `[lng, lat]` to common space, shared with tile transforms.
    fn project_position(&self, lng_lat: [f64; 2]) -> Vec3 {
        lng_lat_to_common(lng_lat)
    }

    /// Clipping planes of the visible volume in common space.
    ///
    /// `None` while the frustum is not established (e.g. before the first render).
    fn frustum_planes(&self) -> Option<Vec<Plane>>;
}

/// Top-down Web Mercator viewport (no pitch or bearing).
#[derive(Debug, Clone, PartialEq)]
pub struct WebMercatorViewport {
    pub center: [f64; 2],
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl WebMercatorViewport {
    pub fn new(center: [f64; 2], zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
        }
    }

    fn scale(&self) -> f64 {
        2f64.powf(self.zoom)
    }
}

impl Viewport for WebMercatorViewport {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn project(&self, lng_lat: [f64; 2]) -> [f64; 2] {
        let c = lng_lat_to_common(self.center);
        let p = lng_lat_to_common(lng_lat);
        let s = self.scale();
        [
            (p.x - c.x) * s + self.width / 2.0,
            (p.y - c.y) * s + self.height / 2.0,
        ]
    }

    fn unproject(&self, xy: [f64; 2]) -> [f64; 2] {
        let c = lng_lat_to_common(self.center);
        let s = self.scale();
        let p = Vec3::new(
            c.x + (xy[0] - self.width / 2.0) / s,
            c.y + (xy[1] - self.height / 2.0) / s,
            0.0,
        );
        common_to_lng_lat(p)
    }

    fn frustum_planes(&self) -> Option<Vec<Plane>> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let c = lng_lat_to_common(self.center);
        let s = self.scale();
        let hw = self.width / 2.0 / s;
        let hh = self.height / 2.0 / s;

        // Planes in the form n·p + d >= 0; common space is planar so near/far
        // bracket z = 0.
        Some(vec![
            Plane::new([1.0, 0.0, 0.0], -(c.x - hw)),
            Plane::new([-1.0, 0.0, 0.0], c.x + hw),
            Plane::new([0.0, 1.0, 0.0], -(c.y - hh)),
            Plane::new([0.0, -1.0, 0.0], c.y + hh),
            Plane::new([0.0, 0.0, 1.0], 1.0),
            Plane::new([0.0, 0.0, -1.0], 1.0),
        ])
    }
}
