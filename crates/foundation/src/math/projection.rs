//! Web Mercator "common space".
//!
//! Every source (tiles with their own local frames, in-memory GeoJSON) is brought
//! into this single linear space before any visibility test. The world is a
//! `WORLD_SIZE` square with the origin at the north-west corner and y growing
//! southward, which lines up with ZXY tile indices.

use super::Vec3;

pub const WORLD_SIZE: f64 = 512.0;
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

pub fn lng_lat_to_common(lng_lat: [f64; 2]) -> Vec3 {
    let [lng, lat] = lng_lat;
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

    let x = (lng + 180.0) / 360.0 * WORLD_SIZE;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * WORLD_SIZE;
    Vec3::new(x, y, 0.0)
}

pub fn common_to_lng_lat(p: Vec3) -> [f64; 2] {
    let lng = p.x / WORLD_SIZE * 360.0 - 180.0;
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * p.y / WORLD_SIZE;
    let lat = n.sinh().atan().to_degrees();
    [lng, lat]
}

/// Common-space size of one tile at zoom `z`.
pub fn tile_size_at_zoom(z: u8) -> f64 {
    WORLD_SIZE / 2f64.powi(i32::from(z))
}
