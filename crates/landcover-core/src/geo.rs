//! Geographic alignment of a raster on the map.
//!
//! The raster's native coordinates are used directly as latitude/longitude;
//! no reprojection happens here.
use serde::{Deserialize, Serialize};

/// A point in map coordinates. All coordinate math uses f64.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned geographic box with `south_west <= north_east` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl GeoBounds {
    /// Build bounds from two opposite corners given in any order.
    pub fn from_corners(a: LatLng, b: LatLng) -> Self {
        Self {
            south_west: LatLng::new(a.lat.min(b.lat), a.lng.min(b.lng)),
            north_east: LatLng::new(a.lat.max(b.lat), a.lng.max(b.lng)),
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn contains_point(&self, p: LatLng) -> bool {
        p.lat >= self.south_west.lat
            && p.lat <= self.north_east.lat
            && p.lng >= self.south_west.lng
            && p.lng <= self.north_east.lng
    }

    /// True if `other` lies entirely inside `self` (edges inclusive).
    pub fn contains(&self, other: &GeoBounds) -> bool {
        self.contains_point(other.south_west) && self.contains_point(other.north_east)
    }

    pub fn intersects(&self, other: &GeoBounds) -> bool {
        !(other.north_east.lat < self.south_west.lat
            || other.south_west.lat > self.north_east.lat
            || other.north_east.lng < self.south_west.lng
            || other.south_west.lng > self.north_east.lng)
    }
}

/// Geographic extent of a raster whose top-left corner sits at `origin`
/// (`x` = lon-like, `y` = lat-like).
///
/// `resolution` is expected as positive magnitudes; the signs are still
/// tolerated because the corners are normalized afterwards.
pub fn raster_bounds(origin: (f64, f64), resolution: (f64, f64), width: usize, height: usize) -> GeoBounds {
    let (origin_x, origin_y) = origin;
    let (res_x, res_y) = resolution;

    let top_left = LatLng::new(origin_y, origin_x);
    let bottom_right = LatLng::new(
        origin_y - height as f64 * res_y,
        origin_x + width as f64 * res_x,
    );
    GeoBounds::from_corners(top_left, bottom_right)
}
