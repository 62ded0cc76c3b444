#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Polygon geometry kernel for neighborhood resolution.
//!
//! Pure, deterministic functions over rings of `[lng, lat]` positions:
//! ray-casting containment, axis-aligned bounding boxes, vertex-mean
//! centroids, and great-circle (Haversine) distance. Nothing here
//! allocates beyond its return value or touches any I/O.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for all distance calculations, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A single ring vertex as `[longitude, latitude]` (`GeoJSON` order).
pub type Position = [f64; 2];

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl GeoPoint {
    /// Creates a point from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Creates a point from a `[lng, lat]` ring position.
    #[must_use]
    pub const fn from_position(position: Position) -> Self {
        Self {
            lat: position[1],
            lng: position[0],
        }
    }

    /// Returns `true` when latitude is within `[-90, 90]` and longitude
    /// within `[-180, 180]`. `NaN` components are never in range.
    #[must_use]
    pub fn is_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Axis-aligned latitude/longitude envelope of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Western edge.
    pub min_lng: f64,
    /// Eastern edge.
    pub max_lng: f64,
}

impl BoundingBox {
    /// Returns `true` if the point lies inside or on the edge of the box.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

/// Ray-casting point-in-polygon test.
///
/// Walks every edge `(v[j], v[i])` of the ring and toggles the result when
/// a horizontal ray from the point crosses it. An edge only counts when
/// the point's latitude is strictly on one side of exactly one endpoint,
/// so horizontal edges never register a crossing.
///
/// Points exactly on the boundary may land on either side; callers must
/// not rely on boundary behavior.
#[must_use]
pub fn point_in_polygon(point: GeoPoint, ring: &[Position]) -> bool {
    let mut inside = false;

    if ring.is_empty() {
        return inside;
    }

    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];

        let crosses = (yi > point.lat) != (yj > point.lat)
            && point.lng < (xj - xi) * (point.lat - yi) / (yj - yi) + xi;

        if crosses {
            inside = !inside;
        }

        j = i;
    }

    inside
}

/// Computes the bounding box over every vertex of the ring.
///
/// Returns `None` for an empty ring.
#[must_use]
pub fn bounding_box(ring: &[Position]) -> Option<BoundingBox> {
    let (&[first_lng, first_lat], rest) = ring.split_first()?;

    let mut bbox = BoundingBox {
        min_lat: first_lat,
        max_lat: first_lat,
        min_lng: first_lng,
        max_lng: first_lng,
    };

    for &[lng, lat] in rest {
        bbox.min_lat = bbox.min_lat.min(lat);
        bbox.max_lat = bbox.max_lat.max(lat);
        bbox.min_lng = bbox.min_lng.min(lng);
        bbox.max_lng = bbox.max_lng.max(lng);
    }

    Some(bbox)
}

/// Arithmetic mean of the ring's distinct vertices.
///
/// The closing vertex of a closed ring (last == first) is excluded so the
/// first vertex is not counted twice. Returns `None` for an empty ring.
#[must_use]
pub fn centroid(ring: &[Position]) -> Option<GeoPoint> {
    let vertices = if is_closed(ring) && ring.len() > 1 {
        &ring[..ring.len() - 1]
    } else {
        ring
    };

    if vertices.is_empty() {
        return None;
    }

    let (sum_lng, sum_lat) = vertices
        .iter()
        .fold((0.0, 0.0), |(lng_acc, lat_acc), &[lng, lat]| {
            (lng_acc + lng, lat_acc + lat)
        });

    #[allow(clippy::cast_precision_loss)]
    let count = vertices.len() as f64;

    Some(GeoPoint {
        lat: sum_lat / count,
        lng: sum_lng / count,
    })
}

/// Returns `true` if the ring is non-empty and its first and last
/// vertices are exactly equal.
#[must_use]
pub fn is_closed(ring: &[Position]) -> bool {
    match (ring.first(), ring.last()) {
        #[allow(clippy::float_cmp)]
        (Some(first), Some(last)) => first[0] == last[0] && first[1] == last[1],
        _ => false,
    }
}

/// Great-circle distance between two points in kilometers, on a sphere of
/// radius [`EARTH_RADIUS_KM`].
#[must_use]
pub fn haversine_distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}
