//! Coordinate to neighborhood resolution.
//!
//! Point lookups go through an R-tree of neighborhood bounding boxes and
//! then an exact ray-casting test. When several polygons overlap, the
//! first match in catalog order (name ascending) wins.

use std::sync::Arc;

use radar_geometry::GeoPoint;
use radar_neighborhood_models::{Neighborhood, NeighborhoodAssignment};
use rstar::{AABB, RTree, RTreeObject};

use crate::NeighborhoodError;
use crate::catalog::NeighborhoodCatalog;

/// Default radius for [`NeighborhoodResolver::resolve_nearby`], in km.
pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 10.0;

/// Default radius for [`NeighborhoodResolver::find_nearest_or_null`], in km.
pub const DEFAULT_MAX_RADIUS_KM: f64 = 1.0;

/// Bounding box of one catalog entry, keyed by its position in catalog
/// order.
struct IndexedBounds {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Immutable snapshot of the catalog prepared for point lookups.
pub struct CatalogIndex {
    neighborhoods: Vec<Neighborhood>,
    tree: RTree<IndexedBounds>,
}

impl CatalogIndex {
    /// Builds an index over `neighborhoods`, which must already be in
    /// catalog order.
    #[must_use]
    pub fn build(neighborhoods: Vec<Neighborhood>) -> Self {
        let entries = neighborhoods
            .iter()
            .enumerate()
            .map(|(position, n)| IndexedBounds {
                position,
                envelope: AABB::from_corners(
                    [n.geo_bounds.min_lng, n.geo_bounds.min_lat],
                    [n.geo_bounds.max_lng, n.geo_bounds.max_lat],
                ),
            })
            .collect();

        Self {
            neighborhoods,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed neighborhoods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighborhoods.len()
    }

    /// Returns `true` if the index holds no neighborhoods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighborhoods.is_empty()
    }

    /// First neighborhood in catalog order whose polygon contains `point`.
    #[must_use]
    pub fn containing(&self, point: GeoPoint) -> Option<&Neighborhood> {
        let query_env = AABB::from_point([point.lng, point.lat]);

        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .map(|entry| entry.position)
            .collect();
        candidates.sort_unstable();

        candidates
            .into_iter()
            .map(|position| &self.neighborhoods[position])
            .find(|n| n.contains(point))
    }

    /// Neighborhoods whose centroid is within `radius_km` of `point`,
    /// nearest first. Equal distances keep catalog order.
    #[must_use]
    pub fn within_radius(&self, point: GeoPoint, radius_km: f64) -> Vec<(&Neighborhood, f64)> {
        let mut nearby: Vec<(&Neighborhood, f64)> = self
            .neighborhoods
            .iter()
            .map(|n| (n, n.distance_to_center_km(point)))
            .filter(|(_, distance)| *distance <= radius_km)
            .collect();

        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
        nearby
    }
}

/// Resolves coordinates against the current catalog.
#[derive(Clone)]
pub struct NeighborhoodResolver {
    catalog: Arc<NeighborhoodCatalog>,
}

impl NeighborhoodResolver {
    /// Creates a resolver reading from `catalog`.
    #[must_use]
    pub const fn new(catalog: Arc<NeighborhoodCatalog>) -> Self {
        Self { catalog }
    }

    /// The catalog this resolver reads from.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<NeighborhoodCatalog> {
        &self.catalog
    }

    /// Returns the neighborhood whose polygon contains the point.
    ///
    /// # Errors
    ///
    /// Returns [`NeighborhoodError::Store`] if the catalog cannot be read.
    pub async fn resolve_by_point(
        &self,
        lat: f64,
        lng: f64,
    ) -> Result<Option<Neighborhood>, NeighborhoodError> {
        let index = self.catalog.index().await?;
        Ok(index.containing(GeoPoint::new(lat, lng)).cloned())
    }

    /// Returns every neighborhood whose centroid is within `radius_km` of
    /// the point, ordered by ascending distance.
    ///
    /// # Errors
    ///
    /// Returns [`NeighborhoodError::Store`] if the catalog cannot be read.
    pub async fn resolve_nearby(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<Vec<Neighborhood>, NeighborhoodError> {
        let index = self.catalog.index().await?;
        Ok(index
            .within_radius(GeoPoint::new(lat, lng), radius_km)
            .into_iter()
            .map(|(n, _)| n.clone())
            .collect())
    }

    /// Resolves a report location: exact polygon match first, otherwise
    /// the nearest centroid within `max_radius_km`, otherwise `None`.
    ///
    /// # Errors
    ///
    /// Returns [`NeighborhoodError::Store`] if the catalog cannot be read.
    pub async fn find_nearest_or_null(
        &self,
        lat: f64,
        lng: f64,
        max_radius_km: f64,
    ) -> Result<Option<NeighborhoodAssignment>, NeighborhoodError> {
        let index = self.catalog.index().await?;
        let point = GeoPoint::new(lat, lng);

        if let Some(n) = index.containing(point) {
            log::debug!("Point ({lat}, {lng}) is inside neighborhood \"{}\"", n.name);
            return Ok(Some(n.assignment()));
        }

        match index.within_radius(point, max_radius_km).first() {
            Some((n, distance)) => {
                log::debug!(
                    "Point ({lat}, {lng}) assigned to nearest neighborhood \"{}\" ({distance:.3} km)",
                    n.name
                );
                Ok(Some(n.assignment()))
            }
            None => {
                log::warn!("No neighborhood found for point ({lat}, {lng}) within {max_radius_km} km");
                Ok(None)
            }
        }
    }
}
