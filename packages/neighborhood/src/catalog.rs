//! The authoritative set of named neighborhood polygons.
//!
//! Every write validates the ring and recomputes the derived bounding box
//! and centroid before it reaches the store. Successful writes drop the
//! cached resolution index synchronously, so lookups never see a polygon
//! set older than the last completed write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use radar_geometry::{BoundingBox, GeoPoint, Position};
use radar_neighborhood_models::{Neighborhood, NeighborhoodUpdate, NewNeighborhood};
use radar_store::{StoreError, read_lock, write_lock};

use crate::NeighborhoodError;
use crate::resolver::CatalogIndex;
use crate::store::NeighborhoodStore;

/// Minimum number of ring vertices (including the closing vertex).
pub const MIN_RING_POINTS: usize = 3;

/// Neighborhood catalog backed by a [`NeighborhoodStore`].
pub struct NeighborhoodCatalog {
    store: Arc<dyn NeighborhoodStore>,
    index: RwLock<Option<Arc<CatalogIndex>>>,
    /// Bumped on every successful write; an index built from data read
    /// before the bump is never installed.
    generation: AtomicU64,
}

impl NeighborhoodCatalog {
    /// Creates a catalog over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn NeighborhoodStore>) -> Self {
        Self {
            store,
            index: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Creates a neighborhood.
    ///
    /// # Errors
    ///
    /// * [`NeighborhoodError::Conflict`] if the name is already used
    /// * [`NeighborhoodError::Validation`] if the name is blank or the
    ///   polygon is malformed
    /// * [`NeighborhoodError::Store`] if the store fails
    pub async fn create(&self, input: NewNeighborhood) -> Result<Neighborhood, NeighborhoodError> {
        validate_name(&input.name)?;

        if self.store.find_by_name(&input.name).await?.is_some() {
            return Err(NeighborhoodError::Conflict { name: input.name });
        }

        let (geo_bounds, center) = derive_geometry(&input.polygon)?;
        let now = Utc::now();

        let neighborhood = Neighborhood {
            id: radar_store::new_id(),
            name: input.name,
            polygon: input.polygon,
            provincia: input.provincia,
            departamento: input.departamento,
            localidad: input.localidad,
            geo_bounds,
            center,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert(&neighborhood)
            .await
            .map_err(|e| conflict_or_store(e, &neighborhood.name))?;
        self.invalidate();

        log::info!(
            "Neighborhood \"{}\" created with ID: {}",
            neighborhood.name,
            neighborhood.id
        );

        Ok(neighborhood)
    }

    /// Applies a partial update to an existing neighborhood.
    ///
    /// Fields left as `None` keep their current value. A new polygon is
    /// validated and its bounding box and centroid recomputed.
    ///
    /// # Errors
    ///
    /// * [`NeighborhoodError::NotFound`] if `id` is unknown
    /// * [`NeighborhoodError::Conflict`] if renaming onto another record's
    ///   name
    /// * [`NeighborhoodError::Validation`] if the new name or polygon is
    ///   malformed
    /// * [`NeighborhoodError::Store`] if the store fails
    pub async fn update(
        &self,
        id: &str,
        update: NeighborhoodUpdate,
    ) -> Result<Neighborhood, NeighborhoodError> {
        let mut neighborhood = self.find_by_id(id).await?;

        if let Some(name) = &update.name {
            validate_name(name)?;

            if *name != neighborhood.name {
                let taken = self
                    .store
                    .find_by_name(name)
                    .await?
                    .is_some_and(|existing| existing.id != neighborhood.id);
                if taken {
                    return Err(NeighborhoodError::Conflict { name: name.clone() });
                }
            }
        }

        if let Some(polygon) = update.polygon {
            let (geo_bounds, center) = derive_geometry(&polygon)?;
            neighborhood.polygon = polygon;
            neighborhood.geo_bounds = geo_bounds;
            neighborhood.center = center;
        }

        if let Some(name) = update.name {
            neighborhood.name = name;
        }
        if let Some(provincia) = update.provincia {
            neighborhood.provincia = Some(provincia);
        }
        if let Some(departamento) = update.departamento {
            neighborhood.departamento = Some(departamento);
        }
        if let Some(localidad) = update.localidad {
            neighborhood.localidad = Some(localidad);
        }
        if let Some(metadata) = update.metadata {
            neighborhood.metadata = Some(metadata);
        }
        neighborhood.updated_at = Utc::now();

        let found = self
            .store
            .update(&neighborhood)
            .await
            .map_err(|e| conflict_or_store(e, &neighborhood.name))?;
        if !found {
            return Err(NeighborhoodError::NotFound { id: id.to_string() });
        }
        self.invalidate();

        log::info!("Neighborhood \"{}\" updated", neighborhood.name);

        Ok(neighborhood)
    }

    /// Deletes a neighborhood. Reports and subscriptions that carry its
    /// name are left untouched.
    ///
    /// # Errors
    ///
    /// * [`NeighborhoodError::NotFound`] if `id` is unknown
    /// * [`NeighborhoodError::Store`] if the store fails
    pub async fn remove(&self, id: &str) -> Result<(), NeighborhoodError> {
        let neighborhood = self.find_by_id(id).await?;

        if !self.store.delete(id).await? {
            return Err(NeighborhoodError::NotFound { id: id.to_string() });
        }
        self.invalidate();

        log::info!("Neighborhood \"{}\" deleted", neighborhood.name);

        Ok(())
    }

    /// Fetches a neighborhood by id.
    ///
    /// # Errors
    ///
    /// * [`NeighborhoodError::NotFound`] if `id` is unknown
    /// * [`NeighborhoodError::Store`] if the store fails
    pub async fn find_by_id(&self, id: &str) -> Result<Neighborhood, NeighborhoodError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| NeighborhoodError::NotFound { id: id.to_string() })
    }

    /// Fetches a neighborhood by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`NeighborhoodError::Store`] if the store fails.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Neighborhood>, NeighborhoodError> {
        Ok(self.store.find_by_name(name).await?)
    }

    /// Lists every neighborhood ordered by name ascending.
    ///
    /// # Errors
    ///
    /// Returns [`NeighborhoodError::Store`] if the store fails.
    pub async fn list(&self) -> Result<Vec<Neighborhood>, NeighborhoodError> {
        Ok(self.store.list().await?)
    }

    /// Lists every neighborhood name ascending.
    ///
    /// # Errors
    ///
    /// Returns [`NeighborhoodError::Store`] if the store fails.
    pub async fn names(&self) -> Result<Vec<String>, NeighborhoodError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .map(|n| n.name)
            .collect())
    }

    /// Returns the resolution index, building it from the store if no
    /// current one is cached.
    pub(crate) async fn index(&self) -> Result<Arc<CatalogIndex>, NeighborhoodError> {
        let cached = read_lock(&self.index).clone();
        if let Some(index) = cached {
            return Ok(index);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let neighborhoods = self.store.list().await?;
        let index = Arc::new(CatalogIndex::build(neighborhoods));

        {
            let mut slot = write_lock(&self.index);
            if self.generation.load(Ordering::Acquire) == generation {
                *slot = Some(Arc::clone(&index));
            }
        }

        log::debug!("Built neighborhood index with {} entries", index.len());

        Ok(index)
    }

    fn invalidate(&self) {
        let mut slot = write_lock(&self.index);
        self.generation.fetch_add(1, Ordering::AcqRel);
        *slot = None;
    }
}

/// Checks that a ring can be stored as a neighborhood polygon.
///
/// Rules, in order: at least [`MIN_RING_POINTS`] vertices, every vertex
/// within `[-90, 90]` latitude and `[-180, 180]` longitude, and first
/// vertex exactly equal to the last.
///
/// # Errors
///
/// Returns [`NeighborhoodError::Validation`] naming the first violated
/// rule.
pub fn validate_polygon(polygon: &[Position]) -> Result<(), NeighborhoodError> {
    if polygon.len() < MIN_RING_POINTS {
        return Err(NeighborhoodError::Validation {
            message: format!("Polygon must have at least {MIN_RING_POINTS} coordinates"),
        });
    }

    for &[lng, lat] in polygon {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(NeighborhoodError::Validation {
                message: format!("Invalid latitude: {lat}. Must be between -90 and 90"),
            });
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(NeighborhoodError::Validation {
                message: format!("Invalid longitude: {lng}. Must be between -180 and 180"),
            });
        }
    }

    if !radar_geometry::is_closed(polygon) {
        return Err(NeighborhoodError::Validation {
            message: "Polygon must be closed (first point must equal last point)".to_string(),
        });
    }

    Ok(())
}

fn validate_name(name: &str) -> Result<(), NeighborhoodError> {
    if name.trim().is_empty() {
        return Err(NeighborhoodError::Validation {
            message: "Neighborhood name must not be empty".to_string(),
        });
    }
    Ok(())
}

fn derive_geometry(polygon: &[Position]) -> Result<(BoundingBox, GeoPoint), NeighborhoodError> {
    validate_polygon(polygon)?;

    let geo_bounds = radar_geometry::bounding_box(polygon);
    let center = radar_geometry::centroid(polygon);

    geo_bounds
        .zip(center)
        .ok_or_else(|| NeighborhoodError::Validation {
            message: "Polygon has no vertices".to_string(),
        })
}

fn conflict_or_store(e: StoreError, name: &str) -> NeighborhoodError {
    match e {
        StoreError::Duplicate { .. } => NeighborhoodError::Conflict {
            name: name.to_string(),
        },
        StoreError::Backend { .. } => NeighborhoodError::Store(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryNeighborhoodStore;

    fn catalog() -> NeighborhoodCatalog {
        NeighborhoodCatalog::new(Arc::new(MemoryNeighborhoodStore::new()))
    }

    fn square(lng: f64, lat: f64, half: f64) -> Vec<Position> {
        vec![
            [lng - half, lat - half],
            [lng + half, lat - half],
            [lng + half, lat + half],
            [lng - half, lat + half],
            [lng - half, lat - half],
        ]
    }

    fn new_neighborhood(name: &str, polygon: Vec<Position>) -> NewNeighborhood {
        NewNeighborhood {
            name: name.to_string(),
            polygon,
            ..NewNeighborhood::default()
        }
    }

    #[tokio::test]
    async fn create_computes_derived_geometry() {
        let catalog = catalog();
        let n = catalog
            .create(new_neighborhood("Centro", square(-58.177, -26.185, 0.001)))
            .await
            .unwrap();

        assert!((n.center.lat - -26.185).abs() < 1e-9);
        assert!((n.center.lng - -58.177).abs() < 1e-9);
        assert!((n.geo_bounds.min_lat - -26.186).abs() < 1e-9);
        assert!((n.geo_bounds.max_lng - -58.176).abs() < 1e-9);
        assert_eq!(n.polygon.first(), n.polygon.last());
        assert!(n.polygon.len() >= MIN_RING_POINTS);
    }

    #[tokio::test]
    async fn duplicate_name_conflicts_and_keeps_one_record() {
        let catalog = catalog();
        catalog
            .create(new_neighborhood("Centro", square(0.0, 0.0, 1.0)))
            .await
            .unwrap();

        let err = catalog
            .create(new_neighborhood("Centro", square(5.0, 5.0, 1.0)))
            .await
            .unwrap_err();

        assert!(matches!(err, NeighborhoodError::Conflict { ref name } if name == "Centro"));
        let all = catalog.list().await.unwrap();
        assert_eq!(all.iter().filter(|n| n.name == "Centro").count(), 1);
    }

    #[tokio::test]
    async fn rejects_short_ring() {
        let err = catalog()
            .create(new_neighborhood("X", vec![[0.0, 0.0], [0.0, 0.0]]))
            .await
            .unwrap_err();
        assert!(matches!(err, NeighborhoodError::Validation { .. }));
    }

    #[tokio::test]
    async fn rejects_unclosed_ring() {
        let err = catalog()
            .create(new_neighborhood(
                "X",
                vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            ))
            .await
            .unwrap_err();
        assert!(
            matches!(err, NeighborhoodError::Validation { ref message } if message.contains("closed"))
        );
    }

    #[tokio::test]
    async fn rejects_out_of_range_vertex() {
        let catalog = catalog();

        let err = catalog
            .create(new_neighborhood("Lat", square(0.0, 90.0, 1.0)))
            .await
            .unwrap_err();
        assert!(
            matches!(err, NeighborhoodError::Validation { ref message } if message.contains("latitude"))
        );

        let err = catalog
            .create(new_neighborhood("Lng", square(180.0, 0.0, 1.0)))
            .await
            .unwrap_err();
        assert!(
            matches!(err, NeighborhoodError::Validation { ref message } if message.contains("longitude"))
        );

        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_blank_name() {
        let err = catalog()
            .create(new_neighborhood("   ", square(0.0, 0.0, 1.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, NeighborhoodError::Validation { .. }));
    }

    #[tokio::test]
    async fn update_recomputes_geometry() {
        let catalog = catalog();
        let n = catalog
            .create(new_neighborhood("Centro", square(0.0, 0.0, 1.0)))
            .await
            .unwrap();

        let updated = catalog
            .update(
                &n.id,
                NeighborhoodUpdate {
                    polygon: Some(square(10.0, 20.0, 2.0)),
                    localidad: Some("Formosa".to_string()),
                    ..NeighborhoodUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Centro");
        assert!((updated.center.lng - 10.0).abs() < 1e-9);
        assert!((updated.center.lat - 20.0).abs() < 1e-9);
        assert!((updated.geo_bounds.max_lat - 22.0).abs() < 1e-9);
        assert_eq!(updated.localidad.as_deref(), Some("Formosa"));
        assert_eq!(catalog.find_by_id(&n.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn update_rejects_invalid_polygon_and_keeps_record() {
        let catalog = catalog();
        let n = catalog
            .create(new_neighborhood("Centro", square(0.0, 0.0, 1.0)))
            .await
            .unwrap();

        let err = catalog
            .update(
                &n.id,
                NeighborhoodUpdate {
                    polygon: Some(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]),
                    ..NeighborhoodUpdate::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, NeighborhoodError::Validation { .. }));
        assert_eq!(catalog.find_by_id(&n.id).await.unwrap(), n);
    }

    #[tokio::test]
    async fn rename_onto_existing_name_conflicts() {
        let catalog = catalog();
        catalog
            .create(new_neighborhood("Centro", square(0.0, 0.0, 1.0)))
            .await
            .unwrap();
        let other = catalog
            .create(new_neighborhood("San Martín", square(5.0, 5.0, 1.0)))
            .await
            .unwrap();

        let err = catalog
            .update(
                &other.id,
                NeighborhoodUpdate {
                    name: Some("Centro".to_string()),
                    ..NeighborhoodUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NeighborhoodError::Conflict { .. }));

        let same = catalog
            .update(
                &other.id,
                NeighborhoodUpdate {
                    name: Some("San Martín".to_string()),
                    ..NeighborhoodUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.name, "San Martín");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let catalog = catalog();

        assert!(matches!(
            catalog.find_by_id("missing").await,
            Err(NeighborhoodError::NotFound { .. })
        ));
        assert!(matches!(
            catalog
                .update("missing", NeighborhoodUpdate::default())
                .await,
            Err(NeighborhoodError::NotFound { .. })
        ));
        assert!(matches!(
            catalog.remove("missing").await,
            Err(NeighborhoodError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn remove_deletes_record() {
        let catalog = catalog();
        let n = catalog
            .create(new_neighborhood("Centro", square(0.0, 0.0, 1.0)))
            .await
            .unwrap();

        catalog.remove(&n.id).await.unwrap();

        assert!(catalog.find_by_name("Centro").await.unwrap().is_none());
        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_name_ascending() {
        let catalog = catalog();
        for name in ["Obrero", "Centro", "Independencia"] {
            catalog
                .create(new_neighborhood(name, square(0.0, 0.0, 1.0)))
                .await
                .unwrap();
        }

        assert_eq!(
            catalog.names().await.unwrap(),
            vec!["Centro", "Independencia", "Obrero"]
        );
    }

    #[tokio::test]
    async fn writes_invalidate_cached_index() {
        let catalog = catalog();
        assert_eq!(catalog.index().await.unwrap().len(), 0);

        catalog
            .create(new_neighborhood("Centro", square(0.0, 0.0, 1.0)))
            .await
            .unwrap();

        assert_eq!(catalog.index().await.unwrap().len(), 1);
    }
}
