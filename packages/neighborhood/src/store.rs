//! Persistence seam for neighborhood records.
//!
//! The catalog only needs single-record atomic writes plus a unique
//! constraint on the name; any backend that offers that can implement
//! [`NeighborhoodStore`]. [`MemoryNeighborhoodStore`] keeps everything in
//! process and is used by tests and dry runs.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use radar_neighborhood_models::Neighborhood;
use radar_store::{StoreError, read_lock, write_lock};

/// Storage operations required by the neighborhood catalog.
#[async_trait]
pub trait NeighborhoodStore: Send + Sync {
    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the id or name is taken, or
    /// [`StoreError::Backend`] if the backend fails.
    async fn insert(&self, neighborhood: &Neighborhood) -> Result<(), StoreError>;

    /// Replaces the record with the same id. Returns `false` if no such
    /// record exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the new name is taken by a
    /// different record, or [`StoreError::Backend`] if the backend fails.
    async fn update(&self, neighborhood: &Neighborhood) -> Result<bool, StoreError>;

    /// Deletes a record by id. Returns `false` if no such record exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Looks up a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn find_by_id(&self, id: &str) -> Result<Option<Neighborhood>, StoreError>;

    /// Looks up a record by its exact name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn find_by_name(&self, name: &str) -> Result<Option<Neighborhood>, StoreError>;

    /// Returns every record ordered by name ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn list(&self) -> Result<Vec<Neighborhood>, StoreError>;
}

/// In-process [`NeighborhoodStore`].
#[derive(Debug, Default)]
pub struct MemoryNeighborhoodStore {
    records: RwLock<BTreeMap<String, Neighborhood>>,
}

impl MemoryNeighborhoodStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NeighborhoodStore for MemoryNeighborhoodStore {
    async fn insert(&self, neighborhood: &Neighborhood) -> Result<(), StoreError> {
        let mut records = write_lock(&self.records);

        if records.contains_key(&neighborhood.id) {
            return Err(StoreError::Duplicate {
                message: format!("neighborhoods.id = {}", neighborhood.id),
            });
        }
        if records.values().any(|n| n.name == neighborhood.name) {
            return Err(StoreError::Duplicate {
                message: format!("neighborhoods.name = {}", neighborhood.name),
            });
        }

        records.insert(neighborhood.id.clone(), neighborhood.clone());
        Ok(())
    }

    async fn update(&self, neighborhood: &Neighborhood) -> Result<bool, StoreError> {
        let mut records = write_lock(&self.records);

        if records
            .values()
            .any(|n| n.name == neighborhood.name && n.id != neighborhood.id)
        {
            return Err(StoreError::Duplicate {
                message: format!("neighborhoods.name = {}", neighborhood.name),
            });
        }

        match records.get_mut(&neighborhood.id) {
            Some(existing) => {
                *existing = neighborhood.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(write_lock(&self.records).remove(id).is_some())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Neighborhood>, StoreError> {
        Ok(read_lock(&self.records).get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Neighborhood>, StoreError> {
        Ok(read_lock(&self.records)
            .values()
            .find(|n| n.name == name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Neighborhood>, StoreError> {
        let mut all: Vec<Neighborhood> = read_lock(&self.records).values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}
