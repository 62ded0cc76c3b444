//! `SQLite`-backed [`NeighborhoodStore`].
//!
//! The ring is stored as a JSON array of `[lng, lat]` pairs and the
//! metadata as a JSON object; the derived bounding box and centroid get
//! their own columns.

use std::sync::Arc;

use async_trait::async_trait;
use moosicbox_json_utils::database::ToValue as _;
use radar_geometry::{BoundingBox, GeoPoint, Position};
use radar_neighborhood::NeighborhoodStore;
use radar_neighborhood_models::{Neighborhood, NeighborhoodMetadata};
use radar_store::StoreError;
use switchy_database::{Database, DatabaseValue, Row};

use crate::{conversion_error, format_timestamp, parse_timestamp, store_error};

const SELECT_COLUMNS: &str = "SELECT id, name, polygon, provincia, departamento, localidad,
        min_lat, max_lat, min_lng, max_lng, center_lat, center_lng,
        metadata, created_at, updated_at
     FROM neighborhoods";

/// Neighborhood records in the `neighborhoods` table.
#[derive(Clone)]
pub struct SqliteNeighborhoodStore {
    db: Arc<dyn Database>,
}

impl SqliteNeighborhoodStore {
    /// Creates a store over an opened, migrated database.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Neighborhood>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                &format!("{SELECT_COLUMNS} WHERE {column} = $1"),
                &[DatabaseValue::String(value.to_string())],
            )
            .await
            .map_err(store_error)?;

        rows.first().map(neighborhood_from_row).transpose()
    }
}

#[async_trait]
impl NeighborhoodStore for SqliteNeighborhoodStore {
    async fn insert(&self, neighborhood: &Neighborhood) -> Result<(), StoreError> {
        let mut params = vec![DatabaseValue::String(neighborhood.id.clone())];
        params.extend(row_values(neighborhood)?);
        params.push(DatabaseValue::String(format_timestamp(
            neighborhood.created_at,
        )));

        self.db
            .exec_raw_params(
                "INSERT INTO neighborhoods (
                    id, name, polygon, provincia, departamento, localidad,
                    min_lat, max_lat, min_lng, max_lng, center_lat, center_lng,
                    metadata, updated_at, created_at
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
                &params,
            )
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn update(&self, neighborhood: &Neighborhood) -> Result<bool, StoreError> {
        let mut params = row_values(neighborhood)?;
        params.push(DatabaseValue::String(neighborhood.id.clone()));

        let updated = self
            .db
            .exec_raw_params(
                "UPDATE neighborhoods SET
                    name = $1, polygon = $2, provincia = $3, departamento = $4,
                    localidad = $5, min_lat = $6, max_lat = $7, min_lng = $8,
                    max_lng = $9, center_lat = $10, center_lng = $11,
                    metadata = $12, updated_at = $13
                 WHERE id = $14",
                &params,
            )
            .await
            .map_err(store_error)?;

        Ok(updated > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let deleted = self
            .db
            .exec_raw_params(
                "DELETE FROM neighborhoods WHERE id = $1",
                &[DatabaseValue::String(id.to_string())],
            )
            .await
            .map_err(store_error)?;

        Ok(deleted > 0)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Neighborhood>, StoreError> {
        self.find_one("id", id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Neighborhood>, StoreError> {
        self.find_one("name", name).await
    }

    async fn list(&self) -> Result<Vec<Neighborhood>, StoreError> {
        let rows = self
            .db
            .query_raw_params(&format!("{SELECT_COLUMNS} ORDER BY name ASC"), &[])
            .await
            .map_err(store_error)?;

        rows.iter().map(neighborhood_from_row).collect()
    }
}

/// Column values shared by insert and update, from `name` through
/// `updated_at`.
fn row_values(n: &Neighborhood) -> Result<Vec<DatabaseValue>, StoreError> {
    let polygon = serde_json::to_string(&n.polygon).map_err(store_error)?;
    let metadata = n
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(store_error)?;

    Ok(vec![
        DatabaseValue::String(n.name.clone()),
        DatabaseValue::String(polygon),
        optional_string(n.provincia.as_deref()),
        optional_string(n.departamento.as_deref()),
        optional_string(n.localidad.as_deref()),
        DatabaseValue::Real64(n.geo_bounds.min_lat),
        DatabaseValue::Real64(n.geo_bounds.max_lat),
        DatabaseValue::Real64(n.geo_bounds.min_lng),
        DatabaseValue::Real64(n.geo_bounds.max_lng),
        DatabaseValue::Real64(n.center.lat),
        DatabaseValue::Real64(n.center.lng),
        metadata.map_or(DatabaseValue::Null, DatabaseValue::String),
        DatabaseValue::String(format_timestamp(n.updated_at)),
    ])
}

pub(crate) fn optional_string(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.to_string()))
}

fn neighborhood_from_row(row: &Row) -> Result<Neighborhood, StoreError> {
    let id: String = row.to_value("id").map_err(|e| conversion_error("id", e))?;
    let name: String = row.to_value("name").map_err(|e| conversion_error("name", e))?;

    let polygon_json: String = row
        .to_value("polygon")
        .map_err(|e| conversion_error("polygon", e))?;
    let polygon: Vec<Position> =
        serde_json::from_str(&polygon_json).map_err(|e| conversion_error("polygon", e))?;

    let metadata_json: Option<String> = row.to_value("metadata").unwrap_or(None);
    let metadata: Option<NeighborhoodMetadata> = metadata_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| conversion_error("metadata", e))?;

    let real = |column: &str| -> Result<f64, StoreError> {
        row.to_value(column).map_err(|e| conversion_error(column, e))
    };

    let created_at: String = row
        .to_value("created_at")
        .map_err(|e| conversion_error("created_at", e))?;
    let updated_at: String = row
        .to_value("updated_at")
        .map_err(|e| conversion_error("updated_at", e))?;

    Ok(Neighborhood {
        id,
        name,
        polygon,
        provincia: row.to_value("provincia").unwrap_or(None),
        departamento: row.to_value("departamento").unwrap_or(None),
        localidad: row.to_value("localidad").unwrap_or(None),
        geo_bounds: BoundingBox {
            min_lat: real("min_lat")?,
            max_lat: real("max_lat")?,
            min_lng: real("min_lng")?,
            max_lng: real("max_lng")?,
        },
        center: GeoPoint::new(real("center_lat")?, real("center_lng")?),
        metadata,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone as _, Utc};
    use radar_neighborhood::{NeighborhoodCatalog, NeighborhoodResolver, NeighborhoodStore as _};
    use radar_neighborhood_models::{Neighborhood, NeighborhoodMetadata, NewNeighborhood};
    use radar_store::StoreError;

    use super::SqliteNeighborhoodStore;
    use crate::test_support::TempDb;

    fn square(name: &str, lng: f64, lat: f64) -> Neighborhood {
        let polygon = vec![
            [lng, lat],
            [lng + 0.01, lat],
            [lng + 0.01, lat + 0.01],
            [lng, lat + 0.01],
            [lng, lat],
        ];
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Neighborhood {
            id: radar_store::new_id(),
            name: name.to_string(),
            geo_bounds: radar_geometry::bounding_box(&polygon).unwrap(),
            center: radar_geometry::centroid(&polygon).unwrap(),
            polygon,
            provincia: Some("Formosa".to_string()),
            departamento: None,
            localidad: Some("Formosa".to_string()),
            metadata: Some(NeighborhoodMetadata {
                population: Some(1200),
                ..NeighborhoodMetadata::default()
            }),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn round_trips_rows() {
        let temp = TempDb::open().await;
        let store = SqliteNeighborhoodStore::new(temp.db.clone());
        let centro = square("Centro", -58.18, -26.19);

        store.insert(&centro).await.unwrap();

        assert_eq!(store.find_by_name("Centro").await.unwrap(), Some(centro.clone()));
        assert_eq!(store.find_by_id(&centro.id).await.unwrap(), Some(centro));
        assert_eq!(store.find_by_name("Nowhere").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_name_is_reported() {
        let temp = TempDb::open().await;
        let store = SqliteNeighborhoodStore::new(temp.db.clone());

        store.insert(&square("Centro", -58.18, -26.19)).await.unwrap();
        let err = store
            .insert(&square("Centro", -58.20, -26.20))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn lists_by_name_and_applies_writes() {
        let temp = TempDb::open().await;
        let store = SqliteNeighborhoodStore::new(temp.db.clone());
        let mut b = square("San Miguel", -58.20, -26.20);
        store.insert(&b).await.unwrap();
        store.insert(&square("Centro", -58.18, -26.19)).await.unwrap();

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|n| n.name).collect();
        assert_eq!(names, ["Centro", "San Miguel"]);

        b.localidad = None;
        assert!(store.update(&b).await.unwrap());
        assert_eq!(store.find_by_id(&b.id).await.unwrap().unwrap().localidad, None);

        assert!(store.delete(&b.id).await.unwrap());
        assert!(!store.delete(&b.id).await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn catalog_resolves_over_sqlite() {
        let temp = TempDb::open().await;
        let catalog = Arc::new(NeighborhoodCatalog::new(Arc::new(
            SqliteNeighborhoodStore::new(temp.db.clone()),
        )));
        catalog
            .create(NewNeighborhood {
                name: "Centro".to_string(),
                polygon: square("Centro", -58.18, -26.19).polygon,
                ..NewNeighborhood::default()
            })
            .await
            .unwrap();

        let resolver = NeighborhoodResolver::new(catalog);
        let hit = resolver
            .resolve_by_point(-26.185, -58.175)
            .await
            .unwrap();

        assert_eq!(hit.map(|n| n.name).as_deref(), Some("Centro"));
    }
}
