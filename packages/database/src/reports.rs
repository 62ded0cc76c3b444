//! `SQLite`-backed [`ReportStore`].

use std::sync::Arc;

use async_trait::async_trait;
use moosicbox_json_utils::database::ToValue as _;
use radar_report::ReportStore;
use radar_report_models::Report;
use radar_store::StoreError;
use switchy_database::{Database, DatabaseValue, Row};

use crate::neighborhoods::optional_string;
use crate::{conversion_error, format_timestamp, parse_timestamp, store_error};

const SELECT_COLUMNS: &str = "SELECT id, description, category, lat, lng, neighborhood_name,
        provincia, departamento, localidad, user_id, created_at
     FROM reports";

/// Reports in the `reports` table.
#[derive(Clone)]
pub struct SqliteReportStore {
    db: Arc<dyn Database>,
}

impl SqliteReportStore {
    /// Creates a store over an opened, migrated database.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn insert(&self, report: &Report) -> Result<(), StoreError> {
        self.db
            .exec_raw_params(
                "INSERT INTO reports (
                    id, description, category, lat, lng, neighborhood_name,
                    provincia, departamento, localidad, user_id, created_at
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                &[
                    DatabaseValue::String(report.id.clone()),
                    DatabaseValue::String(report.description.clone()),
                    optional_string(report.category.as_deref()),
                    DatabaseValue::Real64(report.lat),
                    DatabaseValue::Real64(report.lng),
                    optional_string(report.neighborhood_name.as_deref()),
                    optional_string(report.provincia.as_deref()),
                    optional_string(report.departamento.as_deref()),
                    optional_string(report.localidad.as_deref()),
                    optional_string(report.user_id.as_deref()),
                    DatabaseValue::String(format_timestamp(report.created_at)),
                ],
            )
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn update(&self, report: &Report) -> Result<bool, StoreError> {
        let updated = self
            .db
            .exec_raw_params(
                "UPDATE reports SET description = $1, category = $2 WHERE id = $3",
                &[
                    DatabaseValue::String(report.description.clone()),
                    optional_string(report.category.as_deref()),
                    DatabaseValue::String(report.id.clone()),
                ],
            )
            .await
            .map_err(store_error)?;

        Ok(updated > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let deleted = self
            .db
            .exec_raw_params(
                "DELETE FROM reports WHERE id = $1",
                &[DatabaseValue::String(id.to_string())],
            )
            .await
            .map_err(store_error)?;

        Ok(deleted > 0)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Report>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                &format!("{SELECT_COLUMNS} WHERE id = $1"),
                &[DatabaseValue::String(id.to_string())],
            )
            .await
            .map_err(store_error)?;

        rows.first().map(report_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Report>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                &format!("{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC"),
                &[],
            )
            .await
            .map_err(store_error)?;

        rows.iter().map(report_from_row).collect()
    }
}

fn report_from_row(row: &Row) -> Result<Report, StoreError> {
    let created_at: String = row
        .to_value("created_at")
        .map_err(|e| conversion_error("created_at", e))?;

    Ok(Report {
        id: row.to_value("id").map_err(|e| conversion_error("id", e))?,
        description: row
            .to_value("description")
            .map_err(|e| conversion_error("description", e))?,
        category: row.to_value("category").unwrap_or(None),
        lat: row.to_value("lat").map_err(|e| conversion_error("lat", e))?,
        lng: row.to_value("lng").map_err(|e| conversion_error("lng", e))?,
        neighborhood_name: row.to_value("neighborhood_name").unwrap_or(None),
        provincia: row.to_value("provincia").unwrap_or(None),
        departamento: row.to_value("departamento").unwrap_or(None),
        localidad: row.to_value("localidad").unwrap_or(None),
        user_id: row.to_value("user_id").unwrap_or(None),
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone as _, Utc};
    use radar_report::ReportStore as _;
    use radar_report_models::Report;

    use super::SqliteReportStore;
    use crate::test_support::TempDb;

    fn report(description: &str, minutes: i64) -> Report {
        Report {
            id: radar_store::new_id(),
            description: description.to_string(),
            category: Some("Robo".to_string()),
            lat: -26.185,
            lng: -58.175,
            neighborhood_name: Some("Centro".to_string()),
            provincia: Some("Formosa".to_string()),
            departamento: None,
            localidad: Some("Formosa".to_string()),
            user_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn round_trips_and_lists_newest_first() {
        let temp = TempDb::open().await;
        let store = SqliteReportStore::new(temp.db.clone());
        let older = report("older", 0);
        let newer = report("newer", 3);
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();

        assert_eq!(store.find_by_id(&older.id).await.unwrap(), Some(older));

        let listed: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.description)
            .collect();
        assert_eq!(listed, ["newer", "older"]);
    }

    #[tokio::test]
    async fn unassigned_report_keeps_null_columns() {
        let temp = TempDb::open().await;
        let store = SqliteReportStore::new(temp.db.clone());
        let mut r = report("lejos", 0);
        r.category = None;
        r.neighborhood_name = None;
        r.provincia = None;
        r.localidad = None;
        store.insert(&r).await.unwrap();

        assert_eq!(store.find_by_id(&r.id).await.unwrap(), Some(r));
    }

    #[tokio::test]
    async fn update_and_delete() {
        let temp = TempDb::open().await;
        let store = SqliteReportStore::new(temp.db.clone());
        let mut r = report("antes", 0);
        store.insert(&r).await.unwrap();

        r.description = "después".to_string();
        assert!(store.update(&r).await.unwrap());
        assert_eq!(
            store.find_by_id(&r.id).await.unwrap().unwrap().description,
            "después"
        );

        assert!(store.delete(&r.id).await.unwrap());
        assert_eq!(store.find_by_id(&r.id).await.unwrap(), None);
    }
}
