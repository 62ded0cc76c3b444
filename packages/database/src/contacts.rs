//! `SQLite`-backed [`ContactDirectory`] over the `users` table.

use std::sync::Arc;

use async_trait::async_trait;
use moosicbox_json_utils::database::ToValue as _;
use radar_store::StoreError;
use radar_subscription::ContactDirectory;
use switchy_database::{Database, DatabaseValue};

use crate::{conversion_error, store_error};

/// User email addresses in the `users` table.
#[derive(Clone)]
pub struct SqliteContactDirectory {
    db: Arc<dyn Database>,
}

impl SqliteContactDirectory {
    /// Creates a directory over an opened, migrated database.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContactDirectory for SqliteContactDirectory {
    async fn contact_address(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT email FROM users WHERE id = $1",
                &[DatabaseValue::String(user_id.to_string())],
            )
            .await
            .map_err(store_error)?;

        rows.first()
            .map(|row| {
                row.to_value::<String>("email")
                    .map_err(|e| conversion_error("email", e))
            })
            .transpose()
    }

    async fn set_contact_address(&self, user_id: &str, address: &str) -> Result<(), StoreError> {
        self.db
            .exec_raw_params(
                "INSERT INTO users (id, email) VALUES ($1, $2)
                 ON CONFLICT (id) DO UPDATE SET email = excluded.email",
                &[
                    DatabaseValue::String(user_id.to_string()),
                    DatabaseValue::String(address.to_string()),
                ],
            )
            .await
            .map_err(store_error)?;

        Ok(())
    }
}
