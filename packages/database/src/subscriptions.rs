//! `SQLite`-backed [`SubscriptionStore`].

use std::sync::Arc;

use async_trait::async_trait;
use moosicbox_json_utils::database::ToValue as _;
use radar_store::StoreError;
use radar_subscription::SubscriptionStore;
use radar_subscription_models::Subscription;
use switchy_database::{Database, DatabaseValue, Row};

use crate::{conversion_error, format_timestamp, parse_timestamp, store_error};

const SELECT_COLUMNS: &str = "SELECT id, user_id, neighborhood_name, email_notifications,
        push_notifications, created_at
     FROM neighborhood_subscriptions";

/// Subscriptions in the `neighborhood_subscriptions` table.
#[derive(Clone)]
pub struct SqliteSubscriptionStore {
    db: Arc<dyn Database>,
}

impl SqliteSubscriptionStore {
    /// Creates a store over an opened, migrated database.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    async fn query(&self, filter: &str, params: &[DatabaseValue]) -> Result<Vec<Subscription>, StoreError> {
        let rows = self
            .db
            .query_raw_params(&format!("{SELECT_COLUMNS} {filter}"), params)
            .await
            .map_err(store_error)?;

        rows.iter().map(subscription_from_row).collect()
    }
}

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> Result<(), StoreError> {
        self.db
            .exec_raw_params(
                "INSERT INTO neighborhood_subscriptions (
                    id, user_id, neighborhood_name, email_notifications,
                    push_notifications, created_at
                 ) VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    DatabaseValue::String(subscription.id.clone()),
                    DatabaseValue::String(subscription.user_id.clone()),
                    DatabaseValue::String(subscription.neighborhood_name.clone()),
                    flag(subscription.email_notifications),
                    flag(subscription.push_notifications),
                    DatabaseValue::String(format_timestamp(subscription.created_at)),
                ],
            )
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<bool, StoreError> {
        let updated = self
            .db
            .exec_raw_params(
                "UPDATE neighborhood_subscriptions
                 SET email_notifications = $1, push_notifications = $2
                 WHERE id = $3",
                &[
                    flag(subscription.email_notifications),
                    flag(subscription.push_notifications),
                    DatabaseValue::String(subscription.id.clone()),
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
                "DELETE FROM neighborhood_subscriptions WHERE id = $1",
                &[DatabaseValue::String(id.to_string())],
            )
            .await
            .map_err(store_error)?;

        Ok(deleted > 0)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .query("WHERE id = $1", &[DatabaseValue::String(id.to_string())])
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_user_and_neighborhood(
        &self,
        user_id: &str,
        neighborhood_name: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .query(
                "WHERE user_id = $1 AND neighborhood_name = $2",
                &[
                    DatabaseValue::String(user_id.to_string()),
                    DatabaseValue::String(neighborhood_name.to_string()),
                ],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, StoreError> {
        self.query(
            "WHERE user_id = $1 ORDER BY created_at DESC, rowid DESC",
            &[DatabaseValue::String(user_id.to_string())],
        )
        .await
    }

    async fn list_for_neighborhood(
        &self,
        neighborhood_name: &str,
    ) -> Result<Vec<Subscription>, StoreError> {
        self.query(
            "WHERE neighborhood_name = $1 ORDER BY created_at ASC, rowid ASC",
            &[DatabaseValue::String(neighborhood_name.to_string())],
        )
        .await
    }
}

fn flag(value: bool) -> DatabaseValue {
    DatabaseValue::Int64(i64::from(value))
}

/// Reads an `INTEGER` flag column (1 = true, 0 = false).
fn row_flag(row: &Row, column: &str) -> Result<bool, StoreError> {
    row.to_value::<i64>(column)
        .map(|v| v != 0)
        .map_err(|e| conversion_error(column, e))
}

fn subscription_from_row(row: &Row) -> Result<Subscription, StoreError> {
    let created_at: String = row
        .to_value("created_at")
        .map_err(|e| conversion_error("created_at", e))?;

    Ok(Subscription {
        id: row.to_value("id").map_err(|e| conversion_error("id", e))?,
        user_id: row
            .to_value("user_id")
            .map_err(|e| conversion_error("user_id", e))?,
        neighborhood_name: row
            .to_value("neighborhood_name")
            .map_err(|e| conversion_error("neighborhood_name", e))?,
        email_notifications: row_flag(row, "email_notifications")?,
        push_notifications: row_flag(row, "push_notifications")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}
