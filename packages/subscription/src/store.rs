//! Persistence seams for subscriptions and user contact addresses.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use radar_store::{StoreError, read_lock, write_lock};
use radar_subscription_models::Subscription;

/// Storage operations required by the subscription registry.
///
/// Implementations must enforce uniqueness of `(user_id,
/// neighborhood_name)`.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Inserts a new subscription.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the user is already subscribed
    /// to that neighborhood, or [`StoreError::Backend`] on failure.
    async fn insert(&self, subscription: &Subscription) -> Result<(), StoreError>;

    /// Overwrites the preference flags of the subscription with the same
    /// id. Returns `false` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn update(&self, subscription: &Subscription) -> Result<bool, StoreError>;

    /// Deletes a subscription. Returns `false` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Looks up a subscription by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn find_by_id(&self, id: &str) -> Result<Option<Subscription>, StoreError>;

    /// Looks up the subscription of a user to a neighborhood.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn find_by_user_and_neighborhood(
        &self,
        user_id: &str,
        neighborhood_name: &str,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Every subscription of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, StoreError>;

    /// Every subscription to a neighborhood, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn list_for_neighborhood(
        &self,
        neighborhood_name: &str,
    ) -> Result<Vec<Subscription>, StoreError>;
}

/// Maps users to the address notifications are delivered to.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Returns the user's contact address, if one is on file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn contact_address(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    /// Records or replaces the user's contact address.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn set_contact_address(&self, user_id: &str, address: &str) -> Result<(), StoreError>;
}

/// In-process [`SubscriptionStore`]. Keeps insertion order.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    records: RwLock<Vec<Subscription>>,
}

impl MemorySubscriptionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let mut records = write_lock(&self.records);

        if records.iter().any(|s| {
            s.id == subscription.id
                || (s.user_id == subscription.user_id
                    && s.neighborhood_name == subscription.neighborhood_name)
        }) {
            return Err(StoreError::Duplicate {
                message: format!(
                    "neighborhood_subscriptions ({}, {})",
                    subscription.user_id, subscription.neighborhood_name
                ),
            });
        }

        records.push(subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<bool, StoreError> {
        let mut records = write_lock(&self.records);

        Ok(records
            .iter_mut()
            .find(|s| s.id == subscription.id)
            .map(|existing| {
                existing.email_notifications = subscription.email_notifications;
                existing.push_notifications = subscription.push_notifications;
            })
            .is_some())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = write_lock(&self.records);
        let before = records.len();
        records.retain(|s| s.id != id);
        Ok(records.len() != before)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Subscription>, StoreError> {
        Ok(read_lock(&self.records).iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_user_and_neighborhood(
        &self,
        user_id: &str,
        neighborhood_name: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(read_lock(&self.records)
            .iter()
            .find(|s| s.user_id == user_id && s.neighborhood_name == neighborhood_name)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, StoreError> {
        // Reverse insertion order first so equal timestamps stay newest first.
        let mut found: Vec<Subscription> = read_lock(&self.records)
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_for_neighborhood(
        &self,
        neighborhood_name: &str,
    ) -> Result<Vec<Subscription>, StoreError> {
        Ok(read_lock(&self.records)
            .iter()
            .filter(|s| s.neighborhood_name == neighborhood_name)
            .cloned()
            .collect())
    }
}

/// In-process [`ContactDirectory`].
#[derive(Debug, Default)]
pub struct MemoryContactDirectory {
    addresses: RwLock<BTreeMap<String, String>>,
}

impl MemoryContactDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactDirectory for MemoryContactDirectory {
    async fn contact_address(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(read_lock(&self.addresses).get(user_id).cloned())
    }

    async fn set_contact_address(&self, user_id: &str, address: &str) -> Result<(), StoreError> {
        write_lock(&self.addresses).insert(user_id.to_string(), address.to_string());
        Ok(())
    }
}
