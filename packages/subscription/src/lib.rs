#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood subscriptions.
//!
//! Users subscribe to neighborhoods by name. The [`SubscriptionRegistry`]
//! keeps at most one subscription per user and neighborhood, merging
//! preference changes into the existing row, and answers "who should be
//! told about a report here" for the notification dispatcher.

pub mod store;

use std::sync::Arc;

use chrono::Utc;
use radar_neighborhood::{NeighborhoodCatalog, NeighborhoodError};
use radar_store::StoreError;
use radar_subscription_models::{Subscriber, Subscription, SubscriptionPreferences};
use thiserror::Error;

pub use store::{
    ContactDirectory, MemoryContactDirectory, MemorySubscriptionStore, SubscriptionStore,
};

/// Errors that can occur during subscription operations.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The request refers to something that does not exist or is malformed.
    #[error("Validation error: {message}")]
    Validation {
        /// Which rule was violated.
        message: String,
    },

    /// No subscription with this id belongs to the user.
    #[error("Subscription with ID \"{id}\" not found")]
    NotFound {
        /// The unknown id.
        id: String,
    },

    /// The subscription store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The neighborhood catalog failed.
    #[error(transparent)]
    Neighborhood(#[from] NeighborhoodError),
}

/// Per-user neighborhood subscriptions.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    catalog: Arc<NeighborhoodCatalog>,
    store: Arc<dyn SubscriptionStore>,
    contacts: Arc<dyn ContactDirectory>,
}

impl SubscriptionRegistry {
    /// Creates a registry that checks names against `catalog`.
    #[must_use]
    pub fn new(
        catalog: Arc<NeighborhoodCatalog>,
        store: Arc<dyn SubscriptionStore>,
        contacts: Arc<dyn ContactDirectory>,
    ) -> Self {
        Self {
            catalog,
            store,
            contacts,
        }
    }

    /// The contact directory used to address subscribers.
    #[must_use]
    pub fn contacts(&self) -> &Arc<dyn ContactDirectory> {
        &self.contacts
    }

    /// Subscribes a user to a neighborhood, or updates the preferences of
    /// an existing subscription.
    ///
    /// A new subscription defaults unspecified flags to `true`. On an
    /// existing one, unspecified flags keep their current value.
    ///
    /// # Errors
    ///
    /// * [`SubscriptionError::Validation`] if no neighborhood has that name
    /// * [`SubscriptionError::Store`] or [`SubscriptionError::Neighborhood`]
    ///   if a backend fails
    pub async fn subscribe(
        &self,
        user_id: &str,
        neighborhood_name: &str,
        preferences: SubscriptionPreferences,
    ) -> Result<Subscription, SubscriptionError> {
        if self.catalog.find_by_name(neighborhood_name).await?.is_none() {
            return Err(SubscriptionError::Validation {
                message: format!("neighborhood \"{neighborhood_name}\" does not exist"),
            });
        }

        if let Some(existing) = self.merge_existing(user_id, neighborhood_name, preferences).await? {
            return Ok(existing);
        }

        let subscription = Subscription {
            id: radar_store::new_id(),
            user_id: user_id.to_string(),
            neighborhood_name: neighborhood_name.to_string(),
            email_notifications: preferences.email.unwrap_or(true),
            push_notifications: preferences.push.unwrap_or(true),
            created_at: Utc::now(),
        };

        match self.store.insert(&subscription).await {
            Ok(()) => {
                log::info!("User {user_id} subscribed to neighborhood \"{neighborhood_name}\"");
                Ok(subscription)
            }
            // Lost a race with a concurrent subscribe for the same pair.
            Err(StoreError::Duplicate { .. }) => self
                .merge_existing(user_id, neighborhood_name, preferences)
                .await?
                .ok_or_else(|| SubscriptionError::NotFound {
                    id: subscription.id,
                }),
            Err(e) => Err(e.into()),
        }
    }

    async fn merge_existing(
        &self,
        user_id: &str,
        neighborhood_name: &str,
        preferences: SubscriptionPreferences,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        let Some(mut existing) = self
            .store
            .find_by_user_and_neighborhood(user_id, neighborhood_name)
            .await?
        else {
            return Ok(None);
        };

        preferences.merge_into(&mut existing);

        if !self.store.update(&existing).await? {
            return Err(SubscriptionError::NotFound { id: existing.id });
        }

        log::debug!(
            "Updated preferences of user {user_id} for \"{neighborhood_name}\": email={}, push={}",
            existing.email_notifications,
            existing.push_notifications
        );

        Ok(Some(existing))
    }

    /// Every subscription of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Store`] if the store fails.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, SubscriptionError> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    /// Deletes one of the user's subscriptions.
    ///
    /// # Errors
    ///
    /// * [`SubscriptionError::NotFound`] if the subscription does not exist
    ///   or belongs to a different user
    /// * [`SubscriptionError::Store`] if the store fails
    pub async fn unsubscribe(
        &self,
        user_id: &str,
        subscription_id: &str,
    ) -> Result<(), SubscriptionError> {
        let owned = self
            .store
            .find_by_id(subscription_id)
            .await?
            .filter(|s| s.user_id == user_id);

        let Some(subscription) = owned else {
            return Err(SubscriptionError::NotFound {
                id: subscription_id.to_string(),
            });
        };

        if !self.store.delete(&subscription.id).await? {
            return Err(SubscriptionError::NotFound {
                id: subscription_id.to_string(),
            });
        }

        log::info!(
            "User {user_id} unsubscribed from neighborhood \"{}\"",
            subscription.neighborhood_name
        );

        Ok(())
    }

    /// Subscribers of a neighborhood together with their contact address.
    ///
    /// With `require_email` set, only subscriptions with email
    /// notifications enabled are returned. Users with no contact address
    /// on file are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Store`] if a store fails.
    pub async fn list_subscribers_of(
        &self,
        neighborhood_name: &str,
        require_email: bool,
    ) -> Result<Vec<Subscriber>, SubscriptionError> {
        let subscriptions = self.store.list_for_neighborhood(neighborhood_name).await?;
        let mut subscribers = Vec::with_capacity(subscriptions.len());

        for subscription in subscriptions {
            if require_email && !subscription.email_notifications {
                continue;
            }

            match self.contacts.contact_address(&subscription.user_id).await? {
                Some(contact_address) => subscribers.push(Subscriber {
                    user_id: subscription.user_id,
                    contact_address,
                }),
                None => log::warn!(
                    "User {} is subscribed to \"{neighborhood_name}\" but has no contact address",
                    subscription.user_id
                ),
            }
        }

        Ok(subscribers)
    }
}
