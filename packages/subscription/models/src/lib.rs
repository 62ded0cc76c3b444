#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Subscription data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's opt-in to notifications for one neighborhood, keyed by the
/// neighborhood's name. At most one exists per `(user_id,
/// neighborhood_name)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Unique identifier.
    pub id: String,
    /// Subscribing user.
    pub user_id: String,
    /// Name of the neighborhood, not its id.
    pub neighborhood_name: String,
    /// Whether email notifications are wanted.
    pub email_notifications: bool,
    /// Whether push notifications are wanted.
    pub push_notifications: bool,
    /// When the subscription was first created.
    pub created_at: DateTime<Utc>,
}

/// Preference flags supplied on subscribe. `None` means "not specified".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPreferences {
    /// Email notification flag.
    #[serde(default)]
    pub email: Option<bool>,
    /// Push notification flag.
    #[serde(default)]
    pub push: Option<bool>,
}

impl SubscriptionPreferences {
    /// Applies the specified flags to `subscription`, leaving unspecified
    /// ones untouched.
    pub fn merge_into(self, subscription: &mut Subscription) {
        if let Some(email) = self.email {
            subscription.email_notifications = email;
        }
        if let Some(push) = self.push {
            subscription.push_notifications = push;
        }
    }
}

/// Someone to notify about a report in a neighborhood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    /// The subscribed user.
    pub user_id: String,
    /// Where to deliver the notification (an email address).
    pub contact_address: String,
}
