#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report notifications.
//!
//! When a report lands in a neighborhood, the [`dispatcher::Dispatcher`]
//! looks up every subscriber with email notifications enabled and sends
//! each one a [`ReportNotification`] through a [`NotificationSender`].
//! Sends run concurrently and fail independently; dispatch itself never
//! fails, it only reports how many sends went through.

pub mod dispatcher;
pub mod senders;
pub mod template;

use chrono::{DateTime, Utc};
use radar_report_models::Report;
use serde::Serialize;
use thiserror::Error;

pub use dispatcher::{DispatchTally, Dispatcher};

/// Locality shown when a report carries none.
pub const DEFAULT_LOCALITY: &str = "Formosa";

/// Category shown when a report carries none.
pub const DEFAULT_CATEGORY: &str = "General";

/// Base URL of the public site, used for links in notifications.
pub const DEFAULT_SITE_URL: &str = "http://localhost:5173";

/// Errors from a single notification send.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// HTTP request to the delivery service failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The delivery service answered with something unusable.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The delivery service refused the message.
    #[error("Delivery rejected (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status code returned.
        status: u16,
        /// Reason given by the service.
        message: String,
    },

    /// The sender is not configured.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

/// The report fields a subscriber is told about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportNotification {
    /// Id of the report.
    pub report_id: String,
    /// Neighborhood the report was resolved to.
    pub neighborhood: String,
    /// Locality, defaulted when the report has none.
    pub localidad: String,
    /// What happened.
    pub description: String,
    /// Category, defaulted when the report has none.
    pub category: String,
    /// Latitude of the incident.
    pub lat: f64,
    /// Longitude of the incident.
    pub lng: f64,
    /// When the report was filed.
    pub created_at: DateTime<Utc>,
}

impl ReportNotification {
    /// Builds the notification for a report. Returns `None` if the report
    /// was not resolved to a neighborhood.
    #[must_use]
    pub fn from_report(report: &Report, default_locality: &str) -> Option<Self> {
        let neighborhood = report.neighborhood_name.clone()?;

        Some(Self {
            report_id: report.id.clone(),
            neighborhood,
            localidad: report
                .localidad
                .clone()
                .unwrap_or_else(|| default_locality.to_string()),
            description: report.description.clone(),
            category: report
                .category
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            lat: report.lat,
            lng: report.lng,
            created_at: report.created_at,
        })
    }
}

/// Delivers one notification to one contact address.
#[async_trait::async_trait]
pub trait NotificationSender: Send + Sync {
    /// Sends `notification` to `contact_address`.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] if delivery fails for any reason.
    async fn send(
        &self,
        contact_address: &str,
        notification: &ReportNotification,
    ) -> Result<(), NotificationError>;
}

/// Notification settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    /// Base URL for report and settings links (`RADAR_SITE_URL`).
    pub site_url: String,
    /// Locality used when a report has none (`RADAR_DEFAULT_LOCALITY`).
    pub default_locality: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            default_locality: DEFAULT_LOCALITY.to_string(),
        }
    }
}

impl NotificationSettings {
    /// Reads `RADAR_SITE_URL` and `RADAR_DEFAULT_LOCALITY`, falling back to
    /// the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            site_url: std::env::var("RADAR_SITE_URL")
                .unwrap_or_else(|_| DEFAULT_SITE_URL.to_string()),
            default_locality: std::env::var("RADAR_DEFAULT_LOCALITY")
                .unwrap_or_else(|_| DEFAULT_LOCALITY.to_string()),
        }
    }
}

/// Creates the notification sender configured by the environment.
///
/// With `RESEND_API_KEY` set, emails go out through Resend and
/// `EMAIL_FROM` is required. Otherwise notifications are only logged.
///
/// # Errors
///
/// Returns [`NotificationError::Config`] if `RESEND_API_KEY` is set but
/// `EMAIL_FROM` is not.
pub fn create_sender_from_env(
    settings: &NotificationSettings,
) -> Result<Box<dyn NotificationSender>, NotificationError> {
    let Ok(api_key) = std::env::var("RESEND_API_KEY") else {
        log::warn!("RESEND_API_KEY not set; notifications will only be logged");
        return Ok(Box::new(senders::LogSender));
    };

    let from = std::env::var("EMAIL_FROM").map_err(|_| NotificationError::Config {
        message: "EMAIL_FROM environment variable not set".to_string(),
    })?;

    log::info!("Sending notifications through Resend as {from}");

    Ok(Box::new(senders::ResendSender::new(
        api_key,
        from,
        settings.site_url.clone(),
    )))
}
