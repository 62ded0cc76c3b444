#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Citizen report types.
//!
//! The notification side only relies on a narrow slice of a report (its
//! location, neighborhood and display fields), all of which live on
//! [`Report`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted citizen report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Unique identifier.
    pub id: String,
    /// What happened.
    pub description: String,
    /// Free-form category (e.g. "Robo").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Latitude of the incident.
    pub lat: f64,
    /// Longitude of the incident.
    pub lng: f64,
    /// Resolved neighborhood, if the location matched one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood_name: Option<String>,
    /// Province copied from the resolved neighborhood.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provincia: Option<String>,
    /// Department copied from the resolved neighborhood.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departamento: Option<String>,
    /// Locality copied from the resolved neighborhood.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localidad: Option<String>,
    /// Reporting user, if authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// When the report was filed.
    pub created_at: DateTime<Utc>,
}

/// Input for filing a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    /// What happened.
    pub description: String,
    /// Optional category.
    #[serde(default)]
    pub category: Option<String>,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Reporting user.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Partial edit of a report's text fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportUpdate {
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New category.
    #[serde(default)]
    pub category: Option<String>,
}

/// Change notification published after a report write is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ReportEvent {
    /// A report was filed.
    #[serde(rename = "report.created")]
    Created(Report),
    /// A report was edited.
    #[serde(rename = "report.updated")]
    Updated(Report),
    /// A report was removed.
    #[serde(rename = "report.deleted")]
    Deleted {
        /// Id of the removed report.
        id: String,
    },
}

impl ReportEvent {
    /// Id of the report this event is about.
    #[must_use]
    pub fn report_id(&self) -> &str {
        match self {
            Self::Created(report) | Self::Updated(report) => &report.id,
            Self::Deleted { id } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> Report {
        Report {
            id: "r-1".to_string(),
            description: "Robo de bicicleta".to_string(),
            category: None,
            lat: -26.1845,
            lng: -58.1765,
            neighborhood_name: Some("Centro".to_string()),
            provincia: None,
            departamento: None,
            localidad: None,
            user_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn events_carry_type_tag() {
        let json = serde_json::to_value(ReportEvent::Created(report())).unwrap();
        assert_eq!(json["type"], "report.created");
        assert_eq!(json["data"]["neighborhoodName"], "Centro");

        let json = serde_json::to_value(ReportEvent::Deleted {
            id: "r-1".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "report.deleted");
        assert_eq!(json["data"]["id"], "r-1");
    }

    #[test]
    fn report_id_covers_every_variant() {
        assert_eq!(ReportEvent::Updated(report()).report_id(), "r-1");
        assert_eq!(
            ReportEvent::Deleted {
                id: "r-2".to_string()
            }
            .report_id(),
            "r-2"
        );
    }
}
