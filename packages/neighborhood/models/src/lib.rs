#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood data model.
//!
//! A [`Neighborhood`] is a named polygon with a precomputed bounding box
//! and centroid. The serialized form (camelCase, `geoBounds`, `center`)
//! is also the interchange shape used by seeding and import tooling.

use chrono::{DateTime, Utc};
use radar_geometry::{BoundingBox, GeoPoint, Position};
use serde::{Deserialize, Serialize};

/// Free-form descriptive data attached to a neighborhood.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodMetadata {
    /// Area in square kilometers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    /// Estimated population.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Any other keys supplied by the administrator.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A stored neighborhood with its derived geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighborhood {
    /// Unique identifier.
    pub id: String,
    /// Globally unique display name (e.g. "Centro").
    pub name: String,
    /// Closed ring of `[lng, lat]` vertices.
    pub polygon: Vec<Position>,
    /// Province the neighborhood belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provincia: Option<String>,
    /// Department the neighborhood belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departamento: Option<String>,
    /// Locality the neighborhood belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localidad: Option<String>,
    /// Envelope of `polygon`, recomputed on every polygon write.
    pub geo_bounds: BoundingBox,
    /// Vertex-mean centroid of `polygon`, recomputed on every polygon write.
    pub center: GeoPoint,
    /// Optional descriptive metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NeighborhoodMetadata>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl Neighborhood {
    /// Returns `true` if the point is inside the polygon.
    ///
    /// Checks the bounding box first so the ray cast only runs for
    /// plausible candidates.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.geo_bounds.contains(point) && radar_geometry::point_in_polygon(point, &self.polygon)
    }

    /// Great-circle distance from `point` to this neighborhood's centroid.
    #[must_use]
    pub fn distance_to_center_km(&self, point: GeoPoint) -> f64 {
        radar_geometry::haversine_distance_km(point, self.center)
    }

    /// The administrative labels a resolved report inherits.
    #[must_use]
    pub fn assignment(&self) -> NeighborhoodAssignment {
        NeighborhoodAssignment {
            name: self.name.clone(),
            provincia: self.provincia.clone(),
            departamento: self.departamento.clone(),
            localidad: self.localidad.clone(),
        }
    }
}

/// Input for creating a neighborhood.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewNeighborhood {
    /// Unique name.
    pub name: String,
    /// Closed ring of `[lng, lat]` vertices.
    pub polygon: Vec<Position>,
    /// Province.
    #[serde(default)]
    pub provincia: Option<String>,
    /// Department.
    #[serde(default)]
    pub departamento: Option<String>,
    /// Locality.
    #[serde(default)]
    pub localidad: Option<String>,
    /// Descriptive metadata.
    #[serde(default)]
    pub metadata: Option<NeighborhoodMetadata>,
}

/// Partial update for a neighborhood. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodUpdate {
    /// New name (must not collide with another record).
    #[serde(default)]
    pub name: Option<String>,
    /// New ring; triggers bounding box and centroid recomputation.
    #[serde(default)]
    pub polygon: Option<Vec<Position>>,
    /// New province.
    #[serde(default)]
    pub provincia: Option<String>,
    /// New department.
    #[serde(default)]
    pub departamento: Option<String>,
    /// New locality.
    #[serde(default)]
    pub localidad: Option<String>,
    /// Replacement metadata.
    #[serde(default)]
    pub metadata: Option<NeighborhoodMetadata>,
}

/// Result of resolving a coordinate to a neighborhood: the name plus the
/// administrative labels copied onto the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborhoodAssignment {
    /// Neighborhood name.
    pub name: String,
    /// Province.
    pub provincia: Option<String>,
    /// Department.
    pub departamento: Option<String>,
    /// Locality.
    pub localidad: Option<String>,
}
