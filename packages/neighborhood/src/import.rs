//! `GeoJSON` seed import.
//!
//! Loads a `FeatureCollection` of neighborhoods into the catalog. Every
//! feature goes through [`NeighborhoodCatalog::create`], so imported
//! records get the same validation and derived geometry as hand-entered
//! ones. A bad feature is logged and counted; it never aborts the run.

use std::path::Path;

use geojson::{Feature, GeoJson, Value};
use radar_geometry::Position;
use radar_neighborhood_models::NewNeighborhood;
use serde::Serialize;

use crate::NeighborhoodError;
use crate::catalog::NeighborhoodCatalog;

/// Half the side of the square ring generated around a `Point` feature,
/// in degrees (roughly 500 m).
pub const POINT_RING_OFFSET_DEG: f64 = 0.005;

/// Property keys checked, in order, for the neighborhood name.
const NAME_PROPERTIES: &[&str] = &["nombre_barrio", "name"];

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Features found in the collection.
    pub total: usize,
    /// Features stored as neighborhoods.
    pub inserted: usize,
    /// Features skipped because they were malformed or rejected.
    pub failed: usize,
}

/// Reads a `GeoJSON` file and imports it.
///
/// # Errors
///
/// Returns [`NeighborhoodError::Import`] if the file cannot be read or is
/// not a `FeatureCollection`, or [`NeighborhoodError::Store`] if clearing
/// the catalog in `replace` mode fails.
pub async fn import_file(
    catalog: &NeighborhoodCatalog,
    path: &Path,
    replace: bool,
) -> Result<ImportSummary, NeighborhoodError> {
    log::info!("Loading neighborhoods from {}", path.display());

    let contents = std::fs::read_to_string(path).map_err(|e| NeighborhoodError::Import {
        message: format!("failed to read {}: {e}", path.display()),
    })?;

    import_feature_collection(catalog, &contents, replace).await
}

/// Imports every feature of a `GeoJSON` `FeatureCollection`.
///
/// With `replace` set, every existing neighborhood is removed first.
///
/// # Errors
///
/// Returns [`NeighborhoodError::Import`] if `geojson` is not a
/// `FeatureCollection`, or [`NeighborhoodError::Store`] if clearing the
/// catalog fails.
pub async fn import_feature_collection(
    catalog: &NeighborhoodCatalog,
    geojson: &str,
    replace: bool,
) -> Result<ImportSummary, NeighborhoodError> {
    let parsed: GeoJson = geojson.parse().map_err(|e| NeighborhoodError::Import {
        message: format!("invalid GeoJSON: {e}"),
    })?;

    let GeoJson::FeatureCollection(collection) = parsed else {
        return Err(NeighborhoodError::Import {
            message: "expected a FeatureCollection".to_string(),
        });
    };

    log::info!(
        "Found {} neighborhoods in GeoJSON",
        collection.features.len()
    );

    if replace {
        let existing = catalog.list().await?;
        if !existing.is_empty() {
            log::info!("Clearing {} existing neighborhoods", existing.len());
        }
        for neighborhood in existing {
            catalog.remove(&neighborhood.id).await?;
        }
    }

    let mut summary = ImportSummary {
        total: collection.features.len(),
        ..ImportSummary::default()
    };

    for feature in &collection.features {
        let result = match feature_to_neighborhood(feature) {
            Ok(input) => catalog.create(input).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(neighborhood) => {
                summary.inserted += 1;
                log::debug!("Imported neighborhood \"{}\"", neighborhood.name);
            }
            Err(e) => {
                summary.failed += 1;
                log::error!("Skipping feature {}: {e}", feature_label(feature));
            }
        }
    }

    log::info!(
        "Import finished: {} total, {} inserted, {} failed",
        summary.total,
        summary.inserted,
        summary.failed
    );

    Ok(summary)
}

fn feature_to_neighborhood(feature: &Feature) -> Result<NewNeighborhood, NeighborhoodError> {
    let name = string_property(feature, NAME_PROPERTIES).ok_or_else(|| {
        NeighborhoodError::Import {
            message: "feature has no name property".to_string(),
        }
    })?;

    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| NeighborhoodError::Import {
            message: format!("\"{name}\" has no geometry"),
        })?;

    let polygon = match &geometry.value {
        Value::Point(coords) => {
            let [lng, lat] = position(coords)?;
            log::warn!("\"{name}\" is a Point, generating an approximate polygon");
            square_around(lng, lat, POINT_RING_OFFSET_DEG)
        }
        Value::Polygon(rings) => exterior_ring(rings)?,
        Value::MultiPolygon(polygons) => {
            let first = polygons.first().ok_or_else(|| NeighborhoodError::Import {
                message: format!("\"{name}\" has an empty MultiPolygon"),
            })?;
            exterior_ring(first)?
        }
        _ => {
            return Err(NeighborhoodError::Import {
                message: format!("\"{name}\" must be a Point, Polygon or MultiPolygon"),
            });
        }
    };

    Ok(NewNeighborhood {
        name,
        polygon,
        provincia: string_property(feature, &["provincia"]),
        departamento: string_property(feature, &["departamento"]),
        localidad: string_property(feature, &["localidad"]),
        metadata: None,
    })
}

fn string_property(feature: &Feature, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| feature.property(key))
        .filter_map(serde_json::Value::as_str)
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn feature_label(feature: &Feature) -> String {
    string_property(feature, NAME_PROPERTIES).map_or_else(
        || "<unnamed>".to_string(),
        |name| format!("\"{name}\""),
    )
}

fn exterior_ring(rings: &[Vec<Vec<f64>>]) -> Result<Vec<Position>, NeighborhoodError> {
    let exterior = rings.first().ok_or_else(|| NeighborhoodError::Import {
        message: "polygon has no rings".to_string(),
    })?;

    exterior.iter().map(|coords| position(coords)).collect()
}

fn position(coords: &[f64]) -> Result<Position, NeighborhoodError> {
    match coords {
        [lng, lat, ..] => Ok([*lng, *lat]),
        _ => Err(NeighborhoodError::Import {
            message: format!("position needs two coordinates, got {}", coords.len()),
        }),
    }
}

fn square_around(lng: f64, lat: f64, offset: f64) -> Vec<Position> {
    vec![
        [lng - offset, lat - offset],
        [lng + offset, lat - offset],
        [lng + offset, lat + offset],
        [lng - offset, lat + offset],
        [lng - offset, lat - offset],
    ]
}
