#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood catalog and coordinate resolution.
//!
//! The [`catalog::NeighborhoodCatalog`] owns the set of named neighborhood
//! polygons, validating every write and keeping each record's bounding
//! box and centroid in sync with its ring. The
//! [`resolver::NeighborhoodResolver`] maps a coordinate to the enclosing
//! neighborhood (R-tree bounding-box filter, then ray casting) with a
//! nearest-centroid fallback. Seed data is loaded from `GeoJSON` by the
//! [`import`] module.

pub mod catalog;
pub mod import;
pub mod resolver;
pub mod store;

use radar_store::StoreError;
use thiserror::Error;

pub use catalog::NeighborhoodCatalog;
pub use resolver::NeighborhoodResolver;
pub use store::{MemoryNeighborhoodStore, NeighborhoodStore};

/// Errors that can occur during neighborhood operations.
#[derive(Debug, Error)]
pub enum NeighborhoodError {
    /// The submitted neighborhood is malformed.
    #[error("Validation error: {message}")]
    Validation {
        /// Which rule was violated.
        message: String,
    },

    /// Another neighborhood already uses this name.
    #[error("Neighborhood with name \"{name}\" already exists")]
    Conflict {
        /// The contested name.
        name: String,
    },

    /// No neighborhood has this id.
    #[error("Neighborhood with ID \"{id}\" not found")]
    NotFound {
        /// The unknown id.
        id: String,
    },

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Seed data could not be read or parsed.
    #[error("Import error: {message}")]
    Import {
        /// Description of what went wrong.
        message: String,
    },
}
