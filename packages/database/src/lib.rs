#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `SQLite` persistence for the radar stores.
//!
//! Every store trait (neighborhoods, subscriptions, contacts, reports) has
//! a `Sqlite*` implementation here built on `switchy_database`. The schema
//! is managed by `switchy_schema` from the embedded SQL migrations.
//! Timestamps are stored as fixed-width RFC 3339 text so they sort
//! chronologically.

pub mod contacts;
pub mod db;
pub mod neighborhoods;
pub mod reports;
pub mod subscriptions;

use chrono::{DateTime, SecondsFormat, Utc};
use include_dir::{Dir, include_dir};
use radar_store::StoreError;
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

pub use contacts::SqliteContactDirectory;
pub use db::{DEFAULT_DB_PATH, open_db, open_from_env};
pub use neighborhoods::SqliteNeighborhoodStore;
pub use reports::SqliteReportStore;
pub use subscriptions::SqliteSubscriptionStore;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur while opening or migrating the database.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// The database could not be opened.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Radar schema is up to date");
    Ok(())
}

/// Maps a backend failure to a [`StoreError`], recognizing `SQLite`
/// unique constraint violations.
pub(crate) fn store_error(e: impl std::fmt::Display) -> StoreError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        StoreError::Duplicate { message }
    } else {
        StoreError::Backend { message }
    }
}

/// Formats a timestamp for storage.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp.
pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend {
            message: format!("invalid {column} timestamp {raw:?}: {e}"),
        })
}

/// Maps a column decoding failure to [`StoreError::Backend`].
pub(crate) fn conversion_error(column: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend {
        message: format!("failed to read column {column}: {e}"),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::Arc;

    use switchy_database::Database;

    /// A freshly migrated database in a unique temp file, removed on drop.
    pub struct TempDb {
        pub db: Arc<dyn Database>,
        path: PathBuf,
    }

    impl TempDb {
        pub async fn open() -> Self {
            let path = std::env::temp_dir()
                .join("radar-tests")
                .join(format!("{}.db", radar_store::new_id()));
            let db = crate::open_db(&path).await.unwrap();
            Self { db, path }
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let whole = Utc.with_ymd_and_hms(2025, 3, 14, 21, 5, 0).unwrap();
        let later = whole + chrono::Duration::microseconds(120);

        let a = format_timestamp(whole);
        let b = format_timestamp(later);

        assert_eq!(a, "2025-03-14T21:05:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp("created_at", &b).unwrap(), later);
    }

    #[test]
    fn bad_timestamp_is_backend_error() {
        assert!(matches!(
            parse_timestamp("created_at", "yesterday"),
            Err(StoreError::Backend { .. })
        ));
    }

    #[test]
    fn unique_violations_become_duplicates() {
        assert!(matches!(
            store_error("UNIQUE constraint failed: neighborhoods.name"),
            StoreError::Duplicate { .. }
        ));
        assert!(matches!(
            store_error("database is locked"),
            StoreError::Backend { .. }
        ));
    }
}
