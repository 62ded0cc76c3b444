//! Database connection utilities.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;

use crate::{DbError, run_migrations};

/// Database path used when `RADAR_DB_PATH` is not set.
pub const DEFAULT_DB_PATH: &str = "data/radar.db";

/// Opens (or creates) the `SQLite` database at `path` and applies pending
/// migrations.
///
/// # Errors
///
/// Returns [`DbError`] if the parent directory cannot be created, the
/// database cannot be opened, or a migration fails.
pub async fn open_db(path: &Path) -> Result<Arc<dyn Database>, DbError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Connection {
        message: format!("failed to open {}: {e}", path.display()),
    })?;

    run_migrations(db.as_ref()).await?;

    log::debug!("Opened database at {}", path.display());

    Ok(Arc::from(db))
}

/// Opens the database at `RADAR_DB_PATH`, defaulting to
/// [`DEFAULT_DB_PATH`].
///
/// # Errors
///
/// Returns [`DbError`] if the database cannot be opened or migrated.
pub async fn open_from_env() -> Result<Arc<dyn Database>, DbError> {
    let path = std::env::var("RADAR_DB_PATH")
        .map_or_else(|_| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from);

    open_db(&path).await
}
