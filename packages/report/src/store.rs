//! Persistence seam for reports.

use std::sync::RwLock;

use async_trait::async_trait;
use radar_report_models::Report;
use radar_store::{StoreError, read_lock, write_lock};

/// Storage operations required by the report service.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Inserts a new report.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the id is taken, or
    /// [`StoreError::Backend`] if the backend fails.
    async fn insert(&self, report: &Report) -> Result<(), StoreError>;

    /// Replaces the report with the same id. Returns `false` if it does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn update(&self, report: &Report) -> Result<bool, StoreError>;

    /// Deletes a report. Returns `false` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Looks up a report by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn find_by_id(&self, id: &str) -> Result<Option<Report>, StoreError>;

    /// Every report, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn list(&self) -> Result<Vec<Report>, StoreError>;
}

/// In-process [`ReportStore`]. Keeps insertion order.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    records: RwLock<Vec<Report>>,
}

impl MemoryReportStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn insert(&self, report: &Report) -> Result<(), StoreError> {
        let mut records = write_lock(&self.records);
        if records.iter().any(|r| r.id == report.id) {
            return Err(StoreError::Duplicate {
                message: format!("reports.id = {}", report.id),
            });
        }
        records.push(report.clone());
        Ok(())
    }

    async fn update(&self, report: &Report) -> Result<bool, StoreError> {
        let mut records = write_lock(&self.records);
        Ok(records
            .iter_mut()
            .find(|r| r.id == report.id)
            .map(|existing| *existing = report.clone())
            .is_some())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = write_lock(&self.records);
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Report>, StoreError> {
        Ok(read_lock(&self.records).iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Report>, StoreError> {
        let mut all: Vec<Report> = read_lock(&self.records).iter().rev().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
