#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report filing.
//!
//! [`ReportService::create`] resolves the report location to a
//! neighborhood, persists the report, publishes a [`ReportEvent`] and
//! hands the report to the notification dispatcher on a background task.
//! The caller gets the stored report back without waiting for any
//! notification to go out.

pub mod store;

use std::sync::Arc;

use chrono::Utc;
use radar_geometry::GeoPoint;
use radar_neighborhood::NeighborhoodResolver;
use radar_neighborhood::resolver::DEFAULT_MAX_RADIUS_KM;
use radar_notification::{DispatchTally, Dispatcher};
use radar_report_models::{NewReport, Report, ReportEvent, ReportUpdate};
use radar_store::StoreError;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub use store::{MemoryReportStore, ReportStore};

/// Buffered events per subscriber before slow receivers start lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors that can occur during report operations.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The submitted report is malformed.
    #[error("Validation error: {message}")]
    Validation {
        /// Which rule was violated.
        message: String,
    },

    /// No report has this id.
    #[error("Report with ID \"{id}\" not found")]
    NotFound {
        /// The unknown id.
        id: String,
    },

    /// The report store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Report service settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportSettings {
    /// Furthest a neighborhood centroid may be from a report that falls
    /// outside every polygon and still be assigned (`RADAR_MAX_RADIUS_KM`).
    pub max_radius_km: f64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            max_radius_km: DEFAULT_MAX_RADIUS_KM,
        }
    }
}

impl ReportSettings {
    /// Reads `RADAR_MAX_RADIUS_KM`, falling back to the default when unset
    /// or not a non-negative number.
    #[must_use]
    pub fn from_env() -> Self {
        let max_radius_km = match std::env::var("RADAR_MAX_RADIUS_KM") {
            Ok(raw) => match raw.parse::<f64>() {
                Ok(km) if km >= 0.0 => km,
                _ => {
                    log::warn!(
                        "Ignoring invalid RADAR_MAX_RADIUS_KM={raw:?}; using {DEFAULT_MAX_RADIUS_KM}"
                    );
                    DEFAULT_MAX_RADIUS_KM
                }
            },
            Err(_) => DEFAULT_MAX_RADIUS_KM,
        };

        Self { max_radius_km }
    }
}

/// A freshly filed report plus the background notification task.
#[derive(Debug)]
pub struct CreatedReport {
    /// The stored report.
    pub report: Report,
    /// Notification fan-out for the report. Dropping it does not cancel
    /// the task.
    pub dispatch: JoinHandle<DispatchTally>,
}

/// Files, edits and lists reports.
pub struct ReportService {
    resolver: NeighborhoodResolver,
    store: Arc<dyn ReportStore>,
    dispatcher: Dispatcher,
    events: broadcast::Sender<ReportEvent>,
    settings: ReportSettings,
}

impl ReportService {
    /// Creates a report service.
    #[must_use]
    pub fn new(
        resolver: NeighborhoodResolver,
        store: Arc<dyn ReportStore>,
        dispatcher: Dispatcher,
        settings: ReportSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            resolver,
            store,
            dispatcher,
            events,
            settings,
        }
    }

    /// Subscribes to report change events published after each write.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<ReportEvent> {
        self.events.subscribe()
    }

    /// Files a report.
    ///
    /// The location is resolved to a neighborhood (exact polygon match, or
    /// nearest centroid within the configured radius). A resolution
    /// failure is logged and the report is stored without a neighborhood.
    /// Subscriber notification runs on a spawned task and never delays or
    /// fails this call.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// * [`ReportError::Validation`] if the coordinates are out of range or
    ///   the description is empty
    /// * [`ReportError::Store`] if the report cannot be persisted
    pub async fn create(&self, input: NewReport) -> Result<CreatedReport, ReportError> {
        validate(&input)?;

        let assignment = match self
            .resolver
            .find_nearest_or_null(input.lat, input.lng, self.settings.max_radius_km)
            .await
        {
            Ok(assignment) => assignment,
            Err(e) => {
                log::error!(
                    "Failed to resolve neighborhood for ({}, {}): {e}",
                    input.lat,
                    input.lng
                );
                None
            }
        };

        let (neighborhood_name, provincia, departamento, localidad) = assignment.map_or(
            (None, None, None, None),
            |a| (Some(a.name), a.provincia, a.departamento, a.localidad),
        );

        let report = Report {
            id: radar_store::new_id(),
            description: input.description.trim().to_string(),
            category: input.category.filter(|c| !c.trim().is_empty()),
            lat: input.lat,
            lng: input.lng,
            neighborhood_name,
            provincia,
            departamento,
            localidad,
            user_id: input.user_id,
            created_at: Utc::now(),
        };

        self.store.insert(&report).await?;

        log::info!(
            "Report {} created in {}",
            report.id,
            report
                .neighborhood_name
                .as_deref()
                .unwrap_or("no neighborhood")
        );

        self.publish(ReportEvent::Created(report.clone()));
        let dispatch = self.dispatcher.spawn_dispatch(report.clone());

        Ok(CreatedReport { report, dispatch })
    }

    /// Edits a report's text fields.
    ///
    /// # Errors
    ///
    /// * [`ReportError::NotFound`] if `id` is unknown
    /// * [`ReportError::Validation`] if the new description is empty
    /// * [`ReportError::Store`] if the store fails
    pub async fn update(&self, id: &str, update: ReportUpdate) -> Result<Report, ReportError> {
        let mut report = self.find_by_id(id).await?;

        if let Some(description) = update.description {
            if description.trim().is_empty() {
                return Err(ReportError::Validation {
                    message: "Description must not be empty".to_string(),
                });
            }
            report.description = description.trim().to_string();
        }
        if let Some(category) = update.category {
            report.category = Some(category).filter(|c| !c.trim().is_empty());
        }

        if !self.store.update(&report).await? {
            return Err(ReportError::NotFound { id: id.to_string() });
        }

        self.publish(ReportEvent::Updated(report.clone()));

        Ok(report)
    }

    /// Deletes a report.
    ///
    /// # Errors
    ///
    /// * [`ReportError::NotFound`] if `id` is unknown
    /// * [`ReportError::Store`] if the store fails
    pub async fn remove(&self, id: &str) -> Result<(), ReportError> {
        if !self.store.delete(id).await? {
            return Err(ReportError::NotFound { id: id.to_string() });
        }

        log::info!("Report {id} deleted");
        self.publish(ReportEvent::Deleted { id: id.to_string() });

        Ok(())
    }

    /// Fetches a report by id.
    ///
    /// # Errors
    ///
    /// * [`ReportError::NotFound`] if `id` is unknown
    /// * [`ReportError::Store`] if the store fails
    pub async fn find_by_id(&self, id: &str) -> Result<Report, ReportError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ReportError::NotFound { id: id.to_string() })
    }

    /// Every report, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Store`] if the store fails.
    pub async fn list(&self) -> Result<Vec<Report>, ReportError> {
        Ok(self.store.list().await?)
    }

    fn publish(&self, event: ReportEvent) {
        let id = event.report_id().to_string();
        if self.events.send(event).is_err() {
            log::debug!("No event listeners for report {id}");
        }
    }
}

fn validate(input: &NewReport) -> Result<(), ReportError> {
    if !GeoPoint::new(input.lat, input.lng).is_in_range() {
        return Err(ReportError::Validation {
            message: format!(
                "Invalid coordinates ({}, {}): latitude must be between -90 and 90 \
                 and longitude between -180 and 180",
                input.lat, input.lng
            ),
        });
    }

    if input.description.trim().is_empty() {
        return Err(ReportError::Validation {
            message: "Description must not be empty".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use radar_neighborhood::{MemoryNeighborhoodStore, NeighborhoodCatalog};
    use radar_neighborhood::NeighborhoodStore;
    use radar_neighborhood_models::{Neighborhood, NewNeighborhood};
    use radar_notification::{NotificationError, NotificationSender, ReportNotification};
    use radar_subscription::{
        ContactDirectory as _, MemoryContactDirectory, MemorySubscriptionStore,
        SubscriptionRegistry,
    };
    use radar_subscription_models::SubscriptionPreferences;
    use tokio::sync::Semaphore;

    use super::*;

    /// Blocks every send until the test adds permits.
    struct GatedSender {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl NotificationSender for GatedSender {
        async fn send(
            &self,
            _contact_address: &str,
            _notification: &ReportNotification,
        ) -> Result<(), NotificationError> {
            let permit = self.gate.acquire().await;
            drop(permit);
            Ok(())
        }
    }

    struct Fixture {
        service: ReportService,
        gate: Arc<Semaphore>,
    }

    async fn fixture() -> Fixture {
        let catalog = Arc::new(NeighborhoodCatalog::new(Arc::new(
            MemoryNeighborhoodStore::new(),
        )));
        catalog
            .create(NewNeighborhood {
                name: "Centro".to_string(),
                polygon: vec![
                    [-58.178, -26.186],
                    [-58.176, -26.186],
                    [-58.176, -26.184],
                    [-58.178, -26.184],
                    [-58.178, -26.186],
                ],
                provincia: Some("Formosa".to_string()),
                departamento: Some("Formosa".to_string()),
                localidad: Some("Formosa".to_string()),
                metadata: None,
            })
            .await
            .unwrap();

        let contacts = Arc::new(MemoryContactDirectory::new());
        contacts
            .set_contact_address("vecino", "vecino@example.com")
            .await
            .unwrap();
        let registry = SubscriptionRegistry::new(
            catalog.clone(),
            Arc::new(MemorySubscriptionStore::new()),
            contacts,
        );
        registry
            .subscribe("vecino", "Centro", SubscriptionPreferences::default())
            .await
            .unwrap();

        let gate = Arc::new(Semaphore::new(0));
        let dispatcher = Dispatcher::new(
            registry,
            Arc::new(GatedSender { gate: gate.clone() }),
            radar_notification::DEFAULT_LOCALITY.to_string(),
        );

        Fixture {
            service: ReportService::new(
                NeighborhoodResolver::new(catalog),
                Arc::new(MemoryReportStore::new()),
                dispatcher,
                ReportSettings::default(),
            ),
            gate,
        }
    }

    fn new_report(lat: f64, lng: f64) -> NewReport {
        NewReport {
            description: "Robo de bicicleta".to_string(),
            lat,
            lng,
            ..NewReport::default()
        }
    }

    #[tokio::test]
    async fn reports_are_tagged_with_enclosing_neighborhood() {
        let f = fixture().await;
        f.gate.add_permits(10);

        let inside = f.service.create(new_report(-26.1845, -58.1765)).await.unwrap();
        assert_eq!(inside.report.neighborhood_name.as_deref(), Some("Centro"));
        assert_eq!(inside.report.localidad.as_deref(), Some("Formosa"));
        assert_eq!(
            inside.dispatch.await.unwrap(),
            DispatchTally {
                attempted: 1,
                succeeded: 1,
            }
        );

        let outside = f.service.create(new_report(-26.30, -58.40)).await.unwrap();
        assert_eq!(outside.report.neighborhood_name, None);
        assert_eq!(outside.report.provincia, None);
        assert_eq!(outside.dispatch.await.unwrap(), DispatchTally::default());
    }

    #[tokio::test]
    async fn create_does_not_wait_for_notifications() {
        let f = fixture().await;

        let created = tokio::time::timeout(
            Duration::from_secs(5),
            f.service.create(new_report(-26.1845, -58.1765)),
        )
        .await
        .expect("create blocked on notification delivery")
        .unwrap();

        assert!(!created.dispatch.is_finished());
        assert_eq!(f.service.find_by_id(&created.report.id).await.unwrap(), created.report);

        f.gate.add_permits(1);
        assert_eq!(created.dispatch.await.unwrap().succeeded, 1);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let f = fixture().await;

        for input in [
            new_report(91.0, 0.0),
            new_report(0.0, -180.5),
            new_report(f64::NAN, 0.0),
            NewReport {
                description: "   ".to_string(),
                ..new_report(0.0, 0.0)
            },
        ] {
            let err = f.service.create(input).await.unwrap_err();
            assert!(matches!(err, ReportError::Validation { .. }));
        }

        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_publish_events() {
        let f = fixture().await;
        f.gate.add_permits(10);
        let mut events = f.service.subscribe_events();

        let created = f.service.create(new_report(-26.1845, -58.1765)).await.unwrap();
        let id = created.report.id.clone();

        f.service
            .update(
                &id,
                ReportUpdate {
                    category: Some("Robo".to_string()),
                    ..ReportUpdate::default()
                },
            )
            .await
            .unwrap();
        f.service.remove(&id).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), ReportEvent::Created(r) if r.id == id));
        assert!(
            matches!(events.recv().await.unwrap(), ReportEvent::Updated(r) if r.category.as_deref() == Some("Robo"))
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ReportEvent::Deleted { id: id.clone() }
        );

        assert!(matches!(
            f.service.find_by_id(&id).await,
            Err(ReportError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let f = fixture().await;
        f.gate.add_permits(10);

        let first = f.service.create(new_report(0.0, 0.0)).await.unwrap();
        let second = f.service.create(new_report(1.0, 1.0)).await.unwrap();

        let ids: Vec<String> = f
            .service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(ids, vec![second.report.id, first.report.id]);
    }

    /// Neighborhood store whose backend is unreachable.
    struct UnavailableNeighborhoodStore;

    #[async_trait]
    impl NeighborhoodStore for UnavailableNeighborhoodStore {
        async fn insert(&self, _neighborhood: &Neighborhood) -> Result<(), StoreError> {
            Err(StoreError::backend("connection refused"))
        }

        async fn update(&self, _neighborhood: &Neighborhood) -> Result<bool, StoreError> {
            Err(StoreError::backend("connection refused"))
        }

        async fn delete(&self, _id: &str) -> Result<bool, StoreError> {
            Err(StoreError::backend("connection refused"))
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<Neighborhood>, StoreError> {
            Err(StoreError::backend("connection refused"))
        }

        async fn find_by_name(&self, _name: &str) -> Result<Option<Neighborhood>, StoreError> {
            Err(StoreError::backend("connection refused"))
        }

        async fn list(&self) -> Result<Vec<Neighborhood>, StoreError> {
            Err(StoreError::backend("connection refused"))
        }
    }

    #[tokio::test]
    async fn catalog_outage_files_report_unresolved() {
        let catalog = Arc::new(NeighborhoodCatalog::new(Arc::new(
            UnavailableNeighborhoodStore,
        )));
        let registry = SubscriptionRegistry::new(
            catalog.clone(),
            Arc::new(MemorySubscriptionStore::new()),
            Arc::new(MemoryContactDirectory::new()),
        );
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(MemoryReportStore::new());
        let service = ReportService::new(
            NeighborhoodResolver::new(catalog),
            store.clone(),
            Dispatcher::new(
                registry,
                Arc::new(GatedSender { gate }),
                radar_notification::DEFAULT_LOCALITY.to_string(),
            ),
            ReportSettings::default(),
        );

        let created = service
            .create(new_report(-26.1845, -58.1765))
            .await
            .unwrap();

        assert_eq!(created.report.neighborhood_name, None);
        assert_eq!(created.report.localidad, None);
        assert_eq!(created.dispatch.await.unwrap(), DispatchTally::default());
        assert_eq!(
            store.find_by_id(&created.report.id).await.unwrap(),
            Some(created.report)
        );
    }
}
