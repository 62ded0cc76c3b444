//! Fan-out of one report to every emailable subscriber of its
//! neighborhood.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt as _;
use futures::future::join_all;
use radar_report_models::Report;
use radar_subscription::SubscriptionRegistry;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{NotificationSender, ReportNotification};

/// How many sends were attempted and how many succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchTally {
    /// Subscribers a send was issued to.
    pub attempted: usize,
    /// Sends that completed without error.
    pub succeeded: usize,
}

/// Sends report notifications to neighborhood subscribers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: SubscriptionRegistry,
    sender: Arc<dyn NotificationSender>,
    default_locality: String,
}

impl Dispatcher {
    /// Creates a dispatcher that looks up subscribers in `registry` and
    /// delivers through `sender`.
    #[must_use]
    pub fn new(
        registry: SubscriptionRegistry,
        sender: Arc<dyn NotificationSender>,
        default_locality: String,
    ) -> Self {
        Self {
            registry,
            sender,
            default_locality,
        }
    }

    /// Notifies every subscriber of the report's neighborhood that has
    /// email notifications enabled.
    ///
    /// All sends run concurrently and a failed (or panicking) send never
    /// affects the others. Registry failures are logged and yield an empty
    /// tally; this never returns an error.
    pub async fn dispatch(&self, report: &Report) -> DispatchTally {
        let Some(notification) = ReportNotification::from_report(report, &self.default_locality)
        else {
            log::warn!(
                "Report {} has no neighborhood, skipping notifications",
                report.id
            );
            return DispatchTally::default();
        };

        let subscribers = match self
            .registry
            .list_subscribers_of(&notification.neighborhood, true)
            .await
        {
            Ok(subscribers) => subscribers,
            Err(e) => {
                log::error!(
                    "Error loading subscribers of \"{}\" for report {}: {e}",
                    notification.neighborhood,
                    report.id
                );
                return DispatchTally::default();
            }
        };

        if subscribers.is_empty() {
            log::info!(
                "No subscribers for neighborhood: {}",
                notification.neighborhood
            );
            return DispatchTally::default();
        }

        log::info!(
            "Notifying {} subscribers about report {} in {}",
            subscribers.len(),
            report.id,
            notification.neighborhood
        );

        let notification = &notification;
        let sends = subscribers.iter().map(|subscriber| async move {
            let send = AssertUnwindSafe(
                self.sender
                    .send(&subscriber.contact_address, notification),
            )
            .catch_unwind()
            .await;

            match send {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    log::error!(
                        "Failed to notify user {} about report {}: {e}",
                        subscriber.user_id,
                        notification.report_id
                    );
                    false
                }
                Err(_) => {
                    log::error!(
                        "Sender panicked notifying user {} about report {}",
                        subscriber.user_id,
                        notification.report_id
                    );
                    false
                }
            }
        });

        let results = join_all(sends).await;

        let tally = DispatchTally {
            attempted: results.len(),
            succeeded: results.iter().filter(|ok| **ok).count(),
        };

        log::info!(
            "Sent {}/{} notifications for report {}",
            tally.succeeded,
            tally.attempted,
            report.id
        );

        tally
    }

    /// Runs [`Self::dispatch`] on a background task and returns
    /// immediately. Await the handle only when the tally is needed.
    #[must_use = "dropping the handle detaches the dispatch"]
    pub fn spawn_dispatch(&self, report: Report) -> JoinHandle<DispatchTally> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(&report).await })
    }
}
