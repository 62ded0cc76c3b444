#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the radar services.
//!
//! ```text
//! radar seed data/barrios.geojson [--replace]
//! radar neighborhoods
//! radar add-neighborhood Centro --polygon '[[-58.18,-26.19],...]'
//! radar remove-neighborhood Centro
//! radar resolve --lat -26.185 --lng -58.175
//! radar nearby --lat -26.185 --lng -58.175 [--radius-km 10]
//! radar subscribe --user u1 Centro [--contact a@example.com]
//! radar subscriptions --user u1
//! radar unsubscribe --user u1 <subscription-id>
//! radar report --lat -26.185 --lng -58.175 "Robo en la esquina"
//! radar reports
//! ```
//!
//! All output is JSON on stdout; logging goes to stderr and is controlled
//! by `RUST_LOG`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use radar_database::{
    SqliteContactDirectory, SqliteNeighborhoodStore, SqliteReportStore, SqliteSubscriptionStore,
};
use radar_neighborhood::resolver::DEFAULT_NEARBY_RADIUS_KM;
use radar_neighborhood::{NeighborhoodCatalog, NeighborhoodResolver};
use radar_neighborhood_models::NewNeighborhood;
use radar_notification::{Dispatcher, NotificationSettings, create_sender_from_env};
use radar_report::{ReportService, ReportSettings};
use radar_report_models::NewReport;
use radar_subscription::{ContactDirectory as _, SubscriptionRegistry};
use radar_subscription_models::SubscriptionPreferences;
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "radar",
    about = "Manage neighborhoods, subscriptions and incident reports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import neighborhoods from a GeoJSON `FeatureCollection`
    Seed {
        /// Path to the GeoJSON file
        file: PathBuf,
        /// Delete every existing neighborhood first
        #[arg(long)]
        replace: bool,
    },
    /// List all neighborhoods
    Neighborhoods,
    /// Create a neighborhood from a closed `[lng, lat]` ring
    AddNeighborhood {
        /// Unique neighborhood name
        name: String,
        /// JSON array of `[lng, lat]` pairs, first equal to last
        #[arg(long)]
        polygon: String,
        #[arg(long)]
        provincia: Option<String>,
        #[arg(long)]
        departamento: Option<String>,
        #[arg(long)]
        localidad: Option<String>,
    },
    /// Delete a neighborhood by name
    RemoveNeighborhood {
        name: String,
    },
    /// Resolve a coordinate to its neighborhood
    Resolve {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Nearest-centroid fallback radius (defaults to `RADAR_MAX_RADIUS_KM`)
        #[arg(long)]
        max_radius_km: Option<f64>,
    },
    /// List neighborhoods whose center is within a radius, nearest first
    Nearby {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Search radius (defaults to `RADAR_NEARBY_RADIUS_KM`, then 10 km)
        #[arg(long)]
        radius_km: Option<f64>,
    },
    /// Subscribe a user to a neighborhood, or update an existing subscription
    Subscribe {
        #[arg(long)]
        user: String,
        /// Neighborhood name
        neighborhood: String,
        /// Email address to notify (stored for the user)
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        email_notifications: Option<bool>,
        #[arg(long)]
        push_notifications: Option<bool>,
    },
    /// List a user's subscriptions, newest first
    Subscriptions {
        #[arg(long)]
        user: String,
    },
    /// Remove one of a user's subscriptions
    Unsubscribe {
        #[arg(long)]
        user: String,
        /// Subscription ID
        id: String,
    },
    /// File an incident report and notify subscribers
    Report {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// List reports, newest first
    Reports,
}

/// Services wired over the `SQLite` stores.
struct App {
    catalog: Arc<NeighborhoodCatalog>,
    resolver: NeighborhoodResolver,
    registry: SubscriptionRegistry,
    reports: ReportService,
    report_settings: ReportSettings,
}

impl App {
    async fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let db = radar_database::open_from_env().await?;

        let catalog = Arc::new(NeighborhoodCatalog::new(Arc::new(
            SqliteNeighborhoodStore::new(db.clone()),
        )));
        let resolver = NeighborhoodResolver::new(catalog.clone());
        let registry = SubscriptionRegistry::new(
            catalog.clone(),
            Arc::new(SqliteSubscriptionStore::new(db.clone())),
            Arc::new(SqliteContactDirectory::new(db.clone())),
        );

        let notification_settings = NotificationSettings::from_env();
        let sender = create_sender_from_env(&notification_settings)?;
        let dispatcher = Dispatcher::new(
            registry.clone(),
            Arc::from(sender),
            notification_settings.default_locality,
        );

        let report_settings = ReportSettings::from_env();
        let reports = ReportService::new(
            resolver.clone(),
            Arc::new(SqliteReportStore::new(db)),
            dispatcher,
            report_settings,
        );

        Ok(Self {
            catalog,
            resolver,
            registry,
            reports,
            report_settings,
        })
    }
}

fn nearby_radius_from_env() -> f64 {
    std::env::var("RADAR_NEARBY_RADIUS_KM")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|km: &f64| km.is_finite() && *km > 0.0)
        .unwrap_or(DEFAULT_NEARBY_RADIUS_KM)
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let app = App::open().await?;

    match cli.command {
        Commands::Seed { file, replace } => {
            let summary = radar_neighborhood::import::import_file(&app.catalog, &file, replace).await?;
            print_json(&summary)?;
        }
        Commands::Neighborhoods => {
            print_json(&app.catalog.list().await?)?;
        }
        Commands::AddNeighborhood {
            name,
            polygon,
            provincia,
            departamento,
            localidad,
        } => {
            let polygon: Vec<[f64; 2]> = serde_json::from_str(&polygon)?;
            let created = app
                .catalog
                .create(NewNeighborhood {
                    name,
                    polygon,
                    provincia,
                    departamento,
                    localidad,
                    metadata: None,
                })
                .await?;
            print_json(&created)?;
        }
        Commands::RemoveNeighborhood { name } => {
            let Some(existing) = app.catalog.find_by_name(&name).await? else {
                return Err(format!("Neighborhood \"{name}\" not found").into());
            };
            app.catalog.remove(&existing.id).await?;
            log::info!("Removed neighborhood \"{name}\"");
        }
        Commands::Resolve {
            lat,
            lng,
            max_radius_km,
        } => {
            let radius = max_radius_km.unwrap_or(app.report_settings.max_radius_km);
            let assignment = app.resolver.find_nearest_or_null(lat, lng, radius).await?;
            print_json(&assignment)?;
        }
        Commands::Nearby {
            lat,
            lng,
            radius_km,
        } => {
            let radius = radius_km.unwrap_or_else(nearby_radius_from_env);
            print_json(&app.resolver.resolve_nearby(lat, lng, radius).await?)?;
        }
        Commands::Subscribe {
            user,
            neighborhood,
            contact,
            email_notifications,
            push_notifications,
        } => {
            if let Some(address) = contact {
                app.registry
                    .contacts()
                    .set_contact_address(&user, &address)
                    .await?;
            }
            let subscription = app
                .registry
                .subscribe(
                    &user,
                    &neighborhood,
                    SubscriptionPreferences {
                        email: email_notifications,
                        push: push_notifications,
                    },
                )
                .await?;
            print_json(&subscription)?;
        }
        Commands::Subscriptions { user } => {
            print_json(&app.registry.list_for_user(&user).await?)?;
        }
        Commands::Unsubscribe { user, id } => {
            app.registry.unsubscribe(&user, &id).await?;
            log::info!("Removed subscription {id}");
        }
        Commands::Report {
            lat,
            lng,
            description,
            category,
            user,
        } => {
            let created = app
                .reports
                .create(NewReport {
                    description,
                    category,
                    lat,
                    lng,
                    user_id: user,
                })
                .await?;
            print_json(&created.report)?;

            // The process exits with the runtime, so wait for delivery here.
            let tally = created.dispatch.await?;
            log::info!(
                "Notified {}/{} subscriber(s)",
                tally.succeeded,
                tally.attempted
            );
        }
        Commands::Reports => {
            print_json(&app.reports.list().await?)?;
        }
    }

    Ok(())
}
