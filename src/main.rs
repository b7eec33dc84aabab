//! Campus Hostel Service
//!
//! Hostel allocation subsystem of the college management portal.
//!
//! ## Features
//!
//! - **Registry**: Hostels and rooms with live occupancy counters
//! - **Allocations**: Bed assignment per academic year, check-in/out, cancellation
//! - **Complaints**: Student complaints scoped to their current room
//! - **Reconciliation**: Periodic recount of occupancy from active allocations

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod routes;
mod service;
mod validation;

use db::PgStore;
use handlers::AppState;
use service::HostelService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_hostel=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Campus Hostel Service");
    tracing::info!("Environment: {:?}", config.environment);

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    if let Some(credentials) = &config.bootstrap_admin {
        handlers::bootstrap_admin(&pool, credentials).await?;
    }

    let service = HostelService::new(Arc::new(PgStore::new(pool.clone())));

    match config.reconcile_interval_minutes {
        Some(minutes) => {
            tracing::info!("Occupancy reconciliation every {} minutes", minutes);
            spawn_reconciler(service.clone(), Duration::from_secs(minutes * 60));
        }
        None => tracing::info!("Periodic occupancy reconciliation disabled"),
    }

    // Create application state
    let state = AppState {
        pool,
        service,
        is_production: config.is_production(),
        trusted_proxies: config.trusted_proxies.clone(),
        session_expiry_hours: config.session_expiry_hours,
    };

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    let app = routes::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(cors);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Repair occupancy counters in the background. The first tick fires
/// immediately, so counters are checked once at startup.
fn spawn_reconciler(service: HostelService, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match service.reconcile(true).await {
                Ok(report) if report.is_consistent() => {
                    tracing::debug!(
                        "Occupancy consistent across {} rooms",
                        report.rooms_checked
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Occupancy reconciliation failed: {}", e),
            }
        }
    });
}
