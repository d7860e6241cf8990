//! Fleet Backend
//!
//! Employee REST backend with a Redis-backed vehicle cache refreshed from the
//! upstream fleet API on a cron schedule.

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod errors;
mod models;
mod sync;
mod upstream;
mod vehicles;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::JwtValidator;
use config::{Config, LogFormat};
use db::Repository;
use sync::{SyncJob, SyncScheduler};
use upstream::FleetApi;
use vehicles::{VehicleCache, VehicleCacheService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub vehicles: Arc<dyn VehicleCache>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Fleet Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Fleet API: {}", config.upstream.base_url);

    if config.jwt.is_none() {
        tracing::warn!("No JWT signing key configured (JWT_SIGNING_KEY). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let upstream = Arc::new(FleetApi::new(&config.upstream)?);

    // Cache store is only connected when caching is enabled
    let store = match &config.cache {
        Some(cache_config) => Some(cache::connect(cache_config).await?),
        None => None,
    };

    let vehicles = match &store {
        Some(store) => VehicleCacheService::cache_backed(store.clone()),
        None => VehicleCacheService::passthrough(upstream.clone()),
    };
    tracing::info!(mode = %vehicles.mode(), "Vehicle cache ready");

    let job = Arc::new(SyncJob::new(upstream, store, config.sync.snapshot_ttl));
    let scheduler = SyncScheduler::new(job, &config.sync.schedule, config.sync.run_on_startup)?;
    let (scheduler_shutdown, scheduler_handle) = scheduler.start();

    // Create application state
    let state = AppState {
        repo,
        vehicles: Arc::new(vehicles),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler_shutdown.send(true).ok();
    scheduler_handle.await.ok();
    tracing::info!("Fleet Backend stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let validator = state
        .config
        .jwt
        .as_ref()
        .map(|jwt| Arc::new(JwtValidator::new(jwt)));

    // API routes
    let api_routes = Router::new()
        .route("/employees", post(api::create_employee))
        .route(
            "/employees/{id}",
            get(api::get_employee)
                .put(api::update_employee)
                .delete(api::delete_employee),
        )
        .route(
            "/employees/{id}/vehicles",
            get(api::get_employee_vehicles).put(api::put_employee_vehicles),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::jwt_auth_layer(validator.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
