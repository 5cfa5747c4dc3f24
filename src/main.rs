//! Leadflow Backend
//!
//! A REST backend for role-gated lead distribution and attendance tracking,
//! with SQLite persistence and an in-process TTL cache.

mod api;
mod auth;
mod authz;
mod cache;
mod config;
mod db;
mod engine;
mod errors;
mod geofence;
mod models;
mod notify;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use authz::PermissionResolver;
use cache::TtlCache;
use config::Config;
use db::Repository;
use engine::LeadEngine;
use notify::{BroadcastSink, Notifier};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub cache: Arc<TtlCache>,
    pub authz: PermissionResolver,
    pub engine: Arc<LeadEngine>,
    pub config: Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Leadflow Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (LEADFLOW_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Wire up the cache, RBAC resolver, notifier and assignment engine
    let cache = Arc::new(TtlCache::new(config.cache_capacity));
    let authz = PermissionResolver::new(repo.clone(), cache.clone(), config.authz_ttl);
    let notifier = Arc::new(Notifier::new(
        repo.clone(),
        Arc::new(BroadcastSink::new(256)),
    ));
    let engine = Arc::new(LeadEngine::new(
        repo.clone(),
        cache.clone(),
        authz.clone(),
        notifier.clone(),
    ));

    // Background workers
    spawn_cache_sweeper(cache.clone(), config.cache_sweep_interval);
    if !config.reassign_interval.is_zero() {
        spawn_reassignment_worker(
            engine.clone(),
            config.reassign_interval,
            config.reassign_threshold_hours,
        );
    } else {
        tracing::info!("In-process reassignment worker disabled");
    }

    // Create application state
    let bind_addr = config.bind_addr;
    let state = AppState {
        repo,
        cache,
        authz,
        engine,
        config,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Leads
        .route("/leads", get(api::leads::list_leads))
        .route("/leads", post(api::leads::create_lead))
        .route("/leads/bulk-assign", post(api::leads::bulk_assign))
        .route("/leads/sweep", post(api::leads::run_sweep))
        .route("/leads/{id}", get(api::leads::get_lead))
        .route("/leads/{id}/history", get(api::leads::lead_history))
        .route("/leads/{id}/metadata", patch(api::leads::update_metadata))
        .route("/leads/{id}/assign", post(api::leads::assign_lead))
        .route("/leads/{id}/contacted", post(api::leads::mark_contacted))
        // Employees
        .route("/employees", get(api::employees::list_employees))
        .route("/employees", post(api::employees::create_employee))
        .route("/employees/{id}", get(api::employees::get_employee))
        .route("/employees/{id}", patch(api::employees::update_employee))
        // Roles and permissions
        .route("/roles", post(api::roles::create_role))
        .route("/roles/{id}", get(api::roles::get_role))
        .route("/roles/{id}/permissions", post(api::roles::grant_permission))
        .route("/permissions", post(api::roles::create_permission))
        // Authorization checks
        .route("/authz/check", post(api::authz::check))
        .route("/authz/check-batch", post(api::authz::check_batch))
        // Attendance
        .route("/attendance", get(api::attendance::list_attendance))
        .route("/attendance/check-in", post(api::attendance::check_in))
        .route("/attendance/check-out", post(api::attendance::check_out))
        // Geofences
        .route("/geofences", get(api::geofences::list_geofences))
        .route("/geofences", post(api::geofences::create_geofence))
        // Notifications
        .route("/notifications", get(api::notifications::list_notifications))
        .route("/notifications/{id}/read", post(api::notifications::mark_read))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
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

/// Periodically purge expired cache entries.
fn spawn_cache_sweeper(cache: Arc<TtlCache>, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = cache.sweep();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired cache entries");
            }
        }
    });
}

/// Run the reassignment sweep on an interval. A single task, so sweep
/// passes never overlap.
fn spawn_reassignment_worker(
    engine: Arc<LeadEngine>,
    interval: std::time::Duration,
    threshold_hours: i64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = engine.run_reassignment_sweep(threshold_hours).await;
            if report.reassigned_count > 0 {
                tracing::info!(
                    reassigned = report.reassigned_count,
                    "Scheduled sweep reassigned stale leads"
                );
            }
        }
    });
}

#[cfg(test)]
mod tests;
