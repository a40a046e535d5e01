//! hort-gate library - RFID gate microservice
//!
//! Turns RFID scan events from classroom terminals into check-ins,
//! check-outs, room transfers, supervisor authentications and daily
//! checkouts, enforcing room and activity capacity along the way.

use axum::routing::{get, post};
use axum::{middleware, Router};
use hort_common::config::GateConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod api;
pub mod engine;
pub mod store;

use engine::daily::DailyCheckoutPolicy;
use engine::registry::ActionRegistry;
use engine::CheckinEngine;
use store::SqliteStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The scan workflow engine, bound to the SQLite store
    pub engine: Arc<CheckinEngine<SqliteStore>>,
    pub config: Arc<GateConfig>,
}

impl AppState {
    /// Create new application state with the registry and policy the
    /// engine needs, constructed once at startup.
    pub fn new(db: SqlitePool, config: GateConfig) -> Self {
        let engine = CheckinEngine::new(
            SqliteStore::new(db),
            ActionRegistry::default(),
            DailyCheckoutPolicy::new(config.daily_cutoff),
        );
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        }
    }
}

/// Build application router
///
/// All scan endpoints require a device token; `/health` does not.
pub fn build_router(state: AppState) -> Router {
    // Device-authenticated routes
    let protected = Router::new()
        .route("/checkin", post(api::handlers::checkin))
        .route("/ping", post(api::handlers::ping))
        .route("/status", get(api::handlers::device_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::device_auth::device_auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new().route("/health", get(api::handlers::health));

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
        // Enable CORS for local terminals
        .layer(CorsLayer::permissive())
}
