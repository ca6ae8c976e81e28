pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::provisioner::Provisioner;
use db::registry::TenantPoolRegistry;
use services::verification::RecaptchaVerifier;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub provisioner: Arc<Provisioner>,
    pub registry: Arc<TenantPoolRegistry>,
    pub redis: redis::aio::MultiplexedConnection,
    pub verifier: Option<Arc<RecaptchaVerifier>>,
    pub stats_db: Option<PgPool>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let origin = match state
        .config
        .cors_allowed_origin
        .as_deref()
        .and_then(|o| HeaderValue::from_str(o).ok())
    {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::from(Any),
    };
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(origin);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Human verification
        .route("/verify", post(routes::verify::verify))
        .route("/verify-status", get(routes::verify::verify_status))
        // Provisioning
        .route("/create-database", post(routes::databases::create_database))
        .route("/database-stats", get(routes::stats::database_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
