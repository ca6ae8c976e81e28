use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    db::size::database_size,
    middleware::rate_limit::{check_rate_limit, client_key},
    models::tenant::{CreateDatabaseRequest, CreateDatabaseResponse},
    services::{
        sessions::{SessionRestore, SessionStore},
        stats::StatsService,
    },
    AppState,
};

/// POST /create-database: one database per verified session, one per minute per client.
pub async fn create_database(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<CreateDatabaseRequest>,
) -> Result<Json<CreateDatabaseResponse>, (StatusCode, Json<Value>)> {
    let mut redis = state.redis.clone();
    let key = client_key("create-database", &headers, peer, state.config.trust_proxy_headers);
    check_rate_limit(&mut redis, &key, 1, 60).await?;

    if !SessionStore::is_valid_id(&body.session_id) {
        return Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Session not verified" }))));
    }

    // Consume up front so two concurrent requests cannot share one session.
    let consumed = SessionStore::consume(&mut redis, &body.session_id)
        .await
        .map_err(|e| {
            tracing::error!("Session lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal server error" })))
        })?;
    if !consumed {
        return Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Session not verified" }))));
    }

    // Restores the session unless creation succeeds, including when the
    // client disconnects and this future is dropped.
    let restore = SessionRestore::new(redis.clone(), &body.session_id, state.config.session_ttl_secs);

    let provisioned = match state.provisioner.provision_detached().await {
        Ok(provisioned) => provisioned,
        Err(e) => {
            tracing::error!("Database creation failed: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to create database" })),
            ));
        }
    };
    restore.disarm();

    let identity = &provisioned.identity;

    if let Some(stats_db) = &state.stats_db {
        if let Err(e) = StatsService::record_creation(stats_db, &identity.db_name).await {
            tracing::warn!(db = %identity.db_name, "Could not record database creation: {:#}", e);
        }
    }

    let size = match database_size(&state.registry, &identity.db_name, &identity.username, &identity.password).await {
        Ok(size) => Some(size),
        Err(e) => {
            tracing::warn!(db = %identity.db_name, "Size query failed: {}", e);
            None
        }
    };

    Ok(Json(CreateDatabaseResponse {
        db_name: identity.db_name.clone(),
        username: identity.username.clone(),
        password: identity.password.clone(),
        direct_connection_url: provisioned.connection_url.clone(),
        pooled_connection_url: provisioned.pooled_connection_url.clone(),
        size_bytes: size.as_ref().map(|s| s.bytes),
        size: size.map(|s| s.pretty),
        reset_time: state.config.reset_time.clone(),
    }))
}
