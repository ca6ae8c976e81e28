use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::rate_limit::{check_rate_limit, client_key},
    services::stats::{CreationStats, StatsService},
    AppState,
};

/// GET /database-stats
pub async fn database_stats(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<CreationStats>, (StatusCode, Json<Value>)> {
    let mut redis = state.redis.clone();
    let key = client_key("database-stats", &headers, peer, state.config.trust_proxy_headers);
    check_rate_limit(&mut redis, &key, 10, 60).await?;

    let stats_db = state.stats_db.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "Statistics are not configured" })),
    ))?;

    StatsService::creation_stats(stats_db).await.map(Json).map_err(|e| {
        tracing::error!("Failed to get database stats: {:#}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Failed to get database stats" })))
    })
}
