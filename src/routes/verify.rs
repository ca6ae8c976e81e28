use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    models::tenant::{VerifyRequest, VerifyStatusQuery},
    services::sessions::SessionStore,
    AppState,
};

/// GET /verify-status: polled by the CLI while the user completes the challenge.
pub async fn verify_status(
    State(state): State<AppState>,
    Query(query): Query<VerifyStatusQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !SessionStore::is_valid_id(&query.session) {
        return Ok(Json(json!({ "verified": false })));
    }

    let mut redis = state.redis.clone();
    let verified = SessionStore::is_verified(&mut redis, &query.session)
        .await
        .map_err(|e| {
            tracing::error!("Session lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal server error" })))
        })?;

    Ok(Json(json!({ "verified": verified })))
}

/// POST /verify: exchange a reCAPTCHA token for a verified session.
pub async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let verifier = state.verifier.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "Human verification is not configured" })),
    ))?;

    if !SessionStore::is_valid_id(&body.session) {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid session" }))));
    }

    match verifier.verify(&body.recaptcha_token).await {
        Ok(true) => {
            let mut redis = state.redis.clone();
            SessionStore::mark_verified(&mut redis, &body.session, state.config.session_ttl_secs)
                .await
                .map_err(|e| {
                    tracing::error!("Could not store verified session: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal server error" })))
                })?;
            Ok(StatusCode::OK)
        }
        Ok(false) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "reCAPTCHA verification failed" })),
        )),
        Err(e) => {
            tracing::error!("reCAPTCHA verification failed: {:#}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal server error" }))))
        }
    }
}
