//! Axum webhook server: the two provider endpoints plus health.
//!
//! The provider contract drives the status codes: 2xx once the inbound is
//! durably logged (providers retry on anything else), 400 only for payloads
//! that could not be normalized at all.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::gateway::Gateway;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Token expected in the platform verification handshake.
    pub verify_token: String,
    pub started: Instant,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook/twilio", post(twilio_webhook))
        .route("/webhook/whatsapp", get(meta_verify).post(meta_webhook))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "siembra",
        "uptime_seconds": state.started.elapsed().as_secs(),
    }))
}

async fn twilio_webhook(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    match state.gateway.handle_twilio_webhook(&form).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!("rejecting twilio webhook: {e}");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

async fn meta_webhook(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    match state.gateway.handle_meta_webhook(&body).await {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(e) => {
            warn!("rejecting meta webhook: {e}");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// The platform verification handshake: echo the challenge when the verify
/// token matches, 403 otherwise.
async fn meta_verify(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode == Some("subscribe") && !state.verify_token.is_empty() && token == Some(state.verify_token.as_str()) {
        (StatusCode::OK, challenge).into_response()
    } else {
        warn!("webhook verification rejected (mode {mode:?})");
        StatusCode::FORBIDDEN.into_response()
    }
}
