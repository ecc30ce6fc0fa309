//! HTTP surface: the key helper endpoint plus health and log views

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::error::ReminderError;
use crate::logging::{LogEntry, SharedLogBuffer};
use crate::managers::{apply_remaining_keys, KeyUpdateOutcome};
use crate::models::PerBoss;
use crate::state::SharedClanStore;

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SharedClanStore,
    pub log_buffer: SharedLogBuffer,
}

/// Query sent by the key helper
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyUpdateParams {
    umid: Option<String>,
    hydra_keys_remaining: Option<String>,
    chimera_keys_remaining: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    count: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/logs", get(recent_logs))
        .route(
            "/updateDataFromHelper",
            get(update_data_from_helper).fallback(method_not_allowed),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the router until the process exits
pub async fn start_web_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}

async fn recent_logs(
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> Json<Vec<LogEntry>> {
    Json(state.log_buffer.recent(params.count.unwrap_or(100)))
}

async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
}

async fn update_data_from_helper(
    State(state): State<AppState>,
    Query(params): Query<KeyUpdateParams>,
) -> Response {
    info!("Request received: {:?}", params);

    let remaining = PerBoss::new(params.hydra_keys_remaining, params.chimera_keys_remaining);
    match apply_remaining_keys(state.store.as_ref(), params.umid.as_deref(), &remaining).await {
        Ok(KeyUpdateOutcome::Updated { member_id, .. }) => (
            StatusCode::OK,
            format!("OK: Member {} updated.", member_id),
        )
            .into_response(),
        Ok(KeyUpdateOutcome::NothingToUpdate { .. }) => {
            (StatusCode::OK, "OK: No valid data provided to update.").into_response()
        }
        Err(e @ ReminderError::Validation { .. }) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e @ ReminderError::MemberNotFound { .. }) => {
            (StatusCode::NOT_FOUND, e.to_string()).into_response()
        }
        Err(e) => {
            error!("Error updating member data: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
