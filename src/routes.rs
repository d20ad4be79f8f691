//! Route definitions and router setup
//!
//! The status surface is strictly read-only diagnostics: it renders the
//! monitors' status handles and offers no path that mutates a monitor or
//! its snapshot.

use crate::error::{MonitorError, MonitorResult};
use crate::state::{MonitorStatusView, SharedState};
use axum::{
    extract::{Path, State},
    http::{header, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Generic success envelope
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    fn with_data(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    Router::new()
        .route("/health", get(health_check))
        .route("/api/monitors", get(list_monitors))
        .route("/api/monitors/{name}", get(get_monitor))
        .layer(middleware)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// List status of every configured monitor
async fn list_monitors(
    State(state): State<SharedState>,
) -> Json<SuccessResponse<Vec<MonitorStatusView>>> {
    let mut views = Vec::with_capacity(state.monitors.len());
    for status in &state.monitors {
        views.push(status.view().await);
    }
    Json(SuccessResponse::with_data(views))
}

/// Status of a single monitor by name
async fn get_monitor(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> MonitorResult<Json<SuccessResponse<MonitorStatusView>>> {
    for status in &state.monitors {
        if status.name == name {
            return Ok(Json(SuccessResponse::with_data(status.view().await)));
        }
    }
    Err(MonitorError::NotFound(format!("Monitor '{}' not found", name)))
}
