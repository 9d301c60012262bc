// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - REST API Module
// Handles HTTP API endpoints for host control and the event stream

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::Event,
    response::{IntoResponse, Response, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};
use uuid::Uuid;

use shuttlecraft_common::{
    load_all_hosts_from, Error, HostEvent, HostStatus, OverallStatus, StatusResponse, Utc,
};

use crate::supervisor::SupervisorHandle;

/// Shared application state
pub struct AppState {
    pub supervisor: SupervisorHandle,
    pub hosts_dir: PathBuf,
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

/// API error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/hosts/reload", post(reload_hosts))
        .route("/api/hosts/:id", get(host_status))
        .route("/api/hosts/:id/connect", post(connect_host))
        .route("/api/hosts/:id/disconnect", post(disconnect_host))
        .route("/api/hosts/:id/toggle", post(toggle_host))
        .route("/api/events", get(event_stream))
        .with_state(state)
}

fn error_response(e: Error) -> Response {
    let status = match e {
        Error::HostNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

fn host_response(result: shuttlecraft_common::Result<HostStatus>) -> Response {
    match result {
        Ok(host) => (StatusCode::OK, Json(host)).into_response(),
        Err(e) => error_response(e),
    }
}

fn status_response(hosts: Vec<HostStatus>) -> Response {
    let overall = OverallStatus::from_hosts(&hosts);
    Json(StatusResponse { overall, hosts }).into_response()
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}

/// Overall indicator plus every host
async fn status(State(state): State<Arc<AppState>>) -> Response {
    match state.supervisor.list().await {
        Ok(hosts) => status_response(hosts),
        Err(e) => error_response(e),
    }
}

async fn host_status(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    host_response(state.supervisor.status(id).await)
}

async fn connect_host(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    info!("API: Connect request for {}", id);
    host_response(state.supervisor.connect(id).await)
}

async fn disconnect_host(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    info!("API: Disconnect request for {}", id);
    host_response(state.supervisor.disconnect(id).await)
}

async fn toggle_host(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    info!("API: Toggle request for {}", id);
    host_response(state.supervisor.toggle(id).await)
}

/// Re-read the host store and hand it to the supervisor
async fn reload_hosts(State(state): State<Arc<AppState>>) -> Response {
    info!("API: Reloading hosts from {}", state.hosts_dir.display());

    let hosts = match load_all_hosts_from(&state.hosts_dir) {
        Ok(hosts) => hosts,
        Err(e) => {
            error!("Failed to reload hosts: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("{:#}", e),
                }),
            )
                .into_response();
        }
    };

    match state.supervisor.sync_hosts(hosts).await {
        Ok(hosts) => status_response(hosts),
        Err(e) => error_response(e),
    }
}

/// GET /api/events  → SSE stream of host events
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.supervisor.subscribe();
    let mut shutdown_rx = state.shutdown_tx.subscribe();

    let host_events = BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(event) => event_payload(&event).map(|json| Ok(Event::default().data(json))),
            Err(lagged) => {
                // Slow client; it picks up again with the next event
                tracing::debug!("Event stream lagged: {:?}, continuing", lagged);
                None
            }
        }
    });

    let merged = stream::select(host_events, heartbeat_stream());

    let shutdown_aware = merged.take_until(async move {
        let _ = shutdown_rx.recv().await;
    });

    Sse::new(shutdown_aware)
}

fn event_payload(event: &HostEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to serialize event: {e}");
            None
        }
    }
}

fn heartbeat_stream(
) -> impl futures::Stream<Item = Result<Event, Infallible>> + Send + Sync + 'static {
    tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(heartbeat_interval())).map(
        |_| {
            let json = event_payload(&HostEvent::Heartbeat {
                timestamp: Utc::now(),
            })
            .unwrap_or_else(|| "{}".to_string());
            Ok(Event::default().data(json))
        },
    )
}

#[cfg(not(test))]
fn heartbeat_interval() -> Duration {
    Duration::from_secs(10)
}

#[cfg(test)]
fn heartbeat_interval() -> Duration {
    Duration::from_millis(100)
}
