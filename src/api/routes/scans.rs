use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::Stream;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use crate::api::errors::ApiError;
use crate::api::models::TriggerScanRequest;
use crate::api::{AppState, ScanHandle};
use crate::cloud::gcp::GcpProvider;
use crate::cloud::provider::CloudProvider;
use crate::config::types::ScanLimits;
use crate::events::{EventSink, ScanEvent};
use crate::graph::GraphRuntime;
use crate::scan::{run_scan, ScanOptions};

/// Forwards every emitted event onto a broadcast channel the SSE route
/// drains — the "caller-supplied sink" the HTTP surface wires per §4.9.
struct BroadcastSink(tokio::sync::broadcast::Sender<ScanEvent>);

impl EventSink for BroadcastSink {
    fn emit(&self, event: ScanEvent) {
        let _ = self.0.send(event);
    }
}

pub async fn trigger_scan(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Json(req): Json<TriggerScanRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let account = state
        .db
        .get_account(&account_id)?
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "account not found".to_string()))?;

    let services = req.services.unwrap_or_else(|| account.services.clone());
    let scan_id = uuid::Uuid::new_v4().to_string();

    let limits = ScanLimits::default();
    let (events_tx, _) = tokio::sync::broadcast::channel(256);
    let runtime = GraphRuntime::new(Arc::new(BroadcastSink(events_tx.clone())), state.concurrency, Duration::from_secs(limits.per_stage_deadline_s));
    let handle = Arc::new(ScanHandle::from_parts(runtime.cancel_token(), events_tx));
    state.active_scans.insert(scan_id.clone(), handle.clone());

    let db = state.db.clone();
    let credential = account.credential.clone();
    let project_id = account.project_id.clone();
    let scan_options = ScanOptions::from(&limits);
    let handle_for_task = handle.clone();
    let account_id_for_task = account_id.clone();

    tokio::spawn(async move {
        let provider: Arc<dyn CloudProvider> = Arc::new(GcpProvider::new());
        let result = run_scan(&account_id_for_task, &project_id, services, credential, provider, None, scan_options, runtime).await;

        let _ = db.save_assets(&account_id_for_task, &result.assets);
        let _ = db.save_findings(&account_id_for_task, &result.correlated_findings);
        if let Ok(log_id) = db.create_scan_log(&account_id_for_task) {
            let _ = db.complete_scan_log(&log_id, &result.scan_log);
        }
        if let Some(scan_type) = result.scan_type {
            let _ = db.record_scan_completion(&account_id_for_task, scan_type);
        }

        *handle_for_task.status.write().await = result.status;
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "scan_id": scan_id, "status": "running" }))))
}

pub async fn stream_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let handle = state
        .active_scans
        .get(&id)
        .map(|entry| entry.clone())
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "no active or completed scan with that id".to_string()))?;

    let receiver = handle.events.subscribe();
    let stream = futures::stream::unfold(receiver, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    return Some((Ok::<_, Infallible>(Event::default().data(data)), rx));
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream))
}

pub async fn stop_scan(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.active_scans.get(&id) {
        Some(handle) => {
            handle.cancel.cancel();
            (StatusCode::OK, Json(json!({ "stopped": true })))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "no active scan found" }))),
    }
}

pub async fn get_status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let handle = state
        .active_scans
        .get(&id)
        .map(|entry| entry.clone())
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "no active or completed scan with that id".to_string()))?;
    let status = handle.status.read().await.clone();
    Ok(Json(json!({ "scan_id": id, "status": status })))
}
