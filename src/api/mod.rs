pub mod errors;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::errors::EngineError;
use crate::events::ScanEvent;

/// One in-flight or completed scan's live handle: the cancellation token the
/// `/stop` route uses and a broadcast channel the `/events` SSE route
/// subscribes to (§4.9, §6 event stream).
///
/// This is the reference wiring the "HTTP surface" collaborator (out of
/// scope per §1) would build on — enough to prove the `EventSink` contract
/// drains cleanly over axum, not a full dashboard API.
pub struct ScanHandle {
    pub cancel: CancellationToken,
    pub events: broadcast::Sender<ScanEvent>,
    pub status: RwLock<String>,
}

impl ScanHandle {
    pub(crate) fn from_parts(cancel: CancellationToken, events: broadcast::Sender<ScanEvent>) -> Self {
        Self { cancel, events, status: RwLock::new("running".to_string()) }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub active_scans: Arc<DashMap<String, Arc<ScanHandle>>>,
    pub concurrency: usize,
}

pub async fn create_app_state(db_path: &str, concurrency: usize) -> Result<AppState, EngineError> {
    let db = Database::open(db_path)?;
    Ok(AppState { db, active_scans: Arc::new(DashMap::new()), concurrency })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/accounts", post(routes::accounts::create_account))
        .route("/api/accounts/{id}", get(routes::accounts::get_account).delete(routes::accounts::delete_account))
        .route("/api/accounts/{id}/findings", get(routes::accounts::list_findings))
        .route("/api/accounts/{id}/scans", post(routes::scans::trigger_scan))
        .route("/api/scans/{id}/events", get(routes::scans::stream_events))
        .route("/api/scans/{id}/status", get(routes::scans::get_status))
        .route("/api/scans/{id}/stop", post(routes::scans::stop_scan))
        .with_state(state)
}
