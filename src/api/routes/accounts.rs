use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::api::errors::ApiError;
use crate::api::models::{AccountIdResponse, CreateAccountRequest, FindingsQuery};
use crate::api::AppState;
use crate::models::account::Account;
use crate::models::finding::{FindingStatus, Severity};

pub async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountIdResponse>), ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let mut account = Account::new(&id, &req.project_id, &req.name, req.credential);
    account.purpose = req.purpose;
    account.services = req.services;
    state.db.create_account(&account)?;
    Ok((StatusCode::CREATED, Json(AccountIdResponse { id })))
}

/// Credentials never round-trip through the API surface (§3 Ownership).
pub async fn get_account(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    match state.db.get_account(&id)? {
        Some(account) => Ok(Json(json!({
            "id": account.id,
            "project_id": account.project_id,
            "name": account.name,
            "purpose": account.purpose,
            "services": account.services,
            "status": account.status,
            "last_scan_at": account.last_scan_at,
            "last_scan_type": account.last_scan_type,
            "created_at": account.created_at,
        }))),
        None => Err(ApiError(StatusCode::NOT_FOUND, "account not found".to_string())),
    }
}

pub async fn delete_account(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let deleted = state.db.delete_account(&id)?;
    if !deleted {
        return Err(ApiError(StatusCode::NOT_FOUND, "account not found".to_string()));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub async fn list_findings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<FindingsQuery>,
) -> Result<Json<Value>, ApiError> {
    if state.db.get_account(&id)?.is_none() {
        return Err(ApiError(StatusCode::NOT_FOUND, "account not found".to_string()));
    }

    let status_filter = match query.status.as_deref() {
        Some("todo") => Some(FindingStatus::Todo),
        Some("in-progress") => Some(FindingStatus::InProgress),
        Some("ignored") => Some(FindingStatus::Ignored),
        Some("resolved") => Some(FindingStatus::Resolved),
        Some(other) => return Err(ApiError(StatusCode::BAD_REQUEST, format!("unknown status filter: {other}"))),
        None => None,
    };
    let severity_filter = match query.severity.as_deref() {
        Some("critical") => Some(Severity::Critical),
        Some("high") => Some(Severity::High),
        Some("medium") => Some(Severity::Medium),
        Some("low") => Some(Severity::Low),
        Some(other) => return Err(ApiError(StatusCode::BAD_REQUEST, format!("unknown severity filter: {other}"))),
        None => None,
    };

    let findings = state.db.list_findings(&id, status_filter, severity_filter)?;
    Ok(Json(json!({ "findings": findings, "total": findings.len() })))
}
