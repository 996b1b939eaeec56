use axum::body::Body;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sentryscan::api::{build_router, create_app_state};
use tower::ServiceExt;

async fn app() -> axum::Router {
    let state = create_app_state(":memory:", 4).await.unwrap();
    build_router(state)
}

fn make_request(method: &str, uri: &str, body: Option<Value>) -> axum::http::Request<Body> {
    let builder = axum::http::Request::builder().method(method).uri(uri).header("content-type", "application/json");
    match body {
        Some(b) => builder.body(Body::from(serde_json::to_string(&b).unwrap())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn response_json(response: axum::http::Response<Body>) -> Value {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        panic!("empty response body, status={}", parts.status);
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("JSON parse error: {e}. Body: {:?}", String::from_utf8_lossy(&bytes)))
}

fn credential() -> Value {
    json!({ "access_token": "tok-123", "principal_email": "svc@example.iam.gserviceaccount.com", "declared_project_id": "proj-1" })
}

#[tokio::test]
async fn health_check_reports_ok() {
    let req = make_request("GET", "/api/health", None);
    let response = app().await.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_and_fetch_account_never_returns_the_credential() {
    let router = app().await;

    let req = make_request(
        "POST",
        "/api/accounts",
        Some(json!({
            "project_id": "proj-1",
            "name": "Acme Corp",
            "purpose": "production",
            "credential": credential(),
            "services": ["compute", "firewall"],
        })),
    );
    let response = router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let account_id = body["id"].as_str().unwrap().to_string();

    let req = make_request("GET", &format!("/api/accounts/{account_id}"), None);
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["project_id"], "proj-1");
    assert_eq!(body["name"], "Acme Corp");
    assert!(body.get("credential").is_none());
    assert!(body.get("access_token").is_none());
}

#[tokio::test]
async fn get_unknown_account_is_not_found() {
    let req = make_request("GET", "/api/accounts/nonexistent", None);
    let response = app().await.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_account_then_get_returns_not_found() {
    let router = app().await;

    let req = make_request(
        "POST",
        "/api/accounts",
        Some(json!({ "project_id": "proj-2", "name": "Globex", "credential": credential() })),
    );
    let response = router.clone().oneshot(req).await.unwrap();
    let body = response_json(response).await;
    let account_id = body["id"].as_str().unwrap().to_string();

    let req = make_request("DELETE", &format!("/api/accounts/{account_id}"), None);
    let response = router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let req = make_request("GET", &format!("/api/accounts/{account_id}"), None);
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_findings_for_a_fresh_account_is_empty() {
    let router = app().await;

    let req = make_request(
        "POST",
        "/api/accounts",
        Some(json!({ "project_id": "proj-3", "name": "Initech", "credential": credential() })),
    );
    let response = router.clone().oneshot(req).await.unwrap();
    let body = response_json(response).await;
    let account_id = body["id"].as_str().unwrap().to_string();

    let req = make_request("GET", &format!("/api/accounts/{account_id}/findings"), None);
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total"], 0);
    assert!(body["findings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_findings_rejects_an_unknown_severity_filter() {
    let router = app().await;

    let req = make_request(
        "POST",
        "/api/accounts",
        Some(json!({ "project_id": "proj-4", "name": "Umbrella", "credential": credential() })),
    );
    let response = router.clone().oneshot(req).await.unwrap();
    let body = response_json(response).await;
    let account_id = body["id"].as_str().unwrap().to_string();

    let req = make_request("GET", &format!("/api/accounts/{account_id}/findings?severity=catastrophic"), None);
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn trigger_scan_on_unknown_account_is_not_found() {
    let req = make_request("POST", "/api/accounts/nonexistent/scans", Some(json!({})));
    let response = app().await.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scan_status_and_stop_on_an_unknown_id_are_not_found() {
    let router = app().await;

    let req = make_request("GET", "/api/scans/nonexistent/status", None);
    let response = router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let req = make_request("POST", "/api/scans/nonexistent/stop", None);
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
