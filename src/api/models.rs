use serde::{Deserialize, Serialize};

use crate::cloud::provider::CloudCredential;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub project_id: String,
    pub name: String,
    pub purpose: Option<String>,
    pub credential: CloudCredential,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountIdResponse {
    pub id: String,
}

/// Body for `POST /api/accounts/{id}/scans`. An empty `services` list means
/// "use whatever the account was registered with" — the common case.
#[derive(Debug, Deserialize, Default)]
pub struct TriggerScanRequest {
    pub services: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct FindingsQuery {
    pub status: Option<String>,
    pub severity: Option<String>,
}
