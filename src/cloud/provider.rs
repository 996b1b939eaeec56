use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::asset::{Asset, CredentialProbe};

/// A resolved cloud credential. `access_token` is expected to already be a
/// short-lived bearer token (obtained out-of-band — token minting from a
/// service-account private key is a dashboard/auth concern per the engine's
/// scope). `declared_project_id` is read from the credential material itself
/// (e.g. a service-account JSON's `project_id` field) and used for the
/// project-mismatch warning in the credential probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudCredential {
    pub access_token: String,
    pub principal_email: Option<String>,
    pub declared_project_id: Option<String>,
}

/// Everything the outer Scan Graph's Discovery node and per-asset workers
/// need from a cloud provider. One implementation per provider (this crate
/// ships [`gcp::GcpProvider`]); all methods degrade to a caught error rather
/// than a panic so a per-service failure never aborts the scan.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Minimum-cost "list 1 item" probe per service, used by Discovery
    /// before enumerating anything.
    async fn probe_credential(&self, project_id: &str, credential: &CloudCredential) -> CredentialProbe;

    async fn list_firewall_rules(&self, project_id: &str, credential: &CloudCredential) -> Result<Vec<Asset>, EngineError>;

    async fn list_compute_instances(&self, project_id: &str, credential: &CloudCredential) -> Result<Vec<Asset>, EngineError>;

    async fn list_buckets(&self, project_id: &str, credential: &CloudCredential) -> Result<Vec<Asset>, EngineError>;

    async fn list_sql_instances(&self, project_id: &str, credential: &CloudCredential) -> Result<Vec<Asset>, EngineError>;

    /// Every member string (e.g. `allUsers`) across all bindings of a
    /// bucket's IAM policy.
    async fn get_bucket_iam_members(&self, project_id: &str, credential: &CloudCredential, bucket_name: &str) -> Result<Vec<String>, EngineError>;

    /// Raw log entry text lines, newest first, capped at `max_entries` and
    /// scoped to the trailing `hours_back` window.
    async fn fetch_logs(
        &self,
        project_id: &str,
        credential: &CloudCredential,
        filter: &str,
        max_entries: usize,
        hours_back: u32,
    ) -> Result<Vec<String>, EngineError>;
}
