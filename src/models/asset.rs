use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cloud resource kind. The shape of `metadata` depends on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetType {
    FirewallRule,
    ComputeInstance,
    ObjectBucket,
    SqlInstance,
    LogSummary,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirewallRule => "firewall-rule",
            Self::ComputeInstance => "compute-instance",
            Self::ObjectBucket => "object-bucket",
            Self::SqlInstance => "sql-instance",
            Self::LogSummary => "log-summary",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cloud resource discovered from a provider.
///
/// Identity is `(asset_type, name, region)`. Every discovered asset has a
/// non-empty `name` and a known `asset_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub asset_type: AssetType,
    pub name: String,
    pub region: Option<String>,
    /// Typed metadata whose keys depend on `asset_type` — e.g. `source_ranges`,
    /// `direction`, `allowed` for firewall rules; `public_access_prevention` for
    /// buckets; `service_accounts`, `network_interfaces` for compute instances;
    /// `public_ip` for sql instances.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Asset {
    pub fn new(asset_type: AssetType, name: impl Into<String>) -> Self {
        Self {
            asset_type,
            name: name.into(),
            region: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// The `"<Prefix>: <name>"` form used as a `Finding.location` — the shape
    /// `correlation::extract_resource_name` and the remediation template
    /// engine's asset extraction both expect.
    pub fn location_label(&self) -> String {
        let prefix = match self.asset_type {
            AssetType::FirewallRule => "Firewall",
            AssetType::ComputeInstance => "Instance",
            AssetType::ObjectBucket => "Bucket",
            AssetType::SqlInstance => "Database",
            AssetType::LogSummary => return "Cloud Logging".to_string(),
        };
        format!("{prefix}: {}", self.name)
    }
}

/// Per-service result for one Discovery invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Success,
    Partial,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub service: String,
    pub status: ServiceStatus,
    pub duration_ms: u64,
    pub asset_count: usize,
    pub issue_count: usize,
    pub error: Option<String>,
}

/// Overall status of a persisted scan invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanLogStatus {
    Running,
    Success,
    Partial,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanLog {
    pub status: ScanLogStatus,
    pub summary: Option<String>,
    pub entries: Vec<ScanLogEntry>,
}

impl ScanLog {
    pub fn new() -> Self {
        Self {
            status: ScanLogStatus::Running,
            summary: None,
            entries: Vec::new(),
        }
    }
}

impl Default for ScanLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of the credential probe Discovery runs before enumerating any service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialProbe {
    pub principal: Option<String>,
    pub project_mismatch: bool,
    pub services: HashMap<String, ServiceAccessibility>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccessibility {
    pub accessible: bool,
    pub detail: String,
}

/// The services Discovery knows how to probe and enumerate (§4.2) —
/// `cloud_logging` is handled separately since it is always attempted
/// regardless of what its own probe reports.
pub const KNOWN_SERVICES: [&str; 4] = ["compute", "firewall", "storage", "sql"];

impl CredentialProbe {
    /// A probe result marking every known service (plus `cloud_logging`)
    /// accessible — the common case in tests for a credential with full
    /// permissions.
    pub fn all_accessible(principal: Option<String>) -> Self {
        let mut services = HashMap::new();
        for service in KNOWN_SERVICES.iter().chain(["cloud_logging"].iter()) {
            services.insert((*service).to_string(), ServiceAccessibility { accessible: true, detail: "ok".to_string() });
        }
        Self { principal, project_mismatch: false, services }
    }
}
