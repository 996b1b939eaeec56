use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::models::asset::{Asset, AssetType, CredentialProbe, ServiceAccessibility};

use super::provider::{CloudCredential, CloudProvider};

/// [`CloudProvider`] implementation against Google Cloud's REST surface
/// (Compute, Storage JSON API, Cloud Logging v2). Every method degrades to a
/// caught `EngineError` rather than a panic — Discovery relies on that to
/// skip a service without failing the whole scan.
pub struct GcpProvider {
    client: Client,
}

impl GcpProvider {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    fn auth_header(credential: &CloudCredential) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", credential.access_token))
    }

    async fn get_json(&self, url: &str, credential: &CloudCredential) -> Result<Value, EngineError> {
        let (header, value) = Self::auth_header(credential);
        let resp = self
            .client
            .get(url)
            .header(header, value)
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("GCP request to {url} failed: {e}")))?;

        let status = resp.status();
        if status == 401 || status == 403 {
            return Err(EngineError::Credential(format!(
                "GCP credential rejected ({status}) for {url}"
            )));
        }
        if status == 429 {
            return Err(EngineError::RateLimit(format!("GCP rate limit hit for {url}")));
        }
        if !status.is_success() {
            return Err(EngineError::CloudApi(format!("GCP returned {status} for {url}")));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| EngineError::CloudApi(format!("invalid JSON from {url}: {e}")))
    }
}

impl Default for GcpProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudProvider for GcpProvider {
    async fn probe_credential(&self, project_id: &str, credential: &CloudCredential) -> CredentialProbe {
        let mut services = HashMap::new();

        let compute_url = format!(
            "https://compute.googleapis.com/compute/v1/projects/{project_id}/aggregated/instances?maxResults=1"
        );
        services.insert(
            "compute".to_string(),
            probe_one(self.get_json(&compute_url, credential).await),
        );

        let firewall_url = format!(
            "https://compute.googleapis.com/compute/v1/projects/{project_id}/global/firewalls?maxResults=1"
        );
        services.insert(
            "firewall".to_string(),
            probe_one(self.get_json(&firewall_url, credential).await),
        );

        let storage_url = format!(
            "https://storage.googleapis.com/storage/v1/b?project={project_id}&maxResults=1"
        );
        services.insert(
            "storage".to_string(),
            probe_one(self.get_json(&storage_url, credential).await),
        );

        let sql_url = format!(
            "https://sqladmin.googleapis.com/v1/projects/{project_id}/instances?maxResults=1"
        );
        services.insert(
            "sql".to_string(),
            probe_one(self.get_json(&sql_url, credential).await),
        );

        // cloud_logging is always probed if any credential is supplied (§4.2).
        let logging_url = "https://logging.googleapis.com/v2/entries:list";
        let logging_probe = self
            .client
            .post(logging_url)
            .header("Authorization", format!("Bearer {}", credential.access_token))
            .json(&serde_json::json!({
                "resourceNames": [format!("projects/{project_id}")],
                "pageSize": 1,
            }))
            .send()
            .await;
        let accessible = match logging_probe {
            Ok(resp) if resp.status().is_success() => ServiceAccessibility {
                accessible: true,
                detail: "ok".to_string(),
            },
            Ok(resp) => ServiceAccessibility {
                accessible: false,
                detail: format!("status {}", resp.status()),
            },
            Err(e) => ServiceAccessibility {
                accessible: false,
                detail: e.to_string(),
            },
        };
        services.insert("cloud_logging".to_string(), accessible);

        let project_mismatch = match &credential.declared_project_id {
            Some(declared) if declared != project_id => {
                warn!(declared, project_id, "credential's declared project differs from scan target");
                true
            }
            _ => false,
        };

        CredentialProbe {
            principal: credential.principal_email.clone(),
            project_mismatch,
            services,
        }
    }

    async fn list_firewall_rules(&self, project_id: &str, credential: &CloudCredential) -> Result<Vec<Asset>, EngineError> {
        let url = format!("https://compute.googleapis.com/compute/v1/projects/{project_id}/global/firewalls");
        let body = self.get_json(&url, credential).await?;
        let items = body.get("items").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut assets = Vec::with_capacity(items.len());
        for item in items {
            let name = match item.get("name").and_then(Value::as_str) {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => continue,
            };
            let mut asset = Asset::new(AssetType::FirewallRule, name);
            for key in ["direction", "sourceRanges", "allowed", "targetTags", "network"] {
                if let Some(v) = item.get(key) {
                    asset.metadata.insert(to_snake_case(key), v.clone());
                }
            }
            assets.push(asset);
        }
        debug!(count = assets.len(), "listed firewall rules");
        Ok(assets)
    }

    async fn list_compute_instances(&self, project_id: &str, credential: &CloudCredential) -> Result<Vec<Asset>, EngineError> {
        let url = format!(
            "https://compute.googleapis.com/compute/v1/projects/{project_id}/aggregated/instances"
        );
        let body = self.get_json(&url, credential).await?;
        let mut assets = Vec::new();

        let Some(zones) = body.get("items").and_then(Value::as_object) else {
            return Ok(assets);
        };
        for (zone_path, zone_body) in zones {
            let Some(instances) = zone_body.get("instances").and_then(Value::as_array) else {
                continue;
            };
            let region = zone_path.rsplit('/').next().map(|s| s.to_string());
            for instance in instances {
                let name = match instance.get("name").and_then(Value::as_str) {
                    Some(n) if !n.is_empty() => n.to_string(),
                    _ => continue,
                };
                let mut asset = Asset::new(AssetType::ComputeInstance, name);
                asset.region = region.clone();
                for key in ["networkInterfaces", "serviceAccounts", "status"] {
                    if let Some(v) = instance.get(key) {
                        asset.metadata.insert(to_snake_case(key), v.clone());
                    }
                }
                assets.push(asset);
            }
        }
        debug!(count = assets.len(), "listed compute instances");
        Ok(assets)
    }

    async fn list_buckets(&self, project_id: &str, credential: &CloudCredential) -> Result<Vec<Asset>, EngineError> {
        let url = format!("https://storage.googleapis.com/storage/v1/b?project={project_id}");
        let body = self.get_json(&url, credential).await?;
        let items = body.get("items").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut assets = Vec::with_capacity(items.len());
        for item in items {
            let name = match item.get("name").and_then(Value::as_str) {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => continue,
            };
            let mut asset = Asset::new(AssetType::ObjectBucket, name);
            if let Some(pap) = item
                .get("iamConfiguration")
                .and_then(|c| c.get("publicAccessPrevention"))
            {
                asset.metadata.insert("public_access_prevention".to_string(), pap.clone());
            }
            if let Some(location) = item.get("location").and_then(Value::as_str) {
                asset.region = Some(location.to_string());
            }
            assets.push(asset);
        }
        debug!(count = assets.len(), "listed buckets");
        Ok(assets)
    }

    async fn list_sql_instances(&self, project_id: &str, credential: &CloudCredential) -> Result<Vec<Asset>, EngineError> {
        let url = format!("https://sqladmin.googleapis.com/v1/projects/{project_id}/instances");
        let body = self.get_json(&url, credential).await?;
        let items = body.get("items").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut assets = Vec::with_capacity(items.len());
        for item in items {
            let name = match item.get("name").and_then(Value::as_str) {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => continue,
            };
            let mut asset = Asset::new(AssetType::SqlInstance, name);
            let public_ip = item
                .get("ipAddresses")
                .and_then(Value::as_array)
                .map(|addrs| addrs.iter().any(|a| a.get("type").and_then(Value::as_str) == Some("PRIMARY")))
                .unwrap_or(false);
            asset.metadata.insert("public_ip".to_string(), Value::Bool(public_ip));
            if let Some(region) = item.get("region").and_then(Value::as_str) {
                asset.region = Some(region.to_string());
            }
            assets.push(asset);
        }
        debug!(count = assets.len(), "listed sql instances");
        Ok(assets)
    }

    async fn get_bucket_iam_members(
        &self,
        _project_id: &str,
        credential: &CloudCredential,
        bucket_name: &str,
    ) -> Result<Vec<String>, EngineError> {
        let url = format!("https://storage.googleapis.com/storage/v1/b/{bucket_name}/iam");
        let body = self.get_json(&url, credential).await?;
        let mut members = Vec::new();
        if let Some(bindings) = body.get("bindings").and_then(Value::as_array) {
            for binding in bindings {
                if let Some(ms) = binding.get("members").and_then(Value::as_array) {
                    for m in ms {
                        if let Some(s) = m.as_str() {
                            members.push(s.to_string());
                        }
                    }
                }
            }
        }
        Ok(members)
    }

    async fn fetch_logs(
        &self,
        project_id: &str,
        credential: &CloudCredential,
        filter: &str,
        max_entries: usize,
        hours_back: u32,
    ) -> Result<Vec<String>, EngineError> {
        let since = chrono::Utc::now() - chrono::Duration::hours(hours_back as i64);
        let full_filter = format!(
            "{filter} AND timestamp>=\"{}\"",
            since.to_rfc3339()
        );

        let (header, value) = Self::auth_header(credential);
        let resp = self
            .client
            .post("https://logging.googleapis.com/v2/entries:list")
            .header(header, value)
            .json(&serde_json::json!({
                "resourceNames": [format!("projects/{project_id}")],
                "filter": full_filter,
                "orderBy": "timestamp desc",
                "pageSize": max_entries,
            }))
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("Cloud Logging request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(EngineError::CloudApi(format!(
                "Cloud Logging returned {}",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| EngineError::CloudApi(format!("invalid logging JSON: {e}")))?;

        let entries = body.get("entries").and_then(Value::as_array).cloned().unwrap_or_default();
        let lines = entries
            .iter()
            .take(max_entries)
            .map(render_log_entry)
            .collect();
        Ok(lines)
    }
}

fn probe_one(result: Result<Value, EngineError>) -> ServiceAccessibility {
    match result {
        Ok(_) => ServiceAccessibility { accessible: true, detail: "ok".to_string() },
        Err(e) => ServiceAccessibility { accessible: false, detail: e.to_string() },
    }
}

/// Renders one Cloud Logging API entry back into the free-text line shape
/// the deterministic parser (§3 `[SUPPLEMENT] LogLine event_type set`) expects:
/// `"<SEVERITY> <textPayload or jsonPayload.message>"`.
fn render_log_entry(entry: &Value) -> String {
    let severity = entry.get("severity").and_then(Value::as_str).unwrap_or("DEFAULT");
    let message = entry
        .get("textPayload")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .or_else(|| {
            entry
                .get("jsonPayload")
                .and_then(|p| p.get("message"))
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        })
        .or_else(|| {
            entry
                .get("protoPayload")
                .map(|p| p.to_string())
        })
        .unwrap_or_default();
    format!("{severity} {message}")
}

fn to_snake_case(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    for (i, c) in camel.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("sourceRanges"), "source_ranges");
        assert_eq!(to_snake_case("networkInterfaces"), "network_interfaces");
        assert_eq!(to_snake_case("name"), "name");
    }

    #[test]
    fn render_log_entry_prefers_text_payload() {
        let entry = serde_json::json!({
            "severity": "WARNING",
            "textPayload": "Failed password for root",
        });
        assert_eq!(render_log_entry(&entry), "WARNING Failed password for root");
    }

    #[test]
    fn render_log_entry_falls_back_to_json_payload_message() {
        let entry = serde_json::json!({
            "severity": "ERROR",
            "jsonPayload": { "message": "disk full" },
        });
        assert_eq!(render_log_entry(&entry), "ERROR disk full");
    }
}
