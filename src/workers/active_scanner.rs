use serde_json::Value;
use tracing::warn;

use crate::cloud::provider::{CloudCredential, CloudProvider};
use crate::models::asset::{Asset, AssetType};
use crate::models::finding::{Finding, Severity};
use crate::models::scan_state::ScannedAssetRecord;

use super::scanned_record;

/// One public asset's compliance rule check (§4.4). Any provider-call
/// failure degrades to an empty finding list — never a graph-level error.
pub async fn scan_public_asset(
    asset: &Asset,
    project_id: &str,
    credential: &CloudCredential,
    provider: &dyn CloudProvider,
) -> (Vec<Finding>, ScannedAssetRecord) {
    let findings = match asset.asset_type {
        AssetType::FirewallRule => check_open_ssh(asset),
        AssetType::ObjectBucket => check_public_bucket(asset, project_id, credential, provider).await,
        AssetType::ComputeInstance => check_default_service_account(asset),
        AssetType::SqlInstance | AssetType::LogSummary => Vec::new(),
    };
    let record = scanned_record(&asset.name, findings.len());
    (findings, record)
}

/// `"22"` matches; `"lo-hi"` matches iff `lo <= 22 <= hi`; anything else
/// (including the empty string and non-numeric input) does not match.
pub fn port_range_covers_ssh(range: &str) -> bool {
    if let Some((lo, hi)) = range.split_once('-') {
        match (lo.trim().parse::<u32>(), hi.trim().parse::<u32>()) {
            (Ok(lo), Ok(hi)) => lo <= 22 && 22 <= hi,
            _ => false,
        }
    } else {
        range.trim().parse::<u32>().map(|p| p == 22).unwrap_or(false)
    }
}

fn check_open_ssh(asset: &Asset) -> Vec<Finding> {
    let direction_ingress = asset
        .metadata
        .get("direction")
        .and_then(Value::as_str)
        .map(|d| d.eq_ignore_ascii_case("ingress"))
        .unwrap_or(false);
    if !direction_ingress {
        return Vec::new();
    }

    let has_open_range = asset
        .metadata
        .get("source_ranges")
        .and_then(Value::as_array)
        .map(|ranges| {
            ranges
                .iter()
                .filter_map(Value::as_str)
                .any(|r| r == "0.0.0.0/0" || r == "::/0")
        })
        .unwrap_or(false);
    if !has_open_range {
        return Vec::new();
    }

    let exposes_ssh = asset
        .metadata
        .get("allowed")
        .and_then(Value::as_array)
        .map(|rules| {
            rules.iter().any(|rule| {
                let is_tcp = rule
                    .get("IPProtocol")
                    .and_then(Value::as_str)
                    .map(|p| p.eq_ignore_ascii_case("tcp"))
                    .unwrap_or(false);
                let covers_22 = rule
                    .get("ports")
                    .and_then(Value::as_array)
                    .map(|ports| {
                        ports
                            .iter()
                            .filter_map(Value::as_str)
                            .any(port_range_covers_ssh)
                    })
                    .unwrap_or(false);
                is_tcp && covers_22
            })
        })
        .unwrap_or(false);
    if !exposes_ssh {
        return Vec::new();
    }

    let mut finding = Finding::new(
        "gcp_002",
        "Open SSH Port to the Internet",
        format!(
            "Firewall rule '{}' allows ingress TCP traffic on port 22 from anywhere (0.0.0.0/0).",
            asset.name
        ),
        Severity::High,
        asset.location_label(),
    );
    finding.fix_time = Some("10 min".to_string());
    vec![finding]
}

async fn check_public_bucket(
    asset: &Asset,
    project_id: &str,
    credential: &CloudCredential,
    provider: &dyn CloudProvider,
) -> Vec<Finding> {
    let members = match provider.get_bucket_iam_members(project_id, credential, &asset.name).await {
        Ok(members) => members,
        Err(e) => {
            warn!(bucket = %asset.name, error = %e, "bucket IAM policy fetch failed");
            return Vec::new();
        }
    };

    let publicly_exposed = members
        .iter()
        .any(|m| m == "allUsers" || m == "allAuthenticatedUsers");
    if !publicly_exposed {
        return Vec::new();
    }

    // One issue per bucket — first match short-circuits.
    let mut finding = Finding::new(
        "gcp_004",
        "Publicly Accessible Storage Bucket",
        format!(
            "Bucket '{}' grants access to allUsers or allAuthenticatedUsers via its IAM policy.",
            asset.name
        ),
        Severity::Critical,
        asset.location_label(),
    );
    finding.fix_time = Some("5 min".to_string());
    vec![finding]
}

fn check_default_service_account(asset: &Asset) -> Vec<Finding> {
    const DEFAULT_SA_SUFFIX: &str = "compute@developer.gserviceaccount.com";

    let uses_default_sa = asset
        .metadata
        .get("service_accounts")
        .and_then(Value::as_array)
        .map(|sas| {
            sas.iter().any(|sa| {
                sa.get("email")
                    .and_then(Value::as_str)
                    .map(|email| email.contains(DEFAULT_SA_SUFFIX))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);
    if !uses_default_sa {
        return Vec::new();
    }

    let mut finding = Finding::new(
        "gcp_006",
        "Compute Instance Using Default Service Account",
        format!(
            "Instance '{}' runs with the project's default compute service account, which carries the broad Editor role.",
            asset.name
        ),
        Severity::Medium,
        asset.location_label(),
    );
    finding.fix_time = Some("20 min".to_string());
    vec![finding]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    #[test]
    fn port_matcher_exact_cases_from_spec() {
        assert!(port_range_covers_ssh("22"));
        assert!(port_range_covers_ssh("0-65535"));
        assert!(port_range_covers_ssh("20-25"));
        assert!(!port_range_covers_ssh("1-21"));
        assert!(!port_range_covers_ssh("23-100"));
        assert!(!port_range_covers_ssh("abc"));
        assert!(!port_range_covers_ssh(""));
    }

    fn open_ssh_firewall() -> Asset {
        Asset::new(AssetType::FirewallRule, "allow-ssh")
            .with_metadata("direction", json!("INGRESS"))
            .with_metadata("source_ranges", json!(["0.0.0.0/0"]))
            .with_metadata("allowed", json!([{"IPProtocol": "tcp", "ports": ["22"]}]))
    }

    #[test]
    fn open_ssh_rule_is_flagged() {
        let findings = check_open_ssh(&open_ssh_firewall());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_code, "gcp_002");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].location, "Firewall: allow-ssh");
    }

    #[test]
    fn egress_rule_is_not_flagged_even_if_open() {
        let asset = Asset::new(AssetType::FirewallRule, "allow-egress")
            .with_metadata("direction", json!("EGRESS"))
            .with_metadata("source_ranges", json!(["0.0.0.0/0"]))
            .with_metadata("allowed", json!([{"IPProtocol": "tcp", "ports": ["22"]}]));
        assert!(check_open_ssh(&asset).is_empty());
    }

    #[test]
    fn default_service_account_is_flagged() {
        let asset = Asset::new(AssetType::ComputeInstance, "web-vm").with_metadata(
            "service_accounts",
            json!([{"email": "123-compute@developer.gserviceaccount.com"}]),
        );
        let findings = check_default_service_account(&asset);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_code, "gcp_006");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn custom_service_account_is_not_flagged() {
        let asset = Asset::new(AssetType::ComputeInstance, "web-vm").with_metadata(
            "service_accounts",
            json!([{"email": "custom-sa@my-project.iam.gserviceaccount.com"}]),
        );
        assert!(check_default_service_account(&asset).is_empty());
    }

    struct StubProvider {
        members: Vec<String>,
    }

    #[async_trait]
    impl CloudProvider for StubProvider {
        async fn probe_credential(
            &self,
            _project_id: &str,
            _credential: &CloudCredential,
        ) -> crate::models::asset::CredentialProbe {
            unimplemented!()
        }
        async fn list_firewall_rules(&self, _: &str, _: &CloudCredential) -> Result<Vec<Asset>, crate::errors::EngineError> {
            unimplemented!()
        }
        async fn list_compute_instances(&self, _: &str, _: &CloudCredential) -> Result<Vec<Asset>, crate::errors::EngineError> {
            unimplemented!()
        }
        async fn list_buckets(&self, _: &str, _: &CloudCredential) -> Result<Vec<Asset>, crate::errors::EngineError> {
            unimplemented!()
        }
        async fn list_sql_instances(&self, _: &str, _: &CloudCredential) -> Result<Vec<Asset>, crate::errors::EngineError> {
            unimplemented!()
        }
        async fn get_bucket_iam_members(
            &self,
            _project_id: &str,
            _credential: &CloudCredential,
            _bucket_name: &str,
        ) -> Result<Vec<String>, crate::errors::EngineError> {
            Ok(self.members.clone())
        }
        async fn fetch_logs(
            &self,
            _: &str,
            _: &CloudCredential,
            _: &str,
            _: usize,
            _: u32,
        ) -> Result<Vec<String>, crate::errors::EngineError> {
            unimplemented!()
        }
    }

    fn credential() -> CloudCredential {
        CloudCredential {
            access_token: "tok".to_string(),
            principal_email: None,
            declared_project_id: None,
        }
    }

    #[tokio::test]
    async fn public_bucket_with_all_users_is_flagged() {
        let provider = StubProvider { members: vec!["allUsers".to_string()] };
        let asset = Asset::new(AssetType::ObjectBucket, "public-assets");
        let findings = check_public_bucket(&asset, "proj", &credential(), &provider).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_code, "gcp_004");
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn private_bucket_is_not_flagged() {
        let provider = StubProvider { members: vec!["serviceAccount:x@y.iam.gserviceaccount.com".to_string()] };
        let asset = Asset::new(AssetType::ObjectBucket, "private-assets");
        let findings = check_public_bucket(&asset, "proj", &credential(), &provider).await;
        assert!(findings.is_empty());
    }
}
