use tracing::warn;

use crate::cloud::provider::{CloudCredential, CloudProvider};
use crate::logs;
use crate::models::asset::{Asset, AssetType};
use crate::models::finding::{Finding, Severity};
use crate::models::log_line::{EventType, LogLine};
use crate::models::scan_state::ScannedAssetRecord;

use super::scanned_record;

const LOG_WINDOW_HOURS: u32 = 24;
const ERROR_THRESHOLD: usize = 5;
const AUTH_FAILURE_THRESHOLD: usize = 3;

/// Fetches and classifies the recent logs for one private asset, then
/// applies the per-asset threshold rules (§4.5). A provider-call failure
/// degrades to no log lines and no findings — never a propagated error.
pub async fn analyze_private_asset(
    asset: &Asset,
    project_id: &str,
    credential: &CloudCredential,
    provider: &dyn CloudProvider,
    max_entries: usize,
) -> (Vec<LogLine>, Vec<Finding>, ScannedAssetRecord) {
    let filter = resource_filter(asset);

    let raw = match provider
        .fetch_logs(project_id, credential, &filter, max_entries.min(200), LOG_WINDOW_HOURS)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            warn!(asset = %asset.name, error = %e, "log fetch failed for private asset");
            return (Vec::new(), Vec::new(), scanned_record(&asset.name, 0));
        }
    };

    let log_lines = logs::parse_batch(&raw, 0);
    let findings = threshold_findings(asset, &log_lines);
    let record = scanned_record(&asset.name, findings.len());
    (log_lines, findings, record)
}

fn resource_filter(asset: &Asset) -> String {
    match asset.asset_type {
        AssetType::ComputeInstance => format!(r#"resource.type="gce_instance" AND resource.labels.instance_id="{}""#, asset.name),
        AssetType::ObjectBucket => format!(r#"resource.type="gcs_bucket" AND resource.labels.bucket_name="{}""#, asset.name),
        AssetType::SqlInstance => format!(r#"resource.type="cloudsql_database" AND resource.labels.database_id:"{}""#, asset.name),
        AssetType::FirewallRule | AssetType::LogSummary => format!(r#"jsonPayload.resource_name="{}""#, asset.name),
    }
}

fn threshold_findings(asset: &Asset, log_lines: &[LogLine]) -> Vec<Finding> {
    let error_count = log_lines
        .iter()
        .filter(|l| matches!(l.event_type, EventType::Error | EventType::ServerError))
        .count();
    let auth_failure_count = log_lines.iter().filter(|l| l.event_type == EventType::FailedAuth).count();

    let mut findings = Vec::new();

    if error_count > ERROR_THRESHOLD {
        findings.push(Finding::new(
            "log_001",
            "Elevated Error Rate in Logs",
            format!(
                "{} error-level log entries observed for '{}' in the last {} hours.",
                error_count, asset.name, LOG_WINDOW_HOURS
            ),
            Severity::Medium,
            asset.location_label(),
        ));
    }

    if auth_failure_count > AUTH_FAILURE_THRESHOLD {
        findings.push(Finding::new(
            "log_002",
            "Repeated Authentication Failures",
            format!(
                "{} authentication failures observed for '{}' in the last {} hours.",
                auth_failure_count, asset.name, LOG_WINDOW_HOURS
            ),
            Severity::High,
            asset.location_label(),
        ));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn make_lines(event_types: &[EventType]) -> Vec<LogLine> {
        event_types
            .iter()
            .enumerate()
            .map(|(i, et)| LogLine {
                index: i,
                timestamp: None,
                source: String::new(),
                event_type: *et,
                source_ip: String::new(),
                dest_ip: String::new(),
                user: String::new(),
                details: String::new(),
                raw_text: String::new(),
                is_valid: true,
                parse_error: None,
            })
            .collect()
    }

    #[test]
    fn error_threshold_is_strictly_greater_than_five() {
        let asset = Asset::new(AssetType::ComputeInstance, "vm-1");
        let five = make_lines(&[EventType::Error; 5]);
        assert!(threshold_findings(&asset, &five).is_empty());

        let six = make_lines(&[EventType::Error; 6]);
        let findings = threshold_findings(&asset, &six);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_code, "log_001");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn auth_failure_threshold_is_strictly_greater_than_three() {
        let asset = Asset::new(AssetType::ComputeInstance, "vm-1");
        let three = make_lines(&[EventType::FailedAuth; 3]);
        assert!(threshold_findings(&asset, &three).is_empty());

        let four = make_lines(&[EventType::FailedAuth; 4]);
        let findings = threshold_findings(&asset, &four);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_code, "log_002");
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn both_thresholds_can_fire_together() {
        let asset = Asset::new(AssetType::ComputeInstance, "vm-1");
        let mut types = vec![EventType::Error; 6];
        types.extend(vec![EventType::FailedAuth; 4]);
        let lines = make_lines(&types);
        let findings = threshold_findings(&asset, &lines);
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn resource_filter_embeds_asset_name_per_type() {
        let vm = Asset::new(AssetType::ComputeInstance, "vm-1");
        assert!(resource_filter(&vm).contains("vm-1"));
        assert!(resource_filter(&vm).contains("gce_instance"));

        let bucket = Asset::new(AssetType::ObjectBucket, "my-bucket");
        assert!(resource_filter(&bucket).contains("gcs_bucket"));
    }

    struct EmptyLogsProvider;

    #[async_trait]
    impl CloudProvider for EmptyLogsProvider {
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
            _: &str,
            _: &CloudCredential,
            _: &str,
        ) -> Result<Vec<String>, crate::errors::EngineError> {
            unimplemented!()
        }
        async fn fetch_logs(
            &self,
            _: &str,
            _: &CloudCredential,
            _: &str,
            _: usize,
            _: u32,
        ) -> Result<Vec<String>, crate::errors::EngineError> {
            Ok(vec!["WARNING nothing interesting".to_string()])
        }
    }

    #[tokio::test]
    async fn analyze_private_asset_returns_parsed_lines_and_no_findings_below_threshold() {
        let provider = EmptyLogsProvider;
        let asset = Asset::new(AssetType::ComputeInstance, "vm-1");
        let credential = CloudCredential {
            access_token: "tok".to_string(),
            principal_email: None,
            declared_project_id: None,
        };
        let (lines, findings, record) = analyze_private_asset(&asset, "proj", &credential, &provider, 200).await;
        assert_eq!(lines.len(), 1);
        assert!(findings.is_empty());
        assert_eq!(record.issues_found, 0);
    }
}
