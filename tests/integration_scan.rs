use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use sentryscan::cloud::provider::{CloudCredential, CloudProvider};
use sentryscan::db::Database;
use sentryscan::errors::EngineError;
use sentryscan::events::sink::NullSink;
use sentryscan::graph::GraphRuntime;
use sentryscan::models::account::Account;
use sentryscan::models::asset::{Asset, AssetType, CredentialProbe};
use sentryscan::scan::{run_scan, ScanOptions};

/// A fixed-fixture provider: one internet-facing firewall rule that opens
/// SSH to the world, plus enough failed-auth log lines to trip the
/// aggregate log-volume threshold — exercises Discovery, Routing, the
/// Active Scanner worker, and the aggregate log findings in one pass.
struct FixtureProvider;

#[async_trait]
impl CloudProvider for FixtureProvider {
    async fn probe_credential(&self, _project_id: &str, _credential: &CloudCredential) -> CredentialProbe {
        CredentialProbe::all_accessible(None)
    }

    async fn list_firewall_rules(&self, _project_id: &str, _credential: &CloudCredential) -> Result<Vec<Asset>, EngineError> {
        Ok(vec![Asset::new(AssetType::FirewallRule, "allow-ssh-from-anywhere")
            .with_metadata("direction", json!("INGRESS"))
            .with_metadata("source_ranges", json!(["0.0.0.0/0"]))
            .with_metadata("allowed", json!([{"IPProtocol": "tcp", "ports": ["22"]}]))])
    }

    async fn list_compute_instances(&self, _project_id: &str, _credential: &CloudCredential) -> Result<Vec<Asset>, EngineError> {
        Ok(Vec::new())
    }

    async fn list_buckets(&self, _project_id: &str, _credential: &CloudCredential) -> Result<Vec<Asset>, EngineError> {
        Ok(Vec::new())
    }

    async fn list_sql_instances(&self, _project_id: &str, _credential: &CloudCredential) -> Result<Vec<Asset>, EngineError> {
        Ok(Vec::new())
    }

    async fn get_bucket_iam_members(&self, _project_id: &str, _credential: &CloudCredential, _bucket_name: &str) -> Result<Vec<String>, EngineError> {
        Ok(Vec::new())
    }

    async fn fetch_logs(
        &self,
        _project_id: &str,
        _credential: &CloudCredential,
        _filter: &str,
        _max_entries: usize,
        _hours_back: u32,
    ) -> Result<Vec<String>, EngineError> {
        let mut lines: Vec<String> = (0..6)
            .map(|i| format!(r#"WARNING 203.0.113.{i} - - "GET /login HTTP/1.1" 401"#))
            .collect();
        lines.push(r#"INFO 203.0.113.1 - - "GET /dashboard HTTP/1.1" 200"#.to_string());
        Ok(lines)
    }
}

fn credential() -> CloudCredential {
    CloudCredential { access_token: "tok-fixture".to_string(), principal_email: None, declared_project_id: None }
}

fn default_options() -> ScanOptions {
    ScanOptions { max_log_entries: 500, log_window_hours: 24, burst_threshold: 1000, chunk_size: 200, sample_fraction: 0.05, sample_min: 1, sample_max: 50 }
}

fn runtime() -> GraphRuntime {
    GraphRuntime::new(Arc::new(NullSink), 4, Duration::from_secs(30))
}

/// End-to-end: Discovery through Aggregate+Correlate surfaces the open-SSH
/// finding and the auth-failure finding, and persisting + re-running the
/// same scan against the same database does not duplicate either (§6, §8).
#[tokio::test]
async fn full_scan_persists_findings_idempotently_across_rescans() {
    let db = Database::in_memory().unwrap();
    let account = Account::new("acct-fixture", "proj-fixture", "Fixture Co", credential());
    db.create_account(&account).unwrap();

    let provider: Arc<dyn CloudProvider> = Arc::new(FixtureProvider);

    let state = run_scan("acct-fixture", "proj-fixture", Vec::new(), credential(), provider.clone(), None, default_options(), runtime()).await;

    assert_eq!(state.status, "complete");
    assert!(state.correlated_findings.iter().any(|f| f.rule_code == "gcp_002"));
    assert!(state.correlated_findings.iter().any(|f| f.rule_code == "log_002"));

    let inserted_first = db.save_findings("acct-fixture", &state.correlated_findings).unwrap();
    assert_eq!(inserted_first, state.correlated_findings.len());

    let second_state = run_scan("acct-fixture", "proj-fixture", Vec::new(), credential(), provider, None, default_options(), runtime()).await;
    let inserted_second = db.save_findings("acct-fixture", &second_state.correlated_findings).unwrap();
    assert_eq!(inserted_second, 0, "re-scanning the same fixture must not create duplicate findings");

    let listed = db.list_findings("acct-fixture", None, None).unwrap();
    assert_eq!(listed.len(), state.correlated_findings.len());
}

/// A scan cancelled before Discovery starts never reaches the network and
/// reports a cancelled status rather than a partial result.
#[tokio::test]
async fn cancelling_before_discovery_short_circuits_the_whole_scan() {
    let provider: Arc<dyn CloudProvider> = Arc::new(FixtureProvider);
    let runtime = runtime();
    runtime.cancel_token().cancel();

    let state = run_scan("acct-cancel", "proj-cancel", Vec::new(), credential(), provider, None, default_options(), runtime).await;

    assert_ne!(state.status, "complete");
}
