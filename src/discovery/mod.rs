use tracing::warn;

use crate::cloud::provider::{CloudCredential, CloudProvider};
use crate::logs;
use crate::models::asset::{Asset, AssetType, ScanLog, ScanLogEntry, ScanLogStatus, ServiceStatus};
use crate::models::finding::{Finding, Severity};
use crate::models::log_line::{EventType, LogLine};

const ERROR_FINDING_THRESHOLD: usize = 10;
const AUTH_FAILURE_FINDING_THRESHOLD: usize = 5;
const RECON_PROBE_FINDING_THRESHOLD: usize = 3;
const CLOUD_LOGGING_FILTER: &str = r#"severity>=WARNING"#;

/// Output of one Discovery invocation: the asset inventory plus whatever
/// `cloud_logging` turned up, with per-service success/failure accounted for
/// in `scan_log`.
///
/// Per the resolved Open Question on scope (no per-asset compliance findings
/// at this stage — only the aggregate log-volume findings below; per-asset
/// rule checks belong to the Active Scanner and Log Analyzer workers), the
/// findings this produces are exclusively derived from `cloud_logging`
/// volume thresholds.
pub struct DiscoveryOutput {
    pub assets: Vec<Asset>,
    pub findings: Vec<Finding>,
    pub log_lines: Vec<LogLine>,
    pub scan_log: ScanLog,
}

/// Runs the credential probe, then enumerates every requested service,
/// containing any single service's failure so the rest still complete
/// (§4.2). `requested_services` controls which of
/// `compute`/`firewall`/`storage`/`sql`/`cloud_logging` run; an empty list
/// enumerates all of them.
pub async fn discover(
    project_id: &str,
    credential: &CloudCredential,
    provider: &dyn CloudProvider,
    requested_services: &[String],
    max_log_entries: usize,
    log_window_hours: u32,
) -> DiscoveryOutput {
    let probe = provider.probe_credential(project_id, credential).await;
    if probe.project_mismatch {
        warn!(project_id, "credential's declared project differs from the scan target");
    }

    let requested = |service: &str| requested_services.is_empty() || requested_services.iter().any(|s| s == service);
    // Only services the credential probe marked accessible are attempted —
    // cloud_logging is the one exception, handled separately below (§4.2).
    let wants = |service: &str| {
        requested(service)
            && probe
                .services
                .get(service)
                .map(|s| s.accessible)
                .unwrap_or(false)
    };

    let mut assets = Vec::new();
    let mut scan_log = ScanLog::new();

    for (service, probed) in probe.services.iter() {
        if requested(service) && !probed.accessible && service != "cloud_logging" {
            scan_log.entries.push(ScanLogEntry {
                service: service.clone(),
                status: ServiceStatus::Skipped,
                duration_ms: 0,
                asset_count: 0,
                issue_count: 0,
                error: Some(format!("credential probe reported inaccessible: {}", probed.detail)),
            });
        }
    }

    if wants("firewall") {
        enumerate(&mut assets, &mut scan_log, "firewall", provider.list_firewall_rules(project_id, credential)).await;
    }
    if wants("compute") {
        enumerate(&mut assets, &mut scan_log, "compute", provider.list_compute_instances(project_id, credential)).await;
    }
    if wants("storage") {
        enumerate(&mut assets, &mut scan_log, "storage", provider.list_buckets(project_id, credential)).await;
    }
    if wants("sql") {
        enumerate(&mut assets, &mut scan_log, "sql", provider.list_sql_instances(project_id, credential)).await;
    }

    // cloud_logging is always attempted if any credential is supplied, regardless
    // of what the probe reported for it (§4.2) — only the requested-services
    // filter can skip it.
    let (log_lines, findings) = if requested("cloud_logging") {
        fetch_and_classify_logs(project_id, credential, provider, max_log_entries, log_window_hours, &mut scan_log).await
    } else {
        let entry = ScanLogEntry {
            service: "cloud_logging".to_string(),
            status: ServiceStatus::Skipped,
            duration_ms: 0,
            asset_count: 0,
            issue_count: 0,
            error: None,
        };
        scan_log.entries.push(entry);
        (Vec::new(), Vec::new())
    };

    scan_log.status = overall_status(&scan_log);
    scan_log.summary = Some(format!(
        "{} services queried, {} assets discovered, {} findings from log volume",
        scan_log.entries.len(),
        assets.len(),
        findings.len()
    ));

    DiscoveryOutput {
        assets,
        findings,
        log_lines,
        scan_log,
    }
}

async fn enumerate<F>(
    assets: &mut Vec<Asset>,
    scan_log: &mut ScanLog,
    service: &str,
    fut: F,
) where
    F: std::future::Future<Output = Result<Vec<Asset>, crate::errors::EngineError>>,
{
    let start = std::time::Instant::now();
    let entry = match fut.await {
        Ok(discovered) => {
            let count = discovered.len();
            assets.extend(discovered);
            ScanLogEntry {
                service: service.to_string(),
                status: ServiceStatus::Success,
                duration_ms: start.elapsed().as_millis() as u64,
                asset_count: count,
                issue_count: 0,
                error: None,
            }
        }
        Err(e) => {
            warn!(service, error = %e, "service enumeration failed");
            ScanLogEntry {
                service: service.to_string(),
                status: ServiceStatus::Error,
                duration_ms: start.elapsed().as_millis() as u64,
                asset_count: 0,
                issue_count: 0,
                error: Some(e.to_string()),
            }
        }
    };
    scan_log.entries.push(entry);
}

async fn fetch_and_classify_logs(
    project_id: &str,
    credential: &CloudCredential,
    provider: &dyn CloudProvider,
    max_log_entries: usize,
    log_window_hours: u32,
    scan_log: &mut ScanLog,
) -> (Vec<LogLine>, Vec<Finding>) {
    let start = std::time::Instant::now();
    let raw = match provider
        .fetch_logs(project_id, credential, CLOUD_LOGGING_FILTER, max_log_entries, log_window_hours)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "cloud_logging enumeration failed");
            scan_log.entries.push(ScanLogEntry {
                service: "cloud_logging".to_string(),
                status: ServiceStatus::Error,
                duration_ms: start.elapsed().as_millis() as u64,
                asset_count: 0,
                issue_count: 0,
                error: Some(e.to_string()),
            });
            return (Vec::new(), Vec::new());
        }
    };

    let log_lines = logs::parse_batch(&raw, 0);
    let findings = aggregate_log_findings(&log_lines);

    scan_log.entries.push(ScanLogEntry {
        service: "cloud_logging".to_string(),
        status: ServiceStatus::Success,
        duration_ms: start.elapsed().as_millis() as u64,
        asset_count: log_lines.len(),
        issue_count: findings.len(),
        error: None,
    });

    (log_lines, findings)
}

/// §4.2 aggregate cloud_logging thresholds: these are the only findings
/// Discovery itself produces (>10 errors / >5 auth failures / >3 recon
/// probes across the whole project, not per asset).
fn aggregate_log_findings(log_lines: &[LogLine]) -> Vec<Finding> {
    let error_count = log_lines
        .iter()
        .filter(|l| matches!(l.event_type, EventType::Error | EventType::ServerError))
        .count();
    let auth_failure_count = log_lines.iter().filter(|l| l.event_type == EventType::FailedAuth).count();
    let recon_probe_count = log_lines.iter().filter(|l| l.event_type == EventType::ReconProbe).count();

    let mut findings = Vec::new();

    if error_count > ERROR_FINDING_THRESHOLD {
        findings.push(Finding::new(
            "log_001",
            "Elevated Error Rate in Project Logs",
            format!("{error_count} error-level log entries observed across the project."),
            Severity::High,
            Asset::new(AssetType::LogSummary, "project").location_label(),
        ));
    }

    if auth_failure_count > AUTH_FAILURE_FINDING_THRESHOLD {
        findings.push(Finding::new(
            "log_002",
            "Repeated Authentication Failures",
            format!("{auth_failure_count} authentication failures observed across the project."),
            Severity::High,
            Asset::new(AssetType::LogSummary, "project").location_label(),
        ));
    }

    if recon_probe_count > RECON_PROBE_FINDING_THRESHOLD {
        findings.push(Finding::new(
            "log_003",
            "Reconnaissance Probing Detected",
            format!("{recon_probe_count} requests to known reconnaissance paths observed across the project."),
            Severity::Medium,
            Asset::new(AssetType::LogSummary, "project").location_label(),
        ));
    }

    findings
}

fn overall_status(scan_log: &ScanLog) -> ScanLogStatus {
    let total = scan_log.entries.len();
    let errors = scan_log.entries.iter().filter(|e| e.status == ServiceStatus::Error).count();
    if errors == 0 {
        ScanLogStatus::Success
    } else if errors == total {
        ScanLogStatus::Error
    } else {
        ScanLogStatus::Partial
    }
}
