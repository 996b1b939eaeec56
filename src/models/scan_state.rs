use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::asset::{Asset, ScanLog};
use super::finding::Finding;
use super::incident_report::IncidentReport;
use super::log_line::LogLine;
use super::threat::{ClassifiedThreat, Threat};

/// Set by Aggregate: whether any public asset was scanned, or only log data
/// was available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanType {
    Full,
    CloudLoggingOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedAssetRecord {
    pub asset_name: String,
    pub issues_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationEvidence {
    pub rule_code: String,
    pub asset: String,
    pub verdict: String,
    pub tactic: String,
    pub technique: String,
    pub evidence_logs: Vec<String>,
    pub matched_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub duration_ms: u64,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    pub model: Option<String>,
}

/// The shared object threaded through the outer Scan Graph.
///
/// Field groups: input, discovery output, router output, worker output
/// (append-reducer fields), correlation output, threat-pipeline output,
/// progress, error. Once a field is written by a stage, downstream stages
/// may read but not overwrite it — except for the three append-reducer
/// fields (`scan_issues`, `log_lines`, `scanned_assets`) and `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanState {
    // input
    pub account_id: String,
    pub project_id: String,
    pub requested_services: Vec<String>,

    // discovery output
    pub assets: Vec<Asset>,
    pub initial_findings: Vec<Finding>,
    pub raw_log_lines: Vec<LogLine>,
    pub scan_log: ScanLog,

    // router output
    pub public_assets: Vec<Asset>,
    pub private_assets: Vec<Asset>,

    // worker output — append reducer: parallel workers concatenate without a lock
    pub scan_issues: Vec<Finding>,
    pub log_lines: Vec<LogLine>,
    pub scanned_assets: Vec<ScannedAssetRecord>,

    // aggregate output
    pub scan_type: Option<ScanType>,
    pub public_scanned_count: usize,

    // correlation output
    pub correlated_findings: Vec<Finding>,
    pub active_exploit_count: usize,
    pub correlated_evidence: Vec<CorrelationEvidence>,

    // threat pipeline output
    pub parsed_logs: Vec<LogLine>,
    pub detected_threats: Vec<Threat>,
    pub classified_threats: Vec<ClassifiedThreat>,
    pub report: Option<IncidentReport>,
    pub agent_metrics: HashMap<String, AgentMetrics>,

    // progress
    pub status: String,

    // error channel — set by a failing node, inspected (not cleared) downstream
    pub error: Option<String>,
}

impl ScanState {
    pub fn new(account_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            project_id: project_id.into(),
            requested_services: Vec::new(),
            assets: Vec::new(),
            initial_findings: Vec::new(),
            raw_log_lines: Vec::new(),
            scan_log: ScanLog::new(),
            public_assets: Vec::new(),
            private_assets: Vec::new(),
            scan_issues: Vec::new(),
            log_lines: Vec::new(),
            scanned_assets: Vec::new(),
            scan_type: None,
            public_scanned_count: 0,
            correlated_findings: Vec::new(),
            active_exploit_count: 0,
            correlated_evidence: Vec::new(),
            parsed_logs: Vec::new(),
            detected_threats: Vec::new(),
            classified_threats: Vec::new(),
            report: None,
            agent_metrics: HashMap::new(),
            status: "queued".to_string(),
            error: None,
        }
    }

    /// Append-reducer merge for one worker dispatch's output. Order reflects
    /// completion order, not dispatch order — callers must not rely on it.
    pub fn merge_worker_output(
        &mut self,
        findings: Vec<Finding>,
        log_lines: Vec<LogLine>,
        scanned: Option<ScannedAssetRecord>,
    ) {
        self.scan_issues.extend(findings);
        self.log_lines.extend(log_lines);
        if let Some(record) = scanned {
            self.scanned_assets.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::Severity;

    #[test]
    fn append_reducer_concatenates_across_merges() {
        let mut state = ScanState::new("acct-1", "proj-1");
        state.merge_worker_output(
            vec![Finding::new("gcp_002", "t", "d", Severity::High, "loc")],
            vec![],
            Some(ScannedAssetRecord { asset_name: "a".into(), issues_found: 1 }),
        );
        state.merge_worker_output(
            vec![Finding::new("gcp_004", "t2", "d2", Severity::Critical, "loc2")],
            vec![],
            Some(ScannedAssetRecord { asset_name: "b".into(), issues_found: 0 }),
        );
        assert_eq!(state.scan_issues.len(), 2);
        assert_eq!(state.scanned_assets.len(), 2);
    }
}
