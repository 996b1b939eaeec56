use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cloud::provider::{CloudCredential, CloudProvider};
use crate::correlation;
use crate::discovery;
use crate::events::ScanEvent;
use crate::graph::{fan_out, GraphRuntime};
use crate::llm::LLMProvider;
use crate::models::asset::ScanLogStatus;
use crate::models::scan_state::{ScanState, ScanType};
use crate::remediation;
use crate::router;
use crate::threat;
use crate::workers;

/// Tunables the outer Scan Graph needs beyond `ScanLimits` — concurrency and
/// per-stage deadline live on the [`GraphRuntime`] itself, so this only
/// carries what Discovery and the Threat Pipeline need directly.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_log_entries: usize,
    pub log_window_hours: u32,
    pub burst_threshold: usize,
    pub chunk_size: usize,
    pub sample_fraction: f64,
    pub sample_min: usize,
    pub sample_max: usize,
}

impl From<&crate::config::types::ScanLimits> for ScanOptions {
    fn from(limits: &crate::config::types::ScanLimits) -> Self {
        Self {
            max_log_entries: limits.max_log_entries,
            log_window_hours: limits.log_window_hours,
            burst_threshold: limits.burst_threshold,
            chunk_size: limits.chunk_size,
            sample_fraction: limits.sample_fraction,
            sample_min: limits.sample_min,
            sample_max: limits.sample_max,
        }
    }
}

/// Drives one full scan request through the outer Scan Graph: Discovery,
/// Router, Dispatch (fan-out per-asset workers), Aggregate + Correlate, the
/// Threat Pipeline Bridge, then Finalize (§2, §4.1-§4.9).
///
/// Every write to `state` here follows the append-reducer/overwrite
/// discipline documented on [`ScanState`] itself — Dispatch is the only node
/// that writes `scan_issues`/`log_lines`/`scanned_assets` through
/// `merge_worker_output`, everything else overwrites its own output fields
/// exactly once.
pub async fn run_scan(
    account_id: &str,
    project_id: &str,
    requested_services: Vec<String>,
    credential: CloudCredential,
    cloud_provider: Arc<dyn CloudProvider>,
    llm_provider: Option<Arc<dyn LLMProvider>>,
    options: ScanOptions,
    runtime: GraphRuntime,
) -> ScanState {
    let mut state = ScanState::new(account_id, project_id);
    state.requested_services = requested_services;
    state.status = "discovering".to_string();

    runtime.emit(ScanEvent::Starting { scan_id: account_id.to_string(), project_id: project_id.to_string() });
    runtime.log_stage_enter(account_id, "discovery");

    let discovery_result = runtime
        .run_stage("discovery", async {
            Ok(discovery::discover(
                project_id,
                &credential,
                cloud_provider.as_ref(),
                &state.requested_services,
                options.max_log_entries,
                options.log_window_hours,
            )
            .await)
        })
        .await;

    let discovered = match discovery_result {
        Ok(output) => output,
        Err(e) => {
            state.error = Some(e.to_string());
            state.status = "error".to_string();
            runtime.emit(ScanEvent::Error { message: e.to_string() });
            return state;
        }
    };

    state.assets = discovered.assets;
    state.initial_findings = discovered.findings;
    state.raw_log_lines = discovered.log_lines;
    state.scan_log = discovered.scan_log;
    runtime.log_stage_exit(account_id, "discovery");
    runtime.emit(ScanEvent::DiscoveryComplete { asset_count: state.assets.len(), log_line_count: state.raw_log_lines.len() });

    state.status = "routing".to_string();
    let (public_assets, private_assets) = router::route(state.assets.clone());
    runtime.emit(ScanEvent::Routing { public_count: public_assets.len(), private_count: private_assets.len() });
    state.public_assets = public_assets;
    state.private_assets = private_assets;

    state.status = "scanning".to_string();
    let dispatch_result = runtime
        .run_stage("dispatch", async {
            dispatch_workers(&mut state, project_id, &credential, cloud_provider.clone(), options.max_log_entries, &runtime).await;
            Ok(())
        })
        .await;
    if let Err(e) = dispatch_result {
        warn!(account_id, error = %e, "dispatch stage did not complete within its deadline");
        state.error = Some(e.to_string());
        runtime.emit(ScanEvent::Error { message: e.to_string() });
    }

    // Aggregate always runs on whatever the append reducer collected so far
    // (§5: "the aggregate node is invoked with whatever the reducer has so
    // far"), even when dispatch above was cut short by the deadline.
    state.status = "aggregating".to_string();
    aggregate_and_correlate(&mut state, &runtime);

    // Discovery's own `cloud_logging` lines (`raw_log_lines`) and the Log
    // Analyzers' lines (`log_lines`, the worker-output append field) both
    // feed the inner pipeline (§2 step 5) — either one being non-empty is
    // enough to trigger it.
    if !state.raw_log_lines.is_empty() || !state.log_lines.is_empty() {
        state.status = "threat-analysis".to_string();
        let threat_result = runtime
            .run_stage("threat-analysis", async {
                run_threat_bridge(&mut state, llm_provider, &options, &runtime).await;
                Ok(())
            })
            .await;
        if let Err(e) = threat_result {
            warn!(account_id, error = %e, "threat-analysis stage did not complete within its deadline");
            state.error = Some(e.to_string());
            runtime.emit(ScanEvent::Error { message: e.to_string() });
        }
    }

    remediation::generate_remediation(&mut state.correlated_findings, project_id);

    state.status = finalize_status(&state);
    runtime.emit(ScanEvent::Complete {
        status: state.status.clone(),
        total_findings: state.correlated_findings.len(),
        active_exploit_count: state.active_exploit_count,
    });
    info!(account_id, project_id, status = %state.status, "scan finalized");
    state
}

/// Dispatch (fan-out): one Active Scanner per public asset, one Log Analyzer
/// per private asset, all bounded by the runtime's configured concurrency
/// (§4.1, §4.4, §4.5). Results are merged via the append reducer as each
/// batch completes — worker failures degrade to empty output per asset and
/// never abort their siblings.
async fn dispatch_workers(
    state: &mut ScanState,
    project_id: &str,
    credential: &CloudCredential,
    provider: Arc<dyn CloudProvider>,
    max_log_entries: usize,
    runtime: &GraphRuntime,
) {
    let concurrency = runtime.concurrency();
    let cancel = runtime.cancel_token();

    let public_items: Vec<_> = state.public_assets.clone().into_iter().map(|a| (a, project_id.to_string(), credential.clone())).collect();
    let private_items: Vec<_> = state.private_assets.clone().into_iter().map(|a| (a, project_id.to_string(), credential.clone())).collect();

    let public_total = public_items.len();
    let private_total = private_items.len();
    let mut scanned = 0usize;

    let public_provider = provider.clone();
    let public_results = fan_out(public_items, concurrency, cancel.clone(), move |(asset, project_id, credential)| {
        let provider = public_provider.clone();
        async move { workers::scan_public_asset(&asset, &project_id, &credential, provider.as_ref()).await }
    })
    .await;

    for result in public_results.into_iter().flatten() {
        let (findings, record) = result;
        scanned += 1;
        state.merge_worker_output(findings, Vec::new(), Some(record));
        runtime.emit(ScanEvent::Scanning { total_assets: public_total + private_total, assets_scanned: scanned });
    }

    let private_provider = provider;
    let private_results = fan_out(private_items, concurrency, cancel, move |(asset, project_id, credential)| {
        let provider = private_provider.clone();
        async move { workers::analyze_private_asset(&asset, &project_id, &credential, provider.as_ref(), max_log_entries).await }
    })
    .await;

    for result in private_results.into_iter().flatten() {
        let (log_lines, findings, record) = result;
        scanned += 1;
        state.merge_worker_output(findings, log_lines, Some(record));
        runtime.emit(ScanEvent::Scanning { total_assets: public_total + private_total, assets_scanned: scanned });
    }

    state.public_scanned_count = public_total;
}

fn aggregate_and_correlate(state: &mut ScanState, runtime: &GraphRuntime) {
    state.scan_type = Some(if state.public_scanned_count > 0 { ScanType::Full } else { ScanType::CloudLoggingOnly });

    let mut findings = Vec::with_capacity(state.initial_findings.len() + state.scan_issues.len());
    findings.extend(state.initial_findings.clone());
    findings.extend(state.scan_issues.clone());

    let mut all_logs = Vec::with_capacity(state.raw_log_lines.len() + state.log_lines.len());
    all_logs.extend(state.raw_log_lines.clone());
    all_logs.extend(state.log_lines.clone());

    let (correlated, active_count, evidence) = correlation::correlate(findings, &all_logs);
    state.correlated_findings = correlated;
    state.active_exploit_count = active_count;
    state.correlated_evidence = evidence;

    runtime.emit(ScanEvent::Aggregating {
        scan_type: match state.scan_type {
            Some(ScanType::Full) => "full".to_string(),
            _ => "cloud-logging-only".to_string(),
        },
        public_count: state.public_assets.len(),
        private_count: state.private_assets.len(),
    });
}

/// Threat Pipeline Bridge (§2 step 5): feeds every log line collected this
/// scan — Discovery's own plus every Log Analyzer's — into the inner graph,
/// seeded with whatever correlation evidence Aggregate produced.
async fn run_threat_bridge(state: &mut ScanState, llm_provider: Option<Arc<dyn LLMProvider>>, options: &ScanOptions, runtime: &GraphRuntime) {
    let mut raw_text: Vec<String> = state.raw_log_lines.iter().map(|l| l.raw_text.clone()).collect();
    raw_text.extend(state.log_lines.iter().map(|l| l.raw_text.clone()));

    let mut pre_parsed = state.raw_log_lines.clone();
    pre_parsed.extend(state.log_lines.clone());

    let limits = crate::config::types::ScanLimits {
        max_log_entries: options.max_log_entries,
        log_window_hours: options.log_window_hours,
        burst_threshold: options.burst_threshold,
        chunk_size: options.chunk_size,
        per_stage_deadline_s: 300,
        per_llm_deadline_s: 120,
        sample_fraction: options.sample_fraction,
        sample_min: options.sample_min,
        sample_max: options.sample_max,
    };

    let threat_state = threat::seed_state(raw_text, Some(pre_parsed), state.correlated_evidence.clone());
    let result = threat::run_threat_pipeline(threat_state, llm_provider, &limits, runtime.concurrency(), runtime.cancel_token(), &BridgeSink(runtime.clone())).await;

    state.parsed_logs = result.parsed_logs;
    state.detected_threats = result.detected_threats;
    state.classified_threats = result.classified_threats;
    state.report = result.report;
    state.agent_metrics = result.agent_metrics;
}

/// Forwards Threat Pipeline stage signals into the outer runtime's sink so a
/// single event stream covers both graphs (§4.9).
struct BridgeSink(GraphRuntime);

impl crate::events::EventSink for BridgeSink {
    fn emit(&self, event: ScanEvent) {
        self.0.emit(event);
    }
}

fn finalize_status(state: &ScanState) -> String {
    match state.scan_log.status {
        ScanLogStatus::Error if state.correlated_findings.is_empty() && state.assets.is_empty() => "error".to_string(),
        ScanLogStatus::Partial => "partial".to_string(),
        _ if state.error.is_some() => "partial".to_string(),
        _ => "complete".to_string(),
    }
}
