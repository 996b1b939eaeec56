pub mod classify;
pub mod detect;
pub mod ingest;
pub mod report;
pub mod rules;
pub mod state;
pub mod validate;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::types::ScanLimits;
use crate::events::{EventSink, ScanEvent};
use crate::llm::LLMProvider;
use crate::models::incident_report::IncidentReport;
use crate::models::log_line::LogLine;
use crate::models::scan_state::CorrelationEvidence;

pub use state::ThreatState;

/// Drives the inner Threat Graph end to end (§4.7): Ingest, Detect, Validate,
/// Classify, Report, with the conditional terminals from the routing table
/// (empty-report / clean-report / report — HITL is omitted from the core
/// per the bound Open Question decision, its guard is always false).
pub async fn run_threat_pipeline(
    mut state: ThreatState,
    provider: Option<Arc<dyn LLMProvider>>,
    limits: &ScanLimits,
    concurrency: usize,
    cancel: CancellationToken,
    sink: &dyn EventSink,
) -> ThreatState {
    sink.emit(ScanEvent::ThreatStage { stage: "ingest".to_string() });
    let (parsed_logs, ingest_metrics) = ingest::run(
        &state.raw_log_lines,
        state.pre_parsed_logs.as_deref(),
        provider.clone(),
        limits.burst_threshold,
        limits.chunk_size,
        concurrency,
        cancel.clone(),
    )
    .await;
    state.parsed_logs = parsed_logs;
    state.total_count = state.parsed_logs.len();
    state.record_metrics("ingest", ingest_metrics);

    if !has_any_valid_logs(&state.parsed_logs) {
        state.report = Some(IncidentReport::empty());
        return state;
    }

    sink.emit(ScanEvent::ThreatStage { stage: "detect".to_string() });
    let (detected, detect_metrics) = detect::run(&state.parsed_logs, provider.clone()).await;
    state.detected_threats = detected;
    state.record_metrics("detect", detect_metrics);

    sink.emit(ScanEvent::ThreatStage { stage: "validate".to_string() });
    let (validator_threats, validate_metrics) = validate::run(
        &state.parsed_logs,
        &state.detected_threats,
        provider.clone(),
        limits.sample_fraction,
        limits.sample_min,
        limits.sample_max,
    )
    .await;
    state.detected_threats.extend(validator_threats);
    state.record_metrics("validate", validate_metrics);

    if state.detected_threats.is_empty() {
        state.report = Some(IncidentReport::clean());
        return state;
    }

    sink.emit(ScanEvent::ThreatStage { stage: "classify".to_string() });
    let (classified, classify_metrics) = classify::run(&state.detected_threats, &state.correlated_evidence, provider.clone()).await;
    state.classified_threats = classified;
    state.record_metrics("classify", classify_metrics);

    sink.emit(ScanEvent::ThreatStage { stage: "report".to_string() });
    let (report, report_metrics) = report::run(&state.classified_threats, &state.correlated_evidence, provider).await;
    state.report = Some(report);
    state.record_metrics("report", report_metrics);

    state
}

fn has_any_valid_logs(logs: &[LogLine]) -> bool {
    logs.iter().any(|l| l.is_valid)
}

/// Seeds the initial [`ThreatState`] for one invocation of the inner graph —
/// called from the outer Scan Graph's Threat Pipeline Bridge node.
pub fn seed_state(raw_log_lines: Vec<String>, pre_parsed_logs: Option<Vec<LogLine>>, correlated_evidence: Vec<CorrelationEvidence>) -> ThreatState {
    ThreatState::new(raw_log_lines, pre_parsed_logs, correlated_evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::sink::NullSink;

    fn limits() -> ScanLimits {
        ScanLimits::default()
    }

    #[tokio::test]
    async fn no_valid_logs_yields_the_empty_report_terminal() {
        let state = seed_state(Vec::new(), None, Vec::new());
        let result = run_threat_pipeline(state, None, &limits(), 4, CancellationToken::new(), &NullSink).await;
        assert_eq!(result.report.unwrap().summary, "No logs available for analysis.");
    }

    #[tokio::test]
    async fn parsed_logs_without_threats_yields_the_clean_report_terminal() {
        let raw = vec!["INFO everything is fine".to_string()];
        let pre_parsed = vec![crate::logs::parse_line(0, &raw[0])];
        let state = seed_state(raw, Some(pre_parsed), Vec::new());
        let result = run_threat_pipeline(state, None, &limits(), 4, CancellationToken::new(), &NullSink).await;
        assert_eq!(result.report.unwrap().summary, "No threats detected in the analyzed logs.");
    }

    #[tokio::test]
    async fn threats_detected_produce_a_full_report_sorted_by_priority() {
        let raw: Vec<String> = (0..6).map(|_| "WARNING Failed password for root from 1.2.3.4".to_string()).collect();
        let pre_parsed: Vec<LogLine> = raw
            .iter()
            .enumerate()
            .map(|(i, l)| {
                let mut line = crate::logs::parse_line(i, l);
                line.source_ip = "1.2.3.4".to_string();
                line
            })
            .collect();
        let state = seed_state(raw, Some(pre_parsed), Vec::new());
        let result = run_threat_pipeline(state, None, &limits(), 4, CancellationToken::new(), &NullSink).await;
        let report = result.report.unwrap();
        assert!(report.threat_count >= 1);
        assert!(!result.classified_threats.is_empty());
        for window in result.classified_threats.windows(2) {
            assert!(window[0].remediation_priority <= window[1].remediation_priority);
        }
    }
}
