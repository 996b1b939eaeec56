use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::incident_report::IncidentReport;
use crate::models::log_line::LogLine;
use crate::models::scan_state::{AgentMetrics, CorrelationEvidence};
use crate::models::threat::{ClassifiedThreat, Threat};

/// The shared object threaded through the inner Threat Graph (§4.7).
///
/// Unlike `ScanState`, every field here belongs to a single sequential run —
/// only the burst-mode ingest fan-out needs the append-reducer shape, which
/// `ingest::run` implements internally rather than exposing as a field-level
/// reducer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatState {
    pub raw_log_lines: Vec<String>,
    /// Seeded by the outer pipeline's Threat Bridge when Discovery/workers
    /// already parsed these lines deterministically — routes to skip-ingest.
    pub pre_parsed_logs: Option<Vec<LogLine>>,
    pub parsed_logs: Vec<LogLine>,
    pub total_count: usize,
    pub detected_threats: Vec<Threat>,
    pub classified_threats: Vec<ClassifiedThreat>,
    pub report: Option<IncidentReport>,
    pub agent_metrics: HashMap<String, AgentMetrics>,
    /// Correlated evidence handed down from the outer pipeline's Aggregate +
    /// Correlation Engine step; consumed by Classify's force-escalation rule.
    pub correlated_evidence: Vec<CorrelationEvidence>,
}

impl ThreatState {
    pub fn new(raw_log_lines: Vec<String>, pre_parsed_logs: Option<Vec<LogLine>>, correlated_evidence: Vec<CorrelationEvidence>) -> Self {
        Self {
            raw_log_lines,
            pre_parsed_logs,
            parsed_logs: Vec::new(),
            total_count: 0,
            detected_threats: Vec::new(),
            classified_threats: Vec::new(),
            report: None,
            agent_metrics: HashMap::new(),
            correlated_evidence,
        }
    }

    pub fn record_metrics(&mut self, stage: &str, metrics: AgentMetrics) {
        // Append-reducer (§9 Open Question #2): a burst-mode ingest with
        // multiple chunk nodes reporting under "ingest" must not clobber
        // earlier chunks' metrics, so accumulate duration/tokens/cost.
        self.agent_metrics
            .entry(stage.to_string())
            .and_modify(|existing| {
                existing.duration_ms += metrics.duration_ms;
                existing.input_tokens = add_optional(existing.input_tokens, metrics.input_tokens);
                existing.output_tokens = add_optional(existing.output_tokens, metrics.output_tokens);
                existing.cost_usd = add_optional_f64(existing.cost_usd, metrics.cost_usd);
            })
            .or_insert(metrics);
    }
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn add_optional_f64(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_accumulate_across_repeated_stage_names() {
        let mut state = ThreatState::new(Vec::new(), None, Vec::new());
        state.record_metrics(
            "ingest",
            AgentMetrics { duration_ms: 100, input_tokens: Some(10), output_tokens: Some(5), cost_usd: Some(0.01), model: Some("m".into()) },
        );
        state.record_metrics(
            "ingest",
            AgentMetrics { duration_ms: 50, input_tokens: Some(4), output_tokens: Some(2), cost_usd: Some(0.002), model: Some("m".into()) },
        );
        let merged = &state.agent_metrics["ingest"];
        assert_eq!(merged.duration_ms, 150);
        assert_eq!(merged.input_tokens, Some(14));
    }
}
