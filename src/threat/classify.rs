use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::warn;

use crate::llm::LLMProvider;
use crate::models::scan_state::{AgentMetrics, CorrelationEvidence};
use crate::models::threat::{ClassifiedThreat, RiskLevel, Threat};

/// Classify stage (§4.7). Sends the threat list plus any correlated evidence
/// from the outer pipeline to an LLM for risk classification; per-threat
/// fallback on LLM failure is risk=medium/score=5.0. When correlation
/// evidence is present, any classified threat touching the same resource is
/// force-escalated to critical/priority 1 regardless of what the LLM (or the
/// fallback) assigned — correlated evidence always wins.
///
/// An empty `threats` list short-circuits without calling the LLM (§8).
pub async fn run(
    threats: &[Threat],
    correlated_evidence: &[CorrelationEvidence],
    provider: Option<Arc<dyn LLMProvider>>,
) -> (Vec<ClassifiedThreat>, AgentMetrics) {
    let start = Instant::now();

    if threats.is_empty() {
        return (
            Vec::new(),
            AgentMetrics { duration_ms: start.elapsed().as_millis() as u64, input_tokens: None, output_tokens: None, cost_usd: None, model: None },
        );
    }

    let mut classified = match &provider {
        Some(provider) => match ai_classify(threats, provider.as_ref()).await {
            Ok(result) if result.len() == threats.len() => result,
            Ok(_) => {
                warn!("classify LLM returned a mismatched threat count; falling back to per-threat defaults");
                fallback_classify(threats)
            }
            Err(e) => {
                warn!(error = %e, "classify LLM call failed; falling back to per-threat defaults");
                fallback_classify(threats)
            }
        },
        None => fallback_classify(threats),
    };

    force_escalate_correlated(&mut classified, correlated_evidence);
    classified.sort_by_key(|c| c.remediation_priority);

    let metrics = AgentMetrics {
        duration_ms: start.elapsed().as_millis() as u64,
        input_tokens: None,
        output_tokens: None,
        cost_usd: None,
        model: provider.map(|p| p.model_name().to_string()),
    };
    (classified, metrics)
}

fn fallback_classify(threats: &[Threat]) -> Vec<ClassifiedThreat> {
    threats
        .iter()
        .enumerate()
        .map(|(i, t)| ClassifiedThreat::fallback(t, (i + 1) as u32))
        .collect()
}

/// A classified threat is "touching" a correlated asset when its description
/// or source IP mentions the asset's resource name — the same case-
/// insensitive substring convention the Correlation Engine itself uses.
fn force_escalate_correlated(classified: &mut [ClassifiedThreat], correlated_evidence: &[CorrelationEvidence]) {
    if correlated_evidence.is_empty() {
        return;
    }
    for threat in classified.iter_mut() {
        let touches_active_incident = correlated_evidence.iter().any(|evidence| {
            let asset = evidence.asset.to_lowercase();
            threat.description.to_lowercase().contains(&asset) || threat.source_ip.to_lowercase().contains(&asset)
        });
        if touches_active_incident {
            threat.risk = RiskLevel::Critical;
            threat.risk_score = 10.0;
            threat.remediation_priority = 1;
        }
    }
}

fn classify_schema() -> Value {
    serde_json::json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "threat_id": {"type": "string"},
                "risk": {"type": "string"},
                "risk_score": {"type": "number"},
                "mitre_tactic": {"type": ["string", "null"]},
                "mitre_technique": {"type": ["string", "null"]},
                "business_impact": {"type": ["string", "null"]},
                "affected_systems": {"type": "array", "items": {"type": "string"}},
                "remediation_priority": {"type": "integer"},
            },
            "required": ["threat_id", "risk", "risk_score", "remediation_priority"]
        }
    })
}

async fn ai_classify(threats: &[Threat], provider: &dyn LLMProvider) -> Result<Vec<ClassifiedThreat>, crate::errors::EngineError> {
    let compact: Vec<Value> = threats
        .iter()
        .map(|t| {
            serde_json::json!({
                "threat_id": t.threat_id,
                "type": t.threat_type,
                "confidence": t.confidence,
                "description": t.description,
                "source_ip": t.source_ip,
            })
        })
        .collect();
    let prompt = format!(
        "Classify the risk of each of the following detected threats. Return one object per input threat, same order:\n\n{}",
        serde_json::to_string_pretty(&compact).unwrap_or_default()
    );

    let value = provider.complete_structured(&prompt, &classify_schema(), None).await?;
    let items = value
        .as_array()
        .ok_or_else(|| crate::errors::EngineError::OutputValidation("classify: expected a JSON array".to_string()))?;

    let mut out = Vec::with_capacity(items.len());
    for (threat, item) in threats.iter().zip(items.iter()) {
        let risk: RiskLevel = item
            .get("risk")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_value(Value::String(s.to_string())).ok())
            .unwrap_or(RiskLevel::Medium);
        out.push(ClassifiedThreat {
            threat_id: threat.threat_id.clone(),
            threat_type: threat.threat_type.clone(),
            risk,
            risk_score: item.get("risk_score").and_then(Value::as_f64).unwrap_or(5.0),
            description: threat.description.clone(),
            source_ip: threat.source_ip.clone(),
            mitre_tactic: item.get("mitre_tactic").and_then(Value::as_str).map(|s| s.to_string()),
            mitre_technique: item.get("mitre_technique").and_then(Value::as_str).map(|s| s.to_string()),
            business_impact: item.get("business_impact").and_then(Value::as_str).map(|s| s.to_string()),
            affected_systems: item
                .get("affected_systems")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(|s| s.to_string()).collect())
                .unwrap_or_default(),
            remediation_priority: item.get("remediation_priority").and_then(Value::as_u64).unwrap_or(99) as u32,
            source_log_indices: threat.source_log_indices.clone(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::threat::DetectionMethod;

    fn threat(id: &str) -> Threat {
        Threat {
            threat_id: id.to_string(),
            threat_type: "brute_force".to_string(),
            confidence: 0.9,
            source_log_indices: vec![1, 2],
            method: DetectionMethod::RuleBased,
            description: "desc".to_string(),
            source_ip: "1.2.3.4".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_threats_short_circuits_without_a_provider() {
        let (classified, _) = run(&[], &[], None).await;
        assert!(classified.is_empty());
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_medium_five_for_every_threat_in_order() {
        let threats = vec![threat("t1"), threat("t2"), threat("t3")];
        let (classified, _) = run(&threats, &[], None).await;
        assert_eq!(classified.len(), 3);
        assert!(classified.iter().all(|c| c.risk == RiskLevel::Medium && c.risk_score == 5.0));
        let ids: Vec<&str> = classified.iter().map(|c| c.threat_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn output_is_sorted_by_remediation_priority_ascending() {
        let threats = vec![threat("t1"), threat("t2")];
        let (classified, _) = run(&threats, &[], None).await;
        for window in classified.windows(2) {
            assert!(window[0].remediation_priority <= window[1].remediation_priority);
        }
    }

    #[tokio::test]
    async fn correlated_evidence_force_escalates_matching_threats_to_critical() {
        let mut threats = vec![threat("t1")];
        threats[0].description = "Activity from allow-ssh observed".to_string();
        let evidence = vec![CorrelationEvidence {
            rule_code: "gcp_002".to_string(),
            asset: "allow-ssh".to_string(),
            verdict: "Brute Force Attempt in Progress".to_string(),
            tactic: "TA0006".to_string(),
            technique: "T1110".to_string(),
            evidence_logs: Vec::new(),
            matched_patterns: Vec::new(),
        }];
        let (classified, _) = run(&threats, &evidence, None).await;
        assert_eq!(classified[0].risk, RiskLevel::Critical);
        assert_eq!(classified[0].remediation_priority, 1);
    }
}
