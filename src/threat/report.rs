use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::warn;

use crate::llm::LLMProvider;
use crate::models::incident_report::{ActionStep, IncidentReport, Urgency};
use crate::models::scan_state::{AgentMetrics, CorrelationEvidence};
use crate::models::threat::{ClassifiedThreat, RiskLevel};

/// Report stage (§4.7). Always builds the deterministic template report
/// first — ordering, counts, and the action plan never depend on the LLM —
/// then, if a provider is available, attempts to replace the executive
/// summary and timeline narrative with an LLM-generated version. Any LLM
/// failure silently keeps the template text (§7 kind 3 fallback).
pub async fn run(
    classified: &[ClassifiedThreat],
    correlated_evidence: &[CorrelationEvidence],
    provider: Option<Arc<dyn LLMProvider>>,
) -> (IncidentReport, AgentMetrics) {
    let start = Instant::now();
    let mut report = template_report(classified, correlated_evidence);

    if let Some(provider) = &provider {
        match narrative(classified, correlated_evidence, provider.as_ref()).await {
            Ok(text) => report.summary = text,
            Err(e) => warn!(error = %e, "report narrative LLM call failed; keeping template summary"),
        }
    }

    let metrics = AgentMetrics {
        duration_ms: start.elapsed().as_millis() as u64,
        input_tokens: None,
        output_tokens: None,
        cost_usd: None,
        model: provider.map(|p| p.model_name().to_string()),
    };
    (report, metrics)
}

fn template_report(classified: &[ClassifiedThreat], correlated_evidence: &[CorrelationEvidence]) -> IncidentReport {
    let critical_count = classified.iter().filter(|c| c.risk == RiskLevel::Critical).count();
    let high_count = classified.iter().filter(|c| c.risk == RiskLevel::High).count();
    let medium_count = classified.iter().filter(|c| c.risk == RiskLevel::Medium).count();
    let low_count = classified
        .iter()
        .filter(|c| matches!(c.risk, RiskLevel::Low | RiskLevel::Informational))
        .count();

    let mut summary = if !correlated_evidence.is_empty() {
        format!(
            "ACTIVE INCIDENTS DETECTED: {} finding(s) show confirmed active exploitation. {} total threat(s) analyzed, {} critical.",
            correlated_evidence.len(),
            classified.len(),
            critical_count
        )
    } else {
        format!("{} threat(s) analyzed; {} critical, {} high, {} medium, {} low.", classified.len(), critical_count, high_count, medium_count, low_count)
    };
    if classified.is_empty() {
        summary = "No threats detected in the analyzed logs.".to_string();
    }

    let action_plan: Vec<ActionStep> = classified
        .iter()
        .enumerate()
        .map(|(i, c)| ActionStep {
            step: (i + 1) as u32,
            action: format!("Investigate and remediate: {}", c.description),
            urgency: urgency_for(c.risk),
            owner: "security-oncall".to_string(),
        })
        .collect();

    let recommendations = vec![
        "Rotate credentials for any account implicated in a critical finding.".to_string(),
        "Review firewall and IAM configuration changes made in the affected window.".to_string(),
        "Enable sustained log retention for the affected resources.".to_string(),
    ];

    let ioc_summary: Vec<String> = {
        let mut ips: Vec<String> = classified.iter().map(|c| c.source_ip.clone()).filter(|ip| !ip.is_empty()).collect();
        ips.sort();
        ips.dedup();
        ips
    };

    let mitre_techniques: Vec<String> = {
        let mut techniques: Vec<String> = classified.iter().filter_map(|c| c.mitre_technique.clone()).collect();
        techniques.extend(correlated_evidence.iter().map(|e| e.technique.clone()));
        techniques.sort();
        techniques.dedup();
        techniques
    };

    let timeline = if classified.is_empty() {
        String::new()
    } else {
        format!("{} threat(s) observed across the analyzed log window, ordered by remediation priority.", classified.len())
    };

    IncidentReport {
        summary,
        threat_count: classified.len(),
        critical_count,
        high_count,
        medium_count,
        low_count,
        timeline,
        action_plan,
        recommendations,
        ioc_summary,
        mitre_techniques,
        generated_at: Utc::now(),
    }
}

fn urgency_for(risk: RiskLevel) -> Urgency {
    match risk {
        RiskLevel::Critical => Urgency::Immediate,
        RiskLevel::High => Urgency::OneHour,
        RiskLevel::Medium => Urgency::TwentyFourHour,
        RiskLevel::Low | RiskLevel::Informational => Urgency::OneWeek,
    }
}

async fn narrative(
    classified: &[ClassifiedThreat],
    correlated_evidence: &[CorrelationEvidence],
    provider: &dyn LLMProvider,
) -> Result<String, crate::errors::EngineError> {
    let prompt = format!(
        "Write a concise executive summary (2-4 sentences) of this security incident. {} threats classified, {} with confirmed active exploitation evidence. Threats: {}",
        classified.len(),
        correlated_evidence.len(),
        classified.iter().map(|c| c.description.as_str()).collect::<Vec<_>>().join("; ")
    );
    let response = provider.complete(&prompt, None).await?;
    Ok(response.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::threat::ClassifiedThreat;

    fn classified(risk: RiskLevel) -> ClassifiedThreat {
        ClassifiedThreat {
            threat_id: "t1".to_string(),
            threat_type: "brute_force".to_string(),
            risk,
            risk_score: 9.0,
            description: "desc".to_string(),
            source_ip: "1.2.3.4".to_string(),
            mitre_tactic: Some("TA0006".to_string()),
            mitre_technique: Some("T1110".to_string()),
            business_impact: None,
            affected_systems: Vec::new(),
            remediation_priority: 1,
            source_log_indices: vec![1],
        }
    }

    #[tokio::test]
    async fn correlated_evidence_leads_the_summary() {
        let threats = vec![classified(RiskLevel::Critical)];
        let evidence = vec![CorrelationEvidence {
            rule_code: "gcp_002".to_string(),
            asset: "allow-ssh".to_string(),
            verdict: "Brute Force Attempt in Progress".to_string(),
            tactic: "TA0006".to_string(),
            technique: "T1110".to_string(),
            evidence_logs: Vec::new(),
            matched_patterns: Vec::new(),
        }];
        let (report, _) = run(&threats, &evidence, None).await;
        assert!(report.summary.starts_with("ACTIVE INCIDENTS DETECTED"));
        assert_eq!(report.critical_count, 1);
    }

    #[tokio::test]
    async fn one_action_step_per_threat() {
        let threats = vec![classified(RiskLevel::High), classified(RiskLevel::Medium)];
        let (report, _) = run(&threats, &[], None).await;
        assert_eq!(report.action_plan.len(), 2);
        assert_eq!(report.action_plan[0].urgency, Urgency::OneHour);
        assert_eq!(report.action_plan[1].urgency, Urgency::TwentyFourHour);
    }
}
