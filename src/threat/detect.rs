use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::warn;

use crate::llm::LLMProvider;
use crate::models::log_line::LogLine;
use crate::models::scan_state::AgentMetrics;
use crate::models::threat::{DetectionMethod, Threat};

use super::rules;

/// Detect stage (§4.7): rule-based catalogue first, then an AI layer that is
/// prompted to find only *additional* threats beyond the rule results.
/// Missing or unparseable LLM output degrades to "rule results only".
pub async fn run(logs: &[LogLine], provider: Option<Arc<dyn LLMProvider>>) -> (Vec<Threat>, AgentMetrics) {
    let start = Instant::now();
    let mut threats = rules::detect_all(logs);

    if let Some(provider) = &provider {
        match ai_detect(logs, &threats, provider.as_ref()).await {
            Ok(additional) => threats.extend(additional),
            Err(e) => warn!(error = %e, "AI detection layer failed; keeping rule-based results only"),
        }
    }

    let metrics = AgentMetrics {
        duration_ms: start.elapsed().as_millis() as u64,
        input_tokens: None,
        output_tokens: None,
        cost_usd: None,
        model: provider.map(|p| p.model_name().to_string()),
    };
    (threats, metrics)
}

fn ai_detect_schema() -> Value {
    serde_json::json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "type": {"type": "string"},
                "confidence": {"type": "number"},
                "description": {"type": "string"},
                "source_ip": {"type": "string"},
                "source_log_indices": {"type": "array", "items": {"type": "integer"}},
            },
            "required": ["type", "description"]
        }
    })
}

async fn ai_detect(logs: &[LogLine], existing: &[Threat], provider: &dyn LLMProvider) -> Result<Vec<Threat>, crate::errors::EngineError> {
    let sample: Vec<&str> = logs.iter().filter(|l| l.is_valid).map(|l| l.raw_text.as_str()).collect();
    let existing_summary: Vec<&str> = existing.iter().map(|t| t.threat_type.as_str()).collect();
    let prompt = format!(
        "The rule engine already found these threat types: {:?}. Examine the following log lines and report ONLY additional threats not already covered:\n\n{}",
        existing_summary,
        sample.join("\n")
    );

    let value = provider.complete_structured(&prompt, &ai_detect_schema(), None).await?;
    let items = value
        .as_array()
        .ok_or_else(|| crate::errors::EngineError::OutputValidation("AI detect: expected a JSON array".to_string()))?;

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Some(threat_type) = item.get("type").and_then(Value::as_str) else { continue };
        let description = item.get("description").and_then(Value::as_str).unwrap_or_default().to_string();
        let confidence = item.get("confidence").and_then(Value::as_f64).unwrap_or(0.5);
        let source_ip = item.get("source_ip").and_then(Value::as_str).unwrap_or_default().to_string();
        let source_log_indices = item
            .get("source_log_indices")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_u64).map(|n| n as usize).collect())
            .unwrap_or_default();
        out.push(Threat {
            threat_id: format!("AI-{i}-{threat_type}"),
            threat_type: threat_type.to_string(),
            confidence,
            source_log_indices,
            method: DetectionMethod::AiDetected,
            description,
            source_ip,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn without_a_provider_only_rule_based_threats_are_returned() {
        let logs: Vec<LogLine> = (0..5)
            .map(|i| LogLine {
                index: i,
                timestamp: None,
                source: String::new(),
                event_type: crate::models::log_line::EventType::FailedAuth,
                source_ip: "1.2.3.4".to_string(),
                dest_ip: String::new(),
                user: String::new(),
                details: String::new(),
                raw_text: "Failed password".to_string(),
                is_valid: true,
                parse_error: None,
            })
            .collect();
        let (threats, _) = run(&logs, None).await;
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0].method, DetectionMethod::RuleBased);
    }
}
