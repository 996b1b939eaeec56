use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::warn;

use crate::llm::LLMProvider;
use crate::models::log_line::LogLine;
use crate::models::scan_state::AgentMetrics;
use crate::models::threat::{DetectionMethod, Threat};

/// Validate stage (§4.7): samples a bounded fraction of the logs **not**
/// already covered by any detected threat and asks an LLM to look for missed
/// threats in just that sample. On failure or absence of a provider this
/// degrades to "no missed findings" — an empty addition, never an error.
pub async fn run(
    logs: &[LogLine],
    detected: &[Threat],
    provider: Option<Arc<dyn LLMProvider>>,
    sample_fraction: f64,
    sample_min: usize,
    sample_max: usize,
) -> (Vec<Threat>, AgentMetrics) {
    let start = Instant::now();

    let covered: HashSet<usize> = detected.iter().flat_map(|t| t.source_log_indices.iter().copied()).collect();
    let clean: Vec<&LogLine> = logs.iter().filter(|l| l.is_valid && !covered.contains(&l.index)).collect();

    let additions = match &provider {
        Some(provider) if !clean.is_empty() => {
            let sample = select_sample(&clean, sample_fraction, sample_min, sample_max);
            match ai_validate(&sample, provider.as_ref()).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "validate LLM call failed; assuming no missed findings");
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    };

    let metrics = AgentMetrics {
        duration_ms: start.elapsed().as_millis() as u64,
        input_tokens: None,
        output_tokens: None,
        cost_usd: None,
        model: provider.map(|p| p.model_name().to_string()),
    };
    (additions, metrics)
}

fn select_sample<'a>(clean: &[&'a LogLine], fraction: f64, min: usize, max: usize) -> Vec<&'a LogLine> {
    let target = ((clean.len() as f64) * fraction).round() as usize;
    let size = target.clamp(min, max).min(clean.len());
    let mut rng = rand::thread_rng();
    let mut pool = clean.to_vec();
    pool.shuffle(&mut rng);
    pool.into_iter().take(size).collect()
}

fn validate_schema() -> Value {
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

async fn ai_validate(sample: &[&LogLine], provider: &dyn LLMProvider) -> Result<Vec<Threat>, crate::errors::EngineError> {
    let lines: Vec<String> = sample.iter().map(|l| format!("[{}] {}", l.index, l.raw_text)).collect();
    let prompt = format!(
        "These log lines were not flagged by the threat detector. Look for any missed threat indicators:\n\n{}",
        lines.join("\n")
    );

    let value = provider.complete_structured(&prompt, &validate_schema(), None).await?;
    let items = value
        .as_array()
        .ok_or_else(|| crate::errors::EngineError::OutputValidation("validate: expected a JSON array".to_string()))?;

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Some(threat_type) = item.get("type").and_then(Value::as_str) else { continue };
        out.push(Threat {
            threat_id: format!("VALIDATOR-{i}-{threat_type}"),
            threat_type: threat_type.to_string(),
            confidence: item.get("confidence").and_then(Value::as_f64).unwrap_or(0.5),
            source_log_indices: item
                .get("source_log_indices")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_u64).map(|n| n as usize).collect())
                .unwrap_or_default(),
            method: DetectionMethod::ValidatorDetected,
            description: item.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
            source_ip: item.get("source_ip").and_then(Value::as_str).unwrap_or_default().to_string(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(index: usize) -> LogLine {
        LogLine {
            index,
            timestamp: None,
            source: String::new(),
            event_type: crate::models::log_line::EventType::Info,
            source_ip: String::new(),
            dest_ip: String::new(),
            user: String::new(),
            details: String::new(),
            raw_text: format!("line {index}"),
            is_valid: true,
            parse_error: None,
        }
    }

    #[tokio::test]
    async fn without_a_provider_no_additional_threats_are_found() {
        let logs: Vec<LogLine> = (0..20).map(log).collect();
        let (found, _) = run(&logs, &[], None, 0.05, 1, 50).await;
        assert!(found.is_empty());
    }

    #[test]
    fn sample_size_is_bounded_by_min_and_max() {
        let logs: Vec<LogLine> = (0..1000).map(log).collect();
        let clean: Vec<&LogLine> = logs.iter().collect();
        let sample = select_sample(&clean, 0.05, 1, 50);
        assert_eq!(sample.len(), 50);

        let tiny: Vec<LogLine> = (0..3).map(log).collect();
        let tiny_refs: Vec<&LogLine> = tiny.iter().collect();
        let tiny_sample = select_sample(&tiny_refs, 0.05, 1, 50);
        assert_eq!(tiny_sample.len(), 1);
    }
}
