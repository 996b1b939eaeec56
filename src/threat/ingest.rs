use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::graph::fan_out;
use crate::llm::LLMProvider;
use crate::models::log_line::LogLine;
use crate::models::scan_state::AgentMetrics;

const SCHEMA_NAME: &str = "log_ingest";

/// Runs the Ingest stage (§4.7): either skip-ingest (pre-parsed logs already
/// supplied by the outer pipeline), single-shot LLM parse, or burst-mode
/// chunked fan-out when `raw_log_lines.len() > burst_threshold`.
pub async fn run(
    raw_log_lines: &[String],
    pre_parsed_logs: Option<&[LogLine]>,
    provider: Option<Arc<dyn LLMProvider>>,
    burst_threshold: usize,
    chunk_size: usize,
    concurrency: usize,
    cancel: CancellationToken,
) -> (Vec<LogLine>, AgentMetrics) {
    let start = Instant::now();

    let parsed = if let Some(pre) = pre_parsed_logs {
        pre.to_vec()
    } else if raw_log_lines.len() > burst_threshold {
        burst_ingest(raw_log_lines, chunk_size, provider.clone(), concurrency, cancel).await
    } else {
        ingest_chunk(raw_log_lines, 0, provider.as_deref()).await
    };

    let metrics = AgentMetrics {
        duration_ms: start.elapsed().as_millis() as u64,
        input_tokens: None,
        output_tokens: None,
        cost_usd: None,
        model: provider.map(|p| p.model_name().to_string()),
    };
    (parsed, metrics)
}

/// Splits `raw_log_lines` into `ceil(n/chunk_size)` chunks, runs Ingest on
/// each independently via the shared fan-out dispatcher, and offsets each
/// chunk's indices by `chunk_index * chunk_size` to preserve global
/// ordering (§3 LogLine invariant, §8 burst-mode property).
async fn burst_ingest(
    raw_log_lines: &[String],
    chunk_size: usize,
    provider: Option<Arc<dyn LLMProvider>>,
    concurrency: usize,
    cancel: CancellationToken,
) -> Vec<LogLine> {
    let chunks: Vec<(usize, Vec<String>)> = raw_log_lines
        .chunks(chunk_size.max(1))
        .enumerate()
        .map(|(i, c)| (i, c.to_vec()))
        .collect();

    let results = fan_out(chunks, concurrency, cancel, move |(chunk_index, chunk)| {
        let provider = provider.clone();
        let chunk_size = chunk_size.max(1);
        async move { ingest_chunk(&chunk, chunk_index * chunk_size, provider.as_deref()).await }
    })
    .await;

    results.into_iter().flatten().flatten().collect()
}

async fn ingest_chunk(raw_lines: &[String], start_index: usize, provider: Option<&dyn LLMProvider>) -> Vec<LogLine> {
    if let Some(provider) = provider {
        match llm_parse(raw_lines, provider).await {
            Ok(parsed) if parsed.len() == raw_lines.len() => {
                return parsed
                    .into_iter()
                    .enumerate()
                    .map(|(i, mut line)| {
                        line.index = start_index + i;
                        line
                    })
                    .collect();
            }
            Ok(_) => warn!("LLM ingest returned a mismatched line count; falling back to invalid markers"),
            Err(e) => warn!(error = %e, "LLM ingest call failed; falling back to invalid markers"),
        }
    }

    raw_lines
        .iter()
        .enumerate()
        .map(|(i, raw)| LogLine::invalid(start_index + i, raw.clone(), "no LLM parse available for this chunk"))
        .collect()
}

fn ingest_schema() -> Value {
    serde_json::json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "timestamp": {"type": ["string", "null"]},
                "source": {"type": "string"},
                "event_type": {"type": "string"},
                "source_ip": {"type": "string"},
                "dest_ip": {"type": "string"},
                "user": {"type": "string"},
                "details": {"type": "string"},
            },
            "required": ["source", "event_type"]
        }
    })
}

async fn llm_parse(raw_lines: &[String], provider: &dyn LLMProvider) -> Result<Vec<LogLine>, crate::errors::EngineError> {
    let prompt = format!(
        "Parse each of the following {} raw log lines into a structured record. Return a JSON array, one object per input line, in the same order:\n\n{}",
        raw_lines.len(),
        raw_lines.join("\n")
    );
    let value = provider.complete_structured(&prompt, &ingest_schema(), None).await?;
    let items = value.as_array().ok_or_else(|| crate::errors::EngineError::OutputValidation(format!("{SCHEMA_NAME}: expected a JSON array")))?;

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let raw_text = raw_lines.get(i).cloned().unwrap_or_default();
        let event_type = item
            .get("event_type")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_value(serde_json::Value::String(s.to_string())).ok())
            .unwrap_or(crate::models::log_line::EventType::Unknown);
        out.push(LogLine {
            index: i,
            timestamp: item.get("timestamp").and_then(Value::as_str).map(|s| s.to_string()),
            source: item.get("source").and_then(Value::as_str).unwrap_or_default().to_string(),
            event_type,
            source_ip: item.get("source_ip").and_then(Value::as_str).unwrap_or_default().to_string(),
            dest_ip: item.get("dest_ip").and_then(Value::as_str).unwrap_or_default().to_string(),
            user: item.get("user").and_then(Value::as_str).unwrap_or_default().to_string(),
            details: item.get("details").and_then(Value::as_str).unwrap_or_default().to_string(),
            raw_text,
            is_valid: true,
            parse_error: None,
        });
    }
    Ok(out)
}
