use serde_json::{json, Value};
use std::sync::LazyLock;

/// JSON Schema for `SentryScanConfig`, used by [`super::parser::parse_config`]
/// to reject out-of-range values at load time rather than at first use.
pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "scan": {
                "type": "object",
                "properties": {
                    "max_log_entries": { "type": "integer", "minimum": 1 },
                    "log_window_hours": { "type": "integer", "minimum": 1 },
                    "burst_threshold": { "type": "integer", "minimum": 1 },
                    "chunk_size": { "type": "integer", "minimum": 1 },
                    "per_stage_deadline_s": { "type": "integer", "minimum": 1 },
                    "per_llm_deadline_s": { "type": "integer", "minimum": 1 },
                    "sample_fraction": { "type": "number", "exclusiveMinimum": 0, "maximum": 1 },
                    "sample_min": { "type": "integer", "minimum": 0 },
                    "sample_max": { "type": "integer", "minimum": 1 }
                }
            },
            "llm": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string" },
                    "model": { "type": "string" },
                    "api_key": { "type": "string" },
                    "base_url": { "type": "string" }
                }
            },
            "concurrency": { "type": "integer", "minimum": 1 }
        }
    })
});

#[cfg(test)]
mod tests {
    use super::*;
    use jsonschema::JSONSchema;

    #[test]
    fn rejects_sample_fraction_above_one() {
        let compiled = JSONSchema::compile(&CONFIG_SCHEMA).unwrap();
        let instance = json!({ "scan": { "sample_fraction": 1.5 } });
        assert!(compiled.validate(&instance).is_err());
    }

    #[test]
    fn accepts_empty_document() {
        let compiled = JSONSchema::compile(&CONFIG_SCHEMA).unwrap();
        assert!(compiled.validate(&json!({})).is_ok());
    }
}
