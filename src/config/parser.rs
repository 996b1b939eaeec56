use std::path::Path;

use jsonschema::JSONSchema;

use crate::errors::EngineError;

use super::schema::CONFIG_SCHEMA;
use super::security::validate_security_patterns;
use super::types::SentryScanConfig;

/// Loads, validates, and parses a scan configuration file.
///
/// Validation happens in two passes: a security sweep over the raw YAML
/// (rejecting path-traversal and script-injection look-alikes in string
/// values), then schema validation against [`CONFIG_SCHEMA`] before the
/// final typed deserialization — so an out-of-range value is rejected here
/// rather than surfacing as a confusing failure deep inside the engine.
pub async fn parse_config(path: &Path) -> Result<SentryScanConfig, EngineError> {
    if !path.exists() {
        return Err(EngineError::Config(format!("config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(EngineError::Config("config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;

    validate_security_patterns(&yaml)?;

    let json = serde_json::to_value(&yaml)
        .map_err(|e| EngineError::Config(format!("config is not representable as JSON: {e}")))?;
    let compiled = JSONSchema::compile(&CONFIG_SCHEMA)
        .expect("CONFIG_SCHEMA is a static, known-valid schema");
    if let Err(errors) = compiled.validate(&json) {
        let message = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
        return Err(EngineError::Config(format!("config failed schema validation: {message}")));
    }

    let config: SentryScanConfig = serde_yaml::from_value(yaml)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn missing_file_is_a_config_error() {
        let result = parse_config(Path::new("/nonexistent/path/config.yaml")).await;
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn valid_yaml_parses_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scan:\n  chunk_size: 50\nconcurrency: 2").unwrap();
        let config = parse_config(file.path()).await.unwrap();
        assert_eq!(config.scan.chunk_size, 50);
        assert_eq!(config.concurrency, 2);
    }

    #[tokio::test]
    async fn out_of_range_sample_fraction_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scan:\n  sample_fraction: 2.0").unwrap();
        let result = parse_config(file.path()).await;
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
