use std::path::{Path, PathBuf};
use regex::Regex;
use tracing::debug;
use crate::errors::EngineError;

/// Variables available for template interpolation in threat-pipeline prompt files.
#[derive(Debug, Clone, Default)]
pub struct PromptVariables {
    pub project_id: String,
    pub log_excerpt: Option<String>,
    pub threat_summary: Option<String>,
    pub correlated_evidence: Option<String>,
    pub clean_sample: Option<String>,
    pub detection_stats: Option<String>,
    pub total_count: Option<String>,
    pub invalid_count: Option<String>,
}

/// Loads and processes prompt template files with include directives and variable interpolation.
pub struct PromptLoader {
    prompts_dir: PathBuf,
}

const MAX_INCLUDE_DEPTH: u8 = 5;

impl PromptLoader {
    pub fn new(prompts_dir: PathBuf) -> Self {
        debug!(dir = %prompts_dir.display(), "PromptLoader initialized");
        Self { prompts_dir }
    }

    /// Load a prompt template by name (without .txt extension), processing @include directives.
    pub fn load(&self, prompt_name: &str) -> Result<String, EngineError> {
        let file_path = self.prompts_dir.join(format!("{}.txt", prompt_name));
        if !file_path.exists() {
            return Err(EngineError::Internal(format!(
                "Prompt file not found: {}",
                file_path.display()
            )));
        }
        let content = std::fs::read_to_string(&file_path).map_err(|e| {
            EngineError::Internal(format!("Failed to read prompt {}: {}", file_path.display(), e))
        })?;
        self.process_includes(&content, 0)
    }

    /// Replace {{VARIABLE}} placeholders with values from PromptVariables.
    /// None values become empty string.
    pub fn interpolate(&self, template: &str, vars: &PromptVariables) -> String {
        let mut result = template.replace("{{PROJECT_ID}}", &vars.project_id);

        let optional_replacements: &[(&str, &Option<String>)] = &[
            ("{{LOG_EXCERPT}}", &vars.log_excerpt),
            ("{{THREAT_SUMMARY}}", &vars.threat_summary),
            ("{{CORRELATED_EVIDENCE}}", &vars.correlated_evidence),
            ("{{CLEAN_SAMPLE}}", &vars.clean_sample),
            ("{{DETECTION_STATS}}", &vars.detection_stats),
            ("{{TOTAL_COUNT}}", &vars.total_count),
            ("{{INVALID_COUNT}}", &vars.invalid_count),
        ];
        for (placeholder, value) in optional_replacements {
            let replacement = value.as_deref().unwrap_or("");
            result = result.replace(placeholder, replacement);
        }

        result
    }

    /// Process @include(path) directives recursively with depth limit.
    fn process_includes(&self, content: &str, depth: u8) -> Result<String, EngineError> {
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(EngineError::Internal(format!(
                "Include depth limit ({}) exceeded — possible circular include",
                MAX_INCLUDE_DEPTH
            )));
        }

        let include_re = Regex::new(r"@include\(([^)]+)\)").unwrap();
        let mut result = content.to_string();

        let matches: Vec<(String, String)> = include_re
            .captures_iter(content)
            .map(|cap| (cap[0].to_string(), cap[1].to_string()))
            .collect();

        for (full_match, include_path) in matches {
            let file_path = self.prompts_dir.join(&include_path);
            if !file_path.exists() {
                return Err(EngineError::Internal(format!(
                    "Included file not found: {} (referenced as @include({}))",
                    file_path.display(),
                    include_path
                )));
            }
            let included_content = std::fs::read_to_string(&file_path).map_err(|e| {
                EngineError::Internal(format!(
                    "Failed to read included file {}: {}",
                    file_path.display(),
                    e
                ))
            })?;
            let processed = self.process_includes(&included_content, depth + 1)?;
            result = result.replace(&full_match, &processed);
        }

        Ok(result)
    }

    /// Check if a prompt template file exists.
    pub fn has_prompt(&self, prompt_name: &str) -> bool {
        self.prompts_dir.join(format!("{}.txt", prompt_name)).exists()
    }

    /// Return the prompts directory path.
    pub fn prompts_dir(&self) -> &Path {
        &self.prompts_dir
    }
}
