use serde::{Deserialize, Serialize};

/// Top-level configuration for a scan run, loaded from YAML.
///
/// Every field has a spec-mandated default (see §6 of the requirements);
/// `#[serde(default)]` lets an operator override only what they need.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SentryScanConfig {
    #[serde(default)]
    pub scan: ScanLimits,
    #[serde(default)]
    pub llm: LLMConfig,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SentryScanConfig {
    fn default() -> Self {
        Self {
            scan: ScanLimits::default(),
            llm: LLMConfig::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanLimits {
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
    #[serde(default = "default_log_window_hours")]
    pub log_window_hours: u32,
    #[serde(default = "default_burst_threshold")]
    pub burst_threshold: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_per_stage_deadline_s")]
    pub per_stage_deadline_s: u64,
    #[serde(default = "default_per_llm_deadline_s")]
    pub per_llm_deadline_s: u64,
    #[serde(default = "default_sample_fraction")]
    pub sample_fraction: f64,
    #[serde(default = "default_sample_min")]
    pub sample_min: usize,
    #[serde(default = "default_sample_max")]
    pub sample_max: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_log_entries: default_max_log_entries(),
            log_window_hours: default_log_window_hours(),
            burst_threshold: default_burst_threshold(),
            chunk_size: default_chunk_size(),
            per_stage_deadline_s: default_per_stage_deadline_s(),
            per_llm_deadline_s: default_per_llm_deadline_s(),
            sample_fraction: default_sample_fraction(),
            sample_min: default_sample_min(),
            sample_max: default_sample_max(),
        }
    }
}

fn default_max_log_entries() -> usize { 500 }
fn default_log_window_hours() -> u32 { 24 }
fn default_burst_threshold() -> usize { 1000 }
fn default_chunk_size() -> usize { 200 }
fn default_per_stage_deadline_s() -> u64 { 300 }
fn default_per_llm_deadline_s() -> u64 { 120 }
fn default_sample_fraction() -> f64 { 0.05 }
fn default_sample_min() -> usize { 1 }
fn default_sample_max() -> usize { 50 }

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LLMConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let limits = ScanLimits::default();
        assert_eq!(limits.max_log_entries, 500);
        assert_eq!(limits.log_window_hours, 24);
        assert_eq!(limits.burst_threshold, 1000);
        assert_eq!(limits.chunk_size, 200);
        assert_eq!(limits.per_stage_deadline_s, 300);
        assert_eq!(limits.per_llm_deadline_s, 120);
        assert_eq!(limits.sample_fraction, 0.05);
        assert_eq!(limits.sample_min, 1);
        assert_eq!(limits.sample_max, 50);
    }

    #[test]
    fn partial_yaml_fills_remaining_defaults() {
        let yaml = "scan:\n  chunk_size: 50\n";
        let config: SentryScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scan.chunk_size, 50);
        assert_eq!(config.scan.max_log_entries, 500);
    }
}
