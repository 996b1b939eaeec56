use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Immediate,
    #[serde(rename = "1hr")]
    OneHour,
    #[serde(rename = "24hr")]
    TwentyFourHour,
    #[serde(rename = "1week")]
    OneWeek,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStep {
    pub step: u32,
    pub action: String,
    pub urgency: Urgency,
    pub owner: String,
}

/// Structured incident report produced by the Report stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentReport {
    pub summary: String,
    pub threat_count: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub timeline: String,
    pub action_plan: Vec<ActionStep>,
    pub recommendations: Vec<String>,
    pub ioc_summary: Vec<String>,
    pub mitre_techniques: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl IncidentReport {
    /// The empty-report terminal: no valid parsed logs at all.
    pub fn empty() -> Self {
        Self {
            summary: "No logs available for analysis.".to_string(),
            threat_count: 0,
            critical_count: 0,
            high_count: 0,
            medium_count: 0,
            low_count: 0,
            timeline: String::new(),
            action_plan: Vec::new(),
            recommendations: Vec::new(),
            ioc_summary: Vec::new(),
            mitre_techniques: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// The clean-report terminal: logs parsed, but no threats detected.
    pub fn clean() -> Self {
        Self {
            summary: "No threats detected in the analyzed logs.".to_string(),
            ..Self::empty()
        }
    }
}
