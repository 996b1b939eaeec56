use serde::{Deserialize, Serialize};

/// How a `Threat` was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    RuleBased,
    AiDetected,
    ValidatorDetected,
}

/// A raw detected threat, before risk classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    pub threat_id: String,
    #[serde(rename = "type")]
    pub threat_type: String,
    pub confidence: f64,
    pub source_log_indices: Vec<usize>,
    pub method: DetectionMethod,
    pub description: String,
    pub source_ip: String,
}

/// Risk tier assigned by Classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
    Informational,
}

/// A `Threat` enriched with risk classification, attack-framework mapping,
/// and remediation priority. The final list is ordered by
/// `remediation_priority` ascending (1 = highest priority).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedThreat {
    pub threat_id: String,
    #[serde(rename = "type")]
    pub threat_type: String,
    pub risk: RiskLevel,
    pub risk_score: f64,
    pub description: String,
    pub source_ip: String,
    pub mitre_tactic: Option<String>,
    pub mitre_technique: Option<String>,
    pub business_impact: Option<String>,
    pub affected_systems: Vec<String>,
    pub remediation_priority: u32,
    pub source_log_indices: Vec<usize>,
}

impl ClassifiedThreat {
    /// Fallback classification used when the classify LLM call fails.
    pub fn fallback(threat: &Threat, priority: u32) -> Self {
        Self {
            threat_id: threat.threat_id.clone(),
            threat_type: threat.threat_type.clone(),
            risk: RiskLevel::Medium,
            risk_score: 5.0,
            description: threat.description.clone(),
            source_ip: threat.source_ip.clone(),
            mitre_tactic: None,
            mitre_technique: None,
            business_impact: None,
            affected_systems: Vec::new(),
            remediation_priority: priority,
            source_log_indices: threat.source_log_indices.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_classification_is_medium_five() {
        let threat = Threat {
            threat_id: "RULE-BRUTE-1_2_3_4".into(),
            threat_type: "brute_force".into(),
            confidence: 0.9,
            source_log_indices: vec![1, 2],
            method: DetectionMethod::RuleBased,
            description: "desc".into(),
            source_ip: "1.2.3.4".into(),
        };
        let classified = ClassifiedThreat::fallback(&threat, 1);
        assert_eq!(classified.risk, RiskLevel::Medium);
        assert_eq!(classified.risk_score, 5.0);
        assert_eq!(classified.remediation_priority, 1);
    }
}
