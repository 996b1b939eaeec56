use serde::{Deserialize, Serialize};

/// Severity level for a security finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Returns a numeric rank where lower values indicate higher severity.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }

    /// SQL `CASE` fragment used by the reference persistence adapter to sort
    /// `ListFindings` results: critical, high, medium, low.
    pub fn sql_case_expr(column: &str) -> String {
        format!(
            "CASE {column} WHEN 'critical' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2 WHEN 'low' THEN 3 ELSE 4 END"
        )
    }
}

/// Lifecycle of a finding once it is triaged by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Todo,
    InProgress,
    Ignored,
    Resolved,
}

impl Default for FindingStatus {
    fn default() -> Self {
        Self::Todo
    }
}

/// A security finding (a.k.a. Issue) attached to an asset or to a log pattern.
///
/// Identity is `(rule_code, location)` within a scan scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub rule_code: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// Free-form resource pointer, e.g. `"Firewall: allow-ssh"`.
    pub location: String,
    #[serde(default)]
    pub status: FindingStatus,
    pub remediation_script: Option<String>,
    #[serde(default)]
    pub correlated: bool,
    pub verdict: Option<String>,
    pub tactic: Option<String>,
    pub technique: Option<String>,
    /// Estimated remediation effort, e.g. `"10 min"`.
    pub fix_time: Option<String>,
}

impl Finding {
    pub fn new(
        rule_code: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        location: impl Into<String>,
    ) -> Self {
        Self {
            rule_code: rule_code.into(),
            title: title.into(),
            description: description.into(),
            severity,
            location: location.into(),
            status: FindingStatus::Todo,
            remediation_script: None,
            correlated: false,
            verdict: None,
            tactic: None,
            technique: None,
            fix_time: None,
        }
    }

    /// `(rule_code, location)` identity used for dedup on persist.
    pub fn identity(&self) -> (&str, &str) {
        (&self.rule_code, &self.location)
    }

    /// Invariant: `correlated=true` implies `severity=critical` and the title
    /// carries the `[ACTIVE] ` marker.
    pub fn is_well_formed(&self) -> bool {
        if self.correlated {
            self.severity == Severity::Critical && self.title.starts_with("[ACTIVE] ")
        } else {
            true
        }
    }
}
