use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A read-only correlation rule: `rule_code -> {log_patterns[], verdict, tactic, technique}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationRule {
    pub patterns: &'static [&'static str],
    pub verdict: &'static str,
    pub tactic: &'static str,
    pub technique: &'static str,
}

/// The bit-exact correlation rule matrix from the external interface contract.
/// Defined at build time; read-only; never mutated at runtime.
pub static CORRELATION_RULES: LazyLock<HashMap<&'static str, CorrelationRule>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "gcp_002",
        CorrelationRule {
            patterns: &[
                "Invalid user",
                "Failed password",
                "refused connect",
                "Connection closed by authenticating user",
            ],
            verdict: "Brute Force Attempt in Progress",
            tactic: "TA0006",
            technique: "T1110",
        },
    );
    m.insert(
        "gcp_004",
        CorrelationRule {
            patterns: &["AnonymousAccess", "GetObject", "storage.objects.get", "allUsers"],
            verdict: "Data Exfiltration Occurring",
            tactic: "TA0010",
            technique: "T1530",
        },
    );
    m.insert(
        "gcp_006",
        CorrelationRule {
            patterns: &[
                "compute@developer.gserviceaccount.com",
                "CreateServiceAccountKey",
                "SetIamPolicy",
            ],
            verdict: "Privilege Escalation Risk",
            tactic: "TA0004",
            technique: "T1078.004",
        },
    );
    m.insert(
        "log_002",
        CorrelationRule {
            patterns: &["Invalid user", "brute", "Connection refused", "unauthorized"],
            verdict: "Unauthorized Access Attempt",
            tactic: "TA0001",
            technique: "T1078",
        },
    );
    m
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_has_exactly_the_four_documented_rules() {
        assert_eq!(CORRELATION_RULES.len(), 4);
        assert!(CORRELATION_RULES.contains_key("gcp_002"));
        assert!(CORRELATION_RULES.contains_key("gcp_004"));
        assert!(CORRELATION_RULES.contains_key("gcp_006"));
        assert!(CORRELATION_RULES.contains_key("log_002"));
    }

    #[test]
    fn gcp_002_patterns_are_bit_exact() {
        let rule = &CORRELATION_RULES["gcp_002"];
        assert_eq!(
            rule.patterns,
            &["Invalid user", "Failed password", "refused connect", "Connection closed by authenticating user"]
        );
        assert_eq!(rule.technique, "T1110");
    }
}
