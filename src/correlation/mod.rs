use crate::models::correlation_rule::CORRELATION_RULES;
use crate::models::finding::{Finding, Severity};
use crate::models::log_line::LogLine;
use crate::models::scan_state::CorrelationEvidence;

/// Pulls a bare resource name out of a `Finding.location` string such as
/// `"Firewall: allow-ssh"` or `"Bucket: public-assets"`. Falls back to a
/// slugified copy of the whole string — non-alphanumerics collapsed to `-`,
/// lowercased — when there is no `":"` separator, e.g. `"Cloud Logging"` ->
/// `"cloud-logging"`.
fn extract_resource_name(location: &str) -> String {
    if let Some((_, rest)) = location.split_once(':') {
        return rest.trim().to_string();
    }
    location
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect::<String>()
        .to_lowercase()
}

/// Cross-references static-compliance findings against log evidence.
///
/// For each finding whose `rule_code` has a correlation rule: first narrows
/// `log_lines` down to those mentioning the finding's resource name (the
/// `related` set), then checks whether any of the rule's patterns appear in
/// that narrowed set. A match upgrades the finding in place: severity becomes
/// `critical`, the title gains an `[ACTIVE] ` prefix, the description gains a
/// `CORRELATED:` line, and `verdict`/`tactic`/`technique` are filled in —
/// copy-on-upgrade, so findings with no matching rule, no related logs, or no
/// matching pattern are returned untouched. Evidence is capped at the first
/// five related log lines.
pub fn correlate(
    findings: Vec<Finding>,
    log_lines: &[LogLine],
) -> (Vec<Finding>, usize, Vec<CorrelationEvidence>) {
    let mut correlated_findings = Vec::with_capacity(findings.len());
    let mut active_count = 0usize;
    let mut evidence = Vec::new();

    for finding in findings {
        let Some(rule) = CORRELATION_RULES.get(finding.rule_code.as_str()) else {
            correlated_findings.push(finding);
            continue;
        };

        let resource = extract_resource_name(&finding.location).to_lowercase();
        let related: Vec<&LogLine> = log_lines
            .iter()
            .filter(|l| l.raw_text.to_lowercase().contains(&resource))
            .collect();

        let mut matched_patterns = Vec::new();
        for pattern in rule.patterns {
            let needle = pattern.to_lowercase();
            if related.iter().any(|l| l.raw_text.to_lowercase().contains(&needle)) {
                matched_patterns.push(pattern.to_string());
            }
        }

        if matched_patterns.is_empty() {
            correlated_findings.push(finding);
            continue;
        }

        let evidence_logs: Vec<String> = related.iter().take(5).map(|l| l.raw_text.clone()).collect();

        let mut upgraded = finding;
        upgraded.severity = Severity::Critical;
        upgraded.title = format!("[ACTIVE] {}", upgraded.title);
        upgraded.description = format!(
            "{}\nCORRELATED: {} — {} related log events.",
            upgraded.description,
            rule.verdict,
            related.len()
        );
        upgraded.correlated = true;
        upgraded.verdict = Some(rule.verdict.to_string());
        upgraded.tactic = Some(rule.tactic.to_string());
        upgraded.technique = Some(rule.technique.to_string());

        active_count += 1;
        evidence.push(CorrelationEvidence {
            rule_code: upgraded.rule_code.clone(),
            asset: extract_resource_name(&upgraded.location).to_string(),
            verdict: rule.verdict.to_string(),
            tactic: rule.tactic.to_string(),
            technique: rule.technique.to_string(),
            evidence_logs,
            matched_patterns,
        });

        correlated_findings.push(upgraded);
    }

    (correlated_findings, active_count, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(raw: &str) -> LogLine {
        LogLine {
            index: 0,
            timestamp: None,
            source: "sshd".into(),
            event_type: crate::models::log_line::EventType::FailedAuth,
            source_ip: "1.2.3.4".into(),
            dest_ip: String::new(),
            user: String::new(),
            details: String::new(),
            raw_text: raw.into(),
            is_valid: true,
            parse_error: None,
        }
    }

    #[test]
    fn extract_resource_name_strips_prefix() {
        assert_eq!(extract_resource_name("Firewall: allow-ssh"), "allow-ssh");
        assert_eq!(extract_resource_name("bare-name"), "bare-name");
        assert_eq!(extract_resource_name("Cloud Logging"), "cloud-logging");
    }

    #[test]
    fn matching_log_upgrades_finding_to_active() {
        let finding = Finding::new("gcp_002", "Open SSH", "desc", Severity::High, "Firewall: allow-ssh");
        let logs = vec![
            log("WARNING allow-ssh: Failed password for root"),
            log("WARNING allow-ssh: Invalid user admin"),
        ];
        let (findings, active_count, evidence) = correlate(vec![finding], &logs);
        assert_eq!(active_count, 1);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].correlated);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert!(findings[0].title.starts_with("[ACTIVE] "));
        assert_eq!(findings[0].verdict.as_deref(), Some("Brute Force Attempt in Progress"));
        assert_eq!(findings[0].technique.as_deref(), Some("T1110"));
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].rule_code, "gcp_002");
        assert_eq!(evidence[0].asset, "allow-ssh");
        assert!(evidence[0].matched_patterns.contains(&"Failed password".to_string()));
        assert!(evidence[0].matched_patterns.contains(&"Invalid user".to_string()));
    }

    #[test]
    fn no_matching_log_leaves_finding_untouched() {
        let finding = Finding::new("gcp_002", "Open SSH", "desc", Severity::High, "Firewall: allow-ssh");
        let logs = vec![log("clean request served 200 OK")];
        let (findings, active_count, evidence) = correlate(vec![finding], &logs);
        assert_eq!(active_count, 0);
        assert!(!findings[0].correlated);
        assert!(evidence.is_empty());
    }

    #[test]
    fn finding_with_no_rule_passes_through() {
        let finding = Finding::new("gcp_099", "Unmapped", "desc", Severity::Low, "Foo: bar");
        let logs = vec![log("Failed password for root")];
        let (findings, active_count, _) = correlate(vec![finding], &logs);
        assert_eq!(active_count, 0);
        assert!(!findings[0].correlated);
    }

    #[test]
    fn evidence_logs_are_capped_at_five() {
        let finding = Finding::new("gcp_002", "Open SSH", "desc", Severity::High, "Firewall: allow-ssh");
        let logs: Vec<LogLine> = (0..8)
            .map(|i| log(&format!("allow-ssh: Failed password attempt {i}")))
            .collect();
        let (_, _, evidence) = correlate(vec![finding], &logs);
        assert_eq!(evidence[0].evidence_logs.len(), 5);
    }
}
