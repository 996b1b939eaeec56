use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::models::log_line::{EventType, LogLine};
use crate::models::threat::{DetectionMethod, Threat};

static PORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)port[:\s]+(\d+)").unwrap());
static TRANSFER_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(GB|MB|KB)").unwrap());

const BRUTE_FORCE_THRESHOLD: usize = 5;
const PORT_SCAN_THRESHOLD: usize = 10;
const DATA_EXFIL_THRESHOLD_MB: f64 = 100.0;
const STANDARD_PORTS: &[u32] = &[22, 80, 443, 3306, 5432, 3389, 445, 21, 25];

/// Runs the full rule-based detector catalogue (§4.7 Detect, rule-based
/// layer). Order is fixed so `source_log_indices` across the output is
/// stable for a given input.
pub fn detect_all(logs: &[LogLine]) -> Vec<Threat> {
    let mut threats = Vec::new();
    threats.extend(detect_brute_force(logs));
    threats.extend(detect_port_scan(logs));
    threats.extend(detect_privilege_escalation(logs));
    threats.extend(detect_data_exfiltration(logs));
    threats.extend(detect_lateral_movement(logs));
    threats
}

fn by_source_ip(logs: &[LogLine]) -> HashMap<&str, Vec<&LogLine>> {
    let mut grouped: HashMap<&str, Vec<&LogLine>> = HashMap::new();
    for log in logs {
        if log.source_ip.is_empty() {
            continue;
        }
        grouped.entry(log.source_ip.as_str()).or_default().push(log);
    }
    grouped
}

fn threat_id(prefix: &str, key: &str) -> String {
    format!("RULE-{prefix}-{}", key.replace('.', "_"))
}

/// ≥5 failed-auth events from the same source IP (confidence `min(0.5+n*0.05,0.99)`).
pub fn detect_brute_force(logs: &[LogLine]) -> Vec<Threat> {
    let mut threats = Vec::new();
    for (ip, entries) in by_source_ip(logs) {
        let failed: Vec<&&LogLine> = entries.iter().filter(|l| l.event_type == EventType::FailedAuth).collect();
        if failed.len() < BRUTE_FORCE_THRESHOLD {
            continue;
        }
        let n = failed.len();
        let confidence = (0.5 + n as f64 * 0.05).min(0.99);
        threats.push(Threat {
            threat_id: threat_id("BRUTE", ip),
            threat_type: "brute_force".to_string(),
            confidence,
            source_log_indices: failed.iter().map(|l| l.index).collect(),
            method: DetectionMethod::RuleBased,
            description: format!("{n} failed authentication attempts from {ip}."),
            source_ip: ip.to_string(),
        });
    }
    threats
}

fn extract_port(raw: &str) -> Option<u32> {
    PORT_PATTERN.captures(raw).and_then(|c| c[1].parse().ok())
}

/// ≥10 distinct ports probed from the same source IP.
pub fn detect_port_scan(logs: &[LogLine]) -> Vec<Threat> {
    let mut threats = Vec::new();
    for (ip, entries) in by_source_ip(logs) {
        let mut ports = HashSet::new();
        let mut indices = Vec::new();
        for log in &entries {
            if let Some(port) = extract_port(&log.raw_text).or_else(|| extract_port(&log.details)) {
                ports.insert(port);
                indices.push(log.index);
            }
        }
        if ports.len() < PORT_SCAN_THRESHOLD {
            continue;
        }
        let n = ports.len();
        let confidence = (0.6 + n as f64 * 0.03).min(0.95);
        threats.push(Threat {
            threat_id: threat_id("PORTSCAN", ip),
            threat_type: "port_scan".to_string(),
            confidence,
            source_log_indices: indices,
            method: DetectionMethod::RuleBased,
            description: format!("{n} distinct ports probed from {ip}."),
            source_ip: ip.to_string(),
        });
    }
    threats
}

/// Any privilege-escalation-classified log, or one sourced from sudo/su, or
/// whose raw text carries `USER=root` (fixed confidence 0.85).
pub fn detect_privilege_escalation(logs: &[LogLine]) -> Vec<Threat> {
    let mut threats = Vec::new();
    for log in logs {
        let flagged = log.event_type == EventType::PrivilegeEscalation
            || log.source == "sudo"
            || log.source == "su"
            || log.raw_text.contains("USER=root");
        if !flagged {
            continue;
        }
        let ip = if log.source_ip.is_empty() { "unknown".to_string() } else { log.source_ip.clone() };
        threats.push(Threat {
            threat_id: threat_id("PRIVESC", &format!("{}_{}", ip, log.index)),
            threat_type: "privilege_escalation".to_string(),
            confidence: 0.85,
            source_log_indices: vec![log.index],
            method: DetectionMethod::RuleBased,
            description: format!("Privilege escalation indicator in log line {}.", log.index),
            source_ip: ip,
        });
    }
    threats
}

/// Sum of outbound transfer sizes parsed from raw text, normalized to MB,
/// threshold 100MB (confidence `min(0.7+total_mb/1000*0.1,0.95)`).
pub fn detect_data_exfiltration(logs: &[LogLine]) -> Vec<Threat> {
    let mut threats = Vec::new();
    for (ip, entries) in by_source_ip(logs) {
        let mut total_mb = 0.0;
        let mut indices = Vec::new();
        for log in &entries {
            if let Some(caps) = TRANSFER_PATTERN.captures(&log.raw_text) {
                let amount: f64 = caps[1].parse().unwrap_or(0.0);
                let unit = &caps[2];
                let mb = match unit.to_uppercase().as_str() {
                    "GB" => amount * 1024.0,
                    "MB" => amount,
                    "KB" => amount / 1024.0,
                    _ => 0.0,
                };
                total_mb += mb;
                indices.push(log.index);
            }
        }
        if total_mb < DATA_EXFIL_THRESHOLD_MB {
            continue;
        }
        let confidence = (0.7 + (total_mb / 1000.0) * 0.1).min(0.95);
        threats.push(Threat {
            threat_id: threat_id("EXFIL", ip),
            threat_type: "data_exfiltration".to_string(),
            confidence,
            source_log_indices: indices,
            method: DetectionMethod::RuleBased,
            description: format!("{total_mb:.1}MB transferred outbound from {ip}."),
            source_ip: ip.to_string(),
        });
    }
    threats
}

fn is_rfc1918(ip: &str) -> bool {
    let octets: Vec<u8> = ip.split('.').filter_map(|p| p.parse().ok()).collect();
    if octets.len() != 4 {
        return false;
    }
    match octets[0] {
        10 => true,
        172 => (16..=31).contains(&octets[1]),
        192 => octets[1] == 168,
        _ => false,
    }
}

/// Both source and destination IP fall in RFC1918 ranges and the event is
/// connection-shaped on a non-standard port (fixed confidence 0.75).
pub fn detect_lateral_movement(logs: &[LogLine]) -> Vec<Threat> {
    let mut threats = Vec::new();
    for log in logs {
        if log.event_type != EventType::Connection {
            continue;
        }
        if log.dest_ip.is_empty() || !is_rfc1918(&log.source_ip) || !is_rfc1918(&log.dest_ip) {
            continue;
        }
        let port = extract_port(&log.raw_text).or_else(|| extract_port(&log.details));
        let non_standard = match port {
            Some(p) => !STANDARD_PORTS.contains(&p),
            None => true,
        };
        if !non_standard {
            continue;
        }
        threats.push(Threat {
            threat_id: threat_id("LATERAL", &format!("{}_{}", log.source_ip, log.dest_ip)),
            threat_type: "lateral_movement".to_string(),
            confidence: 0.75,
            source_log_indices: vec![log.index],
            method: DetectionMethod::RuleBased,
            description: format!("Internal connection from {} to {} on a non-standard port.", log.source_ip, log.dest_ip),
            source_ip: log.source_ip.clone(),
        });
    }
    threats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(index: usize, source_ip: &str, event_type: EventType, raw_text: &str) -> LogLine {
        LogLine {
            index,
            timestamp: None,
            source: String::new(),
            event_type,
            source_ip: source_ip.to_string(),
            dest_ip: String::new(),
            user: String::new(),
            details: String::new(),
            raw_text: raw_text.to_string(),
            is_valid: true,
            parse_error: None,
        }
    }

    #[test]
    fn brute_force_fires_at_five_failed_auths_from_one_ip() {
        let logs: Vec<LogLine> = (0..5).map(|i| log(i, "1.2.3.4", EventType::FailedAuth, "Failed password")).collect();
        let threats = detect_brute_force(&logs);
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0].threat_id, "RULE-BRUTE-1_2_3_4");
        assert_eq!(threats[0].threat_type, "brute_force");
        assert!((threats[0].confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn brute_force_does_not_fire_below_threshold() {
        let logs: Vec<LogLine> = (0..4).map(|i| log(i, "1.2.3.4", EventType::FailedAuth, "Failed password")).collect();
        assert!(detect_brute_force(&logs).is_empty());
    }

    #[test]
    fn port_scan_fires_at_ten_distinct_ports() {
        let logs: Vec<LogLine> = (0..10)
            .map(|i| log(i, "5.5.5.5", EventType::Connection, &format!("probe port:{}", 1000 + i)))
            .collect();
        let threats = detect_port_scan(&logs);
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0].threat_type, "port_scan");
    }

    #[test]
    fn privilege_escalation_detects_sudo_source_and_user_root_marker() {
        let mut a = log(0, "1.1.1.1", EventType::Info, "normal line");
        a.source = "sudo".to_string();
        let b = log(1, "", EventType::Info, "command USER=root /bin/bash");
        let threats = detect_privilege_escalation(&[a, b]);
        assert_eq!(threats.len(), 2);
        assert!(threats.iter().all(|t| (t.confidence - 0.85).abs() < 1e-9));
    }

    #[test]
    fn data_exfiltration_sums_transfer_sizes_across_units() {
        let logs = vec![
            log(0, "9.9.9.9", EventType::Info, "transferred 50MB to external host"),
            log(1, "9.9.9.9", EventType::Info, "transferred 0.06GB to external host"),
        ];
        let threats = detect_data_exfiltration(&logs);
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0].threat_type, "data_exfiltration");
    }

    #[test]
    fn data_exfiltration_does_not_fire_under_threshold() {
        let logs = vec![log(0, "9.9.9.9", EventType::Info, "transferred 10MB to external host")];
        assert!(detect_data_exfiltration(&logs).is_empty());
    }

    #[test]
    fn lateral_movement_requires_both_internal_ips_and_nonstandard_port() {
        let mut internal = log(0, "10.0.0.5", EventType::Connection, "connect port:4444");
        internal.dest_ip = "192.168.1.10".to_string();
        let threats = detect_lateral_movement(&[internal]);
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0].threat_type, "lateral_movement");
    }

    #[test]
    fn lateral_movement_skips_when_destination_is_external() {
        let mut mixed = log(0, "10.0.0.5", EventType::Connection, "connect port:4444");
        mixed.dest_ip = "8.8.8.8".to_string();
        assert!(detect_lateral_movement(&[mixed]).is_empty());
    }

    #[test]
    fn lateral_movement_skips_standard_ports() {
        let mut internal = log(0, "10.0.0.5", EventType::Connection, "connect port:443");
        internal.dest_ip = "192.168.1.10".to_string();
        assert!(detect_lateral_movement(&[internal]).is_empty());
    }
}
