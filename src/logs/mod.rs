use std::sync::LazyLock;

use regex::Regex;

use crate::models::log_line::{EventType, LogLine};

static IPV4: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b").unwrap());
static HTTP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[A-Z]+\s+(\S+)\s+HTTP/[\d.]+"\s+(\d{3})"#).unwrap());
static USER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"for\s+(?:invalid user\s+)?(\w+)").unwrap());

const RECON_PATHS: &[&str] = &["/wp-admin", "/wp-login", "/.git", "/.env"];

/// Parses one raw provider log line into a structured [`LogLine`] at a given
/// global `index` (§3, §4.2 `[SUPPLEMENT] LogLine event_type set`).
///
/// This deterministic parser never rejects a line outright — an unrecognized
/// shape still comes back `is_valid=true`, classified `unknown`, with the
/// full text copied into `details`. Only the threat pipeline's LLM-backed
/// Ingest stage can mark a line invalid (§7 kind 3 fallback).
pub fn parse_line(index: usize, raw: &str) -> LogLine {
    let severity = raw.split_whitespace().next().unwrap_or("").to_string();
    let source_ip = IPV4.captures(raw).map(|c| c[1].to_string()).unwrap_or_default();
    let user = USER.captures(raw).map(|c| c[1].to_string()).unwrap_or_default();

    let event_type = if let Some(caps) = HTTP_LINE.captures(raw) {
        let path = &caps[1];
        let status: u16 = caps[2].parse().unwrap_or(0);
        classify_http(status, path)
    } else {
        classify_severity(&severity)
    };

    LogLine {
        index,
        timestamp: None,
        source: severity,
        event_type,
        source_ip,
        dest_ip: String::new(),
        user,
        details: raw.to_string(),
        raw_text: raw.to_string(),
        is_valid: true,
        parse_error: None,
    }
}

fn classify_http(status: u16, path: &str) -> EventType {
    if status >= 500 {
        EventType::ServerError
    } else if status == 401 || status == 403 {
        EventType::FailedAuth
    } else if status == 404 && RECON_PATHS.iter().any(|p| path.contains(p)) {
        EventType::ReconProbe
    } else if (400..500).contains(&status) {
        EventType::HttpClientError
    } else {
        EventType::HttpRequest
    }
}

fn classify_severity(severity: &str) -> EventType {
    match severity.to_uppercase().as_str() {
        "ERROR" | "CRITICAL" | "ALERT" | "EMERGENCY" => EventType::Error,
        "WARNING" => EventType::Warning,
        _ => EventType::Info,
    }
}

/// Parses a whole batch, assigning sequential indices starting at `start_index`
/// — the hook burst-mode chunking uses to offset by `chunk_index * chunk_size`.
pub fn parse_batch(raw_lines: &[String], start_index: usize) -> Vec<LogLine> {
    raw_lines
        .iter()
        .enumerate()
        .map(|(i, line)| parse_line(start_index + i, line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_server_error_by_status() {
        let line = parse_line(0, r#"INFO 10.0.0.5 - - "GET /api HTTP/1.1" 503"#);
        assert_eq!(line.event_type, EventType::ServerError);
    }

    #[test]
    fn classifies_recon_probe_against_known_paths() {
        let line = parse_line(0, r#"INFO 1.2.3.4 - - "GET /wp-admin HTTP/1.1" 404"#);
        assert_eq!(line.event_type, EventType::ReconProbe);
    }

    #[test]
    fn ordinary_404_is_client_error_not_recon() {
        let line = parse_line(0, r#"INFO 1.2.3.4 - - "GET /missing HTTP/1.1" 404"#);
        assert_eq!(line.event_type, EventType::HttpClientError);
    }

    #[test]
    fn falls_back_to_severity_token_without_http_line() {
        assert_eq!(parse_line(0, "WARNING allow-ssh: Failed password for root").event_type, EventType::Warning);
        assert_eq!(parse_line(0, "ERROR disk full").event_type, EventType::Error);
        assert_eq!(parse_line(0, "garbled nonsense").event_type, EventType::Info);
    }

    #[test]
    fn unrecognized_shape_is_still_valid() {
        let line = parse_line(3, "not a log line at all");
        assert!(line.is_valid);
        assert_eq!(line.parse_error, None);
        assert_eq!(line.details, "not a log line at all");
    }

    #[test]
    fn batch_offsets_indices_from_start() {
        let raws = vec!["WARNING a".to_string(), "WARNING b".to_string()];
        let batch = parse_batch(&raws, 200);
        assert_eq!(batch[0].index, 200);
        assert_eq!(batch[1].index, 201);
    }

    #[test]
    fn extracts_source_ip_when_present() {
        let line = parse_line(0, "WARNING connection from 203.0.113.5 refused");
        assert_eq!(line.source_ip, "203.0.113.5");
    }
}
