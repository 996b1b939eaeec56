use serde::{Deserialize, Serialize};

/// Classification of a parsed log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    FailedAuth,
    ReconProbe,
    ServerError,
    HttpClientError,
    HttpRequest,
    Error,
    Warning,
    Info,
    /// A connection-shaped event (ssh/rdp/smb/generic) — used by the
    /// port-scan and lateral-movement rule detectors.
    Connection,
    PrivilegeEscalation,
    FileTransfer,
    Unknown,
}

/// An opaque textual log record plus, after parsing, structured fields.
///
/// `index` is unique and globally ordered across an entire scan; burst-mode
/// chunks offset their indices by `chunk_index * chunk_size`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub index: usize,
    pub timestamp: Option<String>,
    pub source: String,
    pub event_type: EventType,
    pub source_ip: String,
    pub dest_ip: String,
    pub user: String,
    pub details: String,
    pub raw_text: String,
    pub is_valid: bool,
    pub parse_error: Option<String>,
}

impl LogLine {
    pub fn invalid(index: usize, raw_text: impl Into<String>, parse_error: impl Into<String>) -> Self {
        Self {
            index,
            timestamp: None,
            source: String::new(),
            event_type: EventType::Unknown,
            source_ip: String::new(),
            dest_ip: String::new(),
            user: String::new(),
            details: String::new(),
            raw_text: raw_text.into(),
            is_valid: false,
            parse_error: Some(parse_error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_log_line_carries_parse_error() {
        let line = LogLine::invalid(3, "garbled", "no matching pattern");
        assert!(!line.is_valid);
        assert_eq!(line.index, 3);
        assert_eq!(line.parse_error.as_deref(), Some("no matching pattern"));
    }
}
