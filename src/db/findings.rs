use chrono::Utc;
use rusqlite::params;

use crate::errors::EngineError;
use crate::models::finding::{Finding, FindingStatus, Severity};

use super::Database;

impl Database {
    /// `SaveFindings` — deduplicates on `(rule_code, location)` via the
    /// table's unique constraint; a conflicting row is left untouched so its
    /// `status` (and every other field an operator may have edited) survives
    /// a re-scan. Returns the count of rows that were actually new.
    pub fn save_findings(&self, account_id: &str, findings: &[Finding]) -> Result<usize, EngineError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| EngineError::Persistence(format!("save_findings begin failed: {e}")))?;
        let mut inserted = 0usize;
        for finding in findings {
            let changed = tx
                .execute(
                    "INSERT OR IGNORE INTO findings
                     (account_id, rule_code, title, description, severity, location, status, remediation_script, correlated, verdict, tactic, technique, fix_time, discovered_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    params![
                        account_id,
                        finding.rule_code,
                        finding.title,
                        finding.description,
                        severity_str(finding.severity),
                        finding.location,
                        status_str(finding.status),
                        finding.remediation_script,
                        finding.correlated as i64,
                        finding.verdict,
                        finding.tactic,
                        finding.technique,
                        finding.fix_time,
                        Utc::now().to_rfc3339(),
                    ],
                )
                .map_err(|e| EngineError::Persistence(format!("save_findings insert failed: {e}")))?;
            inserted += changed;
        }
        tx.commit().map_err(|e| EngineError::Persistence(format!("save_findings commit failed: {e}")))?;
        Ok(inserted)
    }

    /// `ListFindings` — ordered by severity (critical, high, medium, low)
    /// then discovery timestamp descending (§6, §8).
    pub fn list_findings(&self, account_id: &str, status_filter: Option<FindingStatus>, severity_filter: Option<Severity>) -> Result<Vec<Finding>, EngineError> {
        let conn = self.conn.lock().unwrap();
        let severity_case = Severity::sql_case_expr("severity");
        let mut sql = format!(
            "SELECT rule_code, title, description, severity, location, status, remediation_script, correlated, verdict, tactic, technique, fix_time
             FROM findings WHERE account_id = ?1"
        );
        if status_filter.is_some() {
            sql.push_str(" AND status = ?2");
        }
        if severity_filter.is_some() {
            sql.push_str(if status_filter.is_some() { " AND severity = ?3" } else { " AND severity = ?2" });
        }
        sql.push_str(&format!(" ORDER BY {severity_case}, discovered_at DESC"));

        let mut stmt = conn.prepare(&sql).map_err(|e| EngineError::Persistence(format!("list_findings query failed: {e}")))?;

        let status_param = status_filter.map(status_str);
        let severity_param = severity_filter.map(severity_str);

        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<Finding> {
            let severity_str: String = row.get(3)?;
            let status_str: String = row.get(5)?;
            Ok(Finding {
                rule_code: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                severity: parse_severity(&severity_str),
                location: row.get(4)?,
                status: parse_status(&status_str),
                remediation_script: row.get(6)?,
                correlated: row.get::<_, i64>(7)? != 0,
                verdict: row.get(8)?,
                tactic: row.get(9)?,
                technique: row.get(10)?,
                fix_time: row.get(11)?,
            })
        };

        let rows = match (status_param, severity_param) {
            (Some(s), Some(sev)) => stmt.query_map(params![account_id, s, sev], map_row),
            (Some(s), None) => stmt.query_map(params![account_id, s], map_row),
            (None, Some(sev)) => stmt.query_map(params![account_id, sev], map_row),
            (None, None) => stmt.query_map(params![account_id], map_row),
        }
        .map_err(|e| EngineError::Persistence(format!("list_findings rows failed: {e}")))?;

        let mut findings = Vec::new();
        for row in rows {
            findings.push(row.map_err(|e| EngineError::Persistence(format!("list_findings row failed: {e}")))?);
        }
        Ok(findings)
    }
}

fn severity_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::High => "high",
        Severity::Medium => "medium",
        Severity::Low => "low",
    }
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

fn status_str(status: FindingStatus) -> &'static str {
    match status {
        FindingStatus::Todo => "todo",
        FindingStatus::InProgress => "in-progress",
        FindingStatus::Ignored => "ignored",
        FindingStatus::Resolved => "resolved",
    }
}

fn parse_status(s: &str) -> FindingStatus {
    match s {
        "in-progress" => FindingStatus::InProgress,
        "ignored" => FindingStatus::Ignored,
        "resolved" => FindingStatus::Resolved,
        _ => FindingStatus::Todo,
    }
}
