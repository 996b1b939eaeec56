use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::asset::{ScanLog, ScanLogStatus};

use super::Database;

impl Database {
    /// `CreateScanLog` — opens a `running` scan log for an account and
    /// returns its generated id.
    pub fn create_scan_log(&self, account_id: &str) -> Result<String, EngineError> {
        let id = Uuid::new_v4().to_string();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scan_logs (id, account_id, status, summary, entries, created_at) VALUES (?1, ?2, 'running', NULL, '[]', ?3)",
            params![id, account_id, Utc::now().to_rfc3339()],
        )
        .map_err(|e| EngineError::Persistence(format!("create_scan_log failed: {e}")))?;
        Ok(id)
    }

    /// `CompleteScanLog` — writes the Finalize stage's terminal status,
    /// summary, and per-service entries, stamping `completed_at`.
    pub fn complete_scan_log(&self, id: &str, scan_log: &ScanLog) -> Result<(), EngineError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scan_logs SET status=?2, summary=?3, entries=?4, completed_at=?5 WHERE id=?1",
            params![
                id,
                status_str(scan_log.status),
                scan_log.summary,
                serde_json::to_string(&scan_log.entries)?,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| EngineError::Persistence(format!("complete_scan_log failed: {e}")))?;
        Ok(())
    }

    pub fn get_scan_log(&self, id: &str) -> Result<Option<ScanLog>, EngineError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT status, summary, entries FROM scan_logs WHERE id = ?1")
            .map_err(|e| EngineError::Persistence(format!("get_scan_log query failed: {e}")))?;

        let row = stmt
            .query_row(params![id], |row| {
                let status_str: String = row.get(0)?;
                let entries_json: String = row.get(2)?;
                Ok((status_str, row.get::<_, Option<String>>(1)?, entries_json))
            })
            .optional()
            .map_err(|e| EngineError::Persistence(format!("get_scan_log row failed: {e}")))?;

        Ok(row.map(|(status_str, summary, entries_json)| ScanLog {
            status: parse_status(&status_str),
            summary,
            entries: serde_json::from_str(&entries_json).unwrap_or_default(),
        }))
    }

    pub fn list_scan_logs(&self, account_id: &str, limit: usize) -> Result<Vec<String>, EngineError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id FROM scan_logs WHERE account_id = ?1 ORDER BY created_at DESC LIMIT ?2")
            .map_err(|e| EngineError::Persistence(format!("list_scan_logs query failed: {e}")))?;

        let rows = stmt
            .query_map(params![account_id, limit as i64], |row| row.get::<_, String>(0))
            .map_err(|e| EngineError::Persistence(format!("list_scan_logs rows failed: {e}")))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| EngineError::Persistence(format!("list_scan_logs row failed: {e}")))?);
        }
        Ok(ids)
    }
}

fn status_str(status: ScanLogStatus) -> &'static str {
    match status {
        ScanLogStatus::Running => "running",
        ScanLogStatus::Success => "success",
        ScanLogStatus::Partial => "partial",
        ScanLogStatus::Error => "error",
    }
}

fn parse_status(s: &str) -> ScanLogStatus {
    match s {
        "success" => ScanLogStatus::Success,
        "partial" => ScanLogStatus::Partial,
        "error" => ScanLogStatus::Error,
        _ => ScanLogStatus::Running,
    }
}
