use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::cloud::provider::CloudCredential;
use crate::errors::EngineError;
use crate::models::account::{Account, AccountStatus, AccountUpdate};
use crate::models::scan_state::ScanType;

use super::Database;

impl Database {
    pub fn create_account(&self, account: &Account) -> Result<(), EngineError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO accounts (id, project_id, name, purpose, access_token, principal_email, declared_project_id, services, status, last_scan_at, last_scan_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                account.id,
                account.project_id,
                account.name,
                account.purpose,
                account.credential.access_token,
                account.credential.principal_email,
                account.credential.declared_project_id,
                serde_json::to_string(&account.services)?,
                status_str(account.status),
                account.last_scan_at.map(|t| t.to_rfc3339()),
                account.last_scan_type.map(scan_type_str),
                account.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| EngineError::Persistence(format!("create_account failed: {e}")))?;
        Ok(())
    }

    pub fn get_account(&self, id: &str) -> Result<Option<Account>, EngineError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, project_id, name, purpose, access_token, principal_email, declared_project_id, services, status, last_scan_at, last_scan_type, created_at
                 FROM accounts WHERE id = ?1",
            )
            .map_err(|e| EngineError::Persistence(format!("get_account query failed: {e}")))?;

        let account = stmt
            .query_row(params![id], row_to_account)
            .optional()
            .map_err(|e| EngineError::Persistence(format!("get_account row failed: {e}")))?;
        Ok(account)
    }

    /// `UpdateAccount` — only the fields named in §6 are mutable; anything
    /// left `None` in `update` is left untouched on the stored row.
    pub fn update_account(&self, id: &str, update: &AccountUpdate) -> Result<bool, EngineError> {
        let existing = match self.get_account(id)? {
            Some(a) => a,
            None => return Ok(false),
        };

        let name = update.name.clone().unwrap_or(existing.name);
        let purpose = update.purpose.clone().or(existing.purpose);
        let credential = update.credential.clone().unwrap_or(existing.credential);
        let services = update.services.clone().unwrap_or(existing.services);
        let status = update.status.unwrap_or(existing.status);
        let last_scan_at = update.last_scan_at.or(existing.last_scan_at);

        let conn = self.conn.lock().unwrap();
        let affected = conn
            .execute(
                "UPDATE accounts SET name=?2, purpose=?3, access_token=?4, principal_email=?5, declared_project_id=?6, services=?7, status=?8, last_scan_at=?9 WHERE id=?1",
                params![
                    id,
                    name,
                    purpose,
                    credential.access_token,
                    credential.principal_email,
                    credential.declared_project_id,
                    serde_json::to_string(&services)?,
                    status_str(status),
                    last_scan_at.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| EngineError::Persistence(format!("update_account failed: {e}")))?;
        Ok(affected > 0)
    }

    /// Records the outcome of a completed scan — `last_scan_at`/`last_scan_type`
    /// are the two fields Finalize writes that aren't part of the general
    /// `UpdateAccount` patch surface.
    pub fn record_scan_completion(&self, id: &str, scan_type: ScanType) -> Result<(), EngineError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE accounts SET last_scan_at=?2, last_scan_type=?3 WHERE id=?1",
            params![id, Utc::now().to_rfc3339(), scan_type_str(scan_type)],
        )
        .map_err(|e| EngineError::Persistence(format!("record_scan_completion failed: {e}")))?;
        Ok(())
    }

    /// Cascades to `assets`, `findings`, and `scan_logs` via `ON DELETE CASCADE`.
    pub fn delete_account(&self, id: &str) -> Result<bool, EngineError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn
            .execute("DELETE FROM accounts WHERE id = ?1", params![id])
            .map_err(|e| EngineError::Persistence(format!("delete_account failed: {e}")))?;
        Ok(affected > 0)
    }
}

fn status_str(status: AccountStatus) -> &'static str {
    match status {
        AccountStatus::Active => "active",
        AccountStatus::Paused => "paused",
        AccountStatus::Disabled => "disabled",
    }
}

fn scan_type_str(scan_type: ScanType) -> &'static str {
    match scan_type {
        ScanType::Full => "full",
        ScanType::CloudLoggingOnly => "cloud-logging-only",
    }
}

fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    let services_json: String = row.get(7)?;
    let status_str: String = row.get(8)?;
    let last_scan_at: Option<String> = row.get(9)?;
    let last_scan_type: Option<String> = row.get(10)?;
    let created_at: String = row.get(11)?;

    Ok(Account {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        purpose: row.get(3)?,
        credential: CloudCredential { access_token: row.get(4)?, principal_email: row.get(5)?, declared_project_id: row.get(6)? },
        services: serde_json::from_str(&services_json).unwrap_or_default(),
        status: match status_str.as_str() {
            "paused" => AccountStatus::Paused,
            "disabled" => AccountStatus::Disabled,
            _ => AccountStatus::Active,
        },
        last_scan_at: last_scan_at.and_then(|t| chrono::DateTime::parse_from_rfc3339(&t).ok()).map(|t| t.with_timezone(&Utc)),
        last_scan_type: last_scan_type.map(|t| if t == "full" { ScanType::Full } else { ScanType::CloudLoggingOnly }),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at).map(|t| t.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
    })
}
