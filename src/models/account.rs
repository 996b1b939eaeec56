use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scan_state::ScanType;
use crate::cloud::provider::CloudCredential;

/// Lifecycle status of a monitored account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Paused,
    Disabled,
}

impl Default for AccountStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// One customer's cloud project under management — the persistence layer's
/// tenant boundary. `credential` is never logged or included in an API
/// response verbatim; callers that need it go through the persistence
/// adapter directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub purpose: Option<String>,
    pub credential: CloudCredential,
    pub services: Vec<String>,
    pub status: AccountStatus,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub last_scan_type: Option<ScanType>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: impl Into<String>, project_id: impl Into<String>, name: impl Into<String>, credential: CloudCredential) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            purpose: None,
            credential,
            services: Vec::new(),
            status: AccountStatus::Active,
            last_scan_at: None,
            last_scan_type: None,
            created_at: Utc::now(),
        }
    }
}

/// A sparse patch for `UpdateAccount` — only `name`, `purpose`, `credential`,
/// `services`, `status`, and `last_scan_at` are mutable per the external
/// interface contract; everything else is set once at creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub purpose: Option<String>,
    pub credential: Option<CloudCredential>,
    pub services: Option<Vec<String>>,
    pub status: Option<AccountStatus>,
    pub last_scan_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> CloudCredential {
        CloudCredential { access_token: "tok".to_string(), principal_email: None, declared_project_id: None }
    }

    #[test]
    fn new_account_defaults_to_active_with_no_scan_history() {
        let account = Account::new("acct-1", "proj-1", "Acme Corp", credential());
        assert_eq!(account.status, AccountStatus::Active);
        assert!(account.last_scan_at.is_none());
        assert!(account.services.is_empty());
    }
}
