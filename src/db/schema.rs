/// Schema for the reference SQLite persistence adapter (§6). Foreign keys
/// are enforced so `DeleteAccount` cascades to assets, findings, and scan
/// logs without the adapter having to orchestrate the deletes itself.
pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL,
    purpose TEXT,
    access_token TEXT NOT NULL,
    principal_email TEXT,
    declared_project_id TEXT,
    services TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'active',
    last_scan_at TEXT,
    last_scan_type TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    asset_type TEXT NOT NULL,
    name TEXT NOT NULL,
    region TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS findings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    rule_code TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    severity TEXT NOT NULL,
    location TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'todo',
    remediation_script TEXT,
    correlated INTEGER NOT NULL DEFAULT 0,
    verdict TEXT,
    tactic TEXT,
    technique TEXT,
    fix_time TEXT,
    discovered_at TEXT NOT NULL,
    UNIQUE(account_id, rule_code, location)
);

CREATE TABLE IF NOT EXISTS scan_logs (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'running',
    summary TEXT,
    entries TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_assets_account ON assets(account_id);
CREATE INDEX IF NOT EXISTS idx_findings_account ON findings(account_id);
CREATE INDEX IF NOT EXISTS idx_findings_severity ON findings(severity);
CREATE INDEX IF NOT EXISTS idx_scan_logs_account ON scan_logs(account_id);
";
