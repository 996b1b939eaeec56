use crate::cli::commands::QueryArgs;
use crate::db::Database;
use crate::errors::EngineError;
use crate::models::finding::{FindingStatus, Severity};

pub async fn handle_query(args: QueryArgs) -> Result<(), EngineError> {
    let db = Database::open(&args.db)?;

    if db.get_account(&args.account_id)?.is_none() {
        return Err(EngineError::Persistence(format!("no account {} in {}", args.account_id, args.db)));
    }

    let status_filter = args.status.as_deref().map(parse_status).transpose()?;
    let severity_filter = args.severity.as_deref().map(parse_severity).transpose()?;

    let findings = db.list_findings(&args.account_id, status_filter, severity_filter)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(());
    }

    println!("{} finding(s) for account {}", findings.len(), args.account_id);
    for f in &findings {
        let marker = if f.correlated { "[ACTIVE] " } else { "" };
        println!("  [{:?}] {marker}{} — {} ({})", f.severity, f.title, f.location, f.rule_code);
    }
    Ok(())
}

fn parse_status(s: &str) -> Result<FindingStatus, EngineError> {
    match s {
        "todo" => Ok(FindingStatus::Todo),
        "in-progress" => Ok(FindingStatus::InProgress),
        "ignored" => Ok(FindingStatus::Ignored),
        "resolved" => Ok(FindingStatus::Resolved),
        other => Err(EngineError::Config(format!("unknown status filter: {other}"))),
    }
}

fn parse_severity(s: &str) -> Result<Severity, EngineError> {
    match s {
        "critical" => Ok(Severity::Critical),
        "high" => Ok(Severity::High),
        "medium" => Ok(Severity::Medium),
        "low" => Ok(Severity::Low),
        other => Err(EngineError::Config(format!("unknown severity filter: {other}"))),
    }
}
