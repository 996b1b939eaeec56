use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cli::commands::ScanArgs;
use crate::cloud::gcp::GcpProvider;
use crate::cloud::provider::{CloudCredential, CloudProvider};
use crate::config::{self, SentryScanConfig};
use crate::db::Database;
use crate::errors::EngineError;
use crate::events::{EventSink, ScanEvent};
use crate::graph::GraphRuntime;
use crate::llm::{self, LLMProvider};
use crate::models::account::Account;
use crate::scan::{run_scan, ScanOptions};

/// Prints every event as a JSON line — the shape `--stream` wires the sink
/// to when there is no HTTP client draining server-sent events (§4.9).
struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: ScanEvent) {
        if let Ok(line) = serde_json::to_string(&event) {
            println!("{line}");
        }
    }
}

pub async fn handle_scan(args: ScanArgs) -> Result<(), EngineError> {
    info!(project_id = %args.project_id, "starting scan");

    let file_config = match &args.config {
        Some(path) => config::parse_config(&PathBuf::from(path)).await?,
        None => SentryScanConfig::default(),
    };

    let credential = load_credential(&args.credential).await?;
    let requested_services: Vec<String> = args
        .services
        .as_ref()
        .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    let llm_provider = build_llm_provider(&args)?;

    let account_id = args.account_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let db = Database::open(&args.db)?;
    if db.get_account(&account_id)?.is_none() {
        let account = Account::new(&account_id, &args.project_id, &args.project_id, credential.clone());
        db.create_account(&account)?;
    }

    let sink: Arc<dyn EventSink> = if args.stream { Arc::new(StdoutSink) } else { Arc::new(crate::events::sink::NullSink) };
    let runtime = GraphRuntime::new(sink, file_config.concurrency, Duration::from_secs(file_config.scan.per_stage_deadline_s));
    let options = ScanOptions::from(&file_config.scan);
    let provider: Arc<dyn CloudProvider> = Arc::new(GcpProvider::new());

    let state = run_scan(&account_id, &args.project_id, requested_services, credential, provider, llm_provider, options, runtime).await;

    db.save_assets(&account_id, &state.assets)?;
    let inserted = db.save_findings(&account_id, &state.correlated_findings)?;
    let scan_log_id = db.create_scan_log(&account_id)?;
    db.complete_scan_log(&scan_log_id, &state.scan_log)?;
    if let Some(scan_type) = state.scan_type {
        db.record_scan_completion(&account_id, scan_type)?;
    }

    println!("Scan {} for account {}: status={}", scan_log_id, account_id, state.status);
    println!(
        "  assets={} findings={} active_exploits={} newly_persisted={}",
        state.assets.len(),
        state.correlated_findings.len(),
        state.active_exploit_count,
        inserted
    );
    if let Some(err) = &state.error {
        println!("  error: {err}");
    }

    if state.status == "error" {
        return Err(EngineError::Internal(state.error.unwrap_or_else(|| "scan failed".to_string())));
    }
    Ok(())
}

async fn load_credential(path: &str) -> Result<CloudCredential, EngineError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EngineError::Credential(format!("failed to read credential file {path}: {e}")))?;
    serde_json::from_str(&content).map_err(|e| EngineError::Credential(format!("credential file {path} is not valid JSON: {e}")))
}

fn build_llm_provider(args: &ScanArgs) -> Result<Option<Arc<dyn LLMProvider>>, EngineError> {
    let Some(provider_name) = args.llm_provider.as_deref() else {
        return Ok(None);
    };
    let api_key = args
        .llm_api_key
        .clone()
        .or_else(|| resolve_api_key_from_env(provider_name))
        .unwrap_or_default();
    let provider = llm::create_provider(provider_name, &api_key, args.llm_model.as_deref(), Some(&args.llm_base_url))?;
    Ok(Some(Arc::from(provider)))
}

fn resolve_api_key_from_env(provider: &str) -> Option<String> {
    let var_name = match provider {
        "anthropic" => "ANTHROPIC_API_KEY",
        "openai" => "OPENAI_API_KEY",
        "gemini" => "GEMINI_API_KEY",
        "openrouter" => "OPENROUTER_API_KEY",
        _ => return None,
    };
    std::env::var(var_name).ok()
}
