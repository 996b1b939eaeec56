use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sentryscan", version, about = "Multi-tenant cloud security posture scanner and threat correlation engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one scan against a cloud project and persist the results
    Scan(ScanArgs),
    /// Start the HTTP API server (account/scan endpoints + SSE progress stream)
    Serve(ServeArgs),
    /// List persisted findings for an account
    Query(QueryArgs),
    /// Validate a YAML configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct ScanArgs {
    /// Cloud project id to scan
    #[arg(short, long)]
    pub project_id: String,

    /// Path to a JSON credential file: {"access_token", "principal_email"?, "declared_project_id"?}
    #[arg(short, long)]
    pub credential: String,

    /// Account id to persist under (generated if omitted)
    #[arg(long)]
    pub account_id: Option<String>,

    /// YAML configuration file (see §6 of the scan limits table)
    #[arg(long)]
    pub config: Option<String>,

    /// Comma-separated services to scan: compute,firewall,storage,sql,cloud_logging
    /// (omit to scan everything the credential can access)
    #[arg(long)]
    pub services: Option<String>,

    /// SQLite database path results are persisted to
    #[arg(long, default_value = "./sentryscan.db")]
    pub db: String,

    /// LLM provider for the threat pipeline: anthropic, openai, gemini, openrouter, local
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// LLM model identifier
    #[arg(long)]
    pub llm_model: Option<String>,

    /// LLM API key (or resolved from the provider's standard env var)
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// Local LLM endpoint, used only when --llm-provider=local
    #[arg(long, default_value = "http://localhost:11434/v1")]
    pub llm_base_url: String,

    /// Emit progress events as JSON lines to stdout while scanning
    #[arg(long)]
    pub stream: bool,
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Listen port
    #[arg(long, default_value = "8080")]
    pub port: u16,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// SQLite database path
    #[arg(long, default_value = "./sentryscan.db")]
    pub db: String,

    /// Max concurrent scans (the graph runtime's per-asset worker pool bound)
    #[arg(long, default_value = "4")]
    pub concurrency: usize,
}

#[derive(Args, Clone)]
pub struct QueryArgs {
    /// Account id to query
    pub account_id: String,

    /// SQLite database path
    #[arg(long, default_value = "./sentryscan.db")]
    pub db: String,

    /// Filter by status: todo, in-progress, ignored, resolved
    #[arg(long)]
    pub status: Option<String>,

    /// Filter by severity: critical, high, medium, low
    #[arg(long)]
    pub severity: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
