use clap::Parser;
use tracing_subscriber::EnvFilter;

use sentryscan::cli::{Cli, Commands};
use sentryscan::{cli, config, EngineError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let result = match cli.command {
        Commands::Scan(args) => cli::scan::handle_scan(args).await,
        Commands::Serve(args) => cli::serve::handle_serve(args).await,
        Commands::Query(args) => cli::query::handle_query(args).await,
        Commands::Validate(args) => handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        let exit_code = match &e {
            EngineError::Config(_) | EngineError::OutputValidation(_) => 2,
            EngineError::Credential(_) => 4,
            EngineError::Cancelled(_) => 5,
            EngineError::Timeout(_) => 6,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), EngineError> {
    let path = std::path::PathBuf::from(&args.config);
    let _config = config::parser::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    Ok(())
}
