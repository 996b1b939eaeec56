use tracing::info;

use crate::api;
use crate::cli::commands::ServeArgs;
use crate::errors::EngineError;

pub async fn handle_serve(args: ServeArgs) -> Result<(), EngineError> {
    info!(host = %args.host, port = args.port, db = %args.db, "starting API server");

    let state = api::create_app_state(&args.db, args.concurrency).await?;
    let app = api::build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| EngineError::Internal(format!("server error: {e}")))?;

    Ok(())
}
