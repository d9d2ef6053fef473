use std::env;
use std::time::Duration;

use anyhow::Result;
use ballot_api::{build_router, build_state, spawn_housekeeping, ApiConfig};
use ballot_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("ballot_api");

    let kb_root = env::var("BALLOT_KB_ROOT").unwrap_or_else(|_| "kb".to_string());
    let bind = env::var("BALLOT_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let state = build_state(ApiConfig::from_env(&kb_root)?).await?;
    spawn_housekeeping(&state, Duration::from_secs(15 * 60));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, kb_root = %kb_root, "ballot assistant api started");

    axum::serve(listener, app).await?;
    Ok(())
}
