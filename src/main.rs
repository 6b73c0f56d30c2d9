use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use repo_qa::api;
use repo_qa::config::Config;
use repo_qa::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "LLM provider: {} (embed dim {})",
        config.llm.provider,
        config.llm.embedding_dim
    );
    tracing::info!(
        "Retrieval: K={} beta={} delta={} workflow_enabled={}",
        config.retrieval.top_k,
        config.retrieval.beta,
        config.retrieval.delta,
        config.retrieval.workflow_enabled
    );

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/ask", post(api::ask::ask))
        .route("/api/sessions/{id}", get(api::sessions::inspect_session))
        .route("/api/admin/sessions", post(api::sessions::list_sessions))
        .route("/api/feedback", post(api::feedback::submit_feedback))
        .route("/api/feedback/bulk", post(api::feedback::submit_bulk_feedback))
        .route("/api/chunks/weight", post(api::admin::edit_chunk_weight))
        .route("/api/workflows/search", post(api::workflows::search_workflows))
        .route("/api/stats", get(api::admin::stats))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
