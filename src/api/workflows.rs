use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::api::{require_admin, ApiError};
use crate::error::CoreError;
use crate::llm::embeddings;
use crate::models::{WorkflowSearchRequest, WorkflowSearchResponse, WorkflowSearchResult};
use crate::state::AppState;

/// POST /api/workflows/search — find past reasoning patterns similar
/// to a query.
pub async fn search_workflows(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WorkflowSearchRequest>,
) -> Result<Json<WorkflowSearchResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let query = req.query_text.trim();
    if query.is_empty() {
        return Err(CoreError::InvalidInput("query_text is required".to_string()).into());
    }
    let top_k = req.top_k.min(state.config.retrieval.k_max);
    let min_sim = req
        .min_similarity
        .unwrap_or(state.config.retrieval.min_memory_sim);

    let llm_config = state.llm_config.read().clone();
    let embed = embeddings::embed_single(&state.http_client, &llm_config, query);
    let query_vec = tokio::time::timeout(
        Duration::from_secs(state.config.embed_timeout_secs),
        embed,
    )
    .await
    .map_err(|_| CoreError::Timeout("query embedding deadline exceeded".to_string()))??;

    let hits = state
        .workflows
        .search(&query_vec, top_k, min_sim, req.successful_only);

    let results = hits
        .into_iter()
        .map(|hit| WorkflowSearchResult {
            memory_id: hit.memory.id,
            source_session_id: hit.memory.source_session_id,
            summary: hit.memory.summary,
            similarity: hit.similarity,
            useful_chunk_ids: hit.memory.useful_chunk_ids,
            created_at: hit.memory.created_at,
        })
        .collect();

    Ok(Json(WorkflowSearchResponse { results }))
}
