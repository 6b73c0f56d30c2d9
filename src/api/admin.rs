use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::api::{require_admin, ApiError};
use crate::models::{ChunkUsefulness, ChunkWeightEdit, ChunkWeightEditResponse, StatsResponse};
use crate::state::AppState;

/// Chunks listed in the stats leaderboard.
const TOP_CHUNKS: usize = 10;

/// POST /api/chunks/weight — manual weight override for a chunk that
/// performs consistently well or poorly but hasn't accumulated enough
/// feedback yet.
pub async fn edit_chunk_weight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChunkWeightEdit>,
) -> Result<Json<ChunkWeightEditResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let (old_weight, new_weight) = state.chunks.set_weight(req.chunk_id, req.new_weight)?;
    tracing::info!(
        "chunk {} weight set {old_weight:.2} -> {new_weight:.2}: {}",
        req.chunk_id,
        req.reason
    );

    Ok(Json(ChunkWeightEditResponse {
        chunk_id: req.chunk_id,
        old_weight,
        new_weight,
    }))
}

/// GET /api/stats — accuracy, pending feedback, and the chunks with
/// the best usefulness track record.
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let (total, correct, incorrect, pending) = state.sessions.status_counts();
    let finalised = correct + incorrect;
    let accuracy_rate = if finalised > 0 {
        correct as f32 / finalised as f32
    } else {
        0.0
    };

    let mut top_chunks: Vec<ChunkUsefulness> = state
        .chunks
        .all()
        .into_iter()
        .filter(|c| c.times_retrieved > 0)
        .map(|c| ChunkUsefulness {
            chunk_id: c.id,
            provenance: c.provenance(),
            times_retrieved: c.times_retrieved,
            times_useful: c.times_useful,
            usefulness_rate: c.times_useful as f32 / c.times_retrieved as f32,
            accuracy_weight: c.accuracy_weight,
        })
        .collect();

    top_chunks.sort_by(|a, b| {
        b.usefulness_rate
            .partial_cmp(&a.usefulness_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.times_useful.cmp(&a.times_useful))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    top_chunks.truncate(TOP_CHUNKS);

    Ok(Json(StatsResponse {
        total_sessions: total,
        correct_sessions: correct,
        incorrect_sessions: incorrect,
        pending_feedback: pending,
        accuracy_rate,
        chunk_count: state.chunks.count(),
        workflow_memory_count: state.workflows.count(),
        top_chunks,
    }))
}
