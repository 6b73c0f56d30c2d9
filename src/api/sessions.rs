use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::api::{require_admin, ApiError};
use crate::models::{
    content_preview, InspectedChunk, SessionInspectResponse, SessionListRequest,
    SessionListResponse, SessionSummary,
};
use crate::state::AppState;

/// Characters of query shown in session listings.
const QUERY_PREVIEW_CHARS: usize = 80;
/// Characters of chunk content shown during inspection.
const INSPECT_PREVIEW_CHARS: usize = 200;

/// GET /api/sessions/{id} — full session with retrieved chunks joined
/// against their live chunk rows.
pub async fn inspect_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SessionInspectResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let session = state.sessions.get(id)?;

    let retrieved = session
        .retrieved
        .iter()
        .map(|entry| {
            // A chunk is never deleted by the core, but be tolerant of
            // a missing row rather than failing the whole inspection.
            match state.chunks.get(entry.chunk_id) {
                Ok(chunk) => InspectedChunk {
                    chunk_id: entry.chunk_id,
                    repo: chunk.repo,
                    path: chunk.path,
                    section: chunk.section,
                    content_preview: content_preview(&chunk.content, INSPECT_PREVIEW_CHARS),
                    similarity: entry.similarity,
                    effective_score: entry.effective_score,
                    rank: entry.rank,
                    workflow_boosted: entry.workflow_boosted,
                    was_useful: entry.was_useful,
                    accuracy_weight: chunk.accuracy_weight,
                },
                Err(_) => InspectedChunk {
                    chunk_id: entry.chunk_id,
                    repo: String::new(),
                    path: String::new(),
                    section: None,
                    content_preview: "(chunk no longer available)".to_string(),
                    similarity: entry.similarity,
                    effective_score: entry.effective_score,
                    rank: entry.rank,
                    workflow_boosted: entry.workflow_boosted,
                    was_useful: entry.was_useful,
                    accuracy_weight: 0.0,
                },
            }
        })
        .collect();

    Ok(Json(SessionInspectResponse {
        session_id: session.id,
        query: session.query,
        answer: session.answer,
        feedback_status: session.feedback_status,
        correction: session.correction,
        notes: session.notes,
        retrieved,
        trace: session.trace,
        created_at: session.created_at,
    }))
}

/// POST /api/admin/sessions — filtered, paged session listing.
pub async fn list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SessionListRequest>,
) -> Result<Json<SessionListResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let (total, page) = state.sessions.list(&req);

    let sessions = page
        .into_iter()
        .map(|s| SessionSummary {
            session_id: s.id,
            query_preview: content_preview(&s.query, QUERY_PREVIEW_CHARS),
            feedback_status: s.feedback_status,
            chunk_count: s.retrieved.len(),
            created_at: s.created_at,
        })
        .collect();

    Ok(Json(SessionListResponse { total, sessions }))
}
