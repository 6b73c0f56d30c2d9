use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::api::{require_admin, ApiError};
use crate::error::CoreError;
use crate::models::{
    BulkFeedbackRequest, BulkFeedbackResponse, BulkFeedbackResult, FeedbackRequest,
    FeedbackResponse,
};
use crate::rag::feedback::apply_feedback;
use crate::state::AppState;

/// POST /api/feedback — apply one feedback event to a session.
pub async fn submit_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let outcome = apply_feedback(&state, &req).await?;

    Ok(Json(FeedbackResponse {
        success: true,
        chunks_updated: outcome.chunks_updated,
        workflow_memory_created: outcome.workflow_memory_created,
    }))
}

/// POST /api/feedback/bulk — apply many feedback events. Items are
/// independent: one failure is reported per item and does not abort
/// the rest.
pub async fn submit_bulk_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BulkFeedbackRequest>,
) -> Result<Json<BulkFeedbackResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let max = state.config.max_bulk_feedback;
    if req.items.is_empty() {
        return Err(CoreError::InvalidInput("bulk feedback is empty".to_string()).into());
    }
    if req.items.len() > max {
        return Err(CoreError::InvalidInput(format!(
            "bulk feedback exceeds {max} items"
        ))
        .into());
    }

    let mut results = Vec::with_capacity(req.items.len());
    let mut successful = 0;
    let mut chunks_updated = 0;
    let mut memories_created = 0;

    for item in &req.items {
        match apply_feedback(&state, item).await {
            Ok(outcome) => {
                successful += 1;
                chunks_updated += outcome.chunks_updated;
                if outcome.workflow_memory_created {
                    memories_created += 1;
                }
                results.push(BulkFeedbackResult {
                    session_id: item.session_id,
                    success: true,
                    chunks_updated: outcome.chunks_updated,
                    workflow_memory_created: outcome.workflow_memory_created,
                    error: None,
                });
            }
            Err(e) => {
                tracing::warn!("bulk feedback item for session {} failed: {e}", item.session_id);
                results.push(BulkFeedbackResult {
                    session_id: item.session_id,
                    success: false,
                    chunks_updated: 0,
                    workflow_memory_created: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let total = req.items.len();
    Ok(Json(BulkFeedbackResponse {
        total,
        successful,
        failed: total - successful,
        chunks_updated,
        memories_created,
        results,
    }))
}
