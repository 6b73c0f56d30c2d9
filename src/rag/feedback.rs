use std::collections::HashMap;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::llm::embeddings;
use crate::models::{FeedbackRequest, Session};
use crate::state::AppState;

/// Retries for the best-effort workflow-memory write.
const R_MEM: u32 = 2;
const MEM_BACKOFF_MS: u64 = 250;

/// What one feedback application changed.
#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    pub chunks_updated: usize,
    pub workflow_memory_created: bool,
}

/// Apply one feedback event to a session.
///
/// The session finalisation is the at-most-once gate: it commits the
/// status flip and per-chunk usefulness before any weight moves, so a
/// duplicate submission observes AlreadyFinalised and changes nothing.
/// Weight and counter updates follow per chunk; the workflow-memory
/// write is a secondary learning signal and never fails the request.
pub async fn apply_feedback(state: &AppState, req: &FeedbackRequest) -> Result<FeedbackOutcome> {
    // Usefulness keyed by chunk id; a duplicate entry for the same
    // chunk keeps the last value.
    let usefulness: HashMap<i64, bool> = req
        .chunk_feedback
        .iter()
        .map(|fb| (fb.chunk_id, fb.was_useful))
        .collect();

    let session = state.sessions.finalise_feedback(
        req.session_id,
        req.is_correct,
        &usefulness,
        req.correction.clone(),
        req.notes.clone(),
    )?;

    // Mutate chunk state for every entry that named a retrieved chunk.
    // Entries outside the session's retrieved list are skipped.
    let mut chunks_updated = 0;
    for entry in &session.retrieved {
        let Some(&useful) = usefulness.get(&entry.chunk_id) else {
            continue;
        };
        let delta = if useful {
            state.config.retrieval.delta
        } else {
            -state.config.retrieval.delta
        };

        match state
            .chunks
            .bump_counters(entry.chunk_id, useful)
            .and_then(|_| state.chunks.adjust_weight(entry.chunk_id, delta))
        {
            Ok(new_weight) => {
                chunks_updated += 1;
                tracing::debug!(
                    "chunk {} weight adjusted to {new_weight:.2} (useful={useful})",
                    entry.chunk_id
                );
            }
            Err(e) => {
                tracing::warn!("skipping weight update for chunk {}: {e}", entry.chunk_id);
            }
        }
    }

    let workflow_memory_created = if req.is_correct && state.config.retrieval.workflow_enabled {
        record_workflow_memory(state, &session, &usefulness).await
    } else {
        false
    };

    Ok(FeedbackOutcome {
        chunks_updated,
        workflow_memory_created,
    })
}

/// Best-effort creation of a workflow memory from a correct session.
/// Returns whether a memory was recorded; failures are logged, never
/// propagated.
async fn record_workflow_memory(
    state: &AppState,
    session: &Session,
    usefulness: &HashMap<i64, bool>,
) -> bool {
    let useful_ids: Vec<i64> = session
        .retrieved
        .iter()
        .filter(|e| usefulness.get(&e.chunk_id) == Some(&true))
        .map(|e| e.chunk_id)
        .collect();

    if useful_ids.is_empty() {
        return false;
    }

    let summary = compose_summary(state, &session.query, &useful_ids);

    let llm_config = state.llm_config.read().clone();
    let deadline = Duration::from_secs(state.config.embed_timeout_secs);

    let mut attempt = 0;
    loop {
        let result = embed_and_record(state, &llm_config, deadline, &summary, session, &useful_ids).await;
        match result {
            Ok(()) => {
                tracing::info!("workflow memory recorded for session {}", session.id);
                return true;
            }
            Err(CoreError::InvalidInput(msg)) => {
                // Duplicate for this session, or similarly non-retryable
                tracing::info!("workflow memory not recorded for session {}: {msg}", session.id);
                return false;
            }
            Err(e) if e.is_retryable() && attempt < R_MEM => {
                attempt += 1;
                tracing::warn!(
                    "workflow memory attempt {attempt} failed for session {}: {e}",
                    session.id
                );
                tokio::time::sleep(Duration::from_millis(MEM_BACKOFF_MS * attempt as u64)).await;
            }
            Err(e) => {
                tracing::warn!(
                    "giving up on workflow memory for session {}: {e}",
                    session.id
                );
                return false;
            }
        }
    }
}

async fn embed_and_record(
    state: &AppState,
    llm_config: &crate::config::LlmConfig,
    deadline: Duration,
    summary: &str,
    session: &Session,
    useful_ids: &[i64],
) -> Result<()> {
    let embed = embeddings::embed_single(&state.http_client, llm_config, summary);
    let summary_vec = tokio::time::timeout(deadline, embed)
        .await
        .map_err(|_| CoreError::Timeout("summary embedding deadline exceeded".to_string()))??;

    state.workflows.record(
        summary.to_string(),
        summary_vec,
        session.id,
        useful_ids.to_vec(),
    )?;
    Ok(())
}

/// Deterministic summary of a successful reasoning: the query, the
/// provenance slug of every useful chunk (sorted by chunk id), and the
/// outcome marker. This text seeds the memory's embedding.
fn compose_summary(state: &AppState, query: &str, useful_ids: &[i64]) -> String {
    let mut ids: Vec<i64> = useful_ids.to_vec();
    ids.sort_unstable();

    let mut lines = vec![format!("Query: {query}"), "Useful sources:".to_string()];
    for id in ids {
        match state.chunks.get(id) {
            Ok(chunk) => lines.push(format!("- {}", chunk.provenance_slug())),
            Err(_) => lines.push(format!("- chunk {id}")),
        }
    }
    lines.push("outcome: correct".to_string());
    lines.join("\n")
}
