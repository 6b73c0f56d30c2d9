use std::collections::HashSet;
use std::time::Duration;

use axum::extract::State;
use axum::Json;

use crate::api::ApiError;
use crate::error::{CoreError, Result};
use crate::llm::embeddings;
use crate::models::{AskRequest, AskResponse, RetrievedChunk};
use crate::rag::generator;
use crate::rag::retriever;
use crate::rag::tracer::{Phase, WorkflowTracer};
use crate::state::AppState;
use crate::store::sessions::NewSession;

/// How many workflow memories a single query consults.
const WORKFLOW_TOP_M: usize = 3;

/// The full ask pipeline: validate → embed → workflow lookup →
/// retrieve → generate → persist. Called by the HTTP handler and by
/// the integration tests.
///
/// No session is written if any earlier step fails; the session write
/// is the only visible side effect of a request.
pub async fn run_ask(state: &AppState, query: &str, include_trace: bool) -> Result<AskResponse> {
    // ── Step 1: Validate ──────────────────────────────────
    let query = query.trim();
    if query.is_empty() {
        return Err(CoreError::InvalidInput("query is required".to_string()));
    }
    let q_max = state.config.retrieval.q_max;
    if query.chars().count() > q_max {
        return Err(CoreError::InvalidInput(format!(
            "query exceeds {q_max} characters"
        )));
    }

    let mut tracer = WorkflowTracer::new(query);
    let llm_config = state.llm_config.read().clone();

    // ── Step 2: Embed the query ───────────────────────────
    tracer.mark_phase_start(Phase::Embed);
    let embed = embeddings::embed_single(&state.http_client, &llm_config, query);
    let query_vec = tokio::time::timeout(
        Duration::from_secs(state.config.embed_timeout_secs),
        embed,
    )
    .await
    .map_err(|_| CoreError::Timeout("query embedding deadline exceeded".to_string()))??;
    tracer.add_step(
        Phase::Embed,
        format!("embedded query into {} dimensions", query_vec.len()),
    );
    tracer.mark_phase_end(Phase::Embed);

    // ── Step 3: Look up similar past workflows ────────────
    let workflow_hits = if state.config.retrieval.workflow_enabled {
        tracer.mark_phase_start(Phase::WorkflowLookup);
        let hits = state.workflows.find_similar(
            &query_vec,
            WORKFLOW_TOP_M,
            state.config.retrieval.min_memory_sim,
        );
        tracer.add_step(
            Phase::WorkflowLookup,
            format!("{} similar workflow memories found", hits.len()),
        );
        tracer.mark_phase_end(Phase::WorkflowLookup);
        hits
    } else {
        Vec::new()
    };

    // ── Step 4: Retrieve chunks ───────────────────────────
    let k = state.config.retrieval.top_k.min(state.config.retrieval.k_max);
    tracer.mark_phase_start(Phase::Retrieve);
    let results = retriever::retrieve(
        &state.chunks,
        &query_vec,
        k,
        state.config.retrieval.beta,
        &workflow_hits,
    )?;
    for r in &results {
        tracer.add_retrieved(&r.chunk, r.rank, r.raw_similarity, r.effective_score, r.workflow_boosted);
    }
    let boosted = results.iter().filter(|r| r.workflow_boosted).count();
    tracer.add_step(
        Phase::Retrieve,
        format!("retrieved {} chunks ({boosted} workflow-boosted)", results.len()),
    );
    tracer.mark_phase_end(Phase::Retrieve);

    // ── Step 5: Generate the answer ───────────────────────
    tracer.mark_phase_start(Phase::Generate);
    let answer = generator::generate(
        &state.http_client,
        &llm_config,
        Duration::from_secs(state.config.generate_timeout_secs),
        query,
        &results,
        &mut tracer,
    )
    .await?;
    tracer.mark_phase_end(Phase::Generate);

    // ── Step 6: Persist the session ───────────────────────
    tracer.mark_phase_start(Phase::Persist);
    tracer.add_step(Phase::Persist, "session persisted");
    tracer.mark_phase_end(Phase::Persist);
    let trace = tracer.snapshot();

    let retrieved: Vec<RetrievedChunk> = results
        .iter()
        .map(|r| RetrievedChunk {
            chunk_id: r.chunk.id,
            rank: r.rank,
            similarity: r.raw_similarity,
            effective_score: r.effective_score,
            workflow_boosted: r.workflow_boosted,
            was_useful: None,
        })
        .collect();

    let session_id = state.sessions.create(NewSession {
        query: query.to_string(),
        query_embedding: query_vec,
        answer: answer.clone(),
        retrieved,
        trace: trace.clone(),
    })?;

    // Sources in rank order, deduplicated
    let mut seen = HashSet::new();
    let sources: Vec<String> = results
        .iter()
        .map(|r| r.chunk.provenance())
        .filter(|p| seen.insert(p.clone()))
        .collect();

    tracing::info!(
        "ask answered: session={session_id} chunks={} boosted={boosted}",
        results.len()
    );

    Ok(AskResponse {
        answer,
        session_id,
        sources,
        reasoning_trace: include_trace.then_some(trace),
    })
}

/// POST /api/ask — answer a question about the documentation corpus.
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> std::result::Result<Json<AskResponse>, ApiError> {
    let _permit = state
        .ask_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Core(CoreError::Internal("ask semaphore closed".to_string())))?;

    let response = run_ask(&state, &req.query, req.include_trace).await?;
    Ok(Json(response))
}
