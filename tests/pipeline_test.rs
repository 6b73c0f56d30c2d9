//! Integration tests for the ask → feedback → boosted-ask loop.
//!
//! These exercise the full pipeline against the real stores using the
//! stub LLM provider, so no network or model is required.

use repo_qa::config::Config;
use repo_qa::error::CoreError;
use repo_qa::models::{ChunkFeedback, FeedbackRequest, NewChunk};
use repo_qa::rag::feedback::apply_feedback;
use repo_qa::rag::tracer::Phase;
use repo_qa::state::AppState;

const DIM: usize = 8;

/// Helper: state over a temp data dir with the stub provider.
fn test_state(dir: &tempfile::TempDir) -> AppState {
    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();
    config.llm.provider = "stub".to_string();
    config.llm.embedding_dim = DIM;
    // Let every recorded memory match follow-up queries so the boost
    // path is deterministic under hash-based stub embeddings.
    config.retrieval.min_memory_sim = -1.0;
    AppState::new(config).unwrap()
}

/// Helper: seed a documentation chunk with a fixed-direction embedding.
fn seed_chunk(state: &AppState, path: &str, axis: usize) -> i64 {
    let mut embedding = vec![0.0; DIM];
    embedding[axis % DIM] = 1.0;
    state
        .chunks
        .insert(NewChunk {
            repo: "infra-docs".to_string(),
            path: path.to_string(),
            section: Some("Setup".to_string()),
            content: format!("Documentation text stored in {path}."),
            embedding,
        })
        .unwrap()
}

fn feedback(session_id: i64, is_correct: bool, entries: &[(i64, bool)]) -> FeedbackRequest {
    FeedbackRequest {
        session_id,
        is_correct,
        chunk_feedback: entries
            .iter()
            .map(|&(chunk_id, was_useful)| ChunkFeedback { chunk_id, was_useful })
            .collect(),
        correction: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_ask_on_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let response = repo_qa::api::ask::run_ask(&state, "How do I configure Docker?", false)
        .await
        .unwrap();

    assert!(!response.answer.is_empty());
    assert!(response.session_id > 0);
    assert!(response.sources.is_empty());
    assert_eq!(state.workflows.count(), 0);

    let session = state.sessions.get(response.session_id).unwrap();
    assert!(session.retrieved.is_empty());
    assert_eq!(session.query, "How do I configure Docker?");
}

#[tokio::test]
async fn test_ask_returns_ranked_sources_and_trace() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    for i in 0..4 {
        seed_chunk(&state, &format!("guide{i}.md"), i);
    }

    let response = repo_qa::api::ask::run_ask(&state, "Docker setup", true)
        .await
        .unwrap();

    assert!(!response.sources.is_empty());
    let trace = response.reasoning_trace.expect("trace was requested");
    assert!(!trace.retrieved.is_empty());
    assert_eq!(trace.llm_provider, "stub");
    for phase in [Phase::Embed, Phase::Retrieve, Phase::Generate, Phase::Persist] {
        assert!(
            trace.phase_timings.iter().any(|t| t.phase == phase),
            "missing timing for {phase:?}"
        );
    }

    // Ranks are gapless from 1 and effective scores never increase
    let session = state.sessions.get(response.session_id).unwrap();
    for (i, entry) in session.retrieved.iter().enumerate() {
        assert_eq!(entry.rank, i + 1);
        assert_eq!(entry.was_useful, None);
    }
    for pair in session.retrieved.windows(2) {
        assert!(pair[0].effective_score >= pair[1].effective_score);
    }
}

#[tokio::test]
async fn test_feedback_then_boosted_ask() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let a = seed_chunk(&state, "docker.md", 0);
    let b = seed_chunk(&state, "compose.md", 1);
    let c = seed_chunk(&state, "unrelated.md", 2);

    // First ask retrieves everything (small store)
    let first = repo_qa::api::ask::run_ask(&state, "Docker setup", false)
        .await
        .unwrap();
    let retrieved_ids: Vec<i64> = state
        .sessions
        .get(first.session_id)
        .unwrap()
        .retrieved
        .iter()
        .map(|e| e.chunk_id)
        .collect();
    assert_eq!(retrieved_ids.len(), 3);

    // Positive feedback on a and b, negative on c
    let outcome = apply_feedback(
        &state,
        &feedback(first.session_id, true, &[(a, true), (b, true), (c, false)]),
    )
    .await
    .unwrap();
    assert_eq!(outcome.chunks_updated, 3);
    assert!(outcome.workflow_memory_created);
    assert_eq!(state.workflows.count(), 1);

    assert!((state.chunks.get(a).unwrap().accuracy_weight - 1.1).abs() < 1e-6);
    assert!((state.chunks.get(b).unwrap().accuracy_weight - 1.1).abs() < 1e-6);
    assert!((state.chunks.get(c).unwrap().accuracy_weight - 0.9).abs() < 1e-6);

    // A similar follow-up query gets the remembered chunks boosted
    let second = repo_qa::api::ask::run_ask(&state, "Docker setup steps", false)
        .await
        .unwrap();
    let session = state.sessions.get(second.session_id).unwrap();

    let boosted: Vec<i64> = session
        .retrieved
        .iter()
        .filter(|e| e.workflow_boosted)
        .map(|e| e.chunk_id)
        .collect();
    assert!(boosted.contains(&a));
    assert!(boosted.contains(&b));
    assert!(!boosted.contains(&c));
}

#[tokio::test]
async fn test_second_feedback_rejected_and_state_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let a = seed_chunk(&state, "docker.md", 0);

    let response = repo_qa::api::ask::run_ask(&state, "Docker setup", false)
        .await
        .unwrap();
    apply_feedback(&state, &feedback(response.session_id, true, &[(a, true)]))
        .await
        .unwrap();

    let weight_before = state.chunks.get(a).unwrap().accuracy_weight;
    let retrieved_before = state.chunks.get(a).unwrap().times_retrieved;
    let memories_before = state.workflows.count();

    let err = apply_feedback(&state, &feedback(response.session_id, false, &[(a, false)]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyFinalised(_)));

    assert_eq!(state.chunks.get(a).unwrap().accuracy_weight, weight_before);
    assert_eq!(state.chunks.get(a).unwrap().times_retrieved, retrieved_before);
    assert_eq!(state.workflows.count(), memories_before);
}

#[tokio::test]
async fn test_positive_feedback_at_clamped_weight() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let a = seed_chunk(&state, "docker.md", 0);
    state.chunks.set_weight(a, 2.0).unwrap();

    let response = repo_qa::api::ask::run_ask(&state, "Docker setup", false)
        .await
        .unwrap();
    apply_feedback(&state, &feedback(response.session_id, true, &[(a, true)]))
        .await
        .unwrap();

    let chunk = state.chunks.get(a).unwrap();
    assert_eq!(chunk.accuracy_weight, 2.0);
    assert_eq!(chunk.times_useful, 1);
}

#[tokio::test]
async fn test_query_length_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();
    config.llm.provider = "stub".to_string();
    config.llm.embedding_dim = DIM;
    config.retrieval.q_max = 50;
    let state = AppState::new(config).unwrap();

    let at_limit = "q".repeat(50);
    assert!(repo_qa::api::ask::run_ask(&state, &at_limit, false).await.is_ok());

    let over_limit = "q".repeat(51);
    let err = repo_qa::api::ask::run_ask(&state, &over_limit, false)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));

    let err = repo_qa::api::ask::run_ask(&state, "   ", false).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
}

#[tokio::test]
async fn test_failed_ask_writes_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();
    // Misconfigured provider: the embed step fails before persistence
    config.llm.provider = "bogus".to_string();
    let state = AppState::new(config).unwrap();

    let err = repo_qa::api::ask::run_ask(&state, "Docker setup", false)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));

    let (total, _, _, _) = state.sessions.status_counts();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_workflow_disabled_never_boosts_or_records() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();
    config.llm.provider = "stub".to_string();
    config.llm.embedding_dim = DIM;
    config.retrieval.workflow_enabled = false;
    let state = AppState::new(config).unwrap();

    let a = seed_chunk(&state, "docker.md", 0);
    let response = repo_qa::api::ask::run_ask(&state, "Docker setup", false)
        .await
        .unwrap();
    apply_feedback(&state, &feedback(response.session_id, true, &[(a, true)]))
        .await
        .unwrap();
    assert_eq!(state.workflows.count(), 0);

    let second = repo_qa::api::ask::run_ask(&state, "Docker setup", false)
        .await
        .unwrap();
    let session = state.sessions.get(second.session_id).unwrap();
    assert!(session.retrieved.iter().all(|e| !e.workflow_boosted));
}

#[tokio::test]
async fn test_learning_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (chunk_id, session_id) = {
        let state = test_state(&dir);
        let a = seed_chunk(&state, "docker.md", 0);
        let response = repo_qa::api::ask::run_ask(&state, "Docker setup", false)
            .await
            .unwrap();
        apply_feedback(&state, &feedback(response.session_id, true, &[(a, true)]))
            .await
            .unwrap();
        (a, response.session_id)
    };

    // Fresh state over the same data dir sees the learned weights,
    // finalised session, and recorded memory.
    let state = test_state(&dir);
    assert!((state.chunks.get(chunk_id).unwrap().accuracy_weight - 1.1).abs() < 1e-6);
    assert_eq!(state.workflows.count(), 1);
    let err = apply_feedback(&state, &feedback(session_id, true, &[(chunk_id, true)]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyFinalised(_)));
}
