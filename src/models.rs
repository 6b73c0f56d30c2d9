use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of source documentation with a precomputed embedding and a
/// mutable accuracy weight learned from feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub repo: String,
    pub path: String,
    pub section: Option<String>,
    pub content: String,
    pub embedding: Vec<f32>,
    pub accuracy_weight: f32,
    pub times_retrieved: u64,
    pub times_useful: u64,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// "repo/path" source string shown to API callers.
    pub fn provenance(&self) -> String {
        format!("{}/{}", self.repo, self.path)
    }

    /// "repo/path#section" slug used in workflow summaries.
    pub fn provenance_slug(&self) -> String {
        match &self.section {
            Some(section) => format!("{}/{}#{}", self.repo, self.path, section),
            None => self.provenance(),
        }
    }
}

/// Fields supplied by the ingester when creating a chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct NewChunk {
    pub repo: String,
    pub path: String,
    pub section: Option<String>,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// One entry of a session's retrieved list, fixed at ask time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: i64,
    /// 1-based position in the final ranking
    pub rank: usize,
    /// Raw cosine similarity at retrieval time
    pub similarity: f32,
    /// similarity × accuracy_weight × optional workflow boost
    pub effective_score: f32,
    pub workflow_boosted: bool,
    /// None until feedback arrives
    pub was_useful: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Pending,
    Correct,
    Incorrect,
}

/// One (query, answer, retrieved chunks, feedback) tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub query: String,
    pub query_embedding: Vec<f32>,
    pub answer: String,
    pub retrieved: Vec<RetrievedChunk>,
    pub trace: crate::rag::tracer::ReasoningTrace,
    pub feedback_status: FeedbackStatus,
    pub correction: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Truncate content for display, appending "..." when cut.
pub fn content_preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let cut: String = content.chars().take(max_chars).collect();
    format!("{cut}...")
}

// ─── API request / response types ────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub query: String,
    #[serde(default)]
    pub include_trace: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub session_id: i64,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_trace: Option<crate::rag::tracer::ReasoningTrace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkFeedback {
    pub chunk_id: i64,
    pub was_useful: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: i64,
    pub is_correct: bool,
    #[serde(default)]
    pub chunk_feedback: Vec<ChunkFeedback>,
    pub correction: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub chunks_updated: usize,
    pub workflow_memory_created: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkFeedbackRequest {
    pub items: Vec<FeedbackRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFeedbackResult {
    pub session_id: i64,
    pub success: bool,
    pub chunks_updated: usize,
    pub workflow_memory_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFeedbackResponse {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub chunks_updated: usize,
    pub memories_created: usize,
    pub results: Vec<BulkFeedbackResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkWeightEdit {
    pub chunk_id: i64,
    pub new_weight: f32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkWeightEditResponse {
    pub chunk_id: i64,
    pub old_weight: f32,
    pub new_weight: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSearchRequest {
    pub query_text: String,
    #[serde(default = "default_true")]
    pub successful_only: bool,
    pub min_similarity: Option<f32>,
    #[serde(default = "default_workflow_top_k")]
    pub top_k: usize,
}

fn default_true() -> bool {
    true
}

fn default_workflow_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSearchResult {
    pub memory_id: i64,
    pub source_session_id: i64,
    pub summary: String,
    pub similarity: f32,
    pub useful_chunk_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSearchResponse {
    pub results: Vec<WorkflowSearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionListRequest {
    pub has_feedback: Option<bool>,
    pub is_correct: Option<bool>,
    #[serde(default = "default_list_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_list_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: i64,
    pub query_preview: String,
    pub feedback_status: FeedbackStatus,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    pub total: usize,
    pub sessions: Vec<SessionSummary>,
}

/// One retrieved chunk joined with its live chunk row for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct InspectedChunk {
    pub chunk_id: i64,
    pub repo: String,
    pub path: String,
    pub section: Option<String>,
    pub content_preview: String,
    pub similarity: f32,
    pub effective_score: f32,
    pub rank: usize,
    pub workflow_boosted: bool,
    pub was_useful: Option<bool>,
    pub accuracy_weight: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInspectResponse {
    pub session_id: i64,
    pub query: String,
    pub answer: String,
    pub feedback_status: FeedbackStatus,
    pub correction: Option<String>,
    pub notes: Option<String>,
    pub retrieved: Vec<InspectedChunk>,
    pub trace: crate::rag::tracer::ReasoningTrace,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkUsefulness {
    pub chunk_id: i64,
    pub provenance: String,
    pub times_retrieved: u64,
    pub times_useful: u64,
    pub usefulness_rate: f32,
    pub accuracy_weight: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_sessions: usize,
    pub correct_sessions: usize,
    pub incorrect_sessions: usize,
    pub pending_feedback: usize,
    /// correct / (correct + incorrect); 0.0 when nothing is finalised
    pub accuracy_rate: f32,
    pub chunk_count: usize,
    pub workflow_memory_count: usize,
    pub top_chunks: Vec<ChunkUsefulness>,
}
