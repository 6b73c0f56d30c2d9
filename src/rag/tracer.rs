use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::models::{content_preview, Chunk};

/// Characters of chunk content kept in the persisted trace.
const PREVIEW_CHARS: usize = 200;

/// Pipeline phases captured in a reasoning trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Embed,
    WorkflowLookup,
    Retrieve,
    Generate,
    Persist,
}

/// One reasoning step emitted during a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub phase: Phase,
    pub description: String,
}

/// Wall-clock duration of one completed phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub duration_ms: f64,
}

/// Snapshot of one retrieved chunk as seen at ask time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracedChunk {
    pub chunk_id: i64,
    pub provenance: String,
    pub content_preview: String,
    pub similarity: f32,
    pub effective_score: f32,
    pub rank: usize,
    pub workflow_boosted: bool,
    pub accuracy_weight: f32,
}

/// The persistable reasoning trace stored inside a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub query: String,
    pub steps: Vec<TraceStep>,
    pub phase_timings: Vec<PhaseTiming>,
    pub retrieved: Vec<TracedChunk>,
    pub llm_provider: String,
    pub llm_model: Option<String>,
    pub total_time_ms: f64,
}

/// Scoped recorder for one request: retrieved chunks, per-phase
/// timings, and the reasoning steps emitted along the way.
///
/// Owned by a single request task; insertions preserve insertion order
/// and `snapshot` never mutates.
pub struct WorkflowTracer {
    query: String,
    started: Instant,
    open_phases: HashMap<Phase, Instant>,
    steps: Vec<TraceStep>,
    phase_timings: Vec<PhaseTiming>,
    retrieved: Vec<TracedChunk>,
    llm_provider: String,
    llm_model: Option<String>,
}

impl WorkflowTracer {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            started: Instant::now(),
            open_phases: HashMap::new(),
            steps: Vec::new(),
            phase_timings: Vec::new(),
            retrieved: Vec::new(),
            llm_provider: String::new(),
            llm_model: None,
        }
    }

    pub fn mark_phase_start(&mut self, phase: Phase) {
        self.open_phases.insert(phase, Instant::now());
    }

    /// Close a phase and record its wall-clock duration. Ending a phase
    /// that was never started records a zero duration.
    pub fn mark_phase_end(&mut self, phase: Phase) {
        let duration_ms = self
            .open_phases
            .remove(&phase)
            .map(|start| start.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        self.phase_timings.push(PhaseTiming { phase, duration_ms });
    }

    pub fn add_step(&mut self, phase: Phase, description: impl Into<String>) {
        self.steps.push(TraceStep {
            phase,
            description: description.into(),
        });
    }

    pub fn add_retrieved(
        &mut self,
        chunk: &Chunk,
        rank: usize,
        similarity: f32,
        effective_score: f32,
        workflow_boosted: bool,
    ) {
        self.retrieved.push(TracedChunk {
            chunk_id: chunk.id,
            provenance: chunk.provenance(),
            content_preview: content_preview(&chunk.content, PREVIEW_CHARS),
            similarity,
            effective_score,
            rank,
            workflow_boosted,
            accuracy_weight: chunk.accuracy_weight,
        });
    }

    pub fn set_llm_info(&mut self, provider: &str, model: Option<&str>) {
        self.llm_provider = provider.to_string();
        self.llm_model = model.map(|m| m.to_string());
    }

    /// Produce the persistable trace. Calling this twice yields the
    /// same recorded events (only total_time_ms keeps advancing with
    /// the request clock).
    pub fn snapshot(&self) -> ReasoningTrace {
        ReasoningTrace {
            query: self.query.clone(),
            steps: self.steps.clone(),
            phase_timings: self.phase_timings.clone(),
            retrieved: self.retrieved.clone(),
            llm_provider: self.llm_provider.clone(),
            llm_model: self.llm_model.clone(),
            total_time_ms: self.started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}
