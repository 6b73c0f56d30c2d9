use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::llm::embeddings::cosine;

/// An embedding summarising a past successful reasoning, plus the chunk
/// ids that were useful in it. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMemory {
    pub id: i64,
    pub source_session_id: i64,
    pub summary: String,
    pub summary_embedding: Vec<f32>,
    pub useful_chunk_ids: Vec<i64>,
    pub is_successful: bool,
    pub created_at: DateTime<Utc>,
}

/// A memory matched against a query, with its cosine similarity.
#[derive(Debug, Clone)]
pub struct WorkflowHit {
    pub memory: WorkflowMemory,
    pub similarity: f32,
}

/// Append-only table of workflow memories.
pub struct WorkflowStore {
    rows: RwLock<Vec<WorkflowMemory>>,
    persist_path: PathBuf,
}

impl WorkflowStore {
    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        let rows = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            rows: RwLock::new(rows),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Record a memory for a session. One memory per source session:
    /// a duplicate source_session_id is rejected.
    pub fn record(
        &self,
        summary: String,
        summary_embedding: Vec<f32>,
        source_session_id: i64,
        useful_chunk_ids: Vec<i64>,
    ) -> Result<i64> {
        if useful_chunk_ids.is_empty() {
            return Err(CoreError::InvalidInput(
                "workflow memory requires at least one useful chunk".to_string(),
            ));
        }

        let mut rows = self.rows.write();
        if rows.iter().any(|m| m.source_session_id == source_session_id) {
            return Err(CoreError::InvalidInput(format!(
                "workflow memory already recorded for session {source_session_id}"
            )));
        }

        let id = rows.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        rows.push(WorkflowMemory {
            id,
            source_session_id,
            summary,
            summary_embedding,
            useful_chunk_ids,
            is_successful: true,
            created_at: chrono::Utc::now(),
        });
        super::save_atomic(&self.persist_path, &*rows)?;
        Ok(id)
    }

    /// Cosine search over successful memories: matches with similarity
    /// ≥ `min_sim`, best first, at most `top_m`.
    pub fn find_similar(&self, query_vec: &[f32], top_m: usize, min_sim: f32) -> Vec<WorkflowHit> {
        self.search(query_vec, top_m, min_sim, true)
    }

    /// Admin search variant with an is_successful toggle.
    pub fn search(
        &self,
        query_vec: &[f32],
        top_k: usize,
        min_sim: f32,
        successful_only: bool,
    ) -> Vec<WorkflowHit> {
        let rows = self.rows.read();

        let mut hits: Vec<(f32, &WorkflowMemory)> = rows
            .iter()
            .filter(|m| !successful_only || m.is_successful)
            .map(|m| (cosine(query_vec, &m.summary_embedding), m))
            .filter(|(sim, _)| *sim >= min_sim)
            .collect();

        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        hits.truncate(top_k);

        hits.into_iter()
            .map(|(similarity, m)| WorkflowHit {
                memory: m.clone(),
                similarity,
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.rows.read().len()
    }
}
