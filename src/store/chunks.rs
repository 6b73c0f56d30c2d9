use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::llm::embeddings::cosine;
use crate::models::{Chunk, NewChunk};

/// Largest single weight adjustment the store accepts.
const MAX_WEIGHT_STEP: f32 = 0.5;

/// Persistent table of immutable content chunks with mutable accuracy
/// weights and usefulness counters.
///
/// Each mutation takes the write lock, applies the change, and persists
/// before releasing; readers see either the pre- or post-state.
pub struct ChunkStore {
    rows: RwLock<Vec<Chunk>>,
    persist_path: PathBuf,
    w_min: f32,
    w_max: f32,
}

impl ChunkStore {
    pub fn open_or_create(persist_path: &Path, w_min: f32, w_max: f32) -> Result<Self> {
        let rows = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            rows: RwLock::new(rows),
            persist_path: persist_path.to_path_buf(),
            w_min,
            w_max,
        })
    }

    /// Create a chunk record. Ingester-facing: weight starts at 1.0 and
    /// counters at zero; content and embedding are immutable afterwards.
    pub fn insert(&self, new: NewChunk) -> Result<i64> {
        if new.embedding.is_empty() {
            return Err(CoreError::InvalidInput(
                "chunk embedding must be non-empty".to_string(),
            ));
        }

        let mut rows = self.rows.write();
        let id = rows.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        rows.push(Chunk {
            id,
            repo: new.repo,
            path: new.path,
            section: new.section,
            content: new.content,
            embedding: new.embedding,
            accuracy_weight: 1.0,
            times_retrieved: 0,
            times_useful: 0,
            created_at: chrono::Utc::now(),
        });
        super::save_atomic(&self.persist_path, &*rows)?;
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Chunk> {
        let rows = self.rows.read();
        rows.iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("chunk {id}")))
    }

    /// The `n` nearest chunks to `query_vec` by raw cosine similarity,
    /// most similar first. Ties break toward the lower chunk id so the
    /// pre-ranking order is deterministic.
    pub fn fetch_candidates(&self, query_vec: &[f32], n: usize) -> Vec<(Chunk, f32)> {
        let rows = self.rows.read();

        let mut scored: Vec<(f32, &Chunk)> = rows
            .iter()
            .map(|c| (cosine(query_vec, &c.embedding), c))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        scored.truncate(n);

        scored
            .into_iter()
            .map(|(sim, c)| (c.clone(), sim))
            .collect()
    }

    /// Atomically increment times_retrieved and, if useful, times_useful.
    pub fn bump_counters(&self, id: i64, useful: bool) -> Result<()> {
        let mut rows = self.rows.write();
        let chunk = rows
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("chunk {id}")))?;

        chunk.times_retrieved += 1;
        if useful {
            chunk.times_useful += 1;
        }
        super::save_atomic(&self.persist_path, &*rows)
    }

    /// Atomically apply `weight ← clamp(weight + delta, w_min, w_max)`
    /// and return the post-state.
    pub fn adjust_weight(&self, id: i64, delta: f32) -> Result<f32> {
        if delta.abs() > MAX_WEIGHT_STEP {
            return Err(CoreError::InvalidInput(format!(
                "weight delta {delta} exceeds ±{MAX_WEIGHT_STEP}"
            )));
        }

        let mut rows = self.rows.write();
        let chunk = rows
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("chunk {id}")))?;

        chunk.accuracy_weight = (chunk.accuracy_weight + delta).clamp(self.w_min, self.w_max);
        let new_weight = chunk.accuracy_weight;
        super::save_atomic(&self.persist_path, &*rows)?;
        Ok(new_weight)
    }

    /// Admin override: set the weight to an explicit in-range value.
    /// Returns (old, new).
    pub fn set_weight(&self, id: i64, new_weight: f32) -> Result<(f32, f32)> {
        if !(self.w_min..=self.w_max).contains(&new_weight) {
            return Err(CoreError::InvalidInput(format!(
                "weight {new_weight} outside [{}, {}]",
                self.w_min, self.w_max
            )));
        }

        let mut rows = self.rows.write();
        let chunk = rows
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("chunk {id}")))?;

        let old = chunk.accuracy_weight;
        chunk.accuracy_weight = new_weight;
        super::save_atomic(&self.persist_path, &*rows)?;
        Ok((old, new_weight))
    }

    pub fn count(&self) -> usize {
        self.rows.read().len()
    }

    /// Snapshot of every chunk, for stats aggregation.
    pub fn all(&self) -> Vec<Chunk> {
        self.rows.read().clone()
    }
}
