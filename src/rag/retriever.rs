use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::models::Chunk;
use crate::store::chunks::ChunkStore;
use crate::store::workflows::WorkflowHit;

/// Hard cap on the pre-ranking candidate fanout, to bound latency.
const MAX_FANOUT: usize = 200;

/// One ranked retrieval hit.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub raw_similarity: f32,
    /// raw_similarity × accuracy_weight × optional workflow boost
    pub effective_score: f32,
    /// 1-based
    pub rank: usize,
    pub workflow_boosted: bool,
}

/// Candidate fanout: fetch more than K so that accuracy weights and
/// workflow boosts can promote chunks from below the raw-similarity
/// cutoff.
fn fanout(k: usize) -> usize {
    (3 * k).max(k + 10).min(MAX_FANOUT)
}

/// Retrieve the top-`k` chunks for a query embedding.
///
/// Ranking: raw cosine candidates are re-scored by
/// `similarity × accuracy_weight`, then candidates referenced by a
/// similar workflow memory get a further `1 + beta × max_memory_sim`
/// multiplier. Sort is deterministic: effective score desc, raw
/// similarity desc, chunk id asc.
pub fn retrieve(
    chunks: &ChunkStore,
    query_vec: &[f32],
    k: usize,
    beta: f32,
    workflow_hits: &[WorkflowHit],
) -> Result<Vec<RetrievalResult>> {
    if query_vec.is_empty() {
        return Err(CoreError::InvalidInput(
            "query embedding must be non-empty".to_string(),
        ));
    }
    if k == 0 {
        return Err(CoreError::InvalidInput("k must be positive".to_string()));
    }

    let candidates = chunks.fetch_candidates(query_vec, fanout(k));
    let boosts = boost_map(workflow_hits);
    Ok(rank_candidates(candidates, k, beta, &boosts))
}

/// chunk id → highest similarity among the matching memories that
/// reference it.
fn boost_map(workflow_hits: &[WorkflowHit]) -> HashMap<i64, f32> {
    let mut boosts: HashMap<i64, f32> = HashMap::new();
    for hit in workflow_hits {
        for &chunk_id in &hit.memory.useful_chunk_ids {
            let entry = boosts.entry(chunk_id).or_insert(hit.similarity);
            if hit.similarity > *entry {
                *entry = hit.similarity;
            }
        }
    }
    boosts
}

/// Pure ranking over fetched candidates. No suspension points: this
/// runs start-to-finish on the request task.
fn rank_candidates(
    candidates: Vec<(Chunk, f32)>,
    k: usize,
    beta: f32,
    boosts: &HashMap<i64, f32>,
) -> Vec<RetrievalResult> {
    let mut scored: Vec<(Chunk, f32, f32, bool)> = candidates
        .into_iter()
        .map(|(chunk, raw)| {
            let mut effective = raw * chunk.accuracy_weight;
            let boosted = match boosts.get(&chunk.id) {
                Some(&memory_sim) => {
                    effective *= 1.0 + beta * memory_sim;
                    true
                }
                None => false,
            };
            (chunk, raw, effective, boosted)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    scored.truncate(k);

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (chunk, raw, effective, boosted))| RetrievalResult {
            chunk,
            raw_similarity: raw,
            effective_score: effective,
            rank: i + 1,
            workflow_boosted: boosted,
        })
        .collect()
}
