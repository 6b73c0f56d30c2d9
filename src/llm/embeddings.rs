use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{CoreError, Result};

/// Maximum characters to send per text to the embedding API.
/// Queries are short, but workflow summaries can accumulate many chunk
/// slugs; cut well below typical embedding-model context limits.
const MAX_EMBED_CHARS: usize = 3_000;

/// Generate an L2-normalised embedding for a single text.
pub async fn embed_single(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let results = embed_batch(client, config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::Provider("no embedding returned".to_string()))
}

/// Generate L2-normalised embeddings for a batch of texts.
///
/// Every input must be non-empty; every output has dimension
/// `config.embedding_dim`.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    if texts.iter().any(|t| t.trim().is_empty()) {
        return Err(CoreError::InvalidInput(
            "embedding input must be non-empty".to_string(),
        ));
    }

    let truncated: Vec<String> = texts
        .iter()
        .map(|t| truncate_for_embedding(t, MAX_EMBED_CHARS).to_string())
        .collect();

    let mut embeddings = match config.provider.as_str() {
        "openai" => embed_openai(client, config, &truncated).await?,
        "gemini" => embed_gemini(client, config, &truncated).await?,
        "stub" => truncated.iter().map(|t| stub_embedding(t, config.embedding_dim)).collect(),
        other => {
            return Err(CoreError::InvalidInput(format!(
                "unknown LLM provider: {other}"
            )))
        }
    };

    for v in &mut embeddings {
        if v.len() != config.embedding_dim {
            return Err(CoreError::Provider(format!(
                "embedding dimension mismatch: expected {}, got {}",
                config.embedding_dim,
                v.len()
            )));
        }
        l2_normalize(v);
    }

    Ok(embeddings)
}

/// Cosine similarity between two vectors, in [-1, 1].
/// Mismatched or empty inputs score 0.0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Truncate `text` to at most `max_chars` bytes on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let batch_size = 64;
    let mut all_embeddings = Vec::new();

    for batch in texts.chunks(batch_size) {
        let req = OpenAiEmbedRequest {
            model: config.embedding_model.clone(),
            input: batch.to_vec(),
        };

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .map_err(|e| CoreError::Provider(format!("openai embed request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!(
                "openai embed API returned {status}: {body}"
            )));
        }

        let body: OpenAiEmbedResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Provider(format!("openai embed response parse: {e}")))?;

        all_embeddings.extend(body.data.into_iter().map(|d| d.embedding));
    }

    Ok(all_embeddings)
}

// ─── Gemini ──────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiBatchEmbedRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Serialize)]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiBatchEmbedResponse {
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

async fn embed_gemini(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let url = format!(
        "{}/v1beta/models/{}:batchEmbedContents?key={}",
        config.base_url, config.embedding_model, api_key
    );
    let model_path = format!("models/{}", config.embedding_model);

    let batch_size = 64;
    let mut all_embeddings = Vec::new();

    for batch in texts.chunks(batch_size) {
        let req = GeminiBatchEmbedRequest {
            requests: batch
                .iter()
                .map(|t| GeminiEmbedRequest {
                    model: model_path.clone(),
                    content: GeminiContent {
                        parts: vec![GeminiPart { text: t.clone() }],
                    },
                })
                .collect(),
        };

        let resp = client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| CoreError::Provider(format!("gemini embed request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!(
                "gemini embed API returned {status}: {body}"
            )));
        }

        let body: GeminiBatchEmbedResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Provider(format!("gemini embed response parse: {e}")))?;

        all_embeddings.extend(body.embeddings.into_iter().map(|e| e.values));
    }

    Ok(all_embeddings)
}

// ─── Stub ────────────────────────────────────────────────

/// Deterministic offline embedding: one FNV-1a hash per dimension,
/// mapped into [-1, 1]. Same text always embeds identically, so tests
/// and local runs work without a provider.
fn stub_embedding(text: &str, dim: usize) -> Vec<f32> {
    (0..dim)
        .map(|i| {
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in text.bytes().chain([(i & 0xff) as u8, (i >> 8) as u8]) {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            (hash % 2_000) as f32 / 1_000.0 - 1.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(dim: usize) -> LlmConfig {
        LlmConfig {
            provider: "stub".to_string(),
            embedding_dim: dim,
            ..LlmConfig::default()
        }
    }

    // ── cosine ──────────────────────────────────────────

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![0.6, 0.8];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    // ── stub embeddings ─────────────────────────────────

    #[tokio::test]
    async fn test_stub_embed_is_deterministic() {
        let client = reqwest::Client::new();
        let config = stub_config(16);
        let a = embed_single(&client, &config, "docker setup").await.unwrap();
        let b = embed_single(&client, &config, "docker setup").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_stub_embed_differs_per_text() {
        let client = reqwest::Client::new();
        let config = stub_config(16);
        let a = embed_single(&client, &config, "docker setup").await.unwrap();
        let b = embed_single(&client, &config, "kubernetes ingress").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_stub_embed_is_normalised() {
        let client = reqwest::Client::new();
        let config = stub_config(32);
        let v = embed_single(&client, &config, "some text").await.unwrap();
        assert_eq!(v.len(), 32);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_text() {
        let client = reqwest::Client::new();
        let config = stub_config(8);
        let err = embed_single(&client, &config, "   ").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_embed_batch_empty_is_ok() {
        let client = reqwest::Client::new();
        let config = stub_config(8);
        let out = embed_batch(&client, &config, &[]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let client = reqwest::Client::new();
        let mut config = stub_config(8);
        config.provider = "llamacpp".to_string();
        let err = embed_single(&client, &config, "q").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    // ── truncation ──────────────────────────────────────

    #[test]
    fn test_truncate_short_text() {
        assert_eq!(truncate_for_embedding("short", 100), "short");
    }

    #[test]
    fn test_truncate_over_limit() {
        let text = "a".repeat(200);
        assert_eq!(truncate_for_embedding(&text, 100).len(), 100);
    }

    #[test]
    fn test_truncate_respects_utf8_boundary() {
        let text = "é".repeat(100);
        let result = truncate_for_embedding(&text, 151);
        assert!(result.len() <= 151);
        assert!(result.is_char_boundary(result.len()));
    }
}
