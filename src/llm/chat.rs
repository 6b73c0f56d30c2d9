use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{CoreError, Result};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;

/// One chat completion: system prompt + user prompt in, answer text out.
pub async fn complete(
    client: &reqwest::Client,
    config: &LlmConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String> {
    match config.provider.as_str() {
        "openai" => complete_openai(client, config, system_prompt, user_prompt).await,
        "gemini" => complete_gemini(client, config, system_prompt, user_prompt).await,
        "stub" => Ok(stub_answer(user_prompt)),
        other => Err(CoreError::InvalidInput(format!(
            "unknown LLM provider: {other}"
        ))),
    }
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

async fn complete_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages: vec![
            OpenAiMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            },
            OpenAiMessage {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            },
        ],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .map_err(|e| CoreError::Provider(format!("openai chat request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(CoreError::Provider(format!(
            "openai chat API returned {status}: {body}"
        )));
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .map_err(|e| CoreError::Provider(format!("openai chat response parse: {e}")))?;

    body.choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| CoreError::Provider("openai chat returned no choices".to_string()))
}

// ─── Gemini ──────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiGenerateResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

async fn complete_gemini(
    client: &reqwest::Client,
    config: &LlmConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String> {
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let url = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        config.base_url, config.chat_model, api_key
    );

    // Gemini takes one combined prompt rather than role-tagged messages.
    let full_prompt = format!("{system_prompt}\n\n{user_prompt}");

    let req = GeminiGenerateRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart { text: full_prompt }],
        }],
        generation_config: GeminiGenerationConfig {
            temperature: TEMPERATURE,
            max_output_tokens: MAX_TOKENS,
        },
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .map_err(|e| CoreError::Provider(format!("gemini chat request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(CoreError::Provider(format!(
            "gemini chat API returned {status}: {body}"
        )));
    }

    let body: GeminiGenerateResponse = resp
        .json()
        .await
        .map_err(|e| CoreError::Provider(format!("gemini chat response parse: {e}")))?;

    body.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| CoreError::Provider("gemini chat returned no candidates".to_string()))
}

// ─── Stub ────────────────────────────────────────────────

/// Deterministic offline answer for tests and local runs.
fn stub_answer(user_prompt: &str) -> String {
    let question = user_prompt
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim();
    format!("Stub answer. Prompt tail: {question}")
}
