use std::fmt::Write;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{CoreError, Result};
use crate::llm::chat;
use crate::rag::retriever::RetrievalResult;
use crate::rag::tracer::{Phase, WorkflowTracer};

/// Retries after the first generation attempt.
const R_GEN: u32 = 2;
const BACKOFF_BASE_MS: u64 = 250;

/// Generate an answer for the query from the retrieved chunks.
///
/// Transient provider errors are retried up to R_GEN times with
/// exponential backoff; a deadline miss surfaces as Timeout and is not
/// retried. Steps are recorded on the tracer as they happen.
pub async fn generate(
    client: &reqwest::Client,
    config: &LlmConfig,
    deadline: Duration,
    query: &str,
    results: &[RetrievalResult],
    tracer: &mut WorkflowTracer,
) -> Result<String> {
    let system_prompt = build_system_prompt();
    let user_prompt = build_user_prompt(query, results);
    tracer.add_step(
        Phase::Generate,
        format!("assembled prompt with {} context chunks", results.len()),
    );
    tracer.set_llm_info(&config.provider, Some(config.chat_model.as_str()));

    let mut attempt = 0;
    loop {
        let call = chat::complete(client, config, &system_prompt, &user_prompt);
        let outcome = match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => {
                return Err(CoreError::Timeout(format!(
                    "generation exceeded {}s deadline",
                    deadline.as_secs()
                )))
            }
        };

        match outcome {
            Ok(answer) => {
                tracer.add_step(
                    Phase::Generate,
                    format!("provider returned {} chars", answer.len()),
                );
                return Ok(answer);
            }
            Err(e) if e.is_retryable() && attempt < R_GEN => {
                attempt += 1;
                let backoff = Duration::from_millis(BACKOFF_BASE_MS * (1u64 << (attempt - 1)));
                tracing::warn!("generation attempt {attempt} failed, retrying: {e}");
                tracer.add_step(
                    Phase::Generate,
                    format!("attempt {attempt} failed, retrying after {}ms", backoff.as_millis()),
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn build_system_prompt() -> String {
    String::from(
        "You are a documentation assistant that answers questions about the \
         team's repositories.\n\
         Answer based ONLY on the provided context from repository documentation.\n\
         If the context doesn't contain enough information, say so clearly.\n\
         Cite sources by repository and file name. Be concise but thorough.\n\
         Format the response with markdown where it helps.",
    )
}

fn build_user_prompt(query: &str, results: &[RetrievalResult]) -> String {
    let mut prompt = String::from("Context from repositories:\n\n");

    if results.is_empty() {
        prompt.push_str("(No relevant documentation was found for this question.)\n");
    } else {
        for result in results {
            write!(
                prompt,
                "[Source: {}]\n{}\n\n---\n\n",
                result.chunk.provenance(),
                result.chunk.content
            )
            .unwrap();
        }
    }

    write!(
        prompt,
        "Question: {query}\n\nProvide a detailed answer based on the context above."
    )
    .unwrap();
    prompt
}
