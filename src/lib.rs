//! # repo-qa
//!
//! A Rust web service that answers natural-language questions about a
//! corpus of repository documentation and learns from human feedback
//! to improve future retrieval.
//!
//! ## Architecture
//!
//! Every ask request runs one pass through the pipeline; feedback
//! closes the learning loop by mutating ranking state:
//!
//! ```text
//!                    ┌─────────────┐
//!                    │  User Query │
//!                    └──────┬──────┘
//!                           ▼
//!                    ┌─────────────┐
//!                    │   Embedder  │
//!                    └──────┬──────┘
//!                           ▼
//!                ┌─────────────────────┐
//!                │  Workflow Memory    │  similar past successes
//!                │  lookup (≥ min_sim) │  → chunk ids to boost
//!                └──────────┬──────────┘
//!                           ▼
//!                ┌─────────────────────┐
//!                │      Retriever      │  sim × accuracy_weight
//!                │  (Chunk Store scan) │  × (1 + β·mem_sim)
//!                └──────────┬──────────┘
//!                           ▼
//!                ┌─────────────────────┐
//!                │      Generator      │  prompt → LLM provider
//!                └──────────┬──────────┘
//!                           ▼
//!                ┌─────────────────────┐
//!                │     Session Log     │  query + answer + trace
//!                └──────────┬──────────┘
//!                           │ human feedback
//!                           ▼
//!                ┌─────────────────────┐
//!                │ Feedback Processor  │──► chunk weights ±Δ
//!                └──────────┬──────────┘
//!                           │ correct + useful chunks
//!                           ▼
//!                ┌─────────────────────┐
//!                │  Workflow Memory    │──► boosts future asks
//!                └─────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration: retrieval knobs, weight
//!   clamps, timeouts, and LLM provider settings
//! - [`error`] - Typed error kinds mapped onto HTTP statuses by the API layer
//! - [`models`] - Shared data types: `Chunk`, `Session`, request/response types
//! - [`store`] - Persistent tables for chunks, sessions, and workflow
//!   memories, each with single-row-mutation discipline
//! - [`llm`] - Embedding and chat-completion adapters for the openai /
//!   gemini / stub providers
//! - [`rag`] - The engine: retriever ranking, reasoning tracer, answer
//!   generator, and feedback processor
//! - [`api`] - Axum HTTP handlers for ask, inspection, feedback, and admin
//!   operations
//! - [`state`] - Shared application state holding the stores and clients

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod rag;
pub mod state;
pub mod store;
