use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the chunk / session / workflow tables are persisted
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration (embeddings + generation)
    pub llm: LlmConfig,
    /// Retrieval and learning knobs
    pub retrieval: RetrievalConfig,
    /// API key required on admin endpoints (X-Admin-Key header)
    pub admin_key: String,
    /// Maximum concurrent ask requests
    pub max_concurrent_asks: usize,
    /// Deadline for a single embedding call, in seconds
    pub embed_timeout_secs: u64,
    /// Deadline for a single generation call, in seconds
    pub generate_timeout_secs: u64,
    /// Maximum items accepted by one bulk feedback request
    pub max_bulk_feedback: usize,
}

/// Knobs for the ranking and feedback loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Top-K chunks returned per query
    pub top_k: usize,
    /// Hard cap on a caller-supplied K
    pub k_max: usize,
    /// Workflow boost coefficient (β)
    pub beta: f32,
    /// Minimum cosine similarity for a workflow memory to match
    pub min_memory_sim: f32,
    /// Per-feedback weight increment (Δ)
    pub delta: f32,
    /// Accuracy weight clamp, lower bound
    pub w_min: f32,
    /// Accuracy weight clamp, upper bound
    pub w_max: f32,
    /// Gate for workflow-memory lookup and creation
    pub workflow_enabled: bool,
    /// Maximum query length in characters
    pub q_max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai", "gemini", or "stub"
    pub provider: String,
    /// Base URL for the provider API
    pub base_url: String,
    /// Model name for answer generation
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (not needed for the stub provider)
    pub api_key: Option<String>,
    /// Embedding vector dimension, fixed at boot
    pub embedding_dim: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9100".to_string(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            admin_key: "change-me".to_string(),
            max_concurrent_asks: 4,
            embed_timeout_secs: 30,
            generate_timeout_secs: 120,
            max_bulk_feedback: 100,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            k_max: 50,
            beta: 0.2,
            min_memory_sim: 0.75,
            delta: 0.1,
            w_min: 0.5,
            w_max: 2.0,
            workflow_enabled: true,
            q_max: 2000,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            embedding_dim: 384,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("REPO_QA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("REPO_QA_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(key) = std::env::var("REPO_QA_ADMIN_KEY") {
            config.admin_key = key;
        }
        if let Ok(val) = std::env::var("REPO_QA_MAX_CONCURRENT_ASKS") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_asks = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_EMBED_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.embed_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_GENERATE_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.generate_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_MAX_BULK_FEEDBACK") {
            if let Ok(v) = val.parse() {
                config.max_bulk_feedback = v;
            }
        }

        // Retrieval knobs
        if let Ok(val) = std::env::var("REPO_QA_TOP_K") {
            if let Ok(v) = val.parse() {
                config.retrieval.top_k = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_K_MAX") {
            if let Ok(v) = val.parse() {
                config.retrieval.k_max = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_BETA") {
            if let Ok(v) = val.parse() {
                config.retrieval.beta = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_MIN_MEMORY_SIM") {
            if let Ok(v) = val.parse() {
                config.retrieval.min_memory_sim = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_DELTA") {
            if let Ok(v) = val.parse() {
                config.retrieval.delta = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_W_MIN") {
            if let Ok(v) = val.parse() {
                config.retrieval.w_min = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_W_MAX") {
            if let Ok(v) = val.parse() {
                config.retrieval.w_max = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_QA_WORKFLOW_ENABLED") {
            config.retrieval.workflow_enabled = val != "0" && val.to_lowercase() != "false";
        }
        if let Ok(val) = std::env::var("REPO_QA_Q_MAX") {
            if let Ok(v) = val.parse() {
                config.retrieval.q_max = v;
            }
        }

        // LLM provider
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        config
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.data_dir.join("chunks.json")
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.data_dir.join("sessions.json")
    }

    pub fn workflows_path(&self) -> PathBuf {
        self.data_dir.join("workflows.json")
    }
}
