use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::{Config, LlmConfig};
use crate::error::Result;
use crate::store::chunks::ChunkStore;
use crate::store::sessions::SessionLog;
use crate::store::workflows::WorkflowStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub chunks: Arc<ChunkStore>,
    pub sessions: Arc<SessionLog>,
    pub workflows: Arc<WorkflowStore>,
    pub http_client: reqwest::Client,
    pub llm_config: Arc<RwLock<LlmConfig>>,
    pub ask_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let chunks = ChunkStore::open_or_create(
            &config.chunks_path(),
            config.retrieval.w_min,
            config.retrieval.w_max,
        )?;
        let sessions = SessionLog::open_or_create(&config.sessions_path())?;
        let workflows = WorkflowStore::open_or_create(&config.workflows_path())?;

        let llm_config = config.llm.clone();
        let max_concurrent_asks = config.max_concurrent_asks;

        Ok(Self {
            config,
            chunks: Arc::new(chunks),
            sessions: Arc::new(sessions),
            workflows: Arc::new(workflows),
            http_client: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .map_err(|e| crate::error::CoreError::Internal(e.to_string()))?,
            llm_config: Arc::new(RwLock::new(llm_config)),
            ask_semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_asks)),
        })
    }
}
