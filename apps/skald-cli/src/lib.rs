//! Composition root shared by the skald binaries: configuration loading,
//! tracing setup, and wiring of the store/embedder/retrieval/LLM stack.

use std::sync::Arc;
use std::time::Duration;

use skald_core::config::Config;
use skald_embed::{embedder_from_config, Embedder};
use skald_llm::LlmGateway;
use skald_narrate::{NarrationOrchestrator, RetrievalCoordinator};
use skald_store::{Indexer, VectorStore};

/// Initialise tracing from `RUST_LOG`, defaulting to info-level output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Everything a binary needs, constructed once at startup.
pub struct Pipeline {
    pub store: Arc<VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub indexer: Indexer,
    pub orchestrator: NarrationOrchestrator,
    /// Whether the configuration asks for indexing at startup; binaries
    /// that index explicitly ignore it.
    pub auto_index: bool,
}

/// Load `skald.toml` plus `LLM_*`/`RAG_*` env vars and build the full
/// pipeline. Configuration problems (missing credential, dimension
/// mismatch) fail here, before any game traffic.
pub async fn build_pipeline() -> anyhow::Result<Pipeline> {
    let config = Config::load()?;
    let llm_cfg = config.llm()?;
    let rag_cfg = config.rag()?;

    let embedder: Arc<dyn Embedder> = Arc::from(embedder_from_config(&rag_cfg)?);
    let store = Arc::new(VectorStore::open(&rag_cfg).await?);
    let indexer = Indexer::new(Arc::clone(&store), Arc::clone(&embedder), &rag_cfg);

    let deadline = Duration::from_secs(rag_cfg.deadline_secs);
    let gateway = Arc::new(LlmGateway::new(&llm_cfg, deadline));
    let coordinator =
        RetrievalCoordinator::new(Arc::clone(&store), Arc::clone(&embedder), &rag_cfg);
    let orchestrator = NarrationOrchestrator::new(coordinator, gateway, deadline);

    Ok(Pipeline {
        store,
        embedder,
        indexer,
        orchestrator,
        auto_index: rag_cfg.auto_index,
    })
}
