use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Language-model endpoint settings (`[llm]` in skald.toml, `LLM_*` env).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "" for a local text-generation server, "openai-compatible" (or
    /// "openai") for chat-completion APIs.
    pub api_type: String,
    pub host: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub model: String,
    pub api_key: String,
    /// Base parameters merged into every request body.
    pub request_body: serde_json::Map<String, serde_json::Value>,
    /// Key carrying the prompt in the local-generation request body.
    pub prompt_keyname: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let mut request_body = serde_json::Map::new();
        request_body.insert("max_new_tokens".to_string(), 250.into());
        request_body.insert(
            "temperature".to_string(),
            serde_json::Number::from_f64(0.7).map(Into::into).unwrap_or(serde_json::Value::Null),
        );
        Self {
            api_type: String::new(),
            host: "http://127.0.0.1:5000".to_string(),
            path: "/api/v1/generate".to_string(),
            headers,
            model: "deepseek-chat".to_string(),
            api_key: String::new(),
            request_body,
            prompt_keyname: "prompt".to_string(),
        }
    }
}

/// Retrieval subsystem settings (`[rag]` in skald.toml, `RAG_*` env).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    /// Embedding API credential; falls back to the RAG_API_KEY env var.
    pub api_key: String,
    pub embedding_host: String,
    pub embedding_path: String,
    /// LanceDB database directory.
    pub db_uri: String,
    pub documents_path: String,
    pub max_results: usize,
    /// Hits scoring below this similarity are dropped.
    pub similarity_threshold: f32,
    /// LanceDB table holding the knowledge chunks.
    pub collection_name: String,
    /// Index the documents directory on startup.
    pub auto_index: bool,
    pub chunk_size: usize,
    /// Accepted but not applied as a sliding window; chunking stays
    /// paragraph-granular (see chunker).
    pub chunk_overlap: usize,
    /// Narration deadline, matching the game's tolerance for a turn pause.
    pub deadline_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: "embedding-3".to_string(),
            embedding_dimensions: 1024,
            api_key: String::new(),
            embedding_host: "https://open.bigmodel.cn".to_string(),
            embedding_path: "/api/paas/v4/embeddings".to_string(),
            db_uri: "./rag_data/lancedb".to_string(),
            documents_path: "./rag_data/documents".to_string(),
            max_results: 5,
            similarity_threshold: 0.7,
            collection_name: "battle_knowledge".to_string(),
            auto_index: true,
            chunk_size: 512,
            chunk_overlap: 64,
            deadline_secs: 80,
        }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Merge defaults, `skald.toml`, and `LLM_*`/`RAG_*` env vars
    /// (env wins, per-section).
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::from_file("skald.toml"))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let figment = Figment::new()
            .merge(Serialized::default("llm", LlmConfig::default()))
            .merge(Serialized::default("rag", RagConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(
                Env::prefixed("LLM_")
                    .map(|k| format!("llm__{}", k.as_str().to_lowercase()).into())
                    .split("__"),
            )
            .merge(
                Env::prefixed("RAG_")
                    .map(|k| format!("rag__{}", k.as_str().to_lowercase()).into())
                    .split("__"),
            );
        Self { figment }
    }

    pub fn llm(&self) -> anyhow::Result<LlmConfig> {
        self.figment
            .extract_inner("llm")
            .map_err(|e| anyhow::anyhow!("Failed to load [llm] config: {}", e))
    }

    pub fn rag(&self) -> anyhow::Result<RagConfig> {
        self.figment
            .extract_inner("rag")
            .map_err(|e| anyhow::anyhow!("Failed to load [rag] config: {}", e))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
