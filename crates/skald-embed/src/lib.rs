//! Text-embedding clients.
//!
//! `HttpEmbedder` talks to a remote OpenAI-style embeddings endpoint; the
//! `FakeEmbedder` produces deterministic vectors for tests and offline
//! development (`SKALD_USE_FAKE_EMBEDDINGS=1`).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use skald_core::config::RagConfig;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("no embedding API credential configured (set rag.api_key or RAG_API_KEY)")]
    MissingCredential,

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding response malformed: {0}")]
    Parse(String),

    #[error("embedding dimension mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
}

/// Converts text into fixed-length vectors. Repeated identical text
/// re-embeds; there is no local cache.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding dimensionality; must match the store's schema.
    fn dim(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vecs = self.embed_batch(&[text.to_string()]).await?;
        vecs.pop()
            .ok_or_else(|| EmbedError::Parse("empty embedding batch".to_string()))
    }
}

/// Remote embedding API client.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Build a client from the RAG config. The credential comes from the
    /// config first, then the `RAG_API_KEY` environment variable; with
    /// neither set this is a configuration error, caught at startup rather
    /// than at query time.
    pub fn from_config(cfg: &RagConfig) -> Result<Self, EmbedError> {
        let api_key = if cfg.api_key.is_empty() {
            std::env::var("RAG_API_KEY").unwrap_or_default()
        } else {
            cfg.api_key.clone()
        };
        if api_key.is_empty() {
            return Err(EmbedError::MissingCredential);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self {
            client,
            url: format!(
                "{}{}",
                cfg.embedding_host.trim_end_matches('/'),
                cfg.embedding_path
            ),
            model: cfg.embedding_model.clone(),
            api_key,
            dimensions: cfg.embedding_dimensions,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dim(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dimensions,
        });
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbedError::Request(format!(
                "http {}: {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Parse(e.to_string()))?;
        if parsed.data.len() != texts.len() {
            return Err(EmbedError::Parse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        let mut out = Vec::with_capacity(parsed.data.len());
        for row in parsed.data {
            if row.embedding.len() != self.dimensions {
                return Err(EmbedError::DimensionMismatch {
                    got: row.embedding.len(),
                    expected: self.dimensions,
                });
            }
            out.push(row.embedding);
        }
        Ok(out)
    }
}

/// Deterministic hash-bucket embedder for tests. Similar token sets land on
/// similar vectors, which is enough for exercising the store end to end.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Pick the embedder for the current environment: the fake one when
/// `SKALD_USE_FAKE_EMBEDDINGS` is set, otherwise the remote client.
pub fn embedder_from_config(cfg: &RagConfig) -> Result<Box<dyn Embedder>, EmbedError> {
    let use_fake = std::env::var("SKALD_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        tracing::info!(dim = cfg.embedding_dimensions, "using fake embeddings");
        return Ok(Box::new(FakeEmbedder::new(cfg.embedding_dimensions)));
    }
    Ok(Box::new(HttpEmbedder::from_config(cfg)?))
}
