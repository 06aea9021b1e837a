//! Incremental document indexing: scan the documents directory, drop
//! entries for deleted files, and re-embed only files whose mtime or size
//! changed since they were last indexed.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use skald_core::chunker::{chunk_id, scan_documents, Chunker};
use skald_core::config::{expand_path, RagConfig};
use skald_core::types::{ChunkMeta, DocumentChunk, IndexedDocumentRecord};
use skald_embed::Embedder;

use crate::store::{is_stale, VectorStore};

/// Starter lore written out when the documents directory is empty, so a
/// fresh install has something to retrieve against.
const SAMPLE_DOCUMENTS: &[(&str, &str)] = &[
    (
        "weapon_lore.md",
        "# Weapon Lore\n\n\
         ## Longsword\n\n\
         The longsword rewards patience. Its reach lets a duelist control \
         the middle distance, and a well-timed riposte can end an exchange \
         in a single draw cut.\n\n\
         ## War Hammer\n\n\
         A war hammer ignores finesse. Strikes land with crushing weight, \
         staggering armored foes and cracking shields that would turn \
         aside a blade.\n\n\
         ## Bare Fists\n\n\
         Unarmed fighters close the gap fast, trading reach for speed. \
         Joint locks and throws punish any opponent who overextends.\n",
    ),
    (
        "combat_styles.md",
        "# Combat Styles\n\n\
         ## Aggressive Rush\n\n\
         An aggressive fighter presses forward relentlessly, sacrificing \
         defense to keep the opponent reacting instead of planning.\n\n\
         ## Defensive Counter\n\n\
         Defensive fighters yield ground deliberately, baiting attacks \
         and answering each one with a precise counter at the moment of \
         maximum exposure.\n\n\
         ## Wounded Desperation\n\n\
         A fighter near death fights differently: wild swings, gambits, \
         and a willingness to take a wound to give a worse one.\n",
    ),
];

pub struct Indexer {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    documents_path: PathBuf,
}

impl Indexer {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, cfg: &RagConfig) -> Self {
        Self {
            store,
            embedder,
            chunker: Chunker::new(cfg.chunk_size),
            documents_path: expand_path(&cfg.documents_path),
        }
    }

    /// Bring the store in line with the documents directory. Returns the
    /// number of chunks written. With `force`, every file is re-embedded
    /// regardless of its recorded mtime and size.
    pub async fn reindex(&self, force: bool) -> Result<usize> {
        std::fs::create_dir_all(&self.documents_path).with_context(|| {
            format!("create documents dir {}", self.documents_path.display())
        })?;

        let mut files = scan_documents(&self.documents_path);
        if files.is_empty() {
            self.seed_sample_documents()?;
            files = scan_documents(&self.documents_path);
        }

        // one listing for the whole run; per-file staleness checks reuse it
        let indexed = self.store.list_indexed_files().await?;
        self.clean_deleted_files(&indexed, &files).await?;

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut processed = 0usize;
        for path in &files {
            pb.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
            match self.index_file(path, force, &indexed).await {
                Ok(chunks) => processed += chunks,
                // one broken file must not abort the whole run
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "failed to index file");
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("done");
        tracing::info!(chunks = processed, files = files.len(), "reindex complete");
        Ok(processed)
    }

    /// Embed and store a single free-text snippet under a logical source
    /// name, without touching the filesystem. Returns false on any failure.
    pub async fn add_knowledge(&self, text: &str, source: &str) -> bool {
        let meta = ChunkMeta {
            source: source.to_string(),
            file_path: String::new(),
            chunk_index: 0,
            file_size: text.len() as i64,
            last_modified: 0.0,
        };
        let mut chunks = self.chunker.chunk_text(text, &meta);
        for (i, chunk) in chunks.iter_mut().enumerate() {
            chunk.meta.chunk_index = i;
            chunk.id = chunk_id(source, i, &chunk.content);
        }
        if chunks.is_empty() {
            return false;
        }
        match self.embed_and_upsert(&chunks).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(source, error = %e, "failed to add knowledge");
                false
            }
        }
    }

    /// Returns the number of chunks written for this file; 0 when it is
    /// up to date or empty.
    async fn index_file(
        &self,
        path: &Path,
        force: bool,
        indexed: &HashMap<String, IndexedDocumentRecord>,
    ) -> Result<usize> {
        let stat = std::fs::metadata(path)?;
        let mtime = stat
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let file_path = path.display().to_string();

        if !force && !is_stale(indexed.get(&file_path), mtime, stat.len() as i64) {
            return Ok(0);
        }

        // stale chunk ids from the previous content would otherwise linger
        self.store.delete_by_file_path(&file_path).await?;

        let chunks = self.chunker.load_document_from_path(path)?;
        if chunks.is_empty() {
            return Ok(0);
        }
        self.embed_and_upsert(&chunks).await
    }

    async fn embed_and_upsert(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("embed chunk batch")?;
        self.store.upsert_batch(chunks, &vectors).await
    }

    async fn clean_deleted_files(
        &self,
        indexed: &HashMap<String, IndexedDocumentRecord>,
        present: &[PathBuf],
    ) -> Result<()> {
        let present: std::collections::HashSet<String> =
            present.iter().map(|p| p.display().to_string()).collect();
        for file_path in indexed.keys() {
            if !present.contains(file_path) {
                self.store.delete_by_file_path(file_path).await?;
            }
        }
        Ok(())
    }

    fn seed_sample_documents(&self) -> Result<()> {
        for (name, body) in SAMPLE_DOCUMENTS {
            let path = self.documents_path.join(name);
            std::fs::write(&path, body)
                .with_context(|| format!("write sample document {}", path.display()))?;
        }
        tracing::info!(
            count = SAMPLE_DOCUMENTS.len(),
            dir = %self.documents_path.display(),
            "seeded sample documents"
        );
        Ok(())
    }
}
