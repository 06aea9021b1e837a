//! Paragraph-granular document chunking.
//!
//! Splitting happens on blank lines only; a paragraph is never cut
//! mid-sentence because partial sentences degrade narration quality.
//! `chunk_overlap` from the config is accepted but not applied as a sliding
//! byte window; paragraph boundaries stay authoritative.

use md5::{Digest, Md5};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{ChunkMeta, DocumentChunk};

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Cut `text` into chunks no larger than `chunk_size`, except that a
    /// single paragraph exceeding the limit is emitted whole rather than
    /// truncated. Short text yields exactly one chunk with the trimmed text.
    pub fn chunk_text(&self, text: &str, meta: &ChunkMeta) -> Vec<DocumentChunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        if text.len() <= self.chunk_size {
            chunks.push(make_chunk(text, meta, 0));
            return chunks;
        }

        let mut current = String::new();
        let mut chunk_index = 0usize;
        for paragraph in text.split("\n\n") {
            if current.len() + paragraph.len() <= self.chunk_size {
                current.push_str(paragraph);
                current.push_str("\n\n");
            } else {
                let buffered = current.trim();
                if !buffered.is_empty() {
                    chunks.push(make_chunk(buffered, meta, chunk_index));
                    chunk_index += 1;
                }
                current = format!("{paragraph}\n\n");
            }
        }
        let remainder = current.trim();
        if !remainder.is_empty() {
            chunks.push(make_chunk(remainder, meta, chunk_index));
        }
        chunks
    }

    /// Read one document and chunk it, attaching file metadata.
    pub fn load_document_from_path(&self, path: &Path) -> Result<Vec<DocumentChunk>> {
        if !path.exists() {
            return Err(Error::SourceNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Operation(format!("read {}: {}", path.display(), e)))?;
        let stat = std::fs::metadata(path)
            .map_err(|e| Error::Operation(format!("stat {}: {}", path.display(), e)))?;
        let mtime = stat
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let meta = ChunkMeta {
            source: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            file_path: path.display().to_string(),
            chunk_index: 0,
            file_size: stat.len() as i64,
            last_modified: mtime,
        };
        Ok(self.chunk_text(&content, &meta))
    }
}

/// Full md5 hex digest of chunk content, stored alongside the chunk.
pub fn content_hash(content: &str) -> String {
    let digest = Md5::digest(content.as_bytes());
    let mut hash = String::with_capacity(32);
    for b in digest {
        hash.push_str(&format!("{b:02x}"));
    }
    hash
}

/// Chunk id: `{source}_{index}_{first 8 hex chars of md5(content)}`.
/// Deterministic, so re-indexing unchanged content is idempotent.
pub fn chunk_id(source: &str, index: usize, content: &str) -> String {
    let hash = &content_hash(content)[..8];
    format!("{source}_{index}_{hash}")
}

fn make_chunk(content: &str, meta: &ChunkMeta, index: usize) -> DocumentChunk {
    DocumentChunk {
        id: chunk_id(&meta.source, index, content),
        content: content.to_string(),
        meta: ChunkMeta {
            chunk_index: index,
            ..meta.clone()
        },
        embedding: None,
    }
}

/// List the indexable documents (`*.txt` and `*.md`) under `root`, sorted
/// for a stable processing order.
pub fn scan_documents(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        match path.extension().and_then(|s| s.to_str()) {
            Some("txt") | Some("md") => files.push(path.to_path_buf()),
            _ => {}
        }
    }
    files.sort();
    files
}
