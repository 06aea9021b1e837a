//! Durable similarity-searchable chunk storage, addressable by `file_path`
//! for incremental re-indexing. Updates are delete-then-reinsert; the
//! merge-insert on `id` guarantees the table never holds two chunks with
//! the same id.

use anyhow::{anyhow, Result};
use arrow_array::{
    FixedSizeListArray, Float32Array, Float64Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use skald_core::chunker::content_hash;
use skald_core::config::RagConfig;
use skald_core::types::{
    ChunkMeta, DocumentChunk, IndexedDocumentRecord, Relevance, RetrievalResult,
};

use crate::schema::{build_store_schema, vector_dim_of};
use crate::table::{ensure_table, open_db, sql_quote};

/// Filesystems may truncate sub-second mtime precision; exact equality
/// would cause spurious re-indexing churn.
const MTIME_TOLERANCE_SECS: f64 = 1.0;

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub total_files: usize,
    pub collection_name: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub db_uri: String,
}

pub struct VectorStore {
    conn: Connection,
    table_name: String,
    dim: usize,
    embedding_model: String,
    db_uri: String,
}

impl VectorStore {
    /// Connect and ensure the knowledge table exists, validating that its
    /// vector width matches the configured embedding dimensionality. A
    /// mismatch is a configuration error surfaced here, not at query time.
    pub async fn open(cfg: &RagConfig) -> Result<Self> {
        let conn = open_db(&cfg.db_uri).await?;
        let dim = cfg.embedding_dimensions;
        ensure_table(&conn, &cfg.collection_name, build_store_schema(dim as i32)).await?;

        let table = conn.open_table(&cfg.collection_name).execute().await?;
        let actual = table.schema().await?;
        match vector_dim_of(&actual) {
            Some(d) if d == dim as i32 => {}
            Some(d) => {
                return Err(anyhow!(
                    "collection '{}' holds {}-dimensional vectors but rag.embedding_dimensions is {}",
                    cfg.collection_name, d, dim
                ))
            }
            None => {
                return Err(anyhow!(
                    "collection '{}' has no fixed-size vector column",
                    cfg.collection_name
                ))
            }
        }

        Ok(Self {
            conn,
            table_name: cfg.collection_name.clone(),
            dim,
            embedding_model: cfg.embedding_model.clone(),
            db_uri: cfg.db_uri.clone(),
        })
    }

    /// Insert or replace `chunks` with their vectors. Coarse granularity:
    /// the whole batch either lands or the call fails, and callers retry
    /// per source file.
    pub async fn upsert_batch(
        &self,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        if chunks.len() != vectors.len() {
            return Err(anyhow!(
                "chunk/vector count mismatch: {} vs {}",
                chunks.len(),
                vectors.len()
            ));
        }
        for v in vectors {
            if v.len() != self.dim {
                return Err(anyhow!(
                    "vector dimension {} does not match store dimension {}",
                    v.len(),
                    self.dim
                ));
            }
        }

        let batch = self.to_record_batch(chunks, vectors)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self.conn.open_table(&self.table_name).execute().await?;
        let mut mi = table.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = mi.execute(reader).await?;
        Ok(chunks.len())
    }

    /// Nearest chunks to `query_vec`, descending similarity, ties stable.
    /// `limit == 0` yields no results rather than an error.
    pub async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<RetrievalResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        if query_vec.len() != self.dim {
            return Err(anyhow!(
                "query vector dimension {} does not match store dimension {}",
                query_vec.len(),
                self.dim
            ));
        }
        let table = self.conn.open_table(&self.table_name).execute().await?;
        let mut stream = table
            .vector_search(query_vec.to_vec())?
            .limit(limit)
            .execute()
            .await?;

        let mut results = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = str_col(&batch, "id")?;
            let sources = str_col(&batch, "source")?;
            let contents = str_col(&batch, "content")?;
            let file_paths = str_col(&batch, "file_path")?;
            let chunk_indices = i32_col(&batch, "chunk_index")?;
            let file_sizes = i64_col(&batch, "file_size")?;
            let mtimes = f64_col(&batch, "last_modified")?;
            let distances = f32_col(&batch, "_distance")?;
            for i in 0..batch.num_rows() {
                let score = 1.0 - distances.value(i);
                if let Some(min) = threshold {
                    if score < min {
                        continue;
                    }
                }
                let chunk = DocumentChunk {
                    id: ids.value(i).to_string(),
                    content: contents.value(i).to_string(),
                    meta: ChunkMeta {
                        source: sources.value(i).to_string(),
                        file_path: file_paths.value(i).to_string(),
                        chunk_index: chunk_indices.value(i) as usize,
                        file_size: file_sizes.value(i),
                        last_modified: mtimes.value(i),
                    },
                    embedding: None,
                };
                results.push(RetrievalResult {
                    score,
                    relevance: Relevance::from_score(score),
                    chunk,
                });
            }
        }
        results.truncate(limit);
        Ok(results)
    }

    /// One record per indexed source file, keyed by `file_path`.
    pub async fn list_indexed_files(&self) -> Result<HashMap<String, IndexedDocumentRecord>> {
        let table = self.conn.open_table(&self.table_name).execute().await?;
        let mut stream = table.query().execute().await?;
        let mut indexed = HashMap::new();
        while let Some(batch) = stream.try_next().await? {
            let file_paths = str_col(&batch, "file_path")?;
            let sources = str_col(&batch, "source")?;
            let file_sizes = i64_col(&batch, "file_size")?;
            let mtimes = f64_col(&batch, "last_modified")?;
            for i in 0..batch.num_rows() {
                let file_path = file_paths.value(i);
                if file_path.is_empty() || indexed.contains_key(file_path) {
                    continue;
                }
                indexed.insert(
                    file_path.to_string(),
                    IndexedDocumentRecord {
                        file_path: file_path.to_string(),
                        last_modified: mtimes.value(i),
                        file_size: file_sizes.value(i),
                        source: sources.value(i).to_string(),
                    },
                );
            }
        }
        Ok(indexed)
    }

    /// Remove every chunk originating from `file_path`. Deleting a path
    /// that was never indexed is a no-op success.
    pub async fn delete_by_file_path(&self, file_path: &str) -> Result<usize> {
        let table = self.conn.open_table(&self.table_name).execute().await?;
        let pred = format!("file_path = {}", sql_quote(file_path));
        let count = table.count_rows(Some(pred.clone())).await?;
        if count > 0 {
            table.delete(&pred).await?;
            tracing::info!(file_path, chunks = count, "deleted stale index entries");
        }
        Ok(count)
    }

    /// True when `file_path` is unindexed, its mtime drifted by more than
    /// one second, or its size changed. Bulk callers that already hold a
    /// listing should use [`is_stale`] directly instead of re-scanning per
    /// file.
    pub async fn needs_reindex(
        &self,
        file_path: &str,
        current_mtime: f64,
        current_size: i64,
    ) -> Result<bool> {
        let indexed = self.list_indexed_files().await?;
        Ok(is_stale(indexed.get(file_path), current_mtime, current_size))
    }

    /// Read-only diagnostic snapshot.
    pub async fn stats(&self) -> Result<StoreStats> {
        let table = self.conn.open_table(&self.table_name).execute().await?;
        let total_chunks = table.count_rows(None).await?;
        let total_files = self.list_indexed_files().await?.len();
        Ok(StoreStats {
            total_chunks,
            total_files,
            collection_name: self.table_name.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_dimensions: self.dim,
            db_uri: self.db_uri.clone(),
        })
    }

    fn to_record_batch(
        &self,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> Result<RecordBatch> {
        let schema = build_store_schema(self.dim as i32);
        let mut ids = Vec::new();
        let mut sources = Vec::new();
        let mut contents = Vec::new();
        let mut file_paths = Vec::new();
        let mut hashes = Vec::new();
        let mut chunk_indices = Vec::new();
        let mut file_sizes = Vec::new();
        let mut mtimes = Vec::new();
        let mut vecs: Vec<Option<Vec<Option<f32>>>> = Vec::new();
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            ids.push(chunk.id.clone());
            sources.push(chunk.meta.source.clone());
            contents.push(chunk.content.clone());
            file_paths.push(chunk.meta.file_path.clone());
            hashes.push(content_hash(&chunk.content));
            chunk_indices.push(chunk.meta.chunk_index as i32);
            file_sizes.push(chunk.meta.file_size);
            mtimes.push(chunk.meta.last_modified);
            vecs.push(Some(vector.iter().map(|&x| Some(x)).collect()));
        }
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(sources)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(file_paths)),
                Arc::new(StringArray::from(hashes)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(Int64Array::from(file_sizes)),
                Arc::new(Float64Array::from(mtimes)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(vecs.into_iter(), self.dim as i32)),
            ],
        )?;
        Ok(batch)
    }
}

/// Staleness check against one indexed record: absent, mtime drifted past
/// the one-second tolerance, or size changed.
pub fn is_stale(
    record: Option<&IndexedDocumentRecord>,
    current_mtime: f64,
    current_size: i64,
) -> bool {
    let Some(record) = record else {
        return true;
    };
    (current_mtime - record.last_modified).abs() > MTIME_TOLERANCE_SECS
        || current_size != record.file_size
}

fn str_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("missing column {name}"))
}

fn i32_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow!("missing column {name}"))
}

fn i64_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow!("missing column {name}"))
}

fn f64_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| anyhow!("missing column {name}"))
}

fn f32_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| anyhow!("missing column {name}"))
}
