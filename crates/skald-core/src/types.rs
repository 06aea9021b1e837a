//! Domain types shared by the retrieval store and the narration pipeline.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// File-level metadata attached to every chunk cut from a source document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Short source label (file name or a manual tag like "manual").
    pub source: String,
    /// Absolute path of the originating file; empty for manual knowledge.
    pub file_path: String,
    /// Position of the chunk within its parent document.
    pub chunk_index: usize,
    pub file_size: i64,
    /// Modification time as seconds since the epoch.
    pub last_modified: f64,
}

/// A bounded span of a source document, stored as one retrievable unit.
///
/// `id` is a deterministic function of (source, chunk_index, content hash),
/// so re-chunking unchanged content reproduces identical ids. Chunks are
/// never mutated in place; updates go through delete-then-reinsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub content: String,
    pub meta: ChunkMeta,
    pub embedding: Option<Vec<f32>>,
}

/// Coarse relevance band derived from the similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl Relevance {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            Relevance::High
        } else if score >= 0.5 {
            Relevance::Medium
        } else {
            Relevance::Low
        }
    }
}

/// One similarity-search hit. Transient, produced per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,
    /// Similarity, higher is closer.
    pub score: f32,
    pub relevance: Relevance,
}

/// Summary of all chunks indexed from one source file, keyed by `file_path`.
/// Used to decide re-indexing without re-reading the content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocumentRecord {
    pub file_path: String,
    pub last_modified: f64,
    pub file_size: i64,
    pub source: String,
}

/// Equipped-weapon descriptor as the game exposes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponInfo {
    pub name: String,
    pub kind: String,
    pub kind_name: String,
    pub desc: String,
}

pub const UNARMED_KIND: &str = "unarmed";

impl WeaponInfo {
    /// The sentinel used when a character has nothing equipped.
    pub fn unarmed() -> Self {
        Self {
            name: "bare fists".to_string(),
            kind: UNARMED_KIND.to_string(),
            kind_name: "unarmed".to_string(),
            desc: "fighting empty-handed".to_string(),
        }
    }

    pub fn is_unarmed(&self) -> bool {
        self.kind == UNARMED_KIND
    }
}

/// The slice of a game character the narration pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub name: String,
    pub desc: String,
    pub weapon: Option<WeaponInfo>,
    pub hp: i32,
    pub max_hp: i32,
}

impl CharacterSheet {
    /// Health as a 0.0..=1.0 ratio, saturating when max_hp is unset.
    pub fn health_ratio(&self) -> f32 {
        if self.max_hp > 0 {
            (self.hp as f32 / self.max_hp as f32).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// A resolved combat exchange, consumed read-only. `hit` and `damage` are
/// ground truth already decided by the combat resolver and must pass through
/// the pipeline verbatim.
#[derive(Debug, Clone)]
pub struct CombatEvent {
    pub attacker: CharacterSheet,
    pub defender: CharacterSheet,
    pub hit: bool,
    pub damage: i32,
    pub room: String,
}

/// Structured output parsed from the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationResult {
    pub move_name: String,
    pub narrative: String,
    pub effect: String,
}
