//! Best-effort knowledge retrieval for prompt assembly.
//!
//! Every public method here degrades to an empty result on failure; the
//! prompt is simply leaner when the embedding API or the store is down.

use std::sync::Arc;

use skald_core::config::RagConfig;
use skald_core::types::{CharacterSheet, RetrievalResult, WeaponInfo};
use skald_embed::Embedder;
use skald_store::VectorStore;

/// Generic fighting vocabulary appended to every retrieval query so that
/// lore written in combat terms ranks above unrelated documents.
const COMBAT_KEYWORDS: &[&str] = &["combat", "attack", "technique"];
const BATTLE_KEYWORDS: &[&str] = &["combat", "attack", "technique", "weapon"];

const CHARACTER_RESULTS: usize = 2;
const CHARACTER_SNIPPET_CHARS: usize = 500;
const BATTLE_RESULTS: usize = 3;
const BATTLE_SNIPPET_CHARS: usize = 200;

pub struct RetrievalCoordinator {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    similarity_threshold: f32,
}

impl RetrievalCoordinator {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, cfg: &RagConfig) -> Self {
        Self {
            store,
            embedder,
            max_results: cfg.max_results,
            similarity_threshold: cfg.similarity_threshold,
        }
    }

    /// Search the knowledge store, biasing the query toward `tag`
    /// ("battle" or "character"). Failures come back as no results.
    pub async fn retrieve(&self, query: &str, tag: &str) -> Vec<RetrievalResult> {
        let biased = format!("{tag} {query}");
        let vector = match self.embedder.embed_one(&biased).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tag, error = %e, "embedding unavailable, skipping retrieval");
                return Vec::new();
            }
        };
        match self
            .store
            .search(&vector, self.max_results, Some(self.similarity_threshold))
            .await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(tag, error = %e, "knowledge store unreachable");
                Vec::new()
            }
        }
    }

    /// Lore relevant to one combatant: top two hits for a query built from
    /// the character's description and equipped weapon, each capped at 500
    /// characters. A character with no description and no weapon yields an
    /// empty string without touching the store.
    pub async fn character_context(&self, character: &CharacterSheet, role: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        let desc = character.desc.trim();
        if !desc.is_empty() {
            parts.push(desc.to_string());
        }
        if let Some(weapon) = &character.weapon {
            push_weapon_terms(&mut parts, weapon);
        }
        if parts.is_empty() {
            tracing::debug!(role, name = %character.name, "nothing to retrieve on");
            return String::new();
        }
        parts.extend(COMBAT_KEYWORDS.iter().map(|s| (*s).to_string()));

        let results = self.retrieve(&parts.join(" "), "character").await;
        results
            .iter()
            .take(CHARACTER_RESULTS)
            .map(|r| truncate_chars(r.chunk.content.trim(), CHARACTER_SNIPPET_CHARS))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Scene-level lore for the whole exchange: top three hits, bulleted,
    /// each capped at 200 characters.
    pub async fn battle_context(
        &self,
        attacker: &CharacterSheet,
        defender: &CharacterSheet,
    ) -> String {
        let mut parts: Vec<String> = Vec::new();
        for side in [attacker, defender] {
            let desc = side.desc.trim();
            if !desc.is_empty() {
                parts.push(desc.to_string());
            }
            if let Some(weapon) = &side.weapon {
                if !weapon.is_unarmed() {
                    parts.push(weapon.kind_name.clone());
                }
            }
        }
        parts.extend(BATTLE_KEYWORDS.iter().map(|s| (*s).to_string()));

        let results = self.retrieve(&parts.join(" "), "battle").await;
        results
            .iter()
            .take(BATTLE_RESULTS)
            .map(|r| {
                format!(
                    "- {}",
                    truncate_chars(r.chunk.content.trim(), BATTLE_SNIPPET_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn push_weapon_terms(parts: &mut Vec<String>, weapon: &WeaponInfo) {
    // the unarmed sentinel carries no retrievable lore
    if weapon.is_unarmed() {
        return;
    }
    if !weapon.name.is_empty() {
        parts.push(weapon.name.clone());
    }
    if !weapon.kind_name.is_empty() {
        parts.push(weapon.kind_name.clone());
    }
    if !weapon.desc.is_empty() {
        parts.push(weapon.desc.clone());
    }
}

/// Character-boundary-safe truncation with an ellipsis marker.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::truncate_chars;

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(truncate_chars("a parry", 500), "a parry");
    }

    #[test]
    fn long_strings_are_cut_on_char_boundaries() {
        let s = "х".repeat(600);
        let cut = truncate_chars(&s, 500);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 503);
    }
}
