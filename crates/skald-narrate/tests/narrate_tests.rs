use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use skald_core::config::RagConfig;
use skald_core::types::{CharacterSheet, CombatEvent, WeaponInfo};
use skald_embed::FakeEmbedder;
use skald_llm::{Completion, LlmError};
use skald_narrate::{NarrationOrchestrator, RetrievalCoordinator};
use skald_store::VectorStore;

const DIM: usize = 16;

struct CannedLlm(String);

#[async_trait]
impl Completion for CannedLlm {
    async fn complete(&self, _segments: &[String]) -> Result<String, LlmError> {
        Ok(self.0.clone())
    }
}

struct FailingLlm;

#[async_trait]
impl Completion for FailingLlm {
    async fn complete(&self, _segments: &[String]) -> Result<String, LlmError> {
        Err(LlmError::Transport("connection refused".to_string()))
    }
}

struct StalledLlm;

#[async_trait]
impl Completion for StalledLlm {
    async fn complete(&self, _segments: &[String]) -> Result<String, LlmError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(String::new())
    }
}

fn character(name: &str, desc: &str) -> CharacterSheet {
    CharacterSheet {
        name: name.to_string(),
        desc: desc.to_string(),
        weapon: Some(WeaponInfo {
            name: "iron longsword".to_string(),
            kind: "sword".to_string(),
            kind_name: "longsword".to_string(),
            desc: "a plain, well-kept blade".to_string(),
        }),
        hp: 60,
        max_hp: 100,
    }
}

fn hit_event() -> CombatEvent {
    CombatEvent {
        attacker: character("Rex", "a wandering swordsman"),
        defender: character("Zed", "a grizzled mercenary"),
        hit: true,
        damage: 15,
        room: "the old arena".to_string(),
    }
}

async fn orchestrator_with(
    dir: &tempfile::TempDir,
    gateway: Arc<dyn Completion>,
    deadline: Duration,
) -> NarrationOrchestrator {
    let cfg = RagConfig {
        embedding_dimensions: DIM,
        db_uri: dir.path().join("lancedb").display().to_string(),
        documents_path: dir.path().join("documents").display().to_string(),
        collection_name: "test_knowledge".to_string(),
        ..RagConfig::default()
    };
    let store = Arc::new(VectorStore::open(&cfg).await.unwrap());
    let coordinator = RetrievalCoordinator::new(store, Arc::new(FakeEmbedder::new(DIM)), &cfg);
    NarrationOrchestrator::new(coordinator, gateway, deadline)
}

#[tokio::test]
async fn successful_narration_substitutes_both_names() {
    let dir = tempfile::tempdir().unwrap();
    let canned = r#"{"move_name":"Moonfall Strike","narrative":"<<A>> unleashes 【Moonfall Strike】 at <<D>>!","effect":"15 damage dealt"}"#;
    let orchestrator = orchestrator_with(
        &dir,
        Arc::new(CannedLlm(canned.to_string())),
        Duration::from_secs(5),
    )
    .await;

    let line = orchestrator.narrate(&hit_event()).await;
    assert!(line.contains("Rex"));
    assert!(line.contains("Zed"));
    assert!(line.contains("【Moonfall Strike】"));
    assert!(!line.contains("<<A>>"));
    assert!(!line.contains("<<D>>"));
}

#[tokio::test]
async fn fenced_json_is_still_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let canned = "```json\n{\"move_name\":\"Riposte\",\"narrative\":\"<<A>> answers with a 【Riposte】\",\"effect\":\"15 damage\"}\n```";
    let orchestrator = orchestrator_with(
        &dir,
        Arc::new(CannedLlm(canned.to_string())),
        Duration::from_secs(5),
    )
    .await;

    let line = orchestrator.narrate(&hit_event()).await;
    assert!(line.contains("【Riposte】"));
}

#[tokio::test]
async fn llm_failure_yields_exact_hit_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator =
        orchestrator_with(&dir, Arc::new(FailingLlm), Duration::from_secs(5)).await;

    let line = orchestrator.narrate(&hit_event()).await;
    assert_eq!(line, "Rex struck Zed! (dealt 15 damage)");
}

#[tokio::test]
async fn llm_failure_yields_exact_miss_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator =
        orchestrator_with(&dir, Arc::new(FailingLlm), Duration::from_secs(5)).await;

    let mut event = hit_event();
    event.hit = false;
    event.damage = 0;
    let line = orchestrator.narrate(&event).await;
    assert_eq!(line, "Rex's attack was evaded by Zed! (no damage)");
}

#[tokio::test]
async fn malformed_response_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_with(
        &dir,
        Arc::new(CannedLlm("the model rambled in prose".to_string())),
        Duration::from_secs(5),
    )
    .await;

    let line = orchestrator.narrate(&hit_event()).await;
    assert_eq!(line, "Rex struck Zed! (dealt 15 damage)");
}

#[tokio::test]
async fn empty_narrative_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let canned = r#"{"move_name":"x","narrative":"","effect":"y"}"#;
    let orchestrator = orchestrator_with(
        &dir,
        Arc::new(CannedLlm(canned.to_string())),
        Duration::from_secs(5),
    )
    .await;

    let line = orchestrator.narrate(&hit_event()).await;
    assert_eq!(line, "Rex struck Zed! (dealt 15 damage)");
}

#[tokio::test]
async fn stalled_llm_is_cut_off_at_the_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator =
        orchestrator_with(&dir, Arc::new(StalledLlm), Duration::from_millis(100)).await;

    let started = std::time::Instant::now();
    let line = orchestrator.narrate(&hit_event()).await;
    assert_eq!(line, "Rex struck Zed! (dealt 15 damage)");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn opportunistic_narration_fails_to_empty_string() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator =
        orchestrator_with(&dir, Arc::new(FailingLlm), Duration::from_secs(5)).await;

    let line = orchestrator
        .narrate_with_context(&hit_event(), "a rainstorm lashes the arena")
        .await;
    assert_eq!(line, "");
}
