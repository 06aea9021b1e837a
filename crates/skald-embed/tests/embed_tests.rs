use skald_core::config::RagConfig;
use skald_embed::{EmbedError, Embedder, FakeEmbedder, HttpEmbedder};

#[tokio::test]
async fn fake_embedder_is_deterministic_and_normalized() {
    let embedder = FakeEmbedder::new(64);
    let a = embedder.embed_one("iron sword strike").await.unwrap();
    let b = embedder.embed_one("iron sword strike").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-3);
}

#[tokio::test]
async fn fake_embedder_distinguishes_texts() {
    let embedder = FakeEmbedder::new(64);
    let a = embedder.embed_one("fire magic bolt").await.unwrap();
    let b = embedder.embed_one("calm healing spring").await.unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn batch_embeds_every_text() {
    let embedder = FakeEmbedder::new(32);
    let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
    let vecs = embedder.embed_batch(&texts).await.unwrap();
    assert_eq!(vecs.len(), 3);
    assert!(vecs.iter().all(|v| v.len() == 32));
}

#[test]
fn missing_credential_is_a_startup_error() {
    let cfg = RagConfig {
        api_key: String::new(),
        ..RagConfig::default()
    };
    // Only meaningful when the environment fallback is unset too.
    if std::env::var("RAG_API_KEY").is_err() {
        let err = HttpEmbedder::from_config(&cfg).err().expect("must fail");
        assert!(matches!(err, EmbedError::MissingCredential));
    }
}

#[test]
fn explicit_config_key_wins() {
    let cfg = RagConfig {
        api_key: "sk-test".to_string(),
        ..RagConfig::default()
    };
    assert!(HttpEmbedder::from_config(&cfg).is_ok());
}
