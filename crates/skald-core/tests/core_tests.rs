use std::fs;
use tempfile::TempDir;

use skald_core::chunker::{chunk_id, scan_documents, Chunker};
use skald_core::error::Error;
use skald_core::types::ChunkMeta;

fn meta(source: &str) -> ChunkMeta {
    ChunkMeta {
        source: source.to_string(),
        ..ChunkMeta::default()
    }
}

#[test]
fn short_text_becomes_one_chunk() {
    let chunker = Chunker::new(512);
    let chunks = chunker.chunk_text("  A lone swordsman waits.  ", &meta("lore.txt"));
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "A lone swordsman waits.");
    assert_eq!(chunks[0].meta.chunk_index, 0);
}

#[test]
fn paragraphs_accumulate_up_to_chunk_size() {
    let chunker = Chunker::new(40);
    let text = "first paragraph here\n\nsecond paragraph\n\nthird one";
    let chunks = chunker.chunk_text(text, &meta("lore.txt"));
    assert!(chunks.len() > 1, "text longer than chunk size must split");
    for chunk in &chunks {
        // Each chunk is a whole number of paragraphs within the limit
        // unless a single paragraph alone exceeds it.
        let paragraph_count = chunk.content.split("\n\n").count();
        assert!(chunk.content.len() <= 40 || paragraph_count == 1);
    }
    assert_eq!(chunks[0].meta.chunk_index, 0);
    assert_eq!(chunks[1].meta.chunk_index, 1);
}

#[test]
fn oversized_paragraph_is_emitted_whole() {
    let chunker = Chunker::new(20);
    let long = "a".repeat(100);
    let text = format!("short\n\n{long}\n\ntail");
    let chunks = chunker.chunk_text(&text, &meta("lore.txt"));
    assert!(
        chunks.iter().any(|c| c.content == long),
        "an oversized paragraph must not be truncated"
    );
}

#[test]
fn chunk_ids_are_deterministic() {
    let chunker = Chunker::new(512);
    let a = chunker.chunk_text("the same content", &meta("lore.txt"));
    let b = chunker.chunk_text("the same content", &meta("lore.txt"));
    assert_eq!(a[0].id, b[0].id);
    assert_eq!(a[0].id, chunk_id("lore.txt", 0, "the same content"));

    let other = chunker.chunk_text("different content", &meta("lore.txt"));
    assert_ne!(a[0].id, other[0].id);
}

#[test]
fn chunk_id_embeds_source_and_index() {
    let id = chunk_id("moves.txt", 3, "whirlwind slash");
    assert!(id.starts_with("moves.txt_3_"));
    let hash = id.rsplit('_').next().unwrap();
    assert_eq!(hash.len(), 8);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn load_missing_document_is_source_not_found() {
    let chunker = Chunker::new(512);
    let err = chunker
        .load_document_from_path(std::path::Path::new("/no/such/file.txt"))
        .unwrap_err();
    assert!(matches!(err, Error::SourceNotFound(_)));
}

#[test]
fn load_document_attaches_file_metadata() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("weapons.txt");
    fs::write(&path, "A blade of northern steel.").unwrap();

    let chunker = Chunker::new(512);
    let chunks = chunker.load_document_from_path(&path).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].meta.source, "weapons.txt");
    assert_eq!(chunks[0].meta.file_path, path.display().to_string());
    assert!(chunks[0].meta.file_size > 0);
    assert!(chunks[0].meta.last_modified > 0.0);
}

#[test]
fn scan_documents_lists_txt_and_md_sorted() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("b.md"), "x").unwrap();
    fs::write(tmp.path().join("a.txt"), "x").unwrap();
    fs::write(tmp.path().join("ignored.json"), "x").unwrap();

    let files = scan_documents(tmp.path());
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.md"]);
}

#[test]
fn config_defaults_apply_without_a_file() {
    let config = skald_core::config::Config::from_file("does-not-exist.toml");
    let llm = config.llm().unwrap();
    let rag = config.rag().unwrap();
    assert_eq!(llm.host, "http://127.0.0.1:5000");
    assert_eq!(llm.prompt_keyname, "prompt");
    assert_eq!(rag.embedding_dimensions, 1024);
    assert_eq!(rag.collection_name, "battle_knowledge");
    assert_eq!(rag.deadline_secs, 80);
}

#[test]
fn config_file_overrides_defaults_per_section() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("skald.toml");
    fs::write(
        &path,
        "[llm]\napi_type = \"openai-compatible\"\nmodel = \"test-model\"\n\n\
         [rag]\nchunk_size = 128\nmax_results = 2\n",
    )
    .unwrap();

    let config = skald_core::config::Config::from_file(&path);
    let llm = config.llm().unwrap();
    let rag = config.rag().unwrap();
    assert_eq!(llm.api_type, "openai-compatible");
    assert_eq!(llm.model, "test-model");
    // untouched keys keep their defaults
    assert_eq!(llm.path, "/api/v1/generate");
    assert_eq!(rag.chunk_size, 128);
    assert_eq!(rag.max_results, 2);
    assert!((rag.similarity_threshold - 0.7).abs() < f32::EPSILON);
}
