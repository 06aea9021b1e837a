use std::env;

use skald_cli::{build_pipeline, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let mut force = false;
    let mut add_text: Option<String> = None;
    let mut add_source = "manual".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--force" | "-f" => force = true,
            "--add" => {
                if i + 1 < args.len() {
                    add_text = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --add requires the text to index");
                    std::process::exit(1);
                }
            }
            "--source" => {
                if i + 1 < args.len() {
                    add_source = args[i + 1].clone();
                    i += 1;
                } else {
                    eprintln!("Error: --source requires a name");
                    std::process::exit(1);
                }
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("Usage: skald-indexer [--force] [--add '<text>' [--source <name>]]");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    println!("skald indexer\n=============");
    let pipeline = build_pipeline().await?;

    if let Some(text) = add_text {
        if pipeline.indexer.add_knowledge(&text, &add_source).await {
            println!("✅ Added knowledge under source '{}'", add_source);
        } else {
            eprintln!("❌ Failed to add knowledge");
            std::process::exit(1);
        }
        return Ok(());
    }

    if force {
        println!("⚠️  Forcing a full re-index");
    }
    let processed = pipeline.indexer.reindex(force).await?;
    let stats = pipeline.store.stats().await?;
    println!("\n✅ Indexing completed");
    println!("📊 Chunks processed this run: {}", processed);
    println!(
        "📊 Store now holds {} chunks across {} files",
        stats.total_chunks, stats.total_files
    );
    Ok(())
}
