use skald_cli::{build_pipeline, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    println!("skald status\n============");
    let pipeline = build_pipeline().await?;
    let stats = pipeline.store.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let files = pipeline.store.list_indexed_files().await?;
    if files.is_empty() {
        println!("\n(no files indexed yet)");
    } else {
        println!("\nIndexed files:");
        let mut paths: Vec<_> = files.values().collect();
        paths.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        for record in paths {
            println!(
                "  {} ({} bytes, source {})",
                record.file_path, record.file_size, record.source
            );
        }
    }
    Ok(())
}
