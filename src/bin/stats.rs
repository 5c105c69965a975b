use ragchat::{Config, RagEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::load()?;
    let engine = RagEngine::from_config(&config).await?;

    let info = engine.get_system_info().await?;
    println!("\n=== ragchat Index Statistics ===\n");
    println!("Status:         {} ({} mode)", info.rag.status, info.rag.mode);
    println!("Chunks stored:  {}", info.rag.document_count);
    println!("Indexed files:  {}", info.index.total_indexed_files);
    println!("Total chunks:   {}", info.index.total_chunks);
    match info.index.last_update {
        Some(ts) => println!("Last update:    {}", ts.to_rfc3339()),
        None => println!("Last update:    never"),
    }
    println!("Chat model:     {}", info.chat_model);
    println!("Embedding:      {}", info.embedding_model);

    let files = engine.list_files().await;
    println!("\n--- Files ({}) ---", files.len());
    for file in &files {
        let state = match engine.index_entry(&file.filename).await {
            Some(entry) => format!(
                "{} chunks, indexed {}",
                entry.chunks_count,
                entry.last_indexed.format("%Y-%m-%d %H:%M")
            ),
            None => "not indexed".to_string(),
        };
        println!("{:<40} {:>10} bytes  {}", file.filename, file.size, state);
    }

    println!(
        "\nIntent categories: general [{}], rag [{}]",
        info.intent_detection.general_intents.join(", "),
        info.intent_detection.rag_intents.join(", ")
    );
    Ok(())
}
