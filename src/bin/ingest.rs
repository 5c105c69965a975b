use anyhow::Result;
use clap::Parser;
use ragchat::{Config, RagEngine};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Index the data directory (incremental by default)")]
struct Args {
    /// Reprocess every file, ignoring the index state
    #[arg(short, long)]
    full: bool,

    /// Only these files, comma separated (e.g. a.pdf,b.txt)
    #[arg(long, value_delimiter = ',')]
    files: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.ragchat.log_level)).init();

    log::info!("Data directory: {}", config.data_dir().display());
    log::info!("Database path: {}", config.db_path().display());

    let engine = RagEngine::from_config(&config).await?;
    let start = Instant::now();
    let specific = if args.files.is_empty() { None } else { Some(args.files.as_slice()) };
    let report = engine.reindex(!args.full, specific).await?;

    println!("\n=== Indexing Report ===\n");
    println!("Status:          {}", report.status);
    println!("Files processed: {}", report.files_processed);
    println!("Chunks indexed:  {}", report.chunks_indexed);
    println!("Skipped:         {}", report.skipped);
    if !report.removed.is_empty() {
        println!("Removed:         {}", report.removed.join(", "));
    }
    for failed in &report.failed {
        println!("Failed:          {} ({})", failed.filename, failed.error);
    }
    println!("Elapsed:         {:.2?}", start.elapsed());

    if !report.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
