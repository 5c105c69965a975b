use anyhow::Result;
use clap::Parser;
use ragchat::search::{FilterRequest, FilterValue, MetadataFilter};
use ragchat::{Config, RagEngine};

#[derive(Parser, Debug)]
#[command(name = "ask")]
#[command(about = "Ask one question against the indexed documents")]
struct Args {
    /// The question
    message: String,

    /// Force (true) or skip (false) retrieval; automatic when omitted
    #[arg(long)]
    use_rag: Option<bool>,

    #[arg(long)]
    file_type: Option<String>,

    #[arg(long)]
    source_file: Option<String>,

    /// last_week, last_month, last_year or <start>:<end>
    #[arg(long)]
    date_range: Option<String>,

    /// <min>:<max>, <min>: or a bare minimum, in bytes
    #[arg(long)]
    file_size: Option<String>,

    #[arg(long)]
    top_k: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();

    let request = FilterRequest {
        file_type: args.file_type,
        source_file: args.source_file,
        date_range: args.date_range,
        file_size: args.file_size.map(FilterValue::Text),
        top_k: args.top_k.map(|k| FilterValue::Int(k as i64)),
    };
    let filters = if request.is_empty() {
        None
    } else {
        Some(MetadataFilter::parse(&request, chrono::Utc::now())?)
    };

    let engine = RagEngine::from_config(&config).await?;
    let reply = engine.query(&args.message, args.use_rag, filters).await;

    println!("{}", reply.reply);
    eprintln!("\n[mode: {} | source: {}]", reply.mode.as_str(), reply.source);
    Ok(())
}
