use anyhow::Result;
use ragchat::db::Db;
use ragchat::llm::OllamaClient;
use ragchat::{server, Config, RagEngine, RagchatError};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.ragchat.log_level)).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" => run_server(config).await?,
        "reindex" => run_reindex(config, args.iter().any(|a| a == "--full")).await?,
        "verify" => run_verification(config).await?,
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Usage: ragchat [serve|reindex [--full]|verify]");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    log::info!("Starting ragchat v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Data directory: {}", config.data_dir().display());
    log::info!("Chat model: {}", config.ollama.chat_model);

    let engine = Arc::new(RagEngine::from_config(&config).await?);
    server::serve(engine, &config.http_server).await?;
    Ok(())
}

async fn run_reindex(config: Config, full: bool) -> Result<()> {
    let engine = RagEngine::from_config(&config).await?;
    let report = engine.reindex(!full, None).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Check the index schema and that the configured models are pulled
async fn run_verification(config: Config) -> Result<()> {
    log::info!("Verifying ragchat v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Database path: {}", config.db_path().display());

    let db = Db::open(config.db_path(), &config.ragchat.migrations_dir).await?;
    verify_database_schema(&db).await?;
    log::info!("Database schema OK");

    let client = OllamaClient::from_config(&config.ollama)?;
    match client.list_models().await {
        Ok(models) => {
            for wanted in [&config.ollama.chat_model, &config.ollama.embedding_model] {
                // tags carry an explicit ":latest" when pulled without one
                let present = models.iter().any(|m| m == wanted || m == &format!("{}:latest", wanted));
                if present {
                    log::info!("✓ Model available: {}", wanted);
                } else {
                    log::warn!("Model not pulled: {} (run `ollama pull {}`)", wanted, wanted);
                }
            }
        }
        Err(e) => log::warn!("Ollama unreachable at {}: {}", config.ollama.base_url, e),
    }

    Ok(())
}

async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'trigger') ORDER BY name")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected = [
            "chunks",
            "chunks_fts",
            "schema_migrations",
            "chunks_fts_insert",
            "chunks_fts_delete",
            "chunks_fts_update",
        ];
        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|e| !names.iter().any(|n| n == e))
            .collect();
        if !missing.is_empty() {
            return Err(RagchatError::Config(format!("Missing schema objects: {}", missing.join(", "))));
        }
        Ok(())
    })
    .await?;
    Ok(())
}
