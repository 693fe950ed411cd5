//! Lexi — legal document templatization server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lexi_core::LexiConfig;
use lexi_llm::{CompletionBackend, GeminiClient};
use lexi_server::{build_router, seed, AppState};
use lexi_store::SqliteStore;

fn resolve_data_dir() -> PathBuf {
    std::env::var("LEXI_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("Lexi — legal document templatization server");
    println!();
    println!("Usage: lexi [command]");
    println!();
    println!("Commands:");
    println!("  (none)    Start the server");
    println!("  help      Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown command: {}. Use 'lexi help' for usage.", other);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = LexiConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = SqliteStore::open(&config.data_paths.database)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    info!("Database: {}", store.db_path().display());

    let client = GeminiClient::new(&config.llm)
        .map_err(|e| anyhow::anyhow!("Failed to build completion client: {}", e))?;
    if config.llm.gemini_api_key.is_some() {
        match client.resolve_models().await {
            Ok(models) => info!(
                "Using generation model {} and embedding model {}",
                models.generation, models.embedding
            ),
            Err(e) => warn!("Model discovery failed, will retry on first use: {}", e),
        }
    } else {
        warn!("GEMINI_API_KEY is not set; model calls will fail");
    }
    let llm: Arc<dyn CompletionBackend> = Arc::new(client);

    if config.seed_samples {
        let created = seed::seed_samples(&store, llm.as_ref()).await?;
        if created > 0 {
            info!("Seeded {} sample templates", created);
        }
    }

    let state = Arc::new(AppState::new(config, store, llm));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Lexi server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
