//! Document Q&A server binary
//!
//! Run with: cargo run -p doc-rag --bin doc-rag-server -- --config doc-rag.toml

use clap::Parser;
use doc_rag::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "doc-rag-server", version, about = "Document Q&A server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_rag=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      Doc RAG System                       ║
║         Ask questions about your uploaded documents       ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let mut config = RagConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Provider: {:?}", config.provider.kind);
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.model);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Index: {}", config.vector_db.storage_path.display());

    let server = RagServer::new(config).await?;

    let embedder = server.state().embedding_provider();
    if !embedder.health_check().await.unwrap_or(false) {
        tracing::warn!("{} is not reachable; uploads and queries will fail", embedder.name());
        tracing::warn!(
            "Make sure the models are available: {} and {}",
            embedder.model(),
            server.state().llm_provider().model()
        );
    } else {
        tracing::info!("{} is running", embedder.name());
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /upload - Upload documents (multipart field \"files\")");
    println!("  POST /query  - Ask a question (form field \"question\")");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
