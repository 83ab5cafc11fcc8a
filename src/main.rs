//! vulnrag HTTP server entrypoint.

use std::net::SocketAddr;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use vulnrag::config::Config;
use vulnrag::embedding::OllamaEmbedder;
use vulnrag::gateway::{HandlerState, cors_layer, create_router_with_state};
use vulnrag::generation::GenaiGenerator;
use vulnrag::history::{ChatService, JsonChatRepository};
use vulnrag::retrieval::RetrievalPipeline;
use vulnrag::vectordb::QdrantStore;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check().await);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        qdrant = %config.qdrant_url,
        collection = %config.collection_name,
        embedding_model = %config.embedding_model,
        generation_model = %config.generation_model,
        "vulnrag starting"
    );

    let store = QdrantStore::new(
        &config.qdrant_url,
        &config.collection_name,
        config.embedding_dim as u64,
    )?;
    store.ensure_collection().await?;

    let embedder = OllamaEmbedder::new(
        &config.ollama_url,
        config.embedding_model.clone(),
        config.embedding_dim,
        config.request_timeout(),
    )?;

    let pipeline = RetrievalPipeline::new(embedder, store, config.selection_params()?)
        .with_candidate_limit(config.candidate_limit)?
        .with_stage_timeout(config.request_timeout());

    let generator =
        GenaiGenerator::with_default_client(config.generation_model.clone(), config.generation_timeout());

    let repository = JsonChatRepository::open(&config.data_path).await?;
    tracing::info!(path = %config.data_path.display(), "Chat history storage ready");
    let chats = ChatService::new(repository);

    let state = HandlerState::new(pipeline, generator, chats);
    let app = create_router_with_state(state)
        .layer(cors_layer(config.cors_allow_any, &config.cors_origins));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("vulnrag shutdown complete");
    Ok(())
}

/// Probes `/healthz` on the configured port; exit code 0 when healthy.
async fn run_health_check() -> i32 {
    let port = Config::from_env().map(|c| c.port).unwrap_or(8080);
    let url = format!("http://127.0.0.1:{}/healthz", port);

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
    {
        Ok(client) => client,
        Err(_) => return 1,
    };

    match client.get(&url).send().await {
        Ok(res) if res.status().is_success() => 0,
        _ => 1,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
