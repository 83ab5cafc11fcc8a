//! Test server harness.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use vulnrag::embedding::MockEmbedder;
use vulnrag::embedding::mock::hashed_unit_vector;
use vulnrag::gateway::{HandlerState, create_router_with_state};
use vulnrag::generation::MockGenerator;
use vulnrag::history::{ChatService, JsonChatRepository};
use vulnrag::retrieval::{RetrievalPipeline, SelectionParams, VulnerabilityRecord};
use vulnrag::vectordb::{CveRecord, MockSimilarityStore};

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;
pub const TEST_DIM: usize = 32;

#[derive(Debug, Clone)]
pub struct TestServerConfig {
    pub data_path: Option<PathBuf>,
    pub chunks: Vec<String>,
    pub records: Vec<CveRecord>,
    pub select_k: usize,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            chunks: vec![
                "<think>check the records</think>".to_string(),
                "Upgrade log4j ".to_string(),
                "to 2.17.1.".to_string(),
            ],
            records: sample_records(),
            select_k: 3,
        }
    }
}

pub fn sample_records() -> Vec<CveRecord> {
    vec![
        CveRecord::new(
            "CVE-2021-44228",
            VulnerabilityRecord {
                name: Some("Log4Shell".into()),
                mitigation: Some("Upgrade to 2.17.1".into()),
                ..Default::default()
            }
            .with_product("log4j", "2.14.1")
            .with_severity("CRITICAL", 10.0),
            hashed_unit_vector("log4j remote code execution", TEST_DIM),
        ),
        CveRecord::new(
            "CVE-2021-45046",
            VulnerabilityRecord::default()
                .with_description("Incomplete fix for CVE-2021-44228")
                .with_severity("CRITICAL", 9.0),
            hashed_unit_vector("log4j incomplete fix", TEST_DIM),
        ),
        CveRecord::new(
            "CVE-2014-0160",
            VulnerabilityRecord {
                name: Some("Heartbleed".into()),
                ..Default::default()
            }
            .with_product("openssl", "1.0.1f"),
            hashed_unit_vector("openssl heartbeat over-read", TEST_DIM),
        ),
    ]
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub data_path: PathBuf,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _temp_dir: Option<TempDir>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("Server failed to start within timeout")]
    Timeout,
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Server startup failed: {0}")]
    StartupFailed(String),
}

pub async fn wait_for_server_ready(
    addr: SocketAddr,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerStartupError> {
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ServerStartupError::Timeout);
        }

        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(_) => tokio::time::sleep(interval).await,
        }
    }
}

/// Spawns a server with mocked providers and file-backed history.
///
/// Embeddings, similarity search and generation are in-process mocks; chat history is
/// written to `data_path` (a fresh temp directory unless one is given) exactly as in
/// production.
pub async fn spawn_test_server(config: TestServerConfig) -> Result<TestServer, ServerStartupError> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let local_addr = listener.local_addr()?;

    let (data_path, _temp_dir) = match config.data_path {
        Some(path) => (path, None),
        None => {
            let temp_dir =
                TempDir::new().map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
            (temp_dir.path().to_path_buf(), Some(temp_dir))
        }
    };

    let store = MockSimilarityStore::new().with_records(config.records);
    let params = SelectionParams::balanced(config.select_k)
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
    let pipeline = RetrievalPipeline::new(MockEmbedder::new(TEST_DIM), store, params);

    let repository = JsonChatRepository::open(&data_path)
        .await
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;

    let state = HandlerState::new(
        pipeline,
        MockGenerator::new(config.chunks),
        ChatService::new(repository),
    );
    let app = create_router_with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    wait_for_server_ready(
        local_addr,
        Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS),
        Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
    )
    .await?;

    Ok(TestServer {
        addr: local_addr,
        data_path,
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
        _temp_dir,
    })
}
