//! Progress server - wiring of storage, API and listener.

use crate::api;
use crate::error::{Error, Result};
use crate::storage::Storage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Configuration for a progress server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./regrow-data"),
            api_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables with sensible defaults.
    ///
    /// - `REGROW_DATA_DIR`: storage directory (default `./regrow-data`)
    /// - `REGROW_API_ADDR`: listen address (default `0.0.0.0:4000`)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("REGROW_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(addr) = std::env::var("REGROW_API_ADDR") {
            config.api_addr = addr
                .trim()
                .parse()
                .map_err(|_| Error::InvalidInput(format!("Invalid REGROW_API_ADDR: {addr}")))?;
        }

        Ok(config)
    }
}

/// Shared state for API handlers.
pub struct ServerState {
    pub storage: Arc<Storage>,
    pub config: ServerConfig,
}

/// A progress server instance.
pub struct ProgressServer {
    state: Arc<RwLock<ServerState>>,
    config: ServerConfig,
}

impl ProgressServer {
    /// Open storage and prepare the server.
    pub fn new(config: ServerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let storage = Arc::new(Storage::open(&config.data_dir)?);

        let state = Arc::new(RwLock::new(ServerState {
            storage,
            config: config.clone(),
        }));

        Ok(Self { state, config })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<RwLock<ServerState>> {
        Arc::clone(&self.state)
    }

    /// Serve the HTTP API until ctrl-c.
    pub async fn run(self) -> Result<()> {
        let records = self.state.read().await.storage.count_progress()?;
        tracing::info!("Progress server starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Data: {:?} ({} records)", self.config.data_dir, records);

        let app = api::build_router(self.state());

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Progress server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
