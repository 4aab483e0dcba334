use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use crate::actions::ActionRegistry;
use crate::http::{AppState, panel_router};
use crate::seed;
use crate::store::MemoryBackend;

/// Configuration for the issue panel server.
pub struct ServerConfig {
    pub port: u16,
    /// Bind address; when absent, dev mode binds all interfaces and
    /// production binds loopback.
    pub host: Option<String>,
    pub dev_mode: bool,
    /// Load the demo fixture into the in-memory stores on startup.
    pub seed_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9100,
            host: None,
            dev_mode: false,
            seed_demo: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_host(&self) -> &str {
        match &self.host {
            Some(host) => host,
            None if self.dev_mode => "0.0.0.0",
            None => "127.0.0.1",
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("triage=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build the application router around the shared state.
pub fn build_router(state: Arc<AppState>, dev_mode: bool) -> Router {
    let mut app = panel_router().with_state(state);
    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Start the issue panel server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let backend = MemoryBackend::new();
    if config.seed_demo {
        let keys = seed::load_demo(&backend);
        tracing::info!(issues = keys.len(), "Loaded demo fixture");
    }

    let state = Arc::new(AppState {
        services: backend.services(),
        actions: ActionRegistry::new(),
    });

    let app = build_router(state, config.dev_mode);

    let addr = format!("{}:{}", config.bind_host(), config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!("Issue panel running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
    }
}
