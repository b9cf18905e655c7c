//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::forward::Forwarder;
use super::router::{AppState, create_router};
use crate::config::Config;
use crate::{Error, Result};

/// Forwarding gateway server
pub struct Gateway {
    /// Configuration
    config: Config,
    /// Shared state handed to the router
    state: Arc<AppState>,
}

impl Gateway {
    /// Create a new gateway.
    ///
    /// The backend origin is resolved here, once, and never changes while
    /// the gateway runs.
    pub fn new(config: Config) -> Result<Self> {
        let base = config.backend_base();
        info!(backend = %base, source = %base.source(), "Resolved backend base URL");

        let forwarder = Forwarder::new(base, config.server.max_body_size)?;
        let state = Arc::new(AppState::new(forwarder, &config.server.mount));

        Ok(Self { config, state })
    }

    /// Router serving the gateway, for embedding or tests
    pub fn router(&self) -> axum::Router {
        create_router(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        let mount = if self.state.mount.is_empty() { "/" } else { self.state.mount.as_str() };

        info!("============================================================");
        info!("RESUME EDGE v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(addr = %local, "Listening");
        info!("  ANY http://{local}{mount}/* -> {}/api/*", self.state.forwarder.base());
        info!("  GET http://{local}/health");
        info!("============================================================");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
