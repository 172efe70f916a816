//! Server Implementation
//!
//! HTTP 服务器启动和管理

use std::future::IntoFuture;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::api;
use crate::core::{Config, Result, ServerError, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config)?,
        };

        let addr = format!("{}:{}", self.config.http_host, self.config.http_port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("🍜 Feast server listening on {}", listener.local_addr()?);

        let app = api::build_app(&state).with_state(state);
        let shutdown_timeout = Duration::from_millis(self.config.shutdown_timeout_ms);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
            let _ = tx.send(());
        });

        let mut serve = std::pin::pin!(serve.into_future());
        tokio::select! {
            res = &mut serve => res.map_err(ServerError::Io)?,
            _ = async {
                let _ = rx.await;
                tokio::time::sleep(shutdown_timeout).await;
            } => {
                tracing::warn!(
                    timeout_ms = self.config.shutdown_timeout_ms,
                    "Graceful shutdown timed out, dropping open connections"
                );
            }
        }

        Ok(())
    }
}
