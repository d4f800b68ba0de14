use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use super::router;
use crate::config::TutorConfig;
use crate::history::{HistoryStore, SqliteHistory};
use crate::llm::{HttpTransport, ResilientExecutor};
use crate::tutor::TutorService;

/// Application state shared across handlers
pub struct AppState {
    pub service: TutorService,
    /// Answers are recorded here when set
    pub history: Option<Arc<dyn HistoryStore>>,
}

impl AppState {
    pub fn new(service: TutorService) -> Self {
        Self {
            service,
            history: None,
        }
    }

    pub fn with_history(service: TutorService, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            service,
            history: Some(history),
        }
    }

    /// Build the live service: HTTP transport, retry policy, and history
    /// when a database path is configured
    pub fn from_config(config: &TutorConfig) -> Result<Self> {
        let transport =
            HttpTransport::from_env(&config.upstream.endpoint, &config.upstream.api_key_env)
                .context("failed to create upstream transport")?;
        let executor = ResilientExecutor::new(Arc::new(transport), config.retry);
        let service = TutorService::new(executor, config.upstream.clone());

        match &config.history.path {
            Some(path) => {
                let history = SqliteHistory::new(path, config.history.capacity)?;
                Ok(Self::with_history(service, Arc::new(history)))
            }
            None => Ok(Self::new(service)),
        }
    }
}

/// Serve until Ctrl-C
pub async fn run(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    let app = router(Arc::new(state));

    info!(%addr, "listening on http://{}/api/ask", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("server error")?;

    Ok(())
}
