//! Webhook HTTP Server
//!
//! The messaging sidecar posts every inbound message here. Axum with request
//! tracing and graceful shutdown.

use crate::engine::{ReplyEngine, StatsSnapshot};
use crate::message::InboundMessage;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: ReplyEngine,
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub version: &'static str,
}

impl AppState {
    pub fn new(engine: ReplyEngine) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub active_jobs: usize,
    pub engine: StatsSnapshot,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version,
        uptime_secs: state.uptime_secs(),
        active_jobs: state.engine.active_jobs(),
        engine: state.engine.stats(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Hand an inbound message to the engine; jobs continue after the response
pub async fn webhook_message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<InboundMessage>,
) -> Json<WebhookAck> {
    let dispatch = state.engine.handle_inbound(message).await;
    Json(WebhookAck {
        status: dispatch.label(),
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/webhook/message", post(webhook_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Webhook server
pub struct WebhookServer {
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl WebhookServer {
    pub fn new(addr: SocketAddr, engine: ReplyEngine) -> Self {
        Self {
            addr,
            state: Arc::new(AppState::new(engine)),
        }
    }

    /// Start the server and run until shutdown signal
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("Webhook server listening on {}", self.addr);

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Webhook server shut down gracefully");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
