//! `KaabServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use kaab_assistant::ResponseEngine;
use kaab_core::traits::NotificationStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::http;
use crate::realtime::{ConnectionRegistry, Dispatcher, RoomBroker, SessionLimits};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Realtime routing.
    pub dispatcher: Arc<Dispatcher>,
    /// Chatbot backend.
    pub engine: Arc<ResponseEngine>,
    /// Notification persistence.
    pub notifications: Arc<dyn NotificationStore>,
    /// Limits for each WebSocket session.
    pub limits: SessionLimits,
    /// Largest inbound WebSocket message.
    pub max_message_size: usize,
    /// Parent token of every session.
    pub shutdown: CancellationToken,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The hub server.
pub struct KaabServer {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    engine: Arc<ResponseEngine>,
    notifications: Arc<dyn NotificationStore>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl KaabServer {
    /// Build a server with a fresh registry and broker.
    pub fn new(
        config: ServerConfig,
        engine: Arc<ResponseEngine>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broker = Arc::new(RoomBroker::new(Arc::clone(&registry)));
        Self {
            config,
            dispatcher: Arc::new(Dispatcher::new(registry, broker)),
            engine,
            notifications,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Share an existing shutdown coordinator.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            dispatcher: Arc::clone(&self.dispatcher),
            engine: Arc::clone(&self.engine),
            notifications: Arc::clone(&self.notifications),
            limits: self.config.session_limits(),
            max_message_size: self.config.max_message_size,
            shutdown: self.shutdown.token(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        // Store hooks are for the backend only, so browsers get no CORS grant.
        let internal = Router::new()
            .route("/internal/messages", post(http::message_saved))
            .route("/internal/questions", post(http::question_posted))
            .route("/internal/notifications", post(http::create_notification));

        Router::new()
            .route("/health", get(http::health))
            .route("/metrics", get(http::render_metrics))
            .route("/ws", get(http::ws_upgrade))
            .route("/api/chatbot", post(http::chatbot))
            .layer(CorsLayer::permissive())
            .merge(internal)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in the background until the shutdown token fires.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, "kaab server listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                warn!(error = %e, "server stopped with error");
            }
        });
        Ok((addr, handle))
    }

    /// Realtime dispatcher, for publishing domain events in-process.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
